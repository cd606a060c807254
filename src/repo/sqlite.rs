use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool};
use uuid::Uuid;

use super::{ConversationExists, ConversationRepository, MessageRepository};
use crate::db::{Conversation, ConversationType, Member, Message, format_time, parse_time};

#[derive(Clone)]
pub struct SqliteConversationRepository {
    db_pool: SqlitePool,
}

impl SqliteConversationRepository {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Members of every listed conversation in one query, keyed by
    /// conversation id and in joining order.
    async fn members_of(&self, ids: &[String]) -> anyhow::Result<HashMap<String, Vec<Member>>> {
        let mut members: HashMap<String, Vec<Member>> = HashMap::new();
        if ids.is_empty() {
            return Ok(members);
        }

        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM conversation_members WHERE conversation_id IN ({}) ORDER BY conversation_id, position",
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<Sqlite, MemberRow>(&sql);
        for id in ids {
            query = query.bind(id.as_str());
        }

        for row in query.fetch_all(&self.db_pool).await? {
            let conversation_id = row.0.clone();
            members.entry(conversation_id).or_default().push(member_from_row(row)?);
        }
        Ok(members)
    }
}

type ConversationRow = (String, String, String, String, String);
type MemberRow = (String, String, String, String, String);

const CONVERSATION_COLUMNS: &str = "c.id,c.type,c.created_by,c.created_at,c.updated_at";
const MEMBER_COLUMNS: &str = "conversation_id,user_id,joined_at,created_at,updated_at";

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

fn member_from_row((_, user_id, joined_at, created_at, updated_at): MemberRow) -> anyhow::Result<Member> {
    Ok(Member {
        user_id: Uuid::parse_str(&user_id)?,
        joined_at: parse_time(&joined_at)?,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    })
}

fn conversation_from_row(
    (id, kind, created_by, created_at, updated_at): ConversationRow,
    members: Vec<Member>,
) -> anyhow::Result<Conversation> {
    Ok(Conversation {
        id: Uuid::parse_str(&id)?,
        kind: kind.parse()?,
        members,
        created_by: Uuid::parse_str(&created_by)?,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    })
}

#[async_trait]
impl ConversationRepository for SqliteConversationRepository {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Conversation>> {
        let row: Option<ConversationRow> =
            sqlx::query_as(&format!("SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id=?"))
                .bind(id.to_string())
                .fetch_optional(&self.db_pool)
                .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut members = self.members_of(std::slice::from_ref(&row.0)).await?;
        let members = members.remove(&row.0).unwrap_or_default();
        Ok(Some(conversation_from_row(row, members)?))
    }

    async fn find_by_members(
        &self,
        user_ids: &[Uuid],
        kind: Option<ConversationType>,
    ) -> anyhow::Result<Vec<Conversation>> {
        let mut user_ids: Vec<String> = user_ids.iter().map(Uuid::to_string).collect();
        user_ids.sort();
        user_ids.dedup();
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c
            JOIN conversation_members m ON m.conversation_id = c.id
            WHERE m.user_id IN ({}) AND (? IS NULL OR c.type=?)
            GROUP BY c.id
            HAVING COUNT(DISTINCT m.user_id) = ?",
            placeholders(user_ids.len())
        );
        let mut query = sqlx::query_as::<Sqlite, ConversationRow>(&sql);
        for user_id in &user_ids {
            query = query.bind(user_id.as_str());
        }
        let rows = query
            .bind(kind.map(|k| k.as_str()))
            .bind(kind.map(|k| k.as_str()))
            .bind(user_ids.len() as i64)
            .fetch_all(&self.db_pool)
            .await?;

        let ids: Vec<String> = rows.iter().map(|row| row.0.clone()).collect();
        let mut members = self.members_of(&ids).await?;

        let mut conversations = rows
            .into_iter()
            .map(|row| {
                let of_conversation = members.remove(&row.0).unwrap_or_default();
                conversation_from_row(row, of_conversation)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn insert(&self, conversation: &Conversation) -> anyhow::Result<()> {
        let mut tx = self.db_pool.begin().await?;

        sqlx::query(
            "INSERT INTO conversations (id,type,pair_key,created_by,created_at,updated_at) values (?,?,?,?,?,?)",
        )
        .bind(conversation.id.to_string())
        .bind(conversation.kind.as_str())
        .bind(conversation.pair_key())
        .bind(conversation.created_by.to_string())
        .bind(format_time(conversation.created_at)?)
        .bind(format_time(conversation.updated_at)?)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            let duplicate = matches!(
                &err,
                sqlx::Error::Database(db) if db.is_unique_violation() && db.message().contains("pair_key")
            );
            if duplicate {
                anyhow::Error::from(ConversationExists)
            } else {
                anyhow::Error::from(err)
            }
        })?;

        for (position, member) in conversation.members.iter().enumerate() {
            sqlx::query(
                "INSERT INTO conversation_members (conversation_id,user_id,position,joined_at,created_at,updated_at) values (?,?,?,?,?,?)",
            )
            .bind(conversation.id.to_string())
            .bind(member.user_id.to_string())
            .bind(position as i64)
            .bind(format_time(member.joined_at)?)
            .bind(format_time(member.created_at)?)
            .bind(format_time(member.updated_at)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct SqliteMessageRepository {
    db_pool: SqlitePool,
}

impl SqliteMessageRepository {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

type MessageRow = (String, String, String, Option<String>, String, String, String, String, String);

const MESSAGE_COLUMNS: &str = "id,conversation_id,sender_id,reply_to,content,status,emotions,created_at,updated_at";

fn message_from_row(
    (id, conversation_id, sender_id, reply_to, content, status, emotions, created_at, updated_at): MessageRow,
) -> anyhow::Result<Message> {
    Ok(Message {
        id: Uuid::parse_str(&id)?,
        conversation_id: Uuid::parse_str(&conversation_id)?,
        sender_id: Uuid::parse_str(&sender_id)?,
        reply_to: match reply_to {
            Some(x) => Some(Uuid::parse_str(&x)?),
            None => None,
        },
        content,
        status,
        emotions: serde_json::from_str(&emotions)?,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    })
}

#[async_trait]
impl MessageRepository for SqliteMessageRepository {
    async fn insert(&self, message: &Message) -> anyhow::Result<()> {
        sqlx::query(&format!("INSERT INTO messages ({MESSAGE_COLUMNS}) values (?,?,?,?,?,?,?,?,?)"))
            .bind(message.id.to_string())
            .bind(message.conversation_id.to_string())
            .bind(message.sender_id.to_string())
            .bind(message.reply_to.as_ref().map(Uuid::to_string))
            .bind(&message.content)
            .bind(&message.status)
            .bind(serde_json::to_string(&message.emotions)?)
            .bind(format_time(message.created_at)?)
            .bind(format_time(message.updated_at)?)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Message>> {
        let row: Option<MessageRow> = sqlx::query_as(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id=?"))
            .bind(id.to_string())
            .fetch_optional(&self.db_pool)
            .await?;

        row.map(message_from_row).transpose()
    }

    async fn find_by_conversation(&self, conversation_id: Uuid, limit: u32) -> anyhow::Result<Vec<Message>> {
        // v7 ids sort by creation time
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id=? ORDER BY id DESC LIMIT ?"
        ))
        .bind(conversation_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter().map(message_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::{db, msg::construct_message};

    async fn pool() -> SqlitePool {
        let db_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::migrate(&db_pool).await.unwrap();
        db_pool
    }

    #[tokio::test]
    async fn conversation_keeps_member_order() {
        let repo = SqliteConversationRepository::new(pool().await);
        let (me, friend) = (Uuid::now_v7(), Uuid::now_v7());
        let conversation = Conversation::individual(me, friend);

        repo.insert(&conversation).await.unwrap();
        let found = repo.find_by_id(conversation.id).await.unwrap().unwrap();

        assert_eq!(found.kind, ConversationType::Individual);
        assert_eq!(found.created_by, me);
        assert_eq!(
            found.members.iter().map(|m| m.user_id).collect::<Vec<_>>(),
            vec![me, friend]
        );
    }

    #[tokio::test]
    async fn unknown_conversation_is_none() {
        let repo = SqliteConversationRepository::new(pool().await);
        assert!(repo.find_by_id(Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_members_requires_every_member() {
        let repo = SqliteConversationRepository::new(pool().await);
        let (me, friend, stranger) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let ours = Conversation::individual(me, friend);
        let theirs = Conversation::individual(me, stranger);
        repo.insert(&ours).await.unwrap();
        repo.insert(&theirs).await.unwrap();

        let mine = repo.find_by_members(&[me], None).await.unwrap();
        assert_eq!(mine.len(), 2);

        let with_friend = repo.find_by_members(&[me, friend], Some(ConversationType::Individual)).await.unwrap();
        assert_eq!(with_friend.len(), 1);
        assert_eq!(with_friend[0].id, ours.id);

        let groups = repo.find_by_members(&[me], Some(ConversationType::Group)).await.unwrap();
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn find_by_members_loads_members_of_every_match() {
        let repo = SqliteConversationRepository::new(pool().await);
        let (me, a, b) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        repo.insert(&Conversation::individual(me, a)).await.unwrap();
        repo.insert(&Conversation::individual(b, me)).await.unwrap();

        let mine = repo.find_by_members(&[me, me], None).await.unwrap();
        assert_eq!(mine.len(), 2);
        for conversation in &mine {
            assert_eq!(conversation.members.len(), 2);
            assert!(conversation.is_member(me));
        }
        assert!(repo.find_by_members(&[a, b], None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_individual_conversation_for_a_pair_is_refused() {
        let repo = SqliteConversationRepository::new(pool().await);
        let (me, friend) = (Uuid::now_v7(), Uuid::now_v7());
        repo.insert(&Conversation::individual(me, friend)).await.unwrap();

        let err = repo.insert(&Conversation::individual(friend, me)).await.unwrap_err();
        assert!(err.is::<ConversationExists>());

        let stored = repo.find_by_members(&[me, friend], None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].created_by, me);
    }

    #[tokio::test]
    async fn groups_may_share_members() {
        let repo = SqliteConversationRepository::new(pool().await);
        let (me, friend) = (Uuid::now_v7(), Uuid::now_v7());
        for _ in 0..2 {
            let mut group = Conversation::individual(me, friend);
            group.kind = ConversationType::Group;
            repo.insert(&group).await.unwrap();
        }

        let groups = repo.find_by_members(&[me, friend], Some(ConversationType::Group)).await.unwrap();
        assert_eq!(groups.len(), 2);
    }

    #[tokio::test]
    async fn stored_message_reads_back() {
        let repo = SqliteMessageRepository::new(pool().await);
        let reply_to = Uuid::now_v7();
        let message = construct_message(Uuid::now_v7(), Uuid::now_v7(), Some(reply_to), "hello world".to_owned());

        repo.insert(&message).await.unwrap();
        let found = repo.find_by_id(message.id).await.unwrap().unwrap();

        assert_eq!(found.id, message.id);
        assert_eq!(found.reply_to, Some(reply_to));
        assert_eq!(found.content, "hello world");
        assert_eq!(found.status, db::STATUS_DELIVERED);
        assert!(found.emotions.is_empty());
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let repo = SqliteMessageRepository::new(pool().await);
        let (sender, conversation_id) = (Uuid::now_v7(), Uuid::now_v7());

        let mut ids = Vec::new();
        for n in 0..5 {
            let message = construct_message(sender, conversation_id, None, format!("message {n}"));
            repo.insert(&message).await.unwrap();
            ids.push(message.id);
        }
        repo.insert(&construct_message(sender, Uuid::now_v7(), None, "elsewhere".to_owned()))
            .await
            .unwrap();

        let history = repo.find_by_conversation(conversation_id, 3).await.unwrap();
        assert_eq!(
            history.iter().map(|m| m.id).collect::<Vec<_>>(),
            ids.iter().rev().take(3).copied().collect::<Vec<_>>()
        );
    }
}
