use axum::{extract::FromRequestParts, http::{StatusCode, request::Parts}};
use uuid::Uuid;

/// Set by the authorizer in front of this service once it has verified the
/// caller.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
}

impl Identity {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let unauthorized = (StatusCode::UNAUTHORIZED, "user not found");

        let Some(raw) = parts.headers.get(USER_ID_HEADER) else {
            return Err(unauthorized);
        };
        let user_id = raw
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or(unauthorized)?;

        Ok(Identity { user_id })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<Identity, (StatusCode, &'static str)> {
        let (mut parts, _) = request.into_parts();
        Identity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_the_authorizer_header() {
        let user_id = Uuid::now_v7();
        let request = Request::builder()
            .header(USER_ID_HEADER, user_id.to_string())
            .body(())
            .unwrap();

        assert_eq!(extract(request).await.unwrap(), Identity::new(user_id));
    }

    #[tokio::test]
    async fn missing_or_malformed_is_unauthorized() {
        let missing = Request::builder().body(()).unwrap();
        assert_eq!(extract(missing).await.unwrap_err().0, StatusCode::UNAUTHORIZED);

        let malformed = Request::builder().header(USER_ID_HEADER, "nobody").body(()).unwrap();
        assert_eq!(extract(malformed).await.unwrap_err().0, StatusCode::UNAUTHORIZED);
    }
}
