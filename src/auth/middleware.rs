//! Route protection.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::auth::AuthError;
use crate::http::server::AppState;
use crate::models::User;

/// Authenticated caller, inserted into request extensions by [`protect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Require a valid token belonging to an existing user.
pub async fn protect(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&request).ok_or(AuthError::MissingToken)?;
    let claims = state.jwt.validate_token(token)?;

    if !User::exists(&state.pool, claims.id).await? {
        tracing::debug!(user_id = claims.id, "Token for deleted user");
        return Err(AuthError::UserNotFound);
    }

    request.extensions_mut().insert(AuthUser { id: claims.id });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        let request = Request::get("/")
            .header(header::AUTHORIZATION, "Bearer abc.def.ghi")
            .body(())
            .unwrap();
        assert_eq!(bearer_token(&request), Some("abc.def.ghi"));

        let request = Request::get("/")
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(())
            .unwrap();
        assert_eq!(bearer_token(&request), None);

        let request = Request::get("/")
            .header(header::AUTHORIZATION, "Bearer ")
            .body(())
            .unwrap();
        assert_eq!(bearer_token(&request), None);

        let request = Request::get("/").body(()).unwrap();
        assert_eq!(bearer_token(&request), None);
    }
}
