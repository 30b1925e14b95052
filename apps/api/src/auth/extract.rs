//! Request extractors that resolve the caller from the auth context.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use uuid::Uuid;

use super::SessionState;
use crate::errors::AppError;
use crate::models::ProfileRow;
use crate::state::AppState;

/// The signed-in caller behind a `Bearer` access token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionState);

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.0.user.id
    }

    pub fn access_token(&self) -> &str {
        &self.0.session.access_token
    }

    pub fn profile(&self) -> Option<&ProfileRow> {
        self.0.profile.as_ref()
    }
}

/// A `CurrentUser` whose profile carries `is_admin = true`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

impl AdminUser {
    pub fn id(&self) -> Uuid {
        self.0.id()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if state.auth.is_loading() {
            return Err(AppError::AuthLoading);
        }
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        state
            .auth
            .settled_session(token)
            .await
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        // Current profile as held by the context, not the copy taken at extraction.
        let is_admin = state
            .auth
            .profile(user.access_token())
            .is_some_and(|profile| profile.is_admin());
        if !is_admin {
            tracing::warn!("Admin access denied for user {}", user.id());
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc123"))), Some("abc123"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc123"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer   "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }
}
