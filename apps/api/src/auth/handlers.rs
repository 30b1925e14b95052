//! Axum route handlers for sign-in, sign-out and the current-user view.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::extract::CurrentUser;
use crate::auth::magic_link::resolve_redirect;
use crate::auth::SessionState;
use crate::backend::{AuthUser, Session};
use crate::errors::AppError;
use crate::models::ProfileRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct OtpResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub email: String,
    pub code: String,
    pub redirect_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: Session,
    pub profile: Option<ProfileRow>,
    /// Post-sign-in location with the magic-link credentials removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: AuthUser,
    pub profile: Option<ProfileRow>,
    pub display_name: String,
    pub is_admin: bool,
}

impl SessionResponse {
    fn from_state(state: SessionState, redirect_to: Option<String>) -> Self {
        Self {
            session: state.session,
            profile: state.profile,
            redirect_to,
        }
    }
}

/// POST /api/v1/auth/otp
pub async fn handle_request_code(
    State(state): State<AppState>,
    Json(req): Json<OtpRequest>,
) -> Result<(StatusCode, Json<OtpResponse>), AppError> {
    state.auth.sign_in_with_email(&req.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(OtpResponse {
            message: "Check your email for a sign-in code".to_string(),
        }),
    ))
}

/// POST /api/v1/auth/verify
pub async fn handle_verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.auth.complete_sign_in(&req.email, &req.code).await?;
    Ok(Json(SessionResponse::from_state(session, None)))
}

/// GET /api/v1/auth/callback
pub async fn handle_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackQuery>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .auth
        .complete_sign_in(&params.email, &params.code)
        .await?;
    let redirect_to = resolve_redirect(&state.config.public_url, params.redirect_to.as_deref())
        .map(|url| url.to_string());
    Ok(Json(SessionResponse::from_state(session, redirect_to)))
}

/// POST /api/v1/auth/sign-out
pub async fn handle_sign_out(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<StatusCode, AppError> {
    state.auth.sign_out(user.access_token()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/me
pub async fn handle_me(user: CurrentUser) -> Json<MeResponse> {
    let CurrentUser(session) = user;
    let is_admin = session.is_admin();
    let display_name = session
        .profile
        .as_ref()
        .and_then(|p| p.full_name.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| session.user.email.clone());
    Json(MeResponse {
        user: session.user,
        profile: session.profile,
        display_name,
        is_admin,
    })
}
