pub mod health;
pub mod notifications;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};

use crate::admin::handlers as admin;
use crate::auth::handlers as auth;
use crate::dashboard::handlers as dashboard;
use crate::leaderboard::handlers as leaderboard;
use crate::state::AppState;
use crate::upload::{handlers as upload, MAX_UPLOAD_BYTES};

/// Room for one maximum-size file plus multipart framing, so oversize files still reach
/// the upload validation instead of being cut off by the transport limit.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/auth/otp", post(auth::handle_request_code))
        .route("/api/v1/auth/verify", post(auth::handle_verify))
        .route("/api/v1/auth/callback", get(auth::handle_callback))
        .route("/api/v1/auth/sign-out", post(auth::handle_sign_out))
        .route("/api/v1/auth/me", get(auth::handle_me))
        .route(
            "/api/v1/notifications",
            get(notifications::handle_notifications),
        )
        // Owner
        .route(
            "/api/v1/resumes",
            post(upload::handle_upload)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
                .get(dashboard::handle_list_own),
        )
        .route(
            "/api/v1/resumes/:id/download",
            get(dashboard::handle_download_own),
        )
        .route("/api/v1/leaderboard", get(leaderboard::handle_leaderboard))
        // Admin
        .route("/api/v1/admin/resumes", get(admin::handle_list_all))
        .route(
            "/api/v1/admin/resumes/:id",
            patch(admin::handle_save_review),
        )
        .route("/api/v1/admin/resumes/:id/view", get(admin::handle_view))
        .route(
            "/api/v1/admin/resumes/:id/download",
            get(admin::handle_download),
        )
        .with_state(state)
}
