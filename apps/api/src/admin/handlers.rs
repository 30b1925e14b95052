use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::admin::{AdminRow, ReviewDraft, SaveOutcome, SignedView};
use crate::auth::extract::AdminUser;
use crate::dashboard::handlers::pdf_attachment;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SaveResponse {
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumes: Option<Vec<AdminRow>>,
}

/// GET /api/v1/admin/resumes
pub async fn handle_list_all(
    State(state): State<AppState>,
    admin: AdminUser,
) -> Result<Json<Vec<AdminRow>>, AppError> {
    Ok(Json(state.admin.list(admin.id()).await?))
}

/// PATCH /api/v1/admin/resumes/:id
pub async fn handle_save_review(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(draft): Json<ReviewDraft>,
) -> Result<Json<SaveResponse>, AppError> {
    let response = match state.admin.save(admin.id(), id, &draft).await? {
        SaveOutcome::Saved(rows) => SaveResponse {
            saved: true,
            resumes: Some(rows),
        },
        SaveOutcome::Refused => SaveResponse {
            saved: false,
            resumes: None,
        },
    };
    Ok(Json(response))
}

/// GET /api/v1/admin/resumes/:id/view
pub async fn handle_view(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SignedView>, AppError> {
    Ok(Json(state.admin.view(admin.id(), id).await?))
}

/// GET /api/v1/admin/resumes/:id/download
pub async fn handle_download(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let file = state.admin.download(admin.id(), id).await?;
    Ok(pdf_attachment(file))
}
