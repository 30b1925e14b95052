use axum::{
    extract::{Path, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::auth::extract::CurrentUser;
use crate::dashboard::{download_own_resume, load_dashboard, DashboardView, DownloadedFile};
use crate::errors::AppError;
use crate::state::AppState;
use crate::upload::PDF_MIME;

/// GET /api/v1/resumes
pub async fn handle_list_own(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<DashboardView>, AppError> {
    let view = load_dashboard(state.store.as_ref(), &state.notifier, user.id()).await?;
    Ok(Json(view))
}

/// GET /api/v1/resumes/:id/download
pub async fn handle_download_own(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let file = download_own_resume(
        state.store.as_ref(),
        state.blobs.as_ref(),
        &state.notifier,
        user.id(),
        id,
    )
    .await?;
    Ok(pdf_attachment(file))
}

/// The stored PDF as a download with its original file name.
pub fn pdf_attachment(file: DownloadedFile) -> Response {
    let file_name: String = file
        .file_name
        .chars()
        .map(|c| if c == '"' || !c.is_ascii() || c.is_ascii_control() { '_' } else { c })
        .collect();
    (
        [
            (CONTENT_TYPE, PDF_MIME.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        file.bytes,
    )
        .into_response()
}
