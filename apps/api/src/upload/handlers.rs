use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extract::CurrentUser;
use crate::dashboard::{load_dashboard, DashboardView, ResumeCard};
use crate::errors::AppError;
use crate::notify::Notifier;
use crate::state::AppState;
use crate::upload::{preview_upload, reject, upload_resume, IncomingFile, UploadRejection};

#[derive(Debug, Default, Deserialize)]
pub struct UploadOptions {
    /// Validate and return the preview without storing anything.
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub resume: ResumeCard,
    /// The caller's refreshed dashboard.
    pub dashboard: DashboardView,
}

/// POST /api/v1/resumes[?dry_run=true] (multipart/form-data; file parts only)
pub async fn handle_upload(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(options): Query<UploadOptions>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let files = read_files(multipart, &state.notifier, user.id()).await?;

    if options.dry_run {
        let preview = preview_upload(&state.notifier, user.id(), files)?;
        return Ok(Json(preview).into_response());
    }

    let row = upload_resume(
        state.store.as_ref(),
        state.blobs.as_ref(),
        &state.notifier,
        user.id(),
        files,
    )
    .await?;

    let dashboard = load_dashboard(state.store.as_ref(), &state.notifier, user.id()).await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            resume: ResumeCard::from(&row),
            dashboard,
        }),
    )
        .into_response())
}

async fn read_files(
    mut multipart: Multipart,
    notifier: &Notifier,
    owner: Uuid,
) -> Result<Vec<IncomingFile>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, notifier, owner))?
    {
        // Plain form fields carry no file name and are ignored.
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, notifier, owner))?;
        files.push(IncomingFile {
            file_name,
            content_type,
            bytes,
        });
    }
    Ok(files)
}

/// A body cut off by the size limit is an oversize file, not a malformed request.
fn multipart_error(err: MultipartError, notifier: &Notifier, owner: Uuid) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        reject(notifier, owner, UploadRejection::BodyTooLarge)
    } else {
        AppError::Validation(format!("Malformed upload: {}", err.body_text()))
    }
}
