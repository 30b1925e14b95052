//! Upload flow: one PDF per operation, validated locally before any backend call.
//!
//! `accept` is the drop step: it either rejects the files or yields a `PendingUpload`
//! (the preview state). `PendingUpload::confirm` writes the blob, then the metadata row.
//! The two writes are not transactional; a failed insert leaves the blob orphaned.

pub mod handlers;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::{BlobStore, TableStore};
use crate::display::format_size_mb;
use crate::errors::AppError;
use crate::models::{NewResume, ResumeRow};
use crate::notify::Notifier;

pub const PDF_MIME: &str = "application/pdf";
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_FILES: usize = 1;

const UPLOAD_FAILED_MESSAGE: &str = "Your resume could not be stored. Please try again.";

/// A file as received from the client, before validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Error, PartialEq)]
pub enum UploadRejection {
    #[error("No file was provided")]
    NoFile,

    #[error("Only one file can be uploaded at a time")]
    TooManyFiles,

    #[error("Please upload a PDF file only")]
    InvalidType,

    #[error("File is {size} bytes; the maximum is 10MB")]
    TooLarge { size: usize },

    /// The request body outgrew the transport limit before the file could be read.
    #[error("File exceeds the 10MB limit")]
    BodyTooLarge,
}

impl UploadRejection {
    pub fn title(&self) -> &'static str {
        match self {
            UploadRejection::InvalidType => "Invalid file type",
            UploadRejection::TooLarge { .. } | UploadRejection::BodyTooLarge => "File too large",
            UploadRejection::NoFile | UploadRejection::TooManyFiles => "Invalid upload",
        }
    }
}

/// A validated file awaiting confirmation.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    file_name: String,
    bytes: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadPreview {
    pub file_name: String,
    pub size_bytes: usize,
    pub size_label: String,
}

/// Validates a drop: exactly one file, at most 10 MiB, MIME type `application/pdf`.
pub fn accept(mut files: Vec<IncomingFile>) -> Result<PendingUpload, UploadRejection> {
    if files.len() > MAX_FILES {
        return Err(UploadRejection::TooManyFiles);
    }
    let file = files.pop().ok_or(UploadRejection::NoFile)?;
    if file.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadRejection::TooLarge {
            size: file.bytes.len(),
        });
    }
    if file.content_type.as_deref() != Some(PDF_MIME) {
        return Err(UploadRejection::InvalidType);
    }
    Ok(PendingUpload {
        file_name: file.file_name,
        bytes: file.bytes,
    })
}

/// Text after the last `.`; the whole name when there is no dot.
pub fn file_extension(file_name: &str) -> &str {
    file_name.rsplit('.').next().unwrap_or(file_name)
}

/// `{user_id}/{unix_millis}.{ext}`
pub fn storage_key(user_id: Uuid, at: DateTime<Utc>, file_name: &str) -> String {
    format!(
        "{}/{}.{}",
        user_id,
        at.timestamp_millis(),
        file_extension(file_name)
    )
}

impl PendingUpload {
    pub fn preview(&self) -> UploadPreview {
        UploadPreview {
            file_name: self.file_name.clone(),
            size_bytes: self.bytes.len(),
            size_label: format_size_mb(self.bytes.len() as i64),
        }
    }

    pub async fn confirm(
        self,
        store: &dyn TableStore,
        blobs: &dyn BlobStore,
        owner: Uuid,
        at: DateTime<Utc>,
    ) -> Result<ResumeRow, AppError> {
        let key = storage_key(owner, at, &self.file_name);
        let file_size = self.bytes.len() as i64;

        blobs.upload(&key, self.bytes, PDF_MIME).await?;

        let row = store
            .insert_resume(NewResume {
                user_id: owner,
                file_name: self.file_name,
                file_path: key.clone(),
                file_size,
            })
            .await
            .map_err(|e| {
                warn!("Resume row insert failed; blob {key} is orphaned: {e}");
                e
            })?;

        info!("User {owner} uploaded resume {} ({file_size} bytes)", row.id);
        Ok(row)
    }
}

/// Full drop-and-confirm for one request, reporting the outcome to `owner`.
pub async fn upload_resume(
    store: &dyn TableStore,
    blobs: &dyn BlobStore,
    notifier: &Notifier,
    owner: Uuid,
    files: Vec<IncomingFile>,
) -> Result<ResumeRow, AppError> {
    let pending = accept(files).map_err(|rejection| reject(notifier, owner, rejection))?;

    match pending.confirm(store, blobs, owner, Utc::now()).await {
        Ok(row) => {
            notifier.success(Some(owner), "Success", "Resume uploaded successfully!");
            Ok(row)
        }
        Err(e) => {
            notifier.failure(Some(owner), "Upload failed", UPLOAD_FAILED_MESSAGE);
            Err(e)
        }
    }
}

/// Validation without side effects: the preview a confirmed upload would store.
pub fn preview_upload(
    notifier: &Notifier,
    owner: Uuid,
    files: Vec<IncomingFile>,
) -> Result<UploadPreview, AppError> {
    accept(files)
        .map(|pending| pending.preview())
        .map_err(|rejection| reject(notifier, owner, rejection))
}

/// Reports a rejected drop to `owner` and turns it into a 400.
pub fn reject(notifier: &Notifier, owner: Uuid, rejection: UploadRejection) -> AppError {
    notifier.failure(Some(owner), rejection.title(), rejection.to_string());
    AppError::Validation(rejection.to_string())
}
