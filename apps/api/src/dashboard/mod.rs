//! Owner dashboard: the caller's own submissions, newest first.

pub mod handlers;

use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

use crate::backend::{BlobStore, ResumeQuery, TableStore};
use crate::display::{format_date, format_score, format_size_mb};
use crate::errors::AppError;
use crate::models::resume::StatusVariant;
use crate::models::{ResumeRow, ResumeStatus};
use crate::notify::Notifier;

pub const EMPTY_DASHBOARD_MESSAGE: &str = "Upload your first resume to get started";

#[derive(Debug, Clone, Serialize)]
pub struct ResumeCard {
    pub id: Uuid,
    pub file_name: String,
    pub status: ResumeStatus,
    pub status_label: &'static str,
    pub status_icon: &'static str,
    pub status_variant: StatusVariant,
    pub score: Option<i32>,
    pub score_label: Option<String>,
    pub admin_notes: Option<String>,
    pub size_label: String,
    pub uploaded_on: String,
    pub reviewed_on: Option<String>,
}

impl From<&ResumeRow> for ResumeCard {
    fn from(row: &ResumeRow) -> Self {
        let status = row.effective_status();
        Self {
            id: row.id,
            file_name: row.file_name.clone(),
            status,
            status_label: status.label(),
            status_icon: status.icon(),
            status_variant: status.variant(),
            score: row.score,
            score_label: row.score.map(format_score),
            admin_notes: row.admin_notes.clone().filter(|n| !n.is_empty()),
            size_label: format_size_mb(row.file_size),
            uploaded_on: format_date(row.created_at),
            reviewed_on: row.reviewed_at.map(format_date),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DashboardView {
    Empty { message: &'static str },
    Listed { resumes: Vec<ResumeCard> },
}

impl DashboardView {
    pub fn from_rows(rows: &[ResumeRow]) -> Self {
        if rows.is_empty() {
            DashboardView::Empty {
                message: EMPTY_DASHBOARD_MESSAGE,
            }
        } else {
            DashboardView::Listed {
                resumes: rows.iter().map(ResumeCard::from).collect(),
            }
        }
    }

    pub fn resumes(&self) -> &[ResumeCard] {
        match self {
            DashboardView::Empty { .. } => &[],
            DashboardView::Listed { resumes } => resumes,
        }
    }
}

pub async fn load_dashboard(
    store: &dyn TableStore,
    notifier: &Notifier,
    owner: Uuid,
) -> Result<DashboardView, AppError> {
    match store.select_resumes(&ResumeQuery::owned_by(owner)).await {
        Ok(rows) => Ok(DashboardView::from_rows(&rows)),
        Err(e) => {
            notifier.failure(Some(owner), "Error", "Failed to fetch resumes");
            Err(e.into())
        }
    }
}

/// A stored file ready to hand back as an attachment.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Fetches the blob behind one of `owner`'s resumes.
pub async fn download_own_resume(
    store: &dyn TableStore,
    blobs: &dyn BlobStore,
    notifier: &Notifier,
    owner: Uuid,
    resume_id: Uuid,
) -> Result<DownloadedFile, AppError> {
    let query = ResumeQuery {
        id: Some(resume_id),
        owner: Some(owner),
        ..ResumeQuery::default()
    };
    let result = async {
        let row = store
            .select_resumes(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;
        let bytes = blobs.download(&row.file_path).await?;
        Ok::<_, AppError>(DownloadedFile {
            file_name: row.file_name,
            bytes,
        })
    }
    .await;

    if let Err(e) = &result {
        notifier.failure(Some(owner), "Download failed", e.to_string());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::upload::{upload_resume, IncomingFile, PDF_MIME};
    use chrono::{Duration, Utc};

    fn row(owner: Uuid, minutes_ago: i64) -> ResumeRow {
        ResumeRow {
            id: Uuid::new_v4(),
            user_id: owner,
            file_name: format!("cv-{minutes_ago}.pdf"),
            file_path: format!("{owner}/{minutes_ago}.pdf"),
            file_size: 1024,
            status: None,
            score: None,
            admin_notes: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            reviewed_at: None,
            reviewed_by: None,
        }
    }

    #[tokio::test]
    async fn test_upload_shows_single_pending_row_without_score() {
        let backend = MemoryBackend::new();
        let notifier = Notifier::new();
        let owner = backend.add_user("a@example.com", Some("User A"), None);

        upload_resume(
            &backend,
            &backend,
            &notifier,
            owner,
            vec![IncomingFile {
                file_name: "a.pdf".to_string(),
                content_type: Some(PDF_MIME.to_string()),
                bytes: Bytes::from(vec![0u8; 2 * 1024 * 1024]),
            }],
        )
        .await
        .unwrap();

        let view = load_dashboard(&backend, &notifier, owner).await.unwrap();
        let cards = view.resumes();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].status, ResumeStatus::Pending);
        assert_eq!(cards[0].status_variant, StatusVariant::Neutral);
        assert!(cards[0].score_label.is_none());
        assert_eq!(cards[0].size_label, "2.00 MB");
    }

    #[tokio::test]
    async fn test_only_own_rows_newest_first() {
        let backend = MemoryBackend::new();
        let owner = Uuid::new_v4();
        backend.insert_raw_resume(row(owner, 30));
        backend.insert_raw_resume(row(owner, 5));
        backend.insert_raw_resume(row(Uuid::new_v4(), 1));

        let view = load_dashboard(&backend, &Notifier::new(), owner)
            .await
            .unwrap();
        let names: Vec<_> = view.resumes().iter().map(|c| c.file_name.as_str()).collect();
        assert_eq!(names, vec!["cv-5.pdf", "cv-30.pdf"]);
    }

    #[tokio::test]
    async fn test_empty_dashboard_has_placeholder() {
        let backend = MemoryBackend::new();
        let view = load_dashboard(&backend, &Notifier::new(), Uuid::new_v4())
            .await
            .unwrap();
        assert!(matches!(
            view,
            DashboardView::Empty {
                message: EMPTY_DASHBOARD_MESSAGE
            }
        ));
    }

    #[test]
    fn test_reviewed_card_shows_score_and_notes() {
        let mut reviewed = row(Uuid::new_v4(), 0);
        reviewed.status = Some(ResumeStatus::Approved);
        reviewed.score = Some(87);
        reviewed.admin_notes = Some("Strong impact bullets".to_string());
        reviewed.reviewed_at = Some(Utc::now());

        let card = ResumeCard::from(&reviewed);
        assert_eq!(card.status_label, "Approved");
        assert_eq!(card.status_variant, StatusVariant::Positive);
        assert_eq!(card.score_label.as_deref(), Some("87/100"));
        assert!(card.reviewed_on.is_some());
    }

    #[tokio::test]
    async fn test_cannot_download_someone_elses_resume() {
        let backend = MemoryBackend::new();
        let other = row(Uuid::new_v4(), 0);
        let id = other.id;
        backend.insert_raw_resume(other);

        let err = download_own_resume(&backend, &backend, &Notifier::new(), Uuid::new_v4(), id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
