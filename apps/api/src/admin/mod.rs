//! Admin review panel.
//!
//! Lists every submission with its submitter, commits review drafts one row at a time and
//! hands out signed view URLs or raw downloads. Callers are expected to have passed the
//! `AdminUser` gate already.

pub mod handlers;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::{BlobStore, ResumeQuery, TableStore};
use crate::dashboard::DownloadedFile;
use crate::display::{format_date, format_size_mb};
use crate::errors::AppError;
use crate::join::{fetch_resumes_with_submitters, Submitter};
use crate::models::{ResumeRow, ResumeStatus, ReviewUpdate};
use crate::notify::Notifier;

pub const SIGNED_URL_TTL_SECS: u64 = 3600;
pub const MIN_SCORE: i64 = 0;
pub const MAX_SCORE: i64 = 100;

/// Leading-integer parse of the score field: optional whitespace and sign, then digits.
/// Anything after the digits is ignored; no digits at all means "no score".
pub fn parse_score_draft(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let digits: &str = &rest[..rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len())];
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.bytes().fold(0i64, |acc, d| {
        acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}

/// Editable review fields for one row, committed only by an explicit save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDraft {
    #[serde(default)]
    pub status: ResumeStatus,
    #[serde(default)]
    pub score: String,
    #[serde(default)]
    pub notes: String,
}

impl From<&ResumeRow> for ReviewDraft {
    fn from(row: &ResumeRow) -> Self {
        Self {
            status: row.effective_status(),
            score: row.score.map(|s| s.to_string()).unwrap_or_default(),
            notes: row.admin_notes.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminRow {
    pub resume: ResumeRow,
    pub submitter: Submitter,
    pub submitted_by: String,
    pub size_label: String,
    pub submitted_on: String,
    pub draft: ReviewDraft,
}

impl AdminRow {
    fn new(resume: ResumeRow, submitter: Submitter) -> Self {
        Self {
            submitted_by: submitter.display_name().to_string(),
            size_label: format_size_mb(resume.file_size),
            submitted_on: format_date(resume.created_at),
            draft: ReviewDraft::from(&resume),
            resume,
            submitter,
        }
    }
}

#[derive(Debug)]
pub enum SaveOutcome {
    /// Persisted; carries the refetched listing.
    Saved(Vec<AdminRow>),
    /// Score parsed but outside 0..=100. Nothing was sent to the store.
    Refused,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedView {
    pub url: String,
    pub expires_in: u64,
}

/// Rows with a save in flight. Dropping the guard releases the row.
struct SaveGuard {
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
    id: Uuid,
}

impl SaveGuard {
    fn acquire(in_flight: &Arc<Mutex<HashSet<Uuid>>>, id: Uuid) -> Option<Self> {
        let mut rows = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        rows.insert(id).then(|| SaveGuard {
            in_flight: Arc::clone(in_flight),
            id,
        })
    }
}

impl Drop for SaveGuard {
    fn drop(&mut self) {
        let mut rows = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        rows.remove(&self.id);
    }
}

#[derive(Clone)]
pub struct AdminPanel {
    store: Arc<dyn TableStore>,
    blobs: Arc<dyn BlobStore>,
    notifier: Notifier,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl AdminPanel {
    pub fn new(store: Arc<dyn TableStore>, blobs: Arc<dyn BlobStore>, notifier: Notifier) -> Self {
        Self {
            store,
            blobs,
            notifier,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Every submission, newest first, with its submitter.
    pub async fn list(&self, reviewer: Uuid) -> Result<Vec<AdminRow>, AppError> {
        match fetch_resumes_with_submitters(self.store.as_ref(), &ResumeQuery::default()).await {
            Ok(rows) => Ok(rows
                .into_iter()
                .map(|(resume, submitter)| AdminRow::new(resume, submitter))
                .collect()),
            Err(e) => {
                self.notifier
                    .failure(Some(reviewer), "Error", "Failed to fetch resumes");
                Err(e.into())
            }
        }
    }

    pub async fn save(
        &self,
        reviewer: Uuid,
        id: Uuid,
        draft: &ReviewDraft,
    ) -> Result<SaveOutcome, AppError> {
        let _guard = SaveGuard::acquire(&self.in_flight, id).ok_or_else(|| {
            AppError::Conflict(format!("A save for resume {id} is already in progress"))
        })?;

        let score = match parse_score_draft(&draft.score) {
            Some(score) if !(MIN_SCORE..=MAX_SCORE).contains(&score) => {
                info!("Refusing out-of-range score {score} for resume {id}");
                return Ok(SaveOutcome::Refused);
            }
            // In range, so the narrowing cannot fail.
            Some(score) => i32::try_from(score).ok(),
            None => None,
        };

        let update = ReviewUpdate {
            status: draft.status,
            score,
            admin_notes: draft.notes.clone(),
            reviewed_by: reviewer,
            reviewed_at: Utc::now(),
        };
        if let Err(e) = self.store.update_resume(id, &update).await {
            self.notifier
                .failure(Some(reviewer), "Error", "Failed to update resume");
            return Err(e.into());
        }
        info!(
            "Resume {} reviewed by {}: {} {:?}",
            id,
            reviewer,
            update.status.as_str(),
            update.score
        );
        self.notifier
            .success(Some(reviewer), "Success", "Resume updated successfully");

        Ok(SaveOutcome::Saved(self.list(reviewer).await?))
    }

    pub async fn view(&self, reviewer: Uuid, id: Uuid) -> Result<SignedView, AppError> {
        let result = async {
            let row = self.find(id).await?;
            let url = self
                .blobs
                .signed_url(&row.file_path, SIGNED_URL_TTL_SECS)
                .await?;
            Ok::<_, AppError>(SignedView {
                url,
                expires_in: SIGNED_URL_TTL_SECS,
            })
        }
        .await;

        if let Err(e) = &result {
            warn!("Signed URL for resume {id} failed: {e}");
            self.notifier
                .failure(Some(reviewer), "Error", "Failed to view resume");
        }
        result
    }

    pub async fn download(&self, reviewer: Uuid, id: Uuid) -> Result<DownloadedFile, AppError> {
        let result = async {
            let row = self.find(id).await?;
            let bytes = self.blobs.download(&row.file_path).await?;
            Ok::<_, AppError>(DownloadedFile {
                file_name: row.file_name,
                bytes,
            })
        }
        .await;

        if let Err(e) = &result {
            warn!("Download of resume {id} failed: {e}");
            self.notifier
                .failure(Some(reviewer), "Error", "Failed to download resume");
        }
        result
    }

    async fn find(&self, id: Uuid) -> Result<ResumeRow, AppError> {
        self.store
            .select_resumes(&ResumeQuery::by_id(id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
    }
}
