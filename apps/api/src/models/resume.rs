use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Review lifecycle of a submission. A `NULL` column reads as `Pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "resume_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResumeStatus {
    #[default]
    Pending,
    Approved,
    NeedsRevision,
    Rejected,
}

/// Presentation tone of a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusVariant {
    Neutral,
    Positive,
    Negative,
}

impl ResumeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeStatus::Pending => "pending",
            ResumeStatus::Approved => "approved",
            ResumeStatus::NeedsRevision => "needs_revision",
            ResumeStatus::Rejected => "rejected",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResumeStatus::Pending => "Pending",
            ResumeStatus::Approved => "Approved",
            ResumeStatus::NeedsRevision => "Needs Revision",
            ResumeStatus::Rejected => "Rejected",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ResumeStatus::Pending => "clock",
            ResumeStatus::Approved => "check-circle",
            ResumeStatus::NeedsRevision => "alert-circle",
            ResumeStatus::Rejected => "x-circle",
        }
    }

    pub fn variant(&self) -> StatusVariant {
        match self {
            ResumeStatus::Pending => StatusVariant::Neutral,
            ResumeStatus::Approved => StatusVariant::Positive,
            ResumeStatus::NeedsRevision | ResumeStatus::Rejected => StatusVariant::Negative,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub status: Option<ResumeStatus>,
    pub score: Option<i32>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
}

impl ResumeRow {
    pub fn effective_status(&self) -> ResumeStatus {
        self.status.unwrap_or_default()
    }
}

/// Metadata row written by the owner right after the blob upload.
#[derive(Debug, Clone)]
pub struct NewResume {
    pub user_id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
}

/// Fields an administrator may change on a resume row.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewUpdate {
    pub status: ResumeStatus,
    pub score: Option<i32>,
    pub admin_notes: String,
    pub reviewed_by: Uuid,
    pub reviewed_at: DateTime<Utc>,
}
