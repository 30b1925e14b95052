//! Backend collaborator: authentication, the `profiles` / `resumes` tables and the
//! `resumes` blob bucket.
//!
//! Every component talks to the backend through these traits only. Production wiring is
//! `PgBackend` (PostgreSQL via sqlx) plus `S3BlobStore`; tests use `memory::MemoryBackend`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{NewResume, ProfileRow, ResumeRow, ResumeStatus, ReviewUpdate};

pub mod credentials;
pub mod mailer;
#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod storage;

pub use postgres::PgBackend;
pub use storage::S3BlobStore;

/// Name of the bucket holding uploaded resumes.
pub const RESUME_BUCKET: &str = "resumes";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Invalid or expired one-time code")]
    InvalidCode,

    #[error("Not found: {0}")]
    NotFound(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Auth
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub access_token: String,
    pub user: AuthUser,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut { access_token: String },
}

/// Live sessions at subscription time, plus every change after it.
pub struct AuthSubscription {
    pub initial: Vec<Session>,
    pub events: broadcast::Receiver<AuthEvent>,
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn subscribe(&self) -> Result<AuthSubscription, BackendError>;

    /// Emails a one-time code and a magic link that lands on `redirect_to`.
    async fn send_one_time_code(&self, email: &str, redirect_to: &str) -> Result<(), BackendError>;

    async fn verify_one_time_code(&self, email: &str, code: &str) -> Result<Session, BackendError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Tables
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResumeOrder {
    #[default]
    NewestFirst,
    HighestScore,
}

/// Filter, ordering and limit for a `resumes` select. Unset filters match everything.
#[derive(Debug, Clone, Default)]
pub struct ResumeQuery {
    pub id: Option<Uuid>,
    pub owner: Option<Uuid>,
    pub status: Option<ResumeStatus>,
    pub scored_only: bool,
    pub order: ResumeOrder,
    pub limit: Option<i64>,
}

impl ResumeQuery {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn owned_by(owner: Uuid) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    pub fn matches(&self, row: &ResumeRow) -> bool {
        self.id.map_or(true, |id| row.id == id)
            && self.owner.map_or(true, |owner| row.user_id == owner)
            && self.status.map_or(true, |status| row.status == Some(status))
            && (!self.scored_only || row.score.is_some())
    }
}

#[async_trait]
pub trait TableStore: Send + Sync {
    async fn insert_resume(&self, resume: NewResume) -> Result<ResumeRow, BackendError>;

    async fn select_resumes(&self, query: &ResumeQuery) -> Result<Vec<ResumeRow>, BackendError>;

    /// Returns `BackendError::NotFound` when no row has this id.
    async fn update_resume(
        &self,
        id: Uuid,
        update: &ReviewUpdate,
    ) -> Result<ResumeRow, BackendError>;

    async fn profile_by_user(&self, user_id: Uuid) -> Result<Option<ProfileRow>, BackendError>;

    async fn profiles_by_users(&self, user_ids: &[Uuid]) -> Result<Vec<ProfileRow>, BackendError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Blobs
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, key: &str, bytes: Bytes, content_type: &str)
        -> Result<(), BackendError>;

    async fn download(&self, key: &str) -> Result<Bytes, BackendError>;

    /// Time-limited read URL for `key`.
    async fn signed_url(&self, key: &str, ttl_secs: u64) -> Result<String, BackendError>;
}
