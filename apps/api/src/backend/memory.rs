//! In-memory backend for tests: all three collaborator traits, failure injection and
//! call counters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::credentials::{
    generate_access_token, generate_code, normalize_email, MAX_CODE_ATTEMPTS,
};
use super::{
    AuthBackend, AuthEvent, AuthSubscription, AuthUser, BackendError, BlobStore, ResumeOrder,
    ResumeQuery, Session, TableStore,
};
use crate::models::{NewResume, ProfileRow, ResumeRow, ReviewUpdate};

#[derive(Default)]
struct Inner {
    users: HashMap<String, AuthUser>,
    codes: HashMap<String, String>,
    code_attempts: HashMap<String, i32>,
    sessions: HashMap<String, Session>,
    profiles: Vec<ProfileRow>,
    resumes: Vec<ResumeRow>,
    blobs: HashMap<String, (Bytes, String)>,
}

pub struct MemoryBackend {
    inner: Mutex<Inner>,
    events: broadcast::Sender<AuthEvent>,
    pub fail_resume_insert: AtomicBool,
    pub fail_blob_upload: AtomicBool,
    pub fail_selects: AtomicBool,
    pub blob_uploads: AtomicUsize,
    pub resume_inserts: AtomicUsize,
    pub resume_updates: AtomicUsize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Mutex::new(Inner::default()),
            events,
            fail_resume_insert: AtomicBool::new(false),
            fail_blob_upload: AtomicBool::new(false),
            fail_selects: AtomicBool::new(false),
            blob_uploads: AtomicUsize::new(0),
            resume_inserts: AtomicUsize::new(0),
            resume_updates: AtomicUsize::new(0),
        }
    }

    /// Registers an auth user with a profile, as the sign-up trigger would.
    pub fn add_user(&self, email: &str, full_name: Option<&str>, is_admin: Option<bool>) -> Uuid {
        let mut inner = self.inner.lock().unwrap();
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: normalize_email(email),
        };
        inner.profiles.push(ProfileRow {
            id: Uuid::new_v4(),
            user_id: user.id,
            email: user.email.clone(),
            full_name: full_name.map(String::from),
            is_admin,
            created_at: Utc::now(),
        });
        inner.users.insert(user.email.clone(), user.clone());
        user.id
    }

    /// Plain-text code of the last mail sent to `email`.
    pub fn last_code(&self, email: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .codes
            .get(&normalize_email(email))
            .cloned()
    }

    pub fn insert_raw_resume(&self, row: ResumeRow) {
        self.inner.lock().unwrap().resumes.push(row);
    }

    pub fn resumes(&self) -> Vec<ResumeRow> {
        self.inner.lock().unwrap().resumes.clone()
    }

    pub fn blob(&self, key: &str) -> Option<Bytes> {
        self.inner
            .lock()
            .unwrap()
            .blobs
            .get(key)
            .map(|(bytes, _)| bytes.clone())
    }

    pub fn blob_count(&self) -> usize {
        self.inner.lock().unwrap().blobs.len()
    }
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn subscribe(&self) -> Result<AuthSubscription, BackendError> {
        let events = self.events.subscribe();
        let initial = self
            .inner
            .lock()
            .unwrap()
            .sessions
            .values()
            .cloned()
            .collect();
        Ok(AuthSubscription { initial, events })
    }

    async fn send_one_time_code(&self, email: &str, _redirect_to: &str) -> Result<(), BackendError> {
        if !email.contains('@') {
            return Err(BackendError::Mail(format!("undeliverable address '{email}'")));
        }
        let email = normalize_email(email);
        let mut inner = self.inner.lock().unwrap();
        inner.codes.insert(email.clone(), generate_code());
        inner.code_attempts.remove(&email);
        Ok(())
    }

    async fn verify_one_time_code(&self, email: &str, code: &str) -> Result<Session, BackendError> {
        let email = normalize_email(email);
        let session = {
            let mut inner = self.inner.lock().unwrap();
            if inner.codes.get(&email).map(String::as_str) != Some(code) {
                let attempts = inner.code_attempts.entry(email.clone()).or_insert(0);
                *attempts += 1;
                if *attempts >= MAX_CODE_ATTEMPTS {
                    inner.codes.remove(&email);
                }
                return Err(BackendError::InvalidCode);
            }
            inner.codes.remove(&email);
            inner.code_attempts.remove(&email);

            let user = match inner.users.get(&email) {
                Some(user) => user.clone(),
                None => {
                    let user = AuthUser {
                        id: Uuid::new_v4(),
                        email: email.clone(),
                    };
                    inner.profiles.push(ProfileRow {
                        id: Uuid::new_v4(),
                        user_id: user.id,
                        email: email.clone(),
                        full_name: None,
                        is_admin: Some(false),
                        created_at: Utc::now(),
                    });
                    inner.users.insert(email.clone(), user.clone());
                    user
                }
            };
            let session = Session {
                access_token: generate_access_token(),
                user,
                expires_at: Utc::now() + Duration::hours(24),
            };
            inner
                .sessions
                .insert(session.access_token.clone(), session.clone());
            session
        };
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let removed = self.inner.lock().unwrap().sessions.remove(access_token);
        if removed.is_some() {
            let _ = self.events.send(AuthEvent::SignedOut {
                access_token: access_token.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for MemoryBackend {
    async fn insert_resume(&self, resume: NewResume) -> Result<ResumeRow, BackendError> {
        if self.fail_resume_insert.load(Ordering::SeqCst) {
            return Err(BackendError::Storage("insert rejected".to_string()));
        }
        self.resume_inserts.fetch_add(1, Ordering::SeqCst);
        let row = ResumeRow {
            id: Uuid::new_v4(),
            user_id: resume.user_id,
            file_name: resume.file_name,
            file_path: resume.file_path,
            file_size: resume.file_size,
            status: Some(Default::default()),
            score: None,
            admin_notes: None,
            created_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
        };
        self.inner.lock().unwrap().resumes.push(row.clone());
        Ok(row)
    }

    async fn select_resumes(&self, query: &ResumeQuery) -> Result<Vec<ResumeRow>, BackendError> {
        if self.fail_selects.load(Ordering::SeqCst) {
            return Err(BackendError::Storage("select rejected".to_string()));
        }
        let mut rows: Vec<ResumeRow> = self
            .inner
            .lock()
            .unwrap()
            .resumes
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();
        // Stable sorts: ties keep insertion order.
        match query.order {
            ResumeOrder::NewestFirst => rows.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ResumeOrder::HighestScore => rows.sort_by(|a, b| b.score.cmp(&a.score)),
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit.max(0) as usize);
        }
        Ok(rows)
    }

    async fn update_resume(
        &self,
        id: Uuid,
        update: &ReviewUpdate,
    ) -> Result<ResumeRow, BackendError> {
        self.resume_updates.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        let row = inner
            .resumes
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("Resume {id} not found")))?;
        row.status = Some(update.status);
        row.score = update.score;
        row.admin_notes = Some(update.admin_notes.clone());
        row.reviewed_by = Some(update.reviewed_by);
        row.reviewed_at = Some(update.reviewed_at);
        Ok(row.clone())
    }

    async fn profile_by_user(&self, user_id: Uuid) -> Result<Option<ProfileRow>, BackendError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn profiles_by_users(&self, user_ids: &[Uuid]) -> Result<Vec<ProfileRow>, BackendError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .profiles
            .iter()
            .filter(|p| user_ids.contains(&p.user_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError> {
        self.blob_uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_blob_upload.load(Ordering::SeqCst) {
            return Err(BackendError::Storage("upload rejected".to_string()));
        }
        self.inner
            .lock()
            .unwrap()
            .blobs
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Bytes, BackendError> {
        self.blob(key)
            .ok_or_else(|| BackendError::Storage(format!("object {key} not found")))
    }

    async fn signed_url(&self, key: &str, ttl_secs: u64) -> Result<String, BackendError> {
        if self.blob(key).is_none() {
            return Err(BackendError::Storage(format!("object {key} not found")));
        }
        Ok(format!("memory://resumes/{key}?expires_in={ttl_secs}"))
    }
}
