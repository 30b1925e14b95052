use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use super::credentials::{
    generate_access_token, generate_code, hash_code, magic_link, normalize_email,
    sign_in_mail_body, CODE_TTL_MINUTES, MAX_CODE_ATTEMPTS,
};
use super::mailer::Mailer;
use super::{
    AuthBackend, AuthEvent, AuthSubscription, AuthUser, BackendError, ResumeOrder, ResumeQuery,
    Session, TableStore,
};
use crate::models::{NewResume, ProfileRow, ResumeRow, ReviewUpdate};

const AUTH_EVENT_CAPACITY: usize = 256;

#[derive(Debug, FromRow)]
struct SessionRecord {
    access_token: String,
    user_id: Uuid,
    email: String,
    expires_at: DateTime<Utc>,
}

impl From<SessionRecord> for Session {
    fn from(record: SessionRecord) -> Self {
        Session {
            access_token: record.access_token,
            user: AuthUser {
                id: record.user_id,
                email: record.email,
            },
            expires_at: record.expires_at,
        }
    }
}

/// PostgreSQL-backed auth and table store.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
    mailer: Arc<dyn Mailer>,
    events: broadcast::Sender<AuthEvent>,
    public_url: String,
    session_ttl: Duration,
}

impl PgBackend {
    pub fn new(
        pool: PgPool,
        mailer: Arc<dyn Mailer>,
        public_url: String,
        session_ttl: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            pool,
            mailer,
            events,
            public_url,
            session_ttl,
        }
    }

    /// Counts a wrong guess against every live code for `email`, voiding them all once
    /// the limit is reached.
    async fn record_failed_attempt(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        email: &str,
    ) -> Result<(), BackendError> {
        let attempts: i32 = sqlx::query_scalar(
            r#"
            WITH bumped AS (
                UPDATE auth_codes SET attempts = attempts + 1
                WHERE email = $1 AND consumed_at IS NULL AND expires_at > now()
                RETURNING attempts
            )
            SELECT COALESCE(MAX(attempts), 0) FROM bumped
            "#,
        )
        .bind(email)
        .fetch_one(&mut **tx)
        .await?;

        if attempts >= MAX_CODE_ATTEMPTS {
            sqlx::query(
                "UPDATE auth_codes SET consumed_at = now() WHERE email = $1 AND consumed_at IS NULL",
            )
            .bind(email)
            .execute(&mut **tx)
            .await?;
            warn!("Too many failed sign-in attempts for {email}; outstanding codes voided");
        }
        Ok(())
    }

    fn publish(&self, event: AuthEvent) {
        // No receivers simply means nobody is listening yet.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl AuthBackend for PgBackend {
    async fn subscribe(&self) -> Result<AuthSubscription, BackendError> {
        // Receiver first so no event between the snapshot and the subscription is lost.
        let events = self.events.subscribe();
        let initial = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT s.access_token, s.user_id, u.email, s.expires_at
            FROM auth_sessions s
            JOIN auth_users u ON u.id = s.user_id
            WHERE s.expires_at > now()
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Session::from)
        .collect();
        Ok(AuthSubscription { initial, events })
    }

    async fn send_one_time_code(&self, email: &str, redirect_to: &str) -> Result<(), BackendError> {
        let email = normalize_email(email);
        let code = generate_code();

        sqlx::query(
            r#"
            INSERT INTO auth_codes (email, code_hash, expires_at)
            VALUES ($1, $2, now() + make_interval(mins => $3))
            "#,
        )
        .bind(&email)
        .bind(hash_code(&email, &code))
        .bind(CODE_TTL_MINUTES as i32)
        .execute(&self.pool)
        .await?;

        let link = magic_link(&self.public_url, &email, &code, redirect_to);
        if link.is_none() {
            warn!("PUBLIC_URL '{}' is not a valid base URL; mailing code only", self.public_url);
        }
        self.mailer
            .send(&email, "Your sign-in code", &sign_in_mail_body(&code, link.as_ref()))
            .await?;

        info!("Issued one-time code for {email}");
        Ok(())
    }

    async fn verify_one_time_code(&self, email: &str, code: &str) -> Result<Session, BackendError> {
        let email = normalize_email(email);
        let mut tx = self.pool.begin().await?;

        let consumed: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE auth_codes SET consumed_at = now()
            WHERE id = (
                SELECT id FROM auth_codes
                WHERE email = $1 AND code_hash = $2
                  AND consumed_at IS NULL AND expires_at > now()
                ORDER BY created_at DESC
                LIMIT 1
            )
            RETURNING id
            "#,
        )
        .bind(&email)
        .bind(hash_code(&email, code))
        .fetch_optional(&mut *tx)
        .await?;
        if consumed.is_none() {
            self.record_failed_attempt(&mut tx, &email).await?;
            tx.commit().await?;
            return Err(BackendError::InvalidCode);
        }

        // First sign-in creates the auth user; the trigger creates the profile.
        let user_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO auth_users (email) VALUES ($1)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING id
            "#,
        )
        .bind(&email)
        .fetch_one(&mut *tx)
        .await?;

        let access_token = generate_access_token();
        let expires_at = Utc::now() + self.session_ttl;
        sqlx::query(
            "INSERT INTO auth_sessions (access_token, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(&access_token)
        .bind(user_id)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let session = Session {
            access_token,
            user: AuthUser { id: user_id, email },
            expires_at,
        };
        info!("User {user_id} signed in");
        self.publish(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let removed: Option<Uuid> = sqlx::query_scalar(
            "DELETE FROM auth_sessions WHERE access_token = $1 RETURNING user_id",
        )
        .bind(access_token)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(user_id) = removed {
            info!("User {user_id} signed out");
            self.publish(AuthEvent::SignedOut {
                access_token: access_token.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for PgBackend {
    async fn insert_resume(&self, resume: NewResume) -> Result<ResumeRow, BackendError> {
        Ok(sqlx::query_as::<_, ResumeRow>(
            r#"
            INSERT INTO resumes (user_id, file_name, file_path, file_size)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(resume.user_id)
        .bind(&resume.file_name)
        .bind(&resume.file_path)
        .bind(resume.file_size)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn select_resumes(&self, query: &ResumeQuery) -> Result<Vec<ResumeRow>, BackendError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM resumes WHERE TRUE");
        if let Some(id) = query.id {
            qb.push(" AND id = ").push_bind(id);
        }
        if let Some(owner) = query.owner {
            qb.push(" AND user_id = ").push_bind(owner);
        }
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if query.scored_only {
            qb.push(" AND score IS NOT NULL");
        }
        qb.push(match query.order {
            ResumeOrder::NewestFirst => " ORDER BY created_at DESC",
            ResumeOrder::HighestScore => " ORDER BY score DESC NULLS LAST",
        });
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        Ok(qb.build_query_as::<ResumeRow>().fetch_all(&self.pool).await?)
    }

    async fn update_resume(
        &self,
        id: Uuid,
        update: &ReviewUpdate,
    ) -> Result<ResumeRow, BackendError> {
        sqlx::query_as::<_, ResumeRow>(
            r#"
            UPDATE resumes
            SET status = $1, score = $2, admin_notes = $3, reviewed_by = $4, reviewed_at = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(update.status)
        .bind(update.score)
        .bind(&update.admin_notes)
        .bind(update.reviewed_by)
        .bind(update.reviewed_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| BackendError::NotFound(format!("Resume {id} not found")))
    }

    async fn profile_by_user(&self, user_id: Uuid) -> Result<Option<ProfileRow>, BackendError> {
        Ok(
            sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn profiles_by_users(&self, user_ids: &[Uuid]) -> Result<Vec<ProfileRow>, BackendError> {
        Ok(
            sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE user_id = ANY($1)")
                .bind(user_ids)
                .fetch_all(&self.pool)
                .await?,
        )
    }
}
