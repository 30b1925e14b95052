use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Identity row for an authenticated user. Created by the `on_auth_user_created`
/// trigger; never written by the application.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ProfileRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub is_admin: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl ProfileRow {
    /// Only an explicit `true` grants admin access; `NULL` and `false` both deny.
    pub fn is_admin(&self) -> bool {
        self.is_admin == Some(true)
    }
}
