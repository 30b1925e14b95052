//! Client-side relational joins.
//!
//! Rows and their related records come from two separate queries; the merge is a pure
//! function over a key-indexed map so it can be tested without a backend.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;

use serde::Serialize;
use uuid::Uuid;

use crate::backend::{BackendError, ResumeQuery, TableStore};
use crate::models::{ProfileRow, ResumeRow};

/// Email shown for a resume whose owner has no profile row.
pub const UNKNOWN_SUBMITTER: &str = "Unknown";

/// Who submitted a resume, as shown next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submitter {
    pub full_name: Option<String>,
    pub email: String,
}

impl Submitter {
    pub fn unknown() -> Self {
        Self {
            full_name: None,
            email: UNKNOWN_SUBMITTER.to_string(),
        }
    }

    /// Full name when set and non-empty, email otherwise.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.email)
    }
}

impl From<&ProfileRow> for Submitter {
    fn from(profile: &ProfileRow) -> Self {
        Self {
            full_name: profile.full_name.clone(),
            email: profile.email.clone(),
        }
    }
}

/// Distinct keys in first-seen order.
pub fn distinct_keys<R, K>(rows: &[R], key: impl Fn(&R) -> K) -> Vec<K>
where
    K: Eq + Hash + Clone,
{
    let mut seen = HashSet::new();
    rows.iter()
        .map(key)
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

pub fn index_by<P, K>(related: Vec<P>, key: impl Fn(&P) -> K) -> HashMap<K, P>
where
    K: Eq + Hash,
{
    related.into_iter().map(|p| (key(&p), p)).collect()
}

/// Pairs every row with its related record by key equality, preserving row order.
pub fn merge_related<R, P, K>(
    rows: Vec<R>,
    related: &HashMap<K, P>,
    key: impl Fn(&R) -> K,
) -> Vec<(R, Option<P>)>
where
    K: Eq + Hash,
    P: Clone,
{
    rows.into_iter()
        .map(|row| {
            let matched = related.get(&key(&row)).cloned();
            (row, matched)
        })
        .collect()
}

/// Two sequential round trips: the rows, then the related records for their distinct keys.
/// The related fetch is skipped when there are no rows.
pub async fn fetch_with_related<R, P, K, FR, FP, G>(
    rows: FR,
    fetch_related: G,
    row_key: impl Fn(&R) -> K,
    related_key: impl Fn(&P) -> K,
) -> Result<Vec<(R, Option<P>)>, BackendError>
where
    K: Eq + Hash + Clone,
    P: Clone,
    FR: Future<Output = Result<Vec<R>, BackendError>>,
    FP: Future<Output = Result<Vec<P>, BackendError>>,
    G: FnOnce(Vec<K>) -> FP,
{
    let rows = rows.await?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let keys = distinct_keys(&rows, &row_key);
    let related = index_by(fetch_related(keys).await?, related_key);
    Ok(merge_related(rows, &related, row_key))
}

/// Resumes matching `query`, each with its submitter ("Unknown" when no profile matches).
pub async fn fetch_resumes_with_submitters(
    store: &dyn TableStore,
    query: &ResumeQuery,
) -> Result<Vec<(ResumeRow, Submitter)>, BackendError> {
    let joined = fetch_with_related(
        store.select_resumes(query),
        |user_ids: Vec<Uuid>| async move { store.profiles_by_users(&user_ids).await },
        |resume: &ResumeRow| resume.user_id,
        |profile: &ProfileRow| profile.user_id,
    )
    .await?;

    Ok(joined
        .into_iter()
        .map(|(resume, profile)| {
            let submitter = profile
                .as_ref()
                .map(Submitter::from)
                .unwrap_or_else(Submitter::unknown);
            (resume, submitter)
        })
        .collect())
}
