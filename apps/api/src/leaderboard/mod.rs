//! Leaderboard: the ten highest-scored approved resumes.
//!
//! Ties keep whatever order the store returned; no explicit tie-break is applied.

pub mod handlers;

use serde::Serialize;
use uuid::Uuid;

use crate::backend::{ResumeOrder, ResumeQuery, TableStore};
use crate::display::format_score;
use crate::errors::AppError;
use crate::join::{fetch_resumes_with_submitters, Submitter};
use crate::models::{ResumeRow, ResumeStatus};
use crate::notify::Notifier;

pub const LEADERBOARD_SIZE: i64 = 10;
pub const EMPTY_LEADERBOARD_MESSAGE: &str = "Be the first to get your resume scored!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankIcon {
    Trophy,
    Medal,
    Award,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeVariant {
    Default,
    Secondary,
    Outline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankBadge {
    pub icon: Option<RankIcon>,
    pub variant: BadgeVariant,
    pub highlighted: bool,
}

/// Podium treatment for ranks 1 to 3; a plain numeric rank after that.
pub fn rank_badge(rank: usize) -> RankBadge {
    let (icon, variant) = match rank {
        1 => (Some(RankIcon::Trophy), BadgeVariant::Default),
        2 => (Some(RankIcon::Medal), BadgeVariant::Secondary),
        3 => (Some(RankIcon::Award), BadgeVariant::Secondary),
        _ => (None, BadgeVariant::Outline),
    };
    RankBadge {
        icon,
        variant,
        highlighted: rank <= 3,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub rank_label: String,
    pub resume_id: Uuid,
    pub user_id: Uuid,
    pub score: i32,
    pub score_label: String,
    pub display_name: String,
    /// Shown under the name only when the submitter has a full name.
    pub email: Option<String>,
    pub badge: RankBadge,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LeaderboardView {
    Empty { message: &'static str },
    Ranked { entries: Vec<LeaderboardEntry> },
}

impl LeaderboardView {
    pub fn entries(&self) -> &[LeaderboardEntry] {
        match self {
            LeaderboardView::Empty { .. } => &[],
            LeaderboardView::Ranked { entries } => entries,
        }
    }
}

pub fn leaderboard_query() -> ResumeQuery {
    ResumeQuery {
        status: Some(ResumeStatus::Approved),
        scored_only: true,
        order: ResumeOrder::HighestScore,
        limit: Some(LEADERBOARD_SIZE),
        ..ResumeQuery::default()
    }
}

/// Ranks already-ordered rows. Rows without a score are skipped.
pub fn build_leaderboard(rows: Vec<(ResumeRow, Submitter)>) -> LeaderboardView {
    let entries: Vec<LeaderboardEntry> = rows
        .into_iter()
        .filter_map(|(resume, submitter)| resume.score.map(|score| (resume, submitter, score)))
        .enumerate()
        .map(|(index, (resume, submitter, score))| {
            let rank = index + 1;
            let email = submitter
                .full_name
                .as_ref()
                .filter(|name| !name.is_empty())
                .map(|_| submitter.email.clone());
            LeaderboardEntry {
                rank,
                rank_label: format!("#{rank}"),
                resume_id: resume.id,
                user_id: resume.user_id,
                score,
                score_label: format_score(score),
                display_name: submitter.display_name().to_string(),
                email,
                badge: rank_badge(rank),
            }
        })
        .collect();

    if entries.is_empty() {
        LeaderboardView::Empty {
            message: EMPTY_LEADERBOARD_MESSAGE,
        }
    } else {
        LeaderboardView::Ranked { entries }
    }
}

pub async fn load_leaderboard(
    store: &dyn TableStore,
    notifier: &Notifier,
    viewer: Option<Uuid>,
) -> Result<LeaderboardView, AppError> {
    match fetch_resumes_with_submitters(store, &leaderboard_query()).await {
        Ok(rows) => Ok(build_leaderboard(rows)),
        Err(e) => {
            notifier.failure(viewer, "Error", "Failed to fetch leaderboard");
            Err(e.into())
        }
    }
}
