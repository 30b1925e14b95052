use axum::{extract::State, Json};

use crate::auth::extract::CurrentUser;
use crate::errors::AppError;
use crate::leaderboard::{load_leaderboard, LeaderboardView};
use crate::state::AppState;

/// GET /api/v1/leaderboard
pub async fn handle_leaderboard(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<LeaderboardView>, AppError> {
    let view = load_leaderboard(state.store.as_ref(), &state.notifier, Some(user.id())).await?;
    Ok(Json(view))
}
