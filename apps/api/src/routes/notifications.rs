use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::auth::extract::CurrentUser;
use crate::state::AppState;

/// GET /api/v1/notifications
/// Server-sent events carrying the caller's own notifications.
pub async fn handle_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let user_id = user.id();
    let rx = state.notifier.subscribe();

    let events = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(note) if note.recipient == Some(user_id) => {
                    let event = Event::default().event("notification").json_data(&note);
                    return Some((event, rx));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Notification stream for {user_id} lagged by {skipped}");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
