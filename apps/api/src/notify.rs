//! User-facing notification side channel.
//!
//! Components report one-shot outcomes here instead of (or in addition to) their return
//! value. Notifications fan out on a broadcast channel; `GET /api/v1/notifications`
//! streams the caller's own as server-sent events.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// `None` when there is no signed-in user to address (e.g. a sign-in request).
    pub recipient: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub variant: Variant,
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn success(&self, recipient: Option<Uuid>, title: &str, description: impl Into<String>) {
        self.publish(Notification {
            recipient,
            title: title.to_string(),
            description: description.into(),
            variant: Variant::Default,
        });
    }

    pub fn failure(&self, recipient: Option<Uuid>, title: &str, description: impl Into<String>) {
        self.publish(Notification {
            recipient,
            title: title.to_string(),
            description: description.into(),
            variant: Variant::Destructive,
        });
    }

    fn publish(&self, notification: Notification) {
        match notification.variant {
            Variant::Default => info!(
                "notify {:?}: {} ({})",
                notification.recipient, notification.title, notification.description
            ),
            Variant::Destructive => warn!(
                "notify {:?}: {} ({})",
                notification.recipient, notification.title, notification.description
            ),
        }
        // Nobody streaming is fine; the log line above is the durable record.
        let _ = self.tx.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_notifications() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let user = Uuid::new_v4();

        notifier.failure(Some(user), "Upload failed", "boom");

        let received = rx.recv().await.unwrap();
        assert_eq!(received.recipient, Some(user));
        assert_eq!(received.variant, Variant::Destructive);
        assert_eq!(received.title, "Upload failed");
    }

    #[test]
    fn test_publish_without_subscribers_does_not_panic() {
        Notifier::new().success(None, "Check your email", "sent");
    }
}
