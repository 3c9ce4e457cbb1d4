//! In-memory notification center.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Notification, NotificationSink};

pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_secs(5);

const CHANNEL_CAPACITY: usize = 64;

/// A notification currently on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveNotification {
    pub id: Uuid,
    pub notification: Notification,
    pub timestamp: DateTime<Utc>,
    expires_at: Instant,
}

impl ActiveNotification {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Holds active notifications until they time out or are dismissed.
///
/// New notifications are also broadcast to subscribers as they arrive.
pub struct NotificationCenter {
    entries: Mutex<Vec<ActiveNotification>>,
    duration: Duration,
    events: broadcast::Sender<ActiveNotification>,
}

impl NotificationCenter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_duration(DEFAULT_NOTIFICATION_DURATION)
    }

    #[must_use]
    pub fn with_duration(duration: Duration) -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(Vec::new()),
            duration,
            events,
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<ActiveNotification>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ActiveNotification> {
        self.events.subscribe()
    }

    /// Notifications still within their display duration, oldest first
    #[must_use]
    pub fn active(&self) -> Vec<ActiveNotification> {
        let now = Instant::now();
        let mut entries = self.entries();
        entries.retain(|n| !n.is_expired(now));
        entries.clone()
    }

    /// Remove one notification. Returns `false` if it was already gone.
    pub fn dismiss(&self, id: Uuid) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|n| n.id != id);
        entries.len() != before
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for NotificationCenter {
    fn notify(&self, notification: Notification) {
        let now = Instant::now();
        let active = ActiveNotification {
            id: Uuid::new_v4(),
            notification,
            timestamp: Utc::now(),
            expires_at: now + self.duration,
        };
        debug!(
            id = %active.id,
            severity = ?active.notification.severity,
            title = %active.notification.title,
            "Notification raised"
        );
        {
            let mut entries = self.entries();
            entries.retain(|n| !n.is_expired(now));
            entries.push(active.clone());
        }
        // No receivers is fine
        let _ = self.events.send(active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;

    #[tokio::test(start_paused = true)]
    async fn test_notifications_expire_after_duration() {
        let center = NotificationCenter::new();
        center.success("Transfer complete", "42.00 sent");

        tokio::time::advance(Duration::from_millis(4999)).await;
        assert_eq!(center.active().len(), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(center.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_dropped_without_reading() {
        let center = NotificationCenter::new();
        for i in 0..1000 {
            center.error("Error", &format!("failure {i}"));
            tokio::time::advance(Duration::from_secs(10)).await;
        }
        assert_eq!(center.entries().len(), 1);

        center.info("Still here", "fresh");
        center.info("Still here", "fresher");
        assert_eq!(center.entries().len(), 2);
    }

    #[tokio::test]
    async fn test_dismiss_and_clear() {
        let center = NotificationCenter::new();
        center.error("Error", "first");
        center.warning("Careful", "second");

        let active = center.active();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].notification.message, "first");

        assert!(center.dismiss(active[0].id));
        assert!(!center.dismiss(active[0].id));
        assert_eq!(center.active().len(), 1);

        center.clear();
        assert!(center.active().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_receive_new_notifications() {
        let center = NotificationCenter::new();
        let mut receiver = center.subscribe();

        center.info("Heads up", "maintenance tonight");

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.notification.severity, Severity::Info);
        assert_eq!(received.notification.title, "Heads up");
    }
}
