//! Broadcast stream of terminal job transitions.
//!
//! Workers publish a [`JobNotification`] when a job completes or fails.
//! The subscribed waiter listens so it can re-check job state the moment a
//! transition lands instead of sitting out a poll interval. Notifications
//! are a hint, not the source of truth: every consumer re-reads the
//! database before acting on one.

use drydock_db::models::JobState;
use tokio::sync::broadcast;

/// Broadcast capacity. Subscribers that fall further behind than this see
/// `Lagged` and must re-check state from the database.
const DEFAULT_CAPACITY: usize = 1024;

/// A job reaching `completed` or `failed`.
#[derive(Debug, Clone)]
pub struct JobNotification {
    pub queue_name: String,
    pub job_key: String,
    pub state: JobState,
    /// Failure reason, set when `state` is `Failed`.
    pub reason: Option<String>,
}

/// Cloneable handle for publishing and subscribing to job notifications.
///
/// One notifier is shared by every worker and waiter in the process; clones
/// all feed the same channel.
#[derive(Clone)]
pub struct JobNotifier {
    sender: broadcast::Sender<JobNotification>,
}

impl JobNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self { sender }
    }

    /// Publish a terminal transition. A send error only means nobody is
    /// subscribed, which is fine.
    pub fn notify(&self, notification: JobNotification) {
        let _ = self.sender.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobNotification> {
        self.sender.subscribe()
    }
}

impl Default for JobNotifier {
    fn default() -> Self {
        Self::new()
    }
}
