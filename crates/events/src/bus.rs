//! In-process event bus backed by per-channel `tokio::sync::broadcast`.
//!
//! [`EventBus`] is the publish/subscribe hub for live command output and
//! dashboard refresh pings. It is designed to be shared via `Arc<EventBus>`
//! across the application. Delivery is at-most-once: events published while
//! nobody listens are dropped, and there is no replay for late subscribers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use drydock_core::types::DbId;

// ---------------------------------------------------------------------------
// LogScope
// ---------------------------------------------------------------------------

/// Identifies the resource a stream of log lines belongs to.
///
/// Constructed via [`LogScope::server`] and narrowed with the builder
/// methods [`with_service`](LogScope::with_service) and
/// [`with_deployment`](LogScope::with_deployment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogScope {
    pub server_id: DbId,
    pub service_id: Option<DbId>,
    pub deployment_id: Option<DbId>,
}

impl LogScope {
    /// Scope covering everything on a server.
    pub fn server(server_id: DbId) -> Self {
        Self {
            server_id,
            service_id: None,
            deployment_id: None,
        }
    }

    /// Narrow the scope to one service on the server.
    pub fn with_service(mut self, service_id: DbId) -> Self {
        self.service_id = Some(service_id);
        self
    }

    /// Narrow the scope to one deployment of the service.
    pub fn with_deployment(mut self, deployment_id: DbId) -> Self {
        self.deployment_id = Some(deployment_id);
        self
    }

    /// Render the broadcast channel name for this scope.
    ///
    /// Publisher and subscriber must agree on the rendering; nothing else
    /// about the scope is significant to the bus.
    pub fn channel(&self) -> String {
        let mut name = format!("server-{}", self.server_id);
        if let Some(service_id) = self.service_id {
            name.push_str(&format!("-service-{service_id}"));
        }
        if let Some(deployment_id) = self.deployment_id {
            name.push_str(&format!("-deployment-{deployment_id}"));
        }
        name
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One line of command output or progress text for a scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub message: String,
    /// When the line was published (UTC).
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ping telling dashboard clients to refetch an entity list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshEvent {
    /// Always `true`; clients treat any frame as an invalidation ping.
    pub refresh: bool,
    /// Entity kind whose listing went stale, e.g. `"projects"`.
    pub entity: String,
}

impl RefreshEvent {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            refresh: true,
            entity: entity.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Buffer capacity for each broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// One lazily-created broadcast channel per scope channel name, plus a
/// single global refresh channel. Dropping a receiver is the unsubscribe;
/// slow receivers observe `RecvError::Lagged` when the buffer wraps.
pub struct EventBus {
    channels: RwLock<HashMap<String, broadcast::Sender<LogEvent>>>,
    refresh: broadcast::Sender<RefreshEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (refresh, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            channels: RwLock::new(HashMap::new()),
            refresh,
        }
    }

    /// Publish a log line to all current subscribers of the scope.
    ///
    /// If there are no active subscribers the event is silently dropped and
    /// the channel entry is pruned; the next subscriber recreates it.
    pub async fn publish(&self, scope: &LogScope, event: LogEvent) {
        let channel = scope.channel();

        let delivered = {
            let channels = self.channels.read().await;
            match channels.get(&channel) {
                // SendError only means there are zero receivers.
                Some(sender) => sender.send(event).is_ok(),
                None => return,
            }
        };

        if !delivered {
            let mut channels = self.channels.write().await;
            // Re-check under the write lock: a subscriber may have arrived.
            if let Some(sender) = channels.get(&channel) {
                if sender.receiver_count() == 0 {
                    channels.remove(&channel);
                }
            }
        }
    }

    /// Subscribe to log lines for a scope, creating the channel on demand.
    pub async fn subscribe(&self, scope: &LogScope) -> broadcast::Receiver<LogEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(scope.channel())
            .or_insert_with(|| broadcast::channel(DEFAULT_CAPACITY).0)
            .subscribe()
    }

    /// Publish a refresh ping to all dashboard listeners.
    pub fn publish_refresh(&self, entity: impl Into<String>) {
        // A send with zero receivers is fine; frames are not replayed anyway.
        let _ = self.refresh.send(RefreshEvent::new(entity));
    }

    /// Subscribe to the global refresh channel.
    pub fn subscribe_refresh(&self) -> broadcast::Receiver<RefreshEvent> {
        self.refresh.subscribe()
    }

    /// Number of live channels, for diagnostics.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ProgressSink
// ---------------------------------------------------------------------------

/// A bus handle pre-bound to one scope.
///
/// Workers receive a sink instead of the bus so the scope travels with the
/// job rather than being reconstructed at every publish site.
#[derive(Clone)]
pub struct ProgressSink {
    bus: std::sync::Arc<EventBus>,
    scope: LogScope,
}

impl ProgressSink {
    pub fn new(bus: std::sync::Arc<EventBus>, scope: LogScope) -> Self {
        Self { bus, scope }
    }

    pub fn scope(&self) -> &LogScope {
        &self.scope
    }

    /// Publish one progress line under the bound scope.
    pub async fn send(&self, message: impl Into<String>) {
        self.bus.publish(&self.scope, LogEvent::new(message)).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_renders_channel_name() {
        assert_eq!(LogScope::server(3).channel(), "server-3");
        assert_eq!(
            LogScope::server(3).with_service(9).channel(),
            "server-3-service-9"
        );
        assert_eq!(
            LogScope::server(3).with_service(9).with_deployment(2).channel(),
            "server-3-service-9-deployment-2"
        );
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::new();
        let scope = LogScope::server(1);
        let mut rx = bus.subscribe(&scope).await;

        bus.publish(&scope, LogEvent::new("building image")).await;

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.message, "building image");
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let bus = EventBus::new();
        let mut rx_one = bus.subscribe(&LogScope::server(1)).await;
        let mut rx_two = bus.subscribe(&LogScope::server(2)).await;

        bus.publish(&LogScope::server(2), LogEvent::new("only for two"))
            .await;

        let received = rx_two.recv().await.expect("scope 2 should receive");
        assert_eq!(received.message, "only for two");
        assert!(rx_one.try_recv().is_err(), "scope 1 must stay silent");
    }

    #[tokio::test]
    async fn no_replay_for_late_subscribers() {
        let bus = EventBus::new();
        let scope = LogScope::server(1);

        // Nobody listening: dropped, not buffered.
        bus.publish(&scope, LogEvent::new("lost line")).await;

        let mut rx = bus.subscribe(&scope).await;
        assert!(rx.try_recv().is_err(), "late subscriber must not replay");

        bus.publish(&scope, LogEvent::new("live line")).await;
        assert_eq!(rx.recv().await.unwrap().message, "live line");
    }

    #[tokio::test]
    async fn channel_pruned_after_last_receiver_drops() {
        let bus = EventBus::new();
        let scope = LogScope::server(1);

        let rx = bus.subscribe(&scope).await;
        assert_eq!(bus.channel_count().await, 1);
        drop(rx);

        // First publish after the drop misses and prunes the entry.
        bus.publish(&scope, LogEvent::new("into the void")).await;
        assert_eq!(bus.channel_count().await, 0);
    }

    #[tokio::test]
    async fn refresh_channel_reaches_all_listeners() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe_refresh();
        let mut rx2 = bus.subscribe_refresh();

        bus.publish_refresh("projects");

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert!(e1.refresh);
        assert_eq!(e1.entity, "projects");
        assert_eq!(e2.entity, "projects");
    }

    #[test]
    fn refresh_publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish_refresh("servers");
    }

    #[tokio::test]
    async fn progress_sink_publishes_under_its_scope() {
        let bus = std::sync::Arc::new(EventBus::new());
        let scope = LogScope::server(4).with_service(2);
        let mut rx = bus.subscribe(&scope).await;

        let sink = ProgressSink::new(bus.clone(), scope);
        sink.send("deploying").await;

        assert_eq!(rx.recv().await.unwrap().message, "deploying");
    }
}
