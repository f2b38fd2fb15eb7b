//! Event broadcast bus and webhook delivery.
//!
//! The [`bus`] module fans command output and refresh pings out to live
//! subscribers inside the process; the [`webhook`] module pushes signed
//! mutation notifications to external HTTP endpoints.

pub mod bus;
pub mod webhook;

pub use bus::{EventBus, LogEvent, LogScope, ProgressSink, RefreshEvent};
pub use webhook::{MutationEvent, Operation, WebhookDispatcher};
