//! Durable named job queues over Postgres.
//!
//! The database is the broker: jobs are rows, claiming is `FOR UPDATE SKIP
//! LOCKED`, and the `job_key` column makes every enqueue idempotent per
//! queue. This crate layers the process-side machinery on top:
//!
//! - [`QueueRegistry`] hands out queue handles and runs at most one worker
//!   per queue name.
//! - [`JobProcessor`] is the handler trait a worker drives.
//! - [`waiter`] resolves "is this job done yet" for callers, either by
//!   polling or by subscribing to the [`JobNotifier`] stream.
//! - [`stalled`] recovers jobs whose worker died mid-attempt.

pub mod notifier;
pub mod queue;
pub mod registry;
pub mod stalled;
pub mod waiter;
pub mod worker;

pub use notifier::{JobNotification, JobNotifier};
pub use queue::{EnqueueOptions, JobQueue};
pub use registry::QueueRegistry;
pub use waiter::{PollOptions, SubscribeOptions, WaitError};
pub use worker::JobProcessor;
