//! Domain model structs.
//!
//! Each submodule contains `FromRow` + `Serialize` entity structs matching
//! the database rows, plus any typed accessors over JSONB columns.

pub mod job;
pub mod server;
pub mod state;
pub mod webhook;

pub use job::{Job, Queue};
pub use server::{Project, Server};
pub use state::{JobState, StateId};
pub use webhook::{StaticHeader, WebhookEndpoint};
