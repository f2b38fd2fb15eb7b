//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod job_repo;
pub mod project_repo;
pub mod queue_repo;
pub mod server_repo;
pub mod webhook_repo;

pub use job_repo::{JobRepo, StalledSweep};
pub use project_repo::ProjectRepo;
pub use queue_repo::QueueRepo;
pub use server_repo::ServerRepo;
pub use webhook_repo::WebhookRepo;
