//! Naming helpers for queues and job keys.
//!
//! Queue names scope work to a single resource (`server-3-delete-project`),
//! which keeps one resource's jobs from contending with another's. Job keys
//! double as idempotency tokens: enqueueing the same key twice is a no-op.

use crate::types::DbId;

/// Builds a resource-scoped queue name: `{kind}-{id}-{purpose}`.
pub fn queue_name(kind: &str, id: DbId, purpose: &str) -> String {
    format!("{kind}-{id}-{purpose}")
}

/// Builds a unique job key: `{prefix}-{timestamp_millis}`.
///
/// Millisecond timestamps make keys unique in practice while staying
/// readable in logs. Callers that need stronger guarantees embed their
/// own discriminator in the prefix.
pub fn job_key(prefix: &str) -> String {
    format!("{prefix}-{}", chrono::Utc::now().timestamp_millis())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_name_is_scoped_by_resource() {
        assert_eq!(queue_name("server", 3, "delete-project"), "server-3-delete-project");
        assert_eq!(queue_name("server", 12, "deploy-app"), "server-12-deploy-app");
    }

    #[test]
    fn job_key_carries_prefix() {
        let key = job_key("delete-project-7");
        assert!(key.starts_with("delete-project-7-"));
        let suffix = &key["delete-project-7-".len()..];
        assert!(suffix.parse::<i64>().is_ok());
    }
}
