//! Webhook delivery subsystem.
//!
//! After an entity or global mutation, [`WebhookDispatcher::dispatch`] fans
//! the change out to every subscribed endpoint with a signed JSON payload.
//! Delivery is best-effort: failures are logged and never surface to the
//! mutation path that triggered them.

pub mod dispatcher;
pub mod signing;

use serde::{Deserialize, Serialize};

pub use dispatcher::{WebhookDispatcher, WebhookError};
pub use signing::compute_signature;

// ---------------------------------------------------------------------------
// MutationEvent
// ---------------------------------------------------------------------------

/// Kind of mutation that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// A mutation to announce to subscribed endpoints.
///
/// `collection` is the entity kind's slug (for globals, the global's slug).
/// `doc` is the entity after the change; `previous_doc` the entity before
/// it, when the caller has one.
#[derive(Debug, Clone)]
pub struct MutationEvent {
    pub operation: Operation,
    pub collection: String,
    pub doc: serde_json::Value,
    pub previous_doc: Option<serde_json::Value>,
    /// True when the mutation hit a global (singleton) rather than a
    /// collection entity; matched against an endpoint's `globals` list.
    pub global: bool,
}

impl MutationEvent {
    pub fn new(
        operation: Operation,
        collection: impl Into<String>,
        doc: serde_json::Value,
    ) -> Self {
        Self {
            operation,
            collection: collection.into(),
            doc,
            previous_doc: None,
            global: false,
        }
    }

    /// Attach the pre-change document.
    pub fn with_previous(mut self, doc: serde_json::Value) -> Self {
        self.previous_doc = Some(doc);
        self
    }

    /// Mark the event as a global (singleton) mutation.
    pub fn for_global(mut self) -> Self {
        self.global = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names_are_lowercase() {
        assert_eq!(Operation::Create.as_str(), "create");
        assert_eq!(Operation::Update.as_str(), "update");
        assert_eq!(Operation::Delete.as_str(), "delete");
    }

    #[test]
    fn builder_defaults() {
        let event = MutationEvent::new(
            Operation::Update,
            "servers",
            serde_json::json!({"id": 1}),
        );
        assert!(event.previous_doc.is_none());
        assert!(!event.global);

        let event = event
            .with_previous(serde_json::json!({"id": 1, "status": "active"}))
            .for_global();
        assert!(event.previous_doc.is_some());
        assert!(event.global);
    }
}
