//! Webhook endpoint model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use drydock_core::types::{DbId, Timestamp};

/// A row from the `webhook_endpoints` table.
///
/// The JSONB columns hold string arrays (`events`, `collections`,
/// `globals`) and a header list; the typed accessors below are the only
/// way delivery code reads them. Rows are read-only to the delivery
/// subsystem.
///
/// **Note:** `secret` is never serialized to responses.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookEndpoint {
    pub id: DbId,
    pub name: String,
    pub url: String,
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub events: serde_json::Value,
    pub collections: serde_json::Value,
    pub globals: serde_json::Value,
    pub headers: serde_json::Value,
    pub is_active: bool,
    pub retry_limit: i16,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One static header attached to every delivery for an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticHeader {
    pub name: String,
    pub value: String,
}

impl WebhookEndpoint {
    /// True when the endpoint subscribes to the given operation name.
    pub fn subscribes_to(&self, operation: &str) -> bool {
        Self::array_contains(&self.events, operation)
    }

    /// True when the endpoint watches the given collection slug.
    pub fn watches_collection(&self, slug: &str) -> bool {
        Self::array_contains(&self.collections, slug)
    }

    /// True when the endpoint watches the given global slug.
    pub fn watches_global(&self, slug: &str) -> bool {
        Self::array_contains(&self.globals, slug)
    }

    /// Static headers parsed from the JSONB column. Malformed entries are
    /// dropped rather than failing the delivery.
    pub fn static_headers(&self) -> Vec<StaticHeader> {
        self.headers
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn array_contains(value: &serde_json::Value, needle: &str) -> bool {
        value
            .as_array()
            .is_some_and(|entries| entries.iter().any(|entry| entry.as_str() == Some(needle)))
    }
}
