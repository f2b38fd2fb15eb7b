//! Repository for the `webhook_endpoints` table.

use sqlx::PgPool;

use drydock_core::types::DbId;

use crate::models::webhook::WebhookEndpoint;

const COLUMNS: &str = "\
    id, name, url, secret, events, collections, globals, headers, \
    is_active, retry_limit, created_at, updated_at";

/// Provides operations on webhook endpoints.
///
/// The delivery subsystem only ever reads; endpoint management writes.
pub struct WebhookRepo;

impl WebhookRepo {
    /// Register a webhook endpoint.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &PgPool,
        name: &str,
        url: &str,
        secret: Option<&str>,
        events: &serde_json::Value,
        collections: &serde_json::Value,
        globals: &serde_json::Value,
        headers: &serde_json::Value,
        retry_limit: i16,
    ) -> Result<WebhookEndpoint, sqlx::Error> {
        let query = format!(
            "INSERT INTO webhook_endpoints \
                 (name, url, secret, events, collections, globals, headers, retry_limit) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WebhookEndpoint>(&query)
            .bind(name)
            .bind(url)
            .bind(secret)
            .bind(events)
            .bind(collections)
            .bind(globals)
            .bind(headers)
            .bind(retry_limit)
            .fetch_one(pool)
            .await
    }

    /// List endpoints eligible for delivery.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<WebhookEndpoint>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM webhook_endpoints \
             WHERE is_active ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, WebhookEndpoint>(&query)
            .fetch_all(pool)
            .await
    }

    /// Enable or disable an endpoint. Returns `false` when it does not exist.
    pub async fn set_active(pool: &PgPool, id: DbId, active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE webhook_endpoints SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
