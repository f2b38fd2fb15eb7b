//! Filtered fan-out of mutation events to webhook endpoints.
//!
//! [`WebhookDispatcher`] loads the active endpoints, filters them against
//! the event, serializes the payload exactly once, and delivers to every
//! match concurrently. Endpoints with a `retry_limit` get exponential
//! backoff (1 s, 2 s, 4 s) before the final attempt.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use drydock_db::models::WebhookEndpoint;
use drydock_db::repositories::WebhookRepo;
use drydock_db::DbPool;

use super::signing::compute_signature;
use super::MutationEvent;

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Endpoint returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// Filtering and payload
// ---------------------------------------------------------------------------

/// True when an endpoint subscribes to this event.
///
/// The operation must be in the endpoint's `events` list and the slug in
/// its `collections` list — or `globals` for a global mutation.
pub fn endpoint_matches(endpoint: &WebhookEndpoint, event: &MutationEvent) -> bool {
    if !endpoint.subscribes_to(event.operation.as_str()) {
        return false;
    }
    if event.global {
        endpoint.watches_global(&event.collection)
    } else {
        endpoint.watches_collection(&event.collection)
    }
}

/// Serialize the canonical delivery payload.
///
/// Every matching endpoint receives this exact string; the signature is
/// computed over it byte for byte.
pub fn build_payload(event: &MutationEvent) -> String {
    let mut payload = serde_json::Map::new();
    payload.insert("event".into(), event.operation.as_str().into());
    payload.insert("collection".into(), event.collection.clone().into());
    payload.insert("doc".into(), event.doc.clone());
    if let Some(previous) = &event.previous_doc {
        payload.insert("previousDoc".into(), previous.clone());
    }
    payload.insert("timestamp".into(), Utc::now().to_rfc3339().into());
    serde_json::Value::Object(payload).to_string()
}

// ---------------------------------------------------------------------------
// WebhookDispatcher
// ---------------------------------------------------------------------------

/// Delivers mutation events to subscribed webhook endpoints.
pub struct WebhookDispatcher {
    pool: DbPool,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    /// Create a new dispatcher with a pre-configured HTTP client.
    pub fn new(pool: DbPool) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { pool, client }
    }

    /// Fan a mutation out to every subscribed endpoint.
    ///
    /// Fire-and-forget from the caller's perspective: endpoint loading and
    /// delivery failures are logged, never returned. All matching
    /// deliveries run concurrently and each is given its full attempt
    /// budget regardless of how the others fare.
    pub async fn dispatch(&self, event: MutationEvent) {
        let endpoints = match WebhookRepo::list_active(&self.pool).await {
            Ok(endpoints) => endpoints,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load webhook endpoints, dropping event");
                return;
            }
        };

        let matches: Vec<WebhookEndpoint> = endpoints
            .into_iter()
            .filter(|endpoint| endpoint_matches(endpoint, &event))
            .collect();
        if matches.is_empty() {
            return;
        }

        let body = build_payload(&event);
        tracing::debug!(
            operation = event.operation.as_str(),
            collection = %event.collection,
            endpoints = matches.len(),
            "Dispatching webhook event"
        );

        let deliveries = matches
            .iter()
            .map(|endpoint| self.deliver(endpoint, &event, &body));
        let results = futures::future::join_all(deliveries).await;

        for (endpoint, result) in matches.iter().zip(results) {
            if let Err(e) = result {
                tracing::error!(
                    endpoint = %endpoint.name,
                    url = %endpoint.url,
                    error = %e,
                    "Webhook delivery failed"
                );
            }
        }
    }

    /// Deliver one payload to one endpoint, honoring its retry budget.
    async fn deliver(
        &self,
        endpoint: &WebhookEndpoint,
        event: &MutationEvent,
        body: &str,
    ) -> Result<(), WebhookError> {
        let delivery_id = Uuid::new_v4();
        let retries = endpoint.retry_limit.max(0) as usize;

        for delay_secs in RETRY_DELAYS_SECS.iter().take(retries) {
            match self.try_send(endpoint, event, body, delivery_id).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        endpoint = %endpoint.name,
                        delivery = %delivery_id,
                        error = %e,
                        "Delivery attempt failed, backing off"
                    );
                    tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                }
            }
        }

        // Final attempt after the last backoff (the only one when the
        // endpoint opted out of retries).
        self.try_send(endpoint, event, body, delivery_id).await
    }

    /// Execute a single POST and check the response status.
    async fn try_send(
        &self,
        endpoint: &WebhookEndpoint,
        event: &MutationEvent,
        body: &str,
        delivery_id: Uuid,
    ) -> Result<(), WebhookError> {
        let mut request = self
            .client
            .post(&endpoint.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("X-Event", event.operation.as_str())
            .header("X-Collection", event.collection.as_str())
            .header("X-Delivery", delivery_id.to_string());

        for header in endpoint.static_headers() {
            request = request.header(header.name, header.value);
        }
        if let Some(secret) = &endpoint.secret {
            request = request.header("X-Signature", compute_signature(secret, body));
        }

        let response = request.body(body.to_string()).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
