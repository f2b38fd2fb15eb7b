//! Admin API client for the relay mesh.
//!
//! Wraps the mesh coordination server's HTTP API using [`reqwest`]. The
//! orchestration layer uses it to deregister a machine's mesh identity
//! when the machine is released.

use std::time::Duration;

/// HTTP request timeout for mesh API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the mesh API layer.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The mesh API returned a non-2xx status code.
    #[error("Mesh API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// HTTP client for the mesh coordination server.
pub struct MeshClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl MeshClient {
    /// Create a new client for the mesh API.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `https://mesh.example.com`.
    /// * `api_key` - Bearer token for authenticated deployments.
    pub fn new(api_url: String, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            api_url,
            api_key,
        }
    }

    /// Build a client from `MESH_API_URL` / `MESH_API_KEY`.
    ///
    /// Returns `None` when no mesh API is configured; callers skip
    /// deregistration in that case.
    pub fn from_env() -> Option<Self> {
        let api_url = std::env::var("MESH_API_URL").ok()?;
        let api_key = std::env::var("MESH_API_KEY").ok();
        Some(Self::new(api_url, api_key))
    }

    /// Remove a device from the mesh, releasing its network identity.
    ///
    /// Sends `DELETE /api/devices/{device_id}`.
    pub async fn remove_device(&self, device_id: &str) -> Result<(), MeshError> {
        let mut request = self
            .client
            .delete(format!("{}/api/devices/{}", self.api_url, device_id));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        Self::check_status(response).await
    }

    /// Require a success status, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), MeshError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(MeshError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
