//! Server and project entity models.
//!
//! These are the collaborator rows the orchestration layer reads and
//! releases. The admin CRUD over them lives elsewhere.

use serde::Serialize;
use sqlx::FromRow;

use drydock_core::types::{DbId, Timestamp};

/// A row from the `servers` table.
///
/// **Note:** `private_key` is never serialized to responses.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Server {
    pub id: DbId,
    pub name: String,
    pub hostname: String,
    pub username: String,
    pub port: i32,
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
    pub force_relay: bool,
    /// Device identifier in the relay mesh, when enrolled.
    pub mesh_device_id: Option<String>,
    /// `"active"` until teardown releases the row, then `"released"`.
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub server_id: DbId,
    pub name: String,
    /// Application name as the deployment tool on the server knows it.
    pub app_name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
