//! Repository for the `servers` table.

use sqlx::PgPool;

use drydock_core::types::DbId;

use crate::models::server::Server;

const COLUMNS: &str = "\
    id, name, hostname, username, port, private_key, force_relay, \
    mesh_device_id, status, created_at, updated_at";

/// Provides operations on server rows.
pub struct ServerRepo;

impl ServerRepo {
    /// Register a server.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &PgPool,
        name: &str,
        hostname: &str,
        username: &str,
        port: i32,
        private_key: Option<&str>,
        force_relay: bool,
        mesh_device_id: Option<&str>,
    ) -> Result<Server, sqlx::Error> {
        let query = format!(
            "INSERT INTO servers \
                 (name, hostname, username, port, private_key, force_relay, mesh_device_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Server>(&query)
            .bind(name)
            .bind(hostname)
            .bind(username)
            .bind(port)
            .bind(private_key)
            .bind(force_relay)
            .bind(mesh_device_id)
            .fetch_one(pool)
            .await
    }

    /// Find a server by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Server>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM servers WHERE id = $1");
        sqlx::query_as::<_, Server>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Release a server row after teardown.
    ///
    /// The row stays behind with status `released` and its mesh identity
    /// cleared, so the dashboard keeps a record of the machine. Returns
    /// `false` when the server does not exist.
    pub async fn release(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE servers \
             SET status = 'released', mesh_device_id = NULL \
             WHERE id = $1 AND status <> 'released'",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
