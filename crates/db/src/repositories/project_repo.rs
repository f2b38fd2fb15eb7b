//! Repository for the `projects` table.

use sqlx::PgPool;

use drydock_core::types::DbId;

use crate::models::server::Project;

const COLUMNS: &str = "id, server_id, name, app_name, created_at, updated_at";

/// Provides operations on project rows.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Register a project on a server.
    pub async fn create(
        pool: &PgPool,
        server_id: DbId,
        name: &str,
        app_name: &str,
    ) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (server_id, name, app_name) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(server_id)
            .bind(name)
            .bind(app_name)
            .fetch_one(pool)
            .await
    }

    /// Find a project by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all projects hosted on a server, oldest first.
    pub async fn list_by_server(
        pool: &PgPool,
        server_id: DbId,
    ) -> Result<Vec<Project>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM projects WHERE server_id = $1 ORDER BY created_at ASC");
        sqlx::query_as::<_, Project>(&query)
            .bind(server_id)
            .fetch_all(pool)
            .await
    }

    /// Delete a project row. Returns `false` when it does not exist.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
