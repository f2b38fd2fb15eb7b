//! Repository for the `queues` table.

use sqlx::PgPool;

use crate::models::job::Queue;

const COLUMNS: &str = "id, name, is_paused, created_at, updated_at";

/// Provides operations on named queues.
///
/// Queues are created lazily on first reference and never destroyed.
pub struct QueueRepo;

impl QueueRepo {
    /// Ensure a queue row exists, returning it either way.
    pub async fn ensure(pool: &PgPool, name: &str) -> Result<Queue, sqlx::Error> {
        let query = format!(
            "INSERT INTO queues (name) VALUES ($1) \
             ON CONFLICT (name) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Queue>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await?;

        match inserted {
            Some(queue) => Ok(queue),
            // Conflict: the row already existed, fetch it.
            None => Self::find_by_name(pool, name)
                .await?
                .ok_or(sqlx::Error::RowNotFound),
        }
    }

    /// Find a queue by name.
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Queue>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM queues WHERE name = $1");
        sqlx::query_as::<_, Queue>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Flip the pause flag. Returns `false` when the queue does not exist.
    pub async fn set_paused(pool: &PgPool, name: &str, paused: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE queues SET is_paused = $2 WHERE name = $1")
            .bind(name)
            .bind(paused)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
