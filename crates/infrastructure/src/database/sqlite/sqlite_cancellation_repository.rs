use async_trait::async_trait;
use relay_core::{models::Cancellation, traits::CancellationRepository, RelayError, RelayResult};
use sqlx::{Row, SqlitePool};

pub struct SqliteCancellationRepository {
    pool: SqlitePool,
}

impl SqliteCancellationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CancellationRepository for SqliteCancellationRepository {
    async fn list(&self, limit: u32) -> RelayResult<Vec<Cancellation>> {
        let rows = sqlx::query("SELECT id, relay_id FROM cancellations ORDER BY id LIMIT $1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut cancellations = Vec::with_capacity(rows.len());
        for row in rows {
            cancellations.push(Cancellation {
                id: row.try_get("id")?,
                relay_id: row.try_get("relay_id")?,
            });
        }
        Ok(cancellations)
    }

    async fn insert(&self, relay_id: i64) -> RelayResult<i64> {
        let result = sqlx::query("INSERT OR IGNORE INTO cancellations (relay_id) VALUES ($1)")
            .bind(relay_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(0);
        }
        Ok(result.last_insert_rowid())
    }

    async fn delete(&self, id: i64) -> RelayResult<()> {
        let result = sqlx::query("DELETE FROM cancellations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() != 1 {
            return Err(RelayError::Internal(format!(
                "expected to delete one cancellation with id {id}, removed {}",
                result.rows_affected()
            )));
        }
        Ok(())
    }
}
