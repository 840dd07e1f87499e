use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::{models::Device, traits::DeviceRepository, RelayError, RelayResult};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

pub struct SqliteDeviceRepository {
    pool: SqlitePool,
}

impl SqliteDeviceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_device(row: &sqlx::sqlite::SqliteRow) -> RelayResult<Device> {
        Ok(Device {
            id: row.try_get("id")?,
            external_id: row.try_get("external_id")?,
            last_online: row.try_get("last_online")?,
        })
    }
}

#[async_trait]
impl DeviceRepository for SqliteDeviceRepository {
    #[instrument(skip(self))]
    async fn insert_or_get(&self, external_id: &str) -> RelayResult<i64> {
        sqlx::query("INSERT INTO devices (external_id) VALUES ($1) ON CONFLICT(external_id) DO NOTHING")
            .bind(external_id)
            .execute(&self.pool)
            .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM devices WHERE external_id = $1")
            .bind(external_id)
            .fetch_one(&self.pool)
            .await?;

        debug!("Device {} resolved to id {}", external_id, id);
        Ok(id)
    }

    async fn get_by_id(&self, id: i64) -> RelayResult<Option<Device>> {
        let row = sqlx::query("SELECT id, external_id, last_online FROM devices WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_device).transpose()
    }

    async fn set_last_online(&self, id: i64, at: DateTime<Utc>) -> RelayResult<()> {
        let result = sqlx::query("UPDATE devices SET last_online = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RelayError::DeviceNotFound { id });
        }
        Ok(())
    }
}
