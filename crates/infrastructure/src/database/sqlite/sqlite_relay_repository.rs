use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::{
    models::{NewRelay, Relay, RelayStatus},
    traits::RelayRepository,
    RelayError, RelayResult,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

const RELAY_COLUMNS: &str =
    "id, device_id, function, argument, expected_result, scheduled_time, status, tries";

pub struct SqliteRelayRepository {
    pool: SqlitePool,
}

impl SqliteRelayRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_relay(row: &sqlx::sqlite::SqliteRow) -> RelayResult<Relay> {
        Ok(Relay {
            id: row.try_get("id")?,
            device_id: row.try_get("device_id")?,
            function: row.try_get("function")?,
            argument: row.try_get("argument")?,
            expected_result: row.try_get("expected_result")?,
            scheduled_time: row.try_get("scheduled_time")?,
            status: row.try_get("status")?,
            tries: row.try_get("tries")?,
        })
    }
}

#[async_trait]
impl RelayRepository for SqliteRelayRepository {
    #[instrument(skip(self, relay), fields(device_id = relay.device_id, function = %relay.function))]
    async fn create(&self, relay: &NewRelay) -> RelayResult<Relay> {
        let sql = format!(
            "INSERT INTO relays (device_id, function, argument, expected_result, scheduled_time, status, tries) \
             VALUES ($1, $2, $3, $4, $5, $6, 0) \
             RETURNING {RELAY_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(relay.device_id)
            .bind(&relay.function)
            .bind(&relay.argument)
            .bind(relay.expected_result)
            .bind(relay.scheduled_time)
            .bind(RelayStatus::Ready)
            .fetch_one(&self.pool)
            .await?;

        let created = Self::row_to_relay(&row)?;
        debug!("Created relay {}", created.id);
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> RelayResult<Option<Relay>> {
        let sql = format!("SELECT {RELAY_COLUMNS} FROM relays WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_relay).transpose()
    }

    async fn select_ready_ids(
        &self,
        cursor: i64,
        now: DateTime<Utc>,
        limit: u32,
    ) -> RelayResult<Vec<i64>> {
        // Lowest eligible id per device; at most one id per device per poll.
        let ids: Vec<Option<i64>> = sqlx::query_scalar(
            r#"
            SELECT MIN(id) FROM relays
            WHERE status = $1 AND id >= $2 AND scheduled_time <= $3
            GROUP BY device_id
            ORDER BY 1
            LIMIT $4
            "#,
        )
        .bind(RelayStatus::Ready)
        .bind(cursor)
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().flatten().collect())
    }

    async fn update(
        &self,
        id: i64,
        scheduled_time: DateTime<Utc>,
        status: RelayStatus,
        tries: i32,
    ) -> RelayResult<()> {
        let result = sqlx::query(
            "UPDATE relays SET scheduled_time = $1, status = $2, tries = $3 WHERE id = $4",
        )
        .bind(scheduled_time)
        .bind(status)
        .bind(tries)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RelayError::RelayNotFound { id });
        }
        Ok(())
    }

    async fn update_status(&self, id: i64, status: RelayStatus) -> RelayResult<()> {
        let result = sqlx::query("UPDATE relays SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RelayError::RelayNotFound { id });
        }
        Ok(())
    }
}
