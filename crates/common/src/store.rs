//! Persistence boundary for traffic events and device tokens.
//!
//! All access goes through an explicit transaction obtained from
//! [`Store::begin`]; the caller decides when to commit or roll back.

use async_trait::async_trait;
use sqlx::{Acquire, PgPool, Postgres, Transaction};

use crate::error::AppError;
use crate::types::{DeviceToken, NewDeviceToken, TrafficEvent};

/// Transaction factory.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> Result<Self::Tx, AppError>;
}

/// Operations available inside one transaction.
#[async_trait]
pub trait StoreTx: Send {
    async fn event_exists(&mut self, id: &str) -> Result<bool, AppError>;

    /// Insert a new event. A failure leaves the rest of the transaction usable.
    async fn insert_event(&mut self, event: &TrafficEvent) -> Result<(), AppError>;

    async fn find_event(&mut self, id: &str) -> Result<Option<TrafficEvent>, AppError>;

    /// Number of events stored at or after `since` (epoch seconds).
    async fn count_events_since(&mut self, since: i64) -> Result<i64, AppError>;

    async fn count_tokens(&mut self) -> Result<i64, AppError>;

    /// Highest token row id, `None` for an empty table.
    async fn max_token_id(&mut self) -> Result<Option<i64>, AppError>;

    /// Up to `limit` tokens with row id in `(after_id, through_id]`, ascending by id.
    ///
    /// Keyset bounds keep a page walk stable while earlier pages are being
    /// deleted from or appended to in the same transaction.
    async fn token_page(
        &mut self,
        after_id: i64,
        through_id: i64,
        limit: i64,
    ) -> Result<Vec<DeviceToken>, AppError>;

    /// Insert the token unless the key is already registered.
    /// Returns `true` when a row was created.
    async fn insert_token_if_absent(&mut self, token: &NewDeviceToken) -> Result<bool, AppError>;

    /// Returns `true` when a row was removed.
    async fn delete_token(&mut self, token: &str) -> Result<bool, AppError>;

    async fn commit(self) -> Result<(), AppError>;

    async fn rollback(self) -> Result<(), AppError>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgStoreTx;

    async fn begin(&self) -> Result<PgStoreTx, AppError> {
        Ok(PgStoreTx {
            tx: self.pool.begin().await?,
        })
    }
}

/// An open PostgreSQL transaction.
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn event_exists(&mut self, id: &str) -> Result<bool, AppError> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM traffic_events WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(row.0)
    }

    async fn insert_event(&mut self, event: &TrafficEvent) -> Result<(), AppError> {
        // Savepoint: a failed row must not abort the enclosing transaction.
        let mut savepoint = self.tx.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO traffic_events (
                id, y_wgs, x_wgs, category, description, description_en, road, road_en,
                cause, cause_en, priority, road_priority, is_border_crossing,
                updated, valid_from, valid_to, ingested_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(&event.id)
        .bind(event.y_wgs)
        .bind(event.x_wgs)
        .bind(&event.category)
        .bind(&event.description)
        .bind(&event.description_en)
        .bind(&event.road)
        .bind(&event.road_en)
        .bind(&event.cause)
        .bind(&event.cause_en)
        .bind(event.priority)
        .bind(event.road_priority)
        .bind(event.is_border_crossing)
        .bind(event.updated)
        .bind(event.valid_from)
        .bind(event.valid_to)
        .bind(event.ingested_at)
        .execute(&mut *savepoint)
        .await?;

        savepoint.commit().await?;
        Ok(())
    }

    async fn find_event(&mut self, id: &str) -> Result<Option<TrafficEvent>, AppError> {
        let event = sqlx::query_as::<_, TrafficEvent>("SELECT * FROM traffic_events WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(event)
    }

    async fn count_events_since(&mut self, since: i64) -> Result<i64, AppError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM traffic_events WHERE ingested_at >= $1")
                .bind(since)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(row.0)
    }

    async fn count_tokens(&mut self) -> Result<i64, AppError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM device_tokens")
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(row.0)
    }

    async fn max_token_id(&mut self) -> Result<Option<i64>, AppError> {
        let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(id) FROM device_tokens")
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(row.0)
    }

    async fn token_page(
        &mut self,
        after_id: i64,
        through_id: i64,
        limit: i64,
    ) -> Result<Vec<DeviceToken>, AppError> {
        let tokens = sqlx::query_as::<_, DeviceToken>(
            r#"
            SELECT id, token, registered_at, user_agent
            FROM device_tokens
            WHERE id > $1 AND id <= $2
            ORDER BY id
            LIMIT $3
            "#,
        )
        .bind(after_id)
        .bind(through_id)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(tokens)
    }

    async fn insert_token_if_absent(&mut self, token: &NewDeviceToken) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO device_tokens (token, registered_at, user_agent)
            VALUES ($1, $2, $3)
            ON CONFLICT (token) DO NOTHING
            "#,
        )
        .bind(&token.token)
        .bind(token.registered_at)
        .bind(&token.user_agent)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_token(&mut self, token: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM device_tokens WHERE token = $1")
            .bind(token)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
