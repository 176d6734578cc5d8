use crate::errors::Result;
use crate::metrics::DB_FAILURES_TOTAL;
use crate::model::{Sample, VitalRecord};
use crate::store::SampleStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, error, info};

const SELECT_COLUMNS: &str = "SELECT id, device_id, ts AS timestamp, thermal_value, \
     battery_level, memory_usage, created_at FROM device_vitals";

pub async fn make_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    info!("Database connection established");
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

/// Postgres-backed sample store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        Ok(Self::new(make_pool(database_url, max_connections).await?))
    }
}

fn record_failure<T>(result: sqlx::Result<T>, op: &str) -> Result<T> {
    result.map_err(|e| {
        DB_FAILURES_TOTAL.inc();
        error!("Database {} failed: {}", op, e);
        e.into()
    })
}

#[async_trait]
impl SampleStore for PgStore {
    async fn append(&self, sample: &Sample) -> Result<i64> {
        let query = r#"
            INSERT INTO device_vitals (device_id, ts, thermal_value, battery_level, memory_usage)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#;

        let id: i64 = record_failure(
            sqlx::query_scalar::<_, i64>(query)
                .bind(&sample.device_id)
                .bind(sample.timestamp)
                .bind(sample.thermal_value)
                .bind(sample.battery_level)
                .bind(sample.memory_usage)
                .fetch_one(&self.pool)
                .await,
            "insert",
        )?;

        debug!("Stored vitals for {} with id {}", sample.device_id, id);
        Ok(id)
    }

    async fn query_recent(&self, device_id: &str, limit: usize) -> Result<Vec<VitalRecord>> {
        let query = format!(
            "{} WHERE device_id = $1 ORDER BY ts DESC, id DESC LIMIT $2",
            SELECT_COLUMNS
        );

        record_failure(
            sqlx::query_as::<_, VitalRecord>(&query)
                .bind(device_id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await,
            "recent query",
        )
    }

    async fn query_window(
        &self,
        device_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<VitalRecord>> {
        let query = format!("{} WHERE device_id = $1 AND ts >= $2", SELECT_COLUMNS);

        record_failure(
            sqlx::query_as::<_, VitalRecord>(&query)
                .bind(device_id)
                .bind(since)
                .fetch_all(&self.pool)
                .await,
            "window query",
        )
    }

    async fn list(&self, device_id: Option<&str>, limit: usize) -> Result<Vec<VitalRecord>> {
        // Device filter is optional, so the placeholder for LIMIT shifts
        let mut conditions = Vec::new();
        if device_id.is_some() {
            conditions.push("device_id = $1".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "{} {} ORDER BY ts DESC, id DESC LIMIT ${}",
            SELECT_COLUMNS,
            where_clause,
            conditions.len() + 1
        );

        let mut query_builder = sqlx::query_as::<_, VitalRecord>(&query);
        if let Some(device_id) = device_id {
            query_builder = query_builder.bind(device_id);
        }

        record_failure(
            query_builder
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await,
            "list query",
        )
    }
}
