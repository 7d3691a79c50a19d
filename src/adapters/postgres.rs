use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::domain::model::{InsertResult, MoistureRecord};
use crate::domain::ports::Repository;
use crate::utils::error::{FetcherError, Result};

/// Daily records in PostgreSQL, one row per (zone, date).
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
    zone: String,
}

impl PostgresRepository {
    /// Opens the pool and proves the server is reachable.
    pub async fn connect(config: &DatabaseConfig, zone: &str) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password);

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| FetcherError::InitializationError {
                message: format!(
                    "cannot connect to database {} on {}:{}: {}",
                    config.name, config.host, config.port, e
                ),
            })?;

        tracing::debug!(host = %config.host, database = %config.name, "database pool ready");
        Ok(Self::from_pool(pool, zone))
    }

    pub fn from_pool(pool: PgPool, zone: &str) -> Self {
        Self {
            pool,
            zone: zone.to_string(),
        }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS soil_moisture (
                id BIGSERIAL PRIMARY KEY,
                zone TEXT NOT NULL,
                date DATE NOT NULL,
                value DOUBLE PRECISION,
                label TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (zone, date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn exists(&self, date: NaiveDate) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM soil_moisture WHERE zone = $1 AND date = $2)",
        )
        .bind(&self.zone)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_if_absent(&self, record: &MoistureRecord) -> Result<InsertResult> {
        // ON CONFLICT DO NOTHING returns no row when another run got there first.
        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO soil_moisture (zone, date, value, label, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (zone, date) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&self.zone)
        .bind(record.date)
        .bind(record.value)
        .bind(&record.label)
        .bind(record.created_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match inserted {
            Some(_) => InsertResult::Inserted,
            None => InsertResult::AlreadyPresent,
        })
    }
}
