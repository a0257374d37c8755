use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub fn connect_lazy(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(8))
        .connect_lazy(database_url)
        .with_context(|| format!("Failed to create lazy database pool for {database_url}"))
}

/// Creates the tables the pipeline writes to. Idempotent; run once at
/// startup. Readings and alert/gateway events are append-only, so no
/// migration machinery beyond IF NOT EXISTS is needed here.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    const STATEMENTS: [&str; 7] = [
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            id BIGSERIAL PRIMARY KEY,
            channel TEXT NOT NULL,
            temperature DOUBLE PRECISION NOT NULL,
            humidity DOUBLE PRECISION,
            signal_strength DOUBLE PRECISION,
            recorded_at TIMESTAMPTZ NOT NULL,
            source TEXT NOT NULL,
            gateway_id TEXT,
            sensor_id TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_channel_recorded_at
            ON readings (channel, recorded_at DESC)
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS alert_events (
            id BIGSERIAL PRIMARY KEY,
            channel TEXT NOT NULL,
            direction TEXT NOT NULL,
            temperature DOUBLE PRECISION NOT NULL,
            min_temp DOUBLE PRECISION NOT NULL,
            max_temp DOUBLE PRECISION NOT NULL,
            minutes_out_of_range BIGINT NOT NULL,
            message TEXT NOT NULL,
            source TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS gateway_events (
            id BIGSERIAL PRIMARY KEY,
            gateway_id TEXT,
            payload JSONB NOT NULL,
            parsed_rows INTEGER NOT NULL,
            matched_rows INTEGER NOT NULL,
            ingested_rows INTEGER NOT NULL,
            unmatched JSONB NOT NULL,
            received_at TIMESTAMPTZ NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS device_mappings (
            sensor_id TEXT PRIMARY KEY,
            hardware_model TEXT NOT NULL,
            channel TEXT NOT NULL,
            alias TEXT NOT NULL DEFAULT '',
            enabled BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS threshold_configs (
            channel TEXT PRIMARY KEY,
            min_temp DOUBLE PRECISION NOT NULL,
            max_temp DOUBLE PRECISION NOT NULL,
            warning_delay_minutes BIGINT NOT NULL,
            repeat_interval_minutes BIGINT NOT NULL,
            notifications_enabled BOOLEAN NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS alarm_states (
            channel TEXT PRIMARY KEY,
            out_of_range_since TIMESTAMPTZ,
            last_direction TEXT NOT NULL,
            last_alert_at TIMESTAMPTZ,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    ];

    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("failed to apply schema statement")?;
    }
    Ok(())
}
