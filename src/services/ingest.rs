use sqlx::PgPool;

use crate::channel::{AlertEvent, Reading};
use crate::services::alarm_tracker;
use crate::services::broadcaster::ChannelSnapshot;
use crate::services::thresholds;
use crate::state::AppState;

/// Runs one canonical reading through the full pipeline: threshold lookup,
/// range evaluation, append to storage, live fan-out, alarm transition and —
/// when the tracker decides so — alert persistence, notification, and alert
/// fan-out.
///
/// Storage failures before the state transition propagate to the caller (the
/// direct endpoint turns them into 503); everything after the transition is
/// best-effort, because a decided alert is never undone.
pub async fn ingest_reading(state: &AppState, reading: Reading) -> Result<(), sqlx::Error> {
    let config = thresholds::get(&state.db, reading.channel).await?;
    let status = alarm_tracker::evaluate_range(reading.temperature, &config);

    insert_reading(&state.db, &reading).await?;

    state.broadcaster.publish_reading(ChannelSnapshot {
        channel: reading.channel,
        temperature: reading.temperature,
        humidity: reading.humidity,
        signal_strength: reading.signal_strength,
        recorded_at: reading.recorded_at.to_rfc3339(),
        source: reading.source,
        status,
    });

    let (alarm_state, alert) = state.tracker.process(&reading, &config).await;

    if let Err(err) = alarm_tracker::persist_state(&state.db, &alarm_state).await {
        tracing::warn!(channel = %reading.channel, error = %err, "failed to mirror alarm state");
    }

    if let Some(alert) = alert {
        if let Err(err) = insert_alert(&state.db, &alert).await {
            tracing::warn!(channel = %alert.channel, error = %err, "failed to record alert event");
        }
        if config.notifications_enabled {
            state.notifier.notify(&alert);
        }
        state.broadcaster.publish_alert(&alert);
        tracing::info!(
            channel = %alert.channel,
            direction = alert.direction.as_str(),
            temperature = alert.temperature,
            minutes = alert.minutes_out_of_range,
            "temperature alert emitted"
        );
    }

    Ok(())
}

/// Restores the live snapshot map from the newest stored reading per channel
/// so dashboards reconnecting right after a restart still see current state.
pub async fn seed_latest(state: &AppState) -> anyhow::Result<()> {
    let window_start =
        chrono::Utc::now() - chrono::Duration::minutes(state.config.snapshot_seed_minutes);

    #[derive(sqlx::FromRow)]
    struct LatestRow {
        channel: String,
        temperature: f64,
        humidity: Option<f64>,
        signal_strength: Option<f64>,
        recorded_at: chrono::DateTime<chrono::Utc>,
        source: String,
    }

    let rows: Vec<LatestRow> = sqlx::query_as(
        r#"
        SELECT DISTINCT ON (channel)
            channel, temperature, humidity, signal_strength, recorded_at, source
        FROM readings
        WHERE recorded_at >= $1
        ORDER BY channel, recorded_at DESC
        "#,
    )
    .bind(window_start)
    .fetch_all(&state.db)
    .await?;

    for row in rows {
        let Some(channel) = crate::channel::EquipmentChannel::parse(&row.channel) else {
            continue;
        };
        let config = thresholds::get(&state.db, channel).await?;
        state.broadcaster.store_latest(ChannelSnapshot {
            channel,
            temperature: row.temperature,
            humidity: row.humidity,
            signal_strength: row.signal_strength,
            recorded_at: row.recorded_at.to_rfc3339(),
            source: crate::channel::ReadingSource::parse(&row.source)
                .unwrap_or(crate::channel::ReadingSource::DirectApi),
            status: alarm_tracker::evaluate_range(row.temperature, &config),
        });
    }
    Ok(())
}

async fn insert_reading(pool: &PgPool, reading: &Reading) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO readings (
            channel, temperature, humidity, signal_strength, recorded_at, source, gateway_id, sensor_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(reading.channel.as_str())
    .bind(reading.temperature)
    .bind(reading.humidity)
    .bind(reading.signal_strength)
    .bind(reading.recorded_at)
    .bind(reading.source.as_str())
    .bind(reading.gateway_id.as_deref())
    .bind(reading.sensor_id.as_deref())
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_alert(pool: &PgPool, alert: &AlertEvent) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO alert_events (
            channel, direction, temperature, min_temp, max_temp, minutes_out_of_range, message, source, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(alert.channel.as_str())
    .bind(alert.direction.as_str())
    .bind(alert.temperature)
    .bind(alert.min_temp)
    .bind(alert.max_temp)
    .bind(alert.minutes_out_of_range)
    .bind(&alert.message)
    .bind(alert.source.as_str())
    .bind(alert.created_at)
    .execute(pool)
    .await?;
    Ok(())
}
