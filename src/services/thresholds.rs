use sqlx::PgPool;

use crate::channel::{EquipmentChannel, ThresholdConfig, ThresholdUpdate, ALL_CHANNELS};

#[derive(sqlx::FromRow)]
struct ThresholdRow {
    channel: String,
    min_temp: f64,
    max_temp: f64,
    warning_delay_minutes: i64,
    repeat_interval_minutes: i64,
    notifications_enabled: bool,
}

impl ThresholdRow {
    fn into_config(self) -> Option<ThresholdConfig> {
        let channel = EquipmentChannel::parse(&self.channel)?;
        Some(ThresholdConfig {
            channel,
            min_temp: self.min_temp,
            max_temp: self.max_temp,
            warning_delay_minutes: self.warning_delay_minutes,
            repeat_interval_minutes: self.repeat_interval_minutes,
            notifications_enabled: self.notifications_enabled,
        })
    }
}

/// Effective config for a channel. Always yields a value: a stored row wins,
/// otherwise the built-in defaults, which are lazily written so the row
/// exists for subsequent updates (best-effort; a failed insert still returns
/// the defaults).
pub async fn get(pool: &PgPool, channel: EquipmentChannel) -> Result<ThresholdConfig, sqlx::Error> {
    let row: Option<ThresholdRow> = sqlx::query_as(
        r#"
        SELECT channel, min_temp, max_temp, warning_delay_minutes, repeat_interval_minutes, notifications_enabled
        FROM threshold_configs
        WHERE channel = $1
        "#,
    )
    .bind(channel.as_str())
    .fetch_optional(pool)
    .await?;

    if let Some(config) = row.and_then(ThresholdRow::into_config) {
        return Ok(config);
    }

    let defaults = ThresholdConfig::defaults(channel);
    if let Err(err) = upsert(pool, &defaults).await {
        tracing::warn!(channel = %channel, error = %err, "failed to seed default threshold config");
    }
    Ok(defaults)
}

pub async fn get_all(pool: &PgPool) -> Result<Vec<ThresholdConfig>, sqlx::Error> {
    let mut configs = Vec::with_capacity(ALL_CHANNELS.len());
    for channel in ALL_CHANNELS {
        configs.push(get(pool, channel).await?);
    }
    Ok(configs)
}

/// Merges a partial update over the effective config and stores the result.
/// Validation failures leave the stored row untouched.
pub async fn set(
    pool: &PgPool,
    channel: EquipmentChannel,
    update: &ThresholdUpdate,
) -> Result<Result<ThresholdConfig, String>, sqlx::Error> {
    let current = get(pool, channel).await?;
    let merged = match current.merge(update) {
        Ok(merged) => merged,
        Err(reason) => return Ok(Err(reason)),
    };
    upsert(pool, &merged).await?;
    Ok(Ok(merged))
}

/// Configs are never deleted; reset writes the built-in defaults back.
pub async fn reset(pool: &PgPool, channel: EquipmentChannel) -> Result<ThresholdConfig, sqlx::Error> {
    let defaults = ThresholdConfig::defaults(channel);
    upsert(pool, &defaults).await?;
    Ok(defaults)
}

async fn upsert(pool: &PgPool, config: &ThresholdConfig) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO threshold_configs (
            channel, min_temp, max_temp, warning_delay_minutes, repeat_interval_minutes, notifications_enabled, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        ON CONFLICT (channel)
        DO UPDATE SET
            min_temp = EXCLUDED.min_temp,
            max_temp = EXCLUDED.max_temp,
            warning_delay_minutes = EXCLUDED.warning_delay_minutes,
            repeat_interval_minutes = EXCLUDED.repeat_interval_minutes,
            notifications_enabled = EXCLUDED.notifications_enabled,
            updated_at = NOW()
        "#,
    )
    .bind(config.channel.as_str())
    .bind(config.min_temp)
    .bind(config.max_temp)
    .bind(config.warning_delay_minutes)
    .bind(config.repeat_interval_minutes)
    .bind(config.notifications_enabled)
    .execute(pool)
    .await?;
    Ok(())
}
