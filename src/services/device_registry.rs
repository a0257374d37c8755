use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::channel::EquipmentChannel;
use crate::device_catalog;

/// Physical sensor → logical channel mapping, keyed by sensor id. Owned by
/// operators through the administrative surface; the ingestion path only
/// reads it.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DeviceMapping {
    pub sensor_id: String,
    pub hardware_model: String,
    pub channel: EquipmentChannel,
    pub alias: String,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct DeviceMappingRow {
    sensor_id: String,
    hardware_model: String,
    channel: String,
    alias: String,
    enabled: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl DeviceMappingRow {
    fn into_mapping(self) -> Option<DeviceMapping> {
        let channel = EquipmentChannel::parse(&self.channel)?;
        Some(DeviceMapping {
            sensor_id: self.sensor_id,
            hardware_model: self.hardware_model,
            channel,
            alias: self.alias,
            enabled: self.enabled,
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
        })
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct DeviceRegistration {
    pub sensor_id: String,
    pub hardware_model: String,
    pub channel: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct DeviceUpdate {
    pub hardware_model: Option<String>,
    pub channel: Option<String>,
    pub alias: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub sensor_id: String,
    pub hardware_model: String,
    pub channel: EquipmentChannel,
    pub alias: String,
    pub enabled: bool,
}

/// Registration is an explicit administrative act, so validation is strict:
/// unknown models and channels are rejected here even though gateway row
/// parsing lets them through.
pub fn validate_registration(request: &DeviceRegistration) -> Result<ValidRegistration, String> {
    let sensor_id = request.sensor_id.trim().to_string();
    if sensor_id.is_empty() {
        return Err("sensor_id is required".to_string());
    }
    let channel = EquipmentChannel::parse(&request.channel)
        .ok_or_else(|| format!("unknown channel '{}'", request.channel.trim()))?;
    let hardware_model = device_catalog::normalize_model(&request.hardware_model);
    if !device_catalog::is_supported_model(&hardware_model) {
        return Err(format!("unsupported hardware model '{hardware_model}'"));
    }
    Ok(ValidRegistration {
        sensor_id,
        hardware_model,
        channel,
        alias: request
            .alias
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        enabled: request.enabled.unwrap_or(true),
    })
}

/// Only enabled mappings resolve; a disabled or absent mapping means the row
/// stays out of alarm processing.
pub async fn resolve(pool: &PgPool, sensor_id: &str) -> Result<Option<DeviceMapping>, sqlx::Error> {
    let row: Option<DeviceMappingRow> = sqlx::query_as(
        r#"
        SELECT sensor_id, hardware_model, channel, alias, enabled, created_at, updated_at
        FROM device_mappings
        WHERE sensor_id = $1 AND enabled = TRUE
        "#,
    )
    .bind(sensor_id.trim())
    .fetch_optional(pool)
    .await?;
    Ok(row.and_then(DeviceMappingRow::into_mapping))
}

pub async fn list(pool: &PgPool) -> Result<Vec<DeviceMapping>, sqlx::Error> {
    let rows: Vec<DeviceMappingRow> = sqlx::query_as(
        r#"
        SELECT sensor_id, hardware_model, channel, alias, enabled, created_at, updated_at
        FROM device_mappings
        ORDER BY sensor_id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .filter_map(DeviceMappingRow::into_mapping)
        .collect())
}

/// Upsert by sensor id: re-registering an existing sensor updates its fields
/// instead of erroring.
pub async fn register(
    pool: &PgPool,
    registration: &ValidRegistration,
) -> Result<DeviceMapping, sqlx::Error> {
    let row: DeviceMappingRow = sqlx::query_as(
        r#"
        INSERT INTO device_mappings (sensor_id, hardware_model, channel, alias, enabled, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
        ON CONFLICT (sensor_id)
        DO UPDATE SET
            hardware_model = EXCLUDED.hardware_model,
            channel = EXCLUDED.channel,
            alias = EXCLUDED.alias,
            enabled = EXCLUDED.enabled,
            updated_at = NOW()
        RETURNING sensor_id, hardware_model, channel, alias, enabled, created_at, updated_at
        "#,
    )
    .bind(&registration.sensor_id)
    .bind(&registration.hardware_model)
    .bind(registration.channel.as_str())
    .bind(&registration.alias)
    .bind(registration.enabled)
    .fetch_one(pool)
    .await?;
    Ok(DeviceMapping {
        sensor_id: row.sensor_id,
        hardware_model: row.hardware_model,
        channel: registration.channel,
        alias: row.alias,
        enabled: row.enabled,
        created_at: row.created_at.to_rfc3339(),
        updated_at: row.updated_at.to_rfc3339(),
    })
}

/// Partial update of an existing mapping. Returns `Ok(None)` when the sensor
/// id is unknown; validation errors come back as the inner `Err`.
pub async fn update(
    pool: &PgPool,
    sensor_id: &str,
    update: &DeviceUpdate,
) -> Result<Result<Option<DeviceMapping>, String>, sqlx::Error> {
    let existing: Option<DeviceMappingRow> = sqlx::query_as(
        r#"
        SELECT sensor_id, hardware_model, channel, alias, enabled, created_at, updated_at
        FROM device_mappings
        WHERE sensor_id = $1
        "#,
    )
    .bind(sensor_id.trim())
    .fetch_optional(pool)
    .await?;

    let Some(existing) = existing.and_then(DeviceMappingRow::into_mapping) else {
        return Ok(Ok(None));
    };

    let channel = match update.channel.as_deref() {
        Some(raw) => match EquipmentChannel::parse(raw) {
            Some(channel) => channel,
            None => return Ok(Err(format!("unknown channel '{}'", raw.trim()))),
        },
        None => existing.channel,
    };
    let hardware_model = match update.hardware_model.as_deref() {
        Some(raw) => {
            let normalized = device_catalog::normalize_model(raw);
            if !device_catalog::is_supported_model(&normalized) {
                return Ok(Err(format!("unsupported hardware model '{normalized}'")));
            }
            normalized
        }
        None => existing.hardware_model.clone(),
    };

    let registration = ValidRegistration {
        sensor_id: existing.sensor_id.clone(),
        hardware_model,
        channel,
        alias: update
            .alias
            .as_deref()
            .map(str::trim)
            .map(str::to_string)
            .unwrap_or(existing.alias),
        enabled: update.enabled.unwrap_or(existing.enabled),
    };
    let mapping = register(pool, &registration).await?;
    Ok(Ok(Some(mapping)))
}

/// Removes a mapping outright. Returns whether a row existed.
pub async fn remove(pool: &PgPool, sensor_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM device_mappings WHERE sensor_id = $1")
        .bind(sensor_id.trim())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(sensor_id: &str, model: &str, channel: &str) -> DeviceRegistration {
        DeviceRegistration {
            sensor_id: sensor_id.to_string(),
            hardware_model: model.to_string(),
            channel: channel.to_string(),
            alias: None,
            enabled: None,
        }
    }

    #[test]
    fn registration_requires_sensor_id() {
        let err = validate_registration(&registration("   ", "LHT65", "chiller")).unwrap_err();
        assert!(err.contains("sensor_id"));
    }

    #[test]
    fn registration_rejects_unknown_channel_and_model() {
        let err = validate_registration(&registration("s-1", "LHT65", "walk-in")).unwrap_err();
        assert!(err.contains("channel"));

        let err = validate_registration(&registration("s-1", "WSD500A", "chiller")).unwrap_err();
        assert!(err.contains("hardware model"));
    }

    #[test]
    fn registration_normalizes_model_aliases() {
        let valid =
            validate_registration(&registration("s-1", "dragino-lht65", "freezer")).expect("valid");
        assert_eq!(valid.hardware_model, "LHT65");
        assert_eq!(valid.channel, EquipmentChannel::Freezer);
        assert!(valid.enabled);
    }
}
