use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One logical monitored equipment point. The set is closed: a physical
/// sensor maps onto one of these via the device registry, and alarm state is
/// tracked per channel, not per sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum EquipmentChannel {
    Chiller,
    Freezer,
    FoodWarmer,
}

pub const ALL_CHANNELS: [EquipmentChannel; 3] = [
    EquipmentChannel::Chiller,
    EquipmentChannel::Freezer,
    EquipmentChannel::FoodWarmer,
];

impl EquipmentChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentChannel::Chiller => "chiller",
            EquipmentChannel::Freezer => "freezer",
            EquipmentChannel::FoodWarmer => "food-warmer",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "chiller" => Some(EquipmentChannel::Chiller),
            "freezer" => Some(EquipmentChannel::Freezer),
            "food-warmer" | "food_warmer" | "foodwarmer" => Some(EquipmentChannel::FoodWarmer),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EquipmentChannel::Chiller => "Chiller",
            EquipmentChannel::Freezer => "Freezer",
            EquipmentChannel::FoodWarmer => "Food warmer",
        }
    }
}

impl std::fmt::Display for EquipmentChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a reading falls relative to the configured band. `Normal` doubles as
/// the tracker's resting direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Normal,
    Low,
    High,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Normal => "normal",
            Direction::Low => "low",
            Direction::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "normal" => Some(Direction::Normal),
            "low" => Some(Direction::Low),
            "high" => Some(Direction::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingSource {
    DirectApi,
    Gateway,
}

impl ReadingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingSource::DirectApi => "direct-api",
            ReadingSource::Gateway => "gateway",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "direct-api" => Some(ReadingSource::DirectApi),
            "gateway" => Some(ReadingSource::Gateway),
            _ => None,
        }
    }
}

/// Canonical temperature reading after normalization. Immutable once created;
/// persisted append-only.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub channel: EquipmentChannel,
    pub temperature: f64,
    pub recorded_at: DateTime<Utc>,
    pub source: ReadingSource,
    pub gateway_id: Option<String>,
    pub sensor_id: Option<String>,
    pub humidity: Option<f64>,
    pub signal_strength: Option<f64>,
}

/// Acceptable band and alarm timing for one channel. Durations are stored in
/// whole minutes, matching how operators configure them.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ThresholdConfig {
    pub channel: EquipmentChannel,
    pub min_temp: f64,
    pub max_temp: f64,
    pub warning_delay_minutes: i64,
    pub repeat_interval_minutes: i64,
    pub notifications_enabled: bool,
}

impl ThresholdConfig {
    pub fn defaults(channel: EquipmentChannel) -> Self {
        match channel {
            EquipmentChannel::Chiller => Self {
                channel,
                min_temp: 0.0,
                max_temp: 5.0,
                warning_delay_minutes: 10,
                repeat_interval_minutes: 30,
                notifications_enabled: true,
            },
            EquipmentChannel::Freezer => Self {
                channel,
                min_temp: -25.0,
                max_temp: -15.0,
                warning_delay_minutes: 10,
                repeat_interval_minutes: 30,
                notifications_enabled: true,
            },
            EquipmentChannel::FoodWarmer => Self {
                channel,
                min_temp: 60.0,
                max_temp: 85.0,
                warning_delay_minutes: 15,
                repeat_interval_minutes: 30,
                notifications_enabled: true,
            },
        }
    }

    pub fn warning_delay(&self) -> Duration {
        Duration::minutes(self.warning_delay_minutes.max(0))
    }

    pub fn repeat_interval(&self) -> Duration {
        Duration::minutes(self.repeat_interval_minutes.max(1))
    }

    /// Applies a partial update and validates the merged result. All-or-nothing:
    /// returns the merged config only when every invariant holds.
    pub fn merge(&self, update: &ThresholdUpdate) -> Result<Self, String> {
        let merged = Self {
            channel: self.channel,
            min_temp: update.min_temp.unwrap_or(self.min_temp),
            max_temp: update.max_temp.unwrap_or(self.max_temp),
            warning_delay_minutes: update
                .warning_delay_minutes
                .unwrap_or(self.warning_delay_minutes),
            repeat_interval_minutes: update
                .repeat_interval_minutes
                .unwrap_or(self.repeat_interval_minutes),
            notifications_enabled: update
                .notifications_enabled
                .unwrap_or(self.notifications_enabled),
        };
        merged.validate()?;
        Ok(merged)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.min_temp.is_finite() {
            return Err("min_temp must be a finite number".to_string());
        }
        if !self.max_temp.is_finite() {
            return Err("max_temp must be a finite number".to_string());
        }
        if self.min_temp >= self.max_temp {
            return Err("min_temp must be below max_temp".to_string());
        }
        if self.warning_delay_minutes < 0 {
            return Err("warning_delay_minutes must be >= 0".to_string());
        }
        if self.repeat_interval_minutes < 1 {
            return Err("repeat_interval_minutes must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Partial threshold update as accepted by `PUT /api/config/{channel}`.
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct ThresholdUpdate {
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub warning_delay_minutes: Option<i64>,
    pub repeat_interval_minutes: Option<i64>,
    pub notifications_enabled: Option<bool>,
}

/// Per-channel alarm bookkeeping. Exclusively owned by the alarm tracker;
/// everything else sees read-only snapshots.
#[derive(Debug, Clone)]
pub struct AlarmState {
    pub channel: EquipmentChannel,
    pub out_of_range_since: Option<DateTime<Utc>>,
    pub last_direction: Direction,
    pub last_alert_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl AlarmState {
    pub fn new(channel: EquipmentChannel, now: DateTime<Utc>) -> Self {
        Self {
            channel,
            out_of_range_since: None,
            last_direction: Direction::Normal,
            last_alert_at: None,
            updated_at: now,
        }
    }
}

/// One emitted alert. Append-only; created per alert decision, never per
/// out-of-range reading.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub channel: EquipmentChannel,
    pub direction: Direction,
    pub temperature: f64,
    pub min_temp: f64,
    pub max_temp: f64,
    pub minutes_out_of_range: i64,
    pub message: String,
    pub source: ReadingSource,
    pub created_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn build(
        reading: &Reading,
        config: &ThresholdConfig,
        direction: Direction,
        minutes_out_of_range: i64,
    ) -> Self {
        let limit = match direction {
            Direction::Low => format!("below {:.1}°C", config.min_temp),
            _ => format!("above {:.1}°C", config.max_temp),
        };
        let message = format!(
            "{} temperature {:.1}°C {} for {} min (allowed {:.1}..{:.1}°C)",
            reading.channel.display_name(),
            reading.temperature,
            limit,
            minutes_out_of_range,
            config.min_temp,
            config.max_temp,
        );
        Self {
            channel: reading.channel,
            direction,
            temperature: reading.temperature,
            min_temp: config.min_temp,
            max_temp: config.max_temp,
            minutes_out_of_range,
            message,
            source: reading.source,
            created_at: reading.recorded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_round_trips_through_parse() {
        for channel in ALL_CHANNELS {
            assert_eq!(EquipmentChannel::parse(channel.as_str()), Some(channel));
        }
        assert_eq!(
            EquipmentChannel::parse("  Food_Warmer "),
            Some(EquipmentChannel::FoodWarmer)
        );
        assert_eq!(EquipmentChannel::parse("oven"), None);
    }

    #[test]
    fn defaults_differ_per_channel() {
        let chiller = ThresholdConfig::defaults(EquipmentChannel::Chiller);
        let freezer = ThresholdConfig::defaults(EquipmentChannel::Freezer);
        let warmer = ThresholdConfig::defaults(EquipmentChannel::FoodWarmer);

        assert!(chiller.min_temp < chiller.max_temp);
        assert!(freezer.max_temp < 0.0);
        assert!(warmer.min_temp >= 60.0);
        assert_ne!(chiller.min_temp, freezer.min_temp);
        assert_ne!(freezer.min_temp, warmer.min_temp);
        for config in [&chiller, &freezer, &warmer] {
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn merge_rejects_inverted_band_without_mutation() {
        let base = ThresholdConfig::defaults(EquipmentChannel::Freezer);
        let update = ThresholdUpdate {
            min_temp: Some(-10.0),
            max_temp: Some(-20.0),
            ..Default::default()
        };
        assert!(base.merge(&update).is_err());
        // The original is untouched; merge returns a new value or nothing.
        assert_eq!(base.min_temp, -25.0);
        assert_eq!(base.max_temp, -15.0);
    }

    #[test]
    fn merge_rejects_sub_minute_repeat_interval() {
        let base = ThresholdConfig::defaults(EquipmentChannel::Chiller);
        let update = ThresholdUpdate {
            repeat_interval_minutes: Some(0),
            ..Default::default()
        };
        assert!(base.merge(&update).is_err());
    }

    #[test]
    fn merge_applies_partial_fields_only() {
        let base = ThresholdConfig::defaults(EquipmentChannel::Chiller);
        let update = ThresholdUpdate {
            max_temp: Some(7.5),
            ..Default::default()
        };
        let merged = base.merge(&update).expect("valid merge");
        assert_eq!(merged.min_temp, 0.0);
        assert_eq!(merged.max_temp, 7.5);
        assert_eq!(merged.warning_delay_minutes, 10);
    }
}
