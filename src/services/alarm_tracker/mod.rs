use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::channel::{
    AlarmState, AlertEvent, Direction, EquipmentChannel, Reading, ThresholdConfig,
};

mod eval;

pub use eval::{apply_reading, evaluate_range, AlertDecision};

/// Owns the per-channel alarm state. One mutex per channel: readings for the
/// same channel serialize through it, different channels proceed in parallel.
/// The lock covers only the in-memory transition; persistence, notification,
/// and broadcast all happen after release.
pub struct AlarmTracker {
    chiller: Arc<Mutex<AlarmState>>,
    freezer: Arc<Mutex<AlarmState>>,
    food_warmer: Arc<Mutex<AlarmState>>,
}

impl AlarmTracker {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            chiller: Arc::new(Mutex::new(AlarmState::new(EquipmentChannel::Chiller, now))),
            freezer: Arc::new(Mutex::new(AlarmState::new(EquipmentChannel::Freezer, now))),
            food_warmer: Arc::new(Mutex::new(AlarmState::new(
                EquipmentChannel::FoodWarmer,
                now,
            ))),
        }
    }

    fn slot(&self, channel: EquipmentChannel) -> &Arc<Mutex<AlarmState>> {
        match channel {
            EquipmentChannel::Chiller => &self.chiller,
            EquipmentChannel::Freezer => &self.freezer,
            EquipmentChannel::FoodWarmer => &self.food_warmer,
        }
    }

    /// Seeds in-memory state from the mirrored rows so debounce windows and
    /// repeat suppression survive a restart.
    pub async fn load_persisted(&self, pool: &PgPool) -> anyhow::Result<()> {
        let rows: Vec<AlarmStateRow> = sqlx::query_as(
            r#"
            SELECT channel, out_of_range_since, last_direction, last_alert_at, updated_at
            FROM alarm_states
            "#,
        )
        .fetch_all(pool)
        .await?;

        for row in rows {
            let Some(channel) = EquipmentChannel::parse(&row.channel) else {
                tracing::warn!(channel = %row.channel, "ignoring alarm state for unknown channel");
                continue;
            };
            let mut state = self.slot(channel).lock().await;
            state.out_of_range_since = row.out_of_range_since;
            state.last_direction =
                Direction::parse(&row.last_direction).unwrap_or(Direction::Normal);
            state.last_alert_at = row.last_alert_at;
            state.updated_at = row.updated_at;
        }
        Ok(())
    }

    /// Runs the transition algorithm for one evaluated reading. Returns the
    /// post-transition state snapshot and the alert to emit, if any. At most
    /// one alert per call; `last_alert_at` is updated in the same critical
    /// section that decides it.
    pub async fn process(
        &self,
        reading: &Reading,
        config: &ThresholdConfig,
    ) -> (AlarmState, Option<AlertEvent>) {
        let mut state = self.slot(reading.channel).lock().await;
        let decision = eval::apply_reading(
            &mut state,
            reading.temperature,
            reading.recorded_at,
            config,
        );
        let snapshot = state.clone();
        drop(state);

        let alert = decision.map(|decision| {
            AlertEvent::build(reading, config, decision.direction, decision.minutes_out_of_range)
        });
        (snapshot, alert)
    }

    pub async fn snapshot(&self, channel: EquipmentChannel) -> AlarmState {
        self.slot(channel).lock().await.clone()
    }
}

impl Default for AlarmTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(sqlx::FromRow)]
struct AlarmStateRow {
    channel: String,
    out_of_range_since: Option<chrono::DateTime<chrono::Utc>>,
    last_direction: String,
    last_alert_at: Option<chrono::DateTime<chrono::Utc>>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

/// Mirrors the in-memory state to its row. Best-effort by the caller: the
/// in-memory record stays authoritative for the running process.
pub async fn persist_state(pool: &PgPool, state: &AlarmState) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO alarm_states (channel, out_of_range_since, last_direction, last_alert_at, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (channel)
        DO UPDATE SET
            out_of_range_since = EXCLUDED.out_of_range_since,
            last_direction = EXCLUDED.last_direction,
            last_alert_at = EXCLUDED.last_alert_at,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(state.channel.as_str())
    .bind(state.out_of_range_since)
    .bind(state.last_direction.as_str())
    .bind(state.last_alert_at)
    .bind(state.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ReadingSource;
    use chrono::{Duration, TimeZone};

    fn reading(channel: EquipmentChannel, temperature: f64, minute: i64) -> Reading {
        Reading {
            channel,
            temperature,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
                + Duration::minutes(minute),
            source: ReadingSource::Gateway,
            gateway_id: Some("gw-1".to_string()),
            sensor_id: Some("s-1".to_string()),
            humidity: None,
            signal_strength: None,
        }
    }

    #[tokio::test]
    async fn process_returns_state_snapshot_and_alert() {
        let tracker = AlarmTracker::new();
        let config = ThresholdConfig::defaults(EquipmentChannel::Chiller);

        let (state, alert) = tracker
            .process(&reading(EquipmentChannel::Chiller, 8.0, 0), &config)
            .await;
        assert!(alert.is_none());
        assert_eq!(state.last_direction, Direction::High);

        let (state, alert) = tracker
            .process(&reading(EquipmentChannel::Chiller, 8.0, 12), &config)
            .await;
        let alert = alert.expect("alert after delay");
        assert_eq!(alert.channel, EquipmentChannel::Chiller);
        assert_eq!(alert.direction, Direction::High);
        assert!(alert.message.contains("Chiller"));
        assert_eq!(state.last_alert_at, Some(alert.created_at));
    }

    #[tokio::test]
    async fn channels_track_independent_state() {
        let tracker = AlarmTracker::new();
        let chiller = ThresholdConfig::defaults(EquipmentChannel::Chiller);
        let freezer = ThresholdConfig::defaults(EquipmentChannel::Freezer);

        tracker
            .process(&reading(EquipmentChannel::Chiller, 9.0, 0), &chiller)
            .await;
        let (freezer_state, _) = tracker
            .process(&reading(EquipmentChannel::Freezer, -20.0, 0), &freezer)
            .await;

        assert_eq!(freezer_state.last_direction, Direction::Normal);
        let chiller_state = tracker.snapshot(EquipmentChannel::Chiller).await;
        assert_eq!(chiller_state.last_direction, Direction::High);
    }

    #[tokio::test]
    async fn concurrent_same_channel_readings_emit_one_alert() {
        let tracker = Arc::new(AlarmTracker::new());
        let config = ThresholdConfig::defaults(EquipmentChannel::Chiller);

        tracker
            .process(&reading(EquipmentChannel::Chiller, 8.0, 0), &config)
            .await;

        // A burst of concurrent post-delay readings for the same channel must
        // produce exactly one alert, however they interleave.
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = tracker.clone();
            let config = config.clone();
            handles.push(tokio::spawn(async move {
                let (_, alert) = tracker
                    .process(&reading(EquipmentChannel::Chiller, 8.5, 15), &config)
                    .await;
                alert.is_some()
            }));
        }

        let mut alerts = 0;
        for handle in handles {
            if handle.await.expect("join") {
                alerts += 1;
            }
        }
        assert_eq!(alerts, 1);
    }
}
