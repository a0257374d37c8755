use chrono::{DateTime, Duration, Utc};

use crate::channel::{AlarmState, Direction, ThresholdConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertDecision {
    pub direction: Direction,
    pub minutes_out_of_range: i64,
}

pub fn evaluate_range(temperature: f64, config: &ThresholdConfig) -> Direction {
    if temperature < config.min_temp {
        Direction::Low
    } else if temperature > config.max_temp {
        Direction::High
    } else {
        Direction::Normal
    }
}

/// Applies one evaluated reading to a channel's alarm state and decides
/// whether to emit an alert. Pure: the caller holds the per-channel lock and
/// performs all I/O afterwards.
///
/// An in-range reading clears the out-of-range window, so recovery always
/// restarts the debounce from scratch. Out-of-range readings seed the window
/// on first sight, then alert once the window exceeds the warning delay,
/// rate-limited by the repeat interval measured from the last emitted alert.
pub fn apply_reading(
    state: &mut AlarmState,
    temperature: f64,
    recorded_at: DateTime<Utc>,
    config: &ThresholdConfig,
) -> Option<AlertDecision> {
    let direction = evaluate_range(temperature, config);
    state.updated_at = recorded_at;

    if direction == Direction::Normal {
        state.out_of_range_since = None;
        state.last_direction = Direction::Normal;
        return None;
    }

    let since = state.out_of_range_since.unwrap_or(recorded_at);
    state.out_of_range_since = Some(since);
    state.last_direction = direction;

    // Late-arriving gateway payloads can carry a recorded_at before the stored
    // window start; clamp rather than going negative.
    let elapsed = (recorded_at - since).max(Duration::zero());
    if elapsed < config.warning_delay() {
        return None;
    }

    if let Some(last_alert_at) = state.last_alert_at {
        if recorded_at - last_alert_at < config.repeat_interval() {
            return None;
        }
    }

    state.last_alert_at = Some(recorded_at);
    Some(AlertDecision {
        direction,
        minutes_out_of_range: elapsed.num_minutes(),
    })
}
