use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value as JsonValue};

use crate::channel::{EquipmentChannel, Reading, ReadingSource};
use crate::device_catalog;

// Ordered candidate keys per logical field. Gateways from different vendors
// disagree on spelling; the first present, parseable key wins. Extending
// support for a new vendor means appending here, nothing else.
const SENSOR_ID_KEYS: [&str; 6] = ["sensorId", "sensor_id", "devEui", "dev_eui", "deveui", "id"];
const TEMPERATURE_KEYS: [&str; 5] = ["temperature", "temp", "temperature_c", "tempC", "value"];
const HUMIDITY_KEYS: [&str; 3] = ["humidity", "hum", "rh"];
const SIGNAL_KEYS: [&str; 4] = ["rssi", "signalStrength", "signal_strength", "signal"];
const TIMESTAMP_KEYS: [&str; 5] = ["recordedAt", "recorded_at", "timestamp", "time", "ts"];
const MODEL_KEYS: [&str; 4] = ["model", "hardwareModel", "hardware_model", "deviceModel"];
const CHANNEL_KEYS: [&str; 2] = ["channel", "equipment"];
const GATEWAY_ID_KEYS: [&str; 4] = ["gatewayId", "gateway_id", "gwId", "gateway"];
const SENSOR_LIST_KEYS: [&str; 4] = ["sensors", "SensorList", "data", "items"];

/// Epoch values at or above this are milliseconds; below, seconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

/// One row lifted out of a gateway envelope. The channel is unknown until the
/// device registry resolves the sensor id.
#[derive(Debug, Clone)]
pub struct GatewayRow {
    pub sensor_id: String,
    pub hardware_model: Option<String>,
    pub temperature: f64,
    pub humidity: Option<f64>,
    pub signal_strength: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GatewayEnvelope {
    pub gateway_id: Option<String>,
    /// Total sensor rows found in the payload, including ones rejected by
    /// per-row extraction.
    pub parsed_rows: usize,
    pub rows: Vec<GatewayRow>,
}

/// Parses a direct-API payload: a single reading object or `{readings: [...]}`.
/// Rows that fail extraction are dropped; the caller decides whether an empty
/// result is an error.
pub fn normalize_direct(payload: &JsonValue, now: DateTime<Utc>) -> Vec<Reading> {
    let rows: Vec<&JsonValue> = match payload {
        JsonValue::Object(obj) => match obj.get("readings").and_then(JsonValue::as_array) {
            Some(list) => list.iter().collect(),
            None => vec![payload],
        },
        JsonValue::Array(list) => list.iter().collect(),
        _ => return Vec::new(),
    };

    rows.iter()
        .filter_map(|row| extract_direct_reading(row, now))
        .collect()
}

fn extract_direct_reading(value: &JsonValue, now: DateTime<Utc>) -> Option<Reading> {
    let obj = value.as_object()?;
    let channel = string_field(obj, &CHANNEL_KEYS)
        .as_deref()
        .and_then(EquipmentChannel::parse)?;
    let temperature = number_field(obj, &TEMPERATURE_KEYS)?;
    Some(Reading {
        channel,
        temperature,
        recorded_at: timestamp_field(obj, &TIMESTAMP_KEYS, now),
        source: ReadingSource::DirectApi,
        gateway_id: None,
        sensor_id: string_field(obj, &SENSOR_ID_KEYS),
        humidity: number_field(obj, &HUMIDITY_KEYS),
        signal_strength: number_field(obj, &SIGNAL_KEYS),
    })
}

/// Parses a vendor gateway envelope. Returns `None` when the payload is not
/// structurally recognizable (no sensor list under any known key); individual
/// bad rows are dropped, not fatal.
pub fn normalize_gateway(payload: &JsonValue, now: DateTime<Utc>) -> Option<GatewayEnvelope> {
    let obj = payload.as_object()?;
    let list = SENSOR_LIST_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(JsonValue::as_array))?;

    let gateway_id = string_field(obj, &GATEWAY_ID_KEYS);
    let rows = list
        .iter()
        .filter_map(|row| extract_gateway_row(row, now))
        .collect();

    Some(GatewayEnvelope {
        gateway_id,
        parsed_rows: list.len(),
        rows,
    })
}

fn extract_gateway_row(value: &JsonValue, now: DateTime<Utc>) -> Option<GatewayRow> {
    let obj = value.as_object()?;
    let sensor_id = string_field(obj, &SENSOR_ID_KEYS)?;
    if sensor_id.is_empty() {
        return None;
    }
    let temperature = number_field(obj, &TEMPERATURE_KEYS)?;
    Some(GatewayRow {
        sensor_id,
        hardware_model: string_field(obj, &MODEL_KEYS)
            .map(|model| device_catalog::normalize_model(&model)),
        temperature,
        humidity: number_field(obj, &HUMIDITY_KEYS),
        signal_strength: number_field(obj, &SIGNAL_KEYS),
        recorded_at: timestamp_field(obj, &TIMESTAMP_KEYS, now),
    })
}

fn string_field(obj: &Map<String, JsonValue>, keys: &[&str]) -> Option<String> {
    for key in keys {
        match obj.get(*key) {
            Some(JsonValue::String(raw)) => {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
            // Some gateways emit numeric sensor ids.
            Some(JsonValue::Number(num)) => return Some(num.to_string()),
            _ => {}
        }
    }
    None
}

fn number_field(obj: &Map<String, JsonValue>, keys: &[&str]) -> Option<f64> {
    for key in keys {
        match obj.get(*key) {
            Some(JsonValue::Number(num)) => {
                if let Some(value) = num.as_f64().filter(|v| v.is_finite()) {
                    return Some(value);
                }
            }
            Some(JsonValue::String(raw)) => {
                if let Ok(value) = raw.trim().parse::<f64>() {
                    if value.is_finite() {
                        return Some(value);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Resolves a timestamp field to an instant, defaulting to `now`. Malformed
/// values must not reject the row; a reading with a broken clock is still a
/// reading.
fn timestamp_field(
    obj: &Map<String, JsonValue>,
    keys: &[&str],
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    for key in keys {
        match obj.get(*key) {
            Some(JsonValue::Number(num)) => {
                if let Some(parsed) = num.as_f64().and_then(parse_epoch) {
                    return parsed;
                }
            }
            Some(JsonValue::String(raw)) => {
                if let Some(parsed) = parse_timestamp_str(raw) {
                    return parsed;
                }
            }
            _ => {}
        }
    }
    now
}

fn parse_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    let millis = if value >= EPOCH_MILLIS_THRESHOLD {
        value
    } else {
        value * 1000.0
    };
    Utc.timestamp_millis_opt(millis as i64).single()
}

fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return parse_epoch(value);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn single_object_payload_yields_one_reading() {
        let payload = json!({"channel": "chiller", "temperature": 3.5});
        let readings = normalize_direct(&payload, now());
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].channel, EquipmentChannel::Chiller);
        assert_eq!(readings[0].temperature, 3.5);
        assert_eq!(readings[0].source, ReadingSource::DirectApi);
        assert_eq!(readings[0].recorded_at, now());
    }

    #[test]
    fn readings_array_payload_keeps_only_valid_rows() {
        let payload = json!({"readings": [
            {"channel": "freezer", "temp": "-18.5"},
            {"channel": "sauna", "temp": 40.0},
            {"channel": "chiller"},
            {"channel": "food-warmer", "temperature": 72.0}
        ]});
        let readings = normalize_direct(&payload, now());
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].channel, EquipmentChannel::Freezer);
        assert_eq!(readings[0].temperature, -18.5);
        assert_eq!(readings[1].channel, EquipmentChannel::FoodWarmer);
    }

    #[test]
    fn gateway_envelope_accepts_vendor_list_keys() {
        for list_key in ["sensors", "SensorList", "data", "items"] {
            let payload = json!({
                "gatewayId": "gw-7",
                list_key: [{"devEui": "a84041ffff000001", "temp": 4.2}]
            });
            let envelope = normalize_gateway(&payload, now()).expect("envelope");
            assert_eq!(envelope.gateway_id.as_deref(), Some("gw-7"));
            assert_eq!(envelope.parsed_rows, 1);
            assert_eq!(envelope.rows.len(), 1);
            assert_eq!(envelope.rows[0].sensor_id, "a84041ffff000001");
        }
    }

    #[test]
    fn gateway_payload_without_sensor_list_is_unparsable() {
        assert!(normalize_gateway(&json!({"gatewayId": "gw-1"}), now()).is_none());
        assert!(normalize_gateway(&json!([1, 2, 3]), now()).is_none());
        assert!(normalize_gateway(&json!("nope"), now()).is_none());
    }

    #[test]
    fn rows_with_bad_temperature_are_dropped_not_fatal() {
        let mut rows = Vec::new();
        for i in 0..10 {
            if i < 3 {
                rows.push(json!({"sensorId": format!("s-{i}"), "temp": "not-a-number"}));
            } else {
                rows.push(json!({"sensorId": format!("s-{i}"), "temp": 2.0 + i as f64}));
            }
        }
        let payload = json!({"gateway_id": "gw-2", "sensors": rows});
        let envelope = normalize_gateway(&payload, now()).expect("envelope");
        assert_eq!(envelope.parsed_rows, 10);
        assert_eq!(envelope.rows.len(), 7);
    }

    #[test]
    fn rows_without_sensor_id_are_dropped() {
        let payload = json!({"sensors": [
            {"temp": 4.0},
            {"sensorId": "   ", "temp": 4.0},
            {"sensorId": "ok-1", "temp": 4.0}
        ]});
        let envelope = normalize_gateway(&payload, now()).expect("envelope");
        assert_eq!(envelope.rows.len(), 1);
        assert_eq!(envelope.rows[0].sensor_id, "ok-1");
    }

    #[test]
    fn numeric_sensor_ids_are_stringified() {
        let payload = json!({"sensors": [{"id": 12045, "value": -17.0}]});
        let envelope = normalize_gateway(&payload, now()).expect("envelope");
        assert_eq!(envelope.rows[0].sensor_id, "12045");
    }

    #[test]
    fn epoch_seconds_and_millis_disambiguate_by_magnitude() {
        let expected = Utc.with_ymd_and_hms(2026, 2, 28, 23, 59, 0).unwrap();
        let seconds = expected.timestamp();
        let millis = expected.timestamp_millis();

        for ts in [json!(seconds), json!(millis), json!(seconds.to_string())] {
            let payload = json!({"sensors": [{"sensorId": "s-1", "temp": 1.0, "ts": ts}]});
            let envelope = normalize_gateway(&payload, now()).expect("envelope");
            assert_eq!(envelope.rows[0].recorded_at, expected, "input {ts:?}");
        }
    }

    #[test]
    fn iso_timestamps_parse_and_garbage_falls_back_to_now() {
        let payload = json!({"sensors": [
            {"sensorId": "s-1", "temp": 1.0, "timestamp": "2026-03-01T08:30:00Z"},
            {"sensorId": "s-2", "temp": 1.0, "timestamp": "2026-03-01 08:30:00"},
            {"sensorId": "s-3", "temp": 1.0, "timestamp": "last tuesday"}
        ]});
        let envelope = normalize_gateway(&payload, now()).expect("envelope");
        let expected = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
        assert_eq!(envelope.rows[0].recorded_at, expected);
        assert_eq!(envelope.rows[1].recorded_at, expected);
        // Malformed timestamps must not cause data loss: row kept, stamped now.
        assert_eq!(envelope.rows[2].recorded_at, now());
    }

    #[test]
    fn vendor_model_aliases_are_normalized_in_rows() {
        let payload = json!({"sensors": [
            {"sensorId": "s-1", "temp": 1.0, "model": "lht-65"},
            {"sensorId": "s-2", "temp": 1.0, "hardware_model": "MYSTERY-9"}
        ]});
        let envelope = normalize_gateway(&payload, now()).expect("envelope");
        assert_eq!(envelope.rows[0].hardware_model.as_deref(), Some("LHT65"));
        assert_eq!(envelope.rows[1].hardware_model.as_deref(), Some("MYSTERY-9"));
    }

    #[test]
    fn humidity_and_signal_aliases_are_optional_extras() {
        let payload = json!({"sensors": [
            {"sensorId": "s-1", "temp": 1.0, "rh": 55.2, "rssi": -71}
        ]});
        let envelope = normalize_gateway(&payload, now()).expect("envelope");
        assert_eq!(envelope.rows[0].humidity, Some(55.2));
        assert_eq!(envelope.rows[0].signal_strength, Some(-71.0));
    }

    #[test]
    fn non_finite_temperature_strings_are_rejected() {
        let payload = json!({"sensors": [
            {"sensorId": "s-1", "temp": "NaN"},
            {"sensorId": "s-2", "temp": "inf"}
        ]});
        let envelope = normalize_gateway(&payload, now()).expect("envelope");
        assert!(envelope.rows.is_empty());
    }
}
