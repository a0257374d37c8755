use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde_json::Value as JsonValue;

use crate::channel::{Direction, EquipmentChannel, ThresholdConfig};
use crate::error::{bad_request, map_db_error};
use crate::services::alarm_tracker::evaluate_range;
use crate::services::broadcaster::LatestEntry;
use crate::services::{ingest, normalizer, thresholds};
use crate::state::AppState;

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct IngestResponse {
    pub ok: bool,
    pub count: usize,
}

#[utoipa::path(
    post,
    path = "/api/readings",
    tag = "readings",
    responses(
        (status = 200, description = "Readings accepted", body = IngestResponse),
        (status = 400, description = "No valid readings in request"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub(crate) async fn submit_readings(
    State(state): State<AppState>,
    Json(payload): Json<JsonValue>,
) -> Result<Json<IngestResponse>, (StatusCode, String)> {
    let readings = normalizer::normalize_direct(&payload, Utc::now());
    if readings.is_empty() {
        return Err(bad_request("no valid readings in request"));
    }

    let mut count = 0usize;
    for reading in readings {
        ingest::ingest_reading(&state, reading)
            .await
            .map_err(map_db_error)?;
        count += 1;
    }
    Ok(Json(IngestResponse { ok: true, count }))
}

#[derive(Debug, Clone, serde::Deserialize, utoipa::IntoParams)]
pub(crate) struct ReadingsQuery {
    channel: Option<String>,
    /// Lookback window in minutes.
    minutes: Option<i64>,
    #[param(minimum = 1, maximum = 2000)]
    limit: Option<u32>,
}

#[derive(sqlx::FromRow)]
struct ReadingRow {
    id: i64,
    temperature: f64,
    humidity: Option<f64>,
    signal_strength: Option<f64>,
    recorded_at: chrono::DateTime<chrono::Utc>,
    source: String,
    gateway_id: Option<String>,
    sensor_id: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct ReadingResponse {
    id: i64,
    channel: EquipmentChannel,
    temperature: f64,
    humidity: Option<f64>,
    signal_strength: Option<f64>,
    recorded_at: String,
    source: String,
    gateway_id: Option<String>,
    sensor_id: Option<String>,
    status: Direction,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct ReadingsResponse {
    channel: EquipmentChannel,
    config: ThresholdConfig,
    readings: Vec<ReadingResponse>,
}

#[utoipa::path(
    get,
    path = "/api/readings",
    tag = "readings",
    params(ReadingsQuery),
    responses(
        (status = 200, description = "Readings in window", body = ReadingsResponse),
        (status = 400, description = "Missing or invalid channel")
    )
)]
pub(crate) async fn list_readings(
    State(state): State<AppState>,
    Query(query): Query<ReadingsQuery>,
) -> Result<Json<ReadingsResponse>, (StatusCode, String)> {
    let channel = query
        .channel
        .as_deref()
        .ok_or_else(|| bad_request("channel query parameter is required"))
        .and_then(|raw| {
            EquipmentChannel::parse(raw).ok_or_else(|| bad_request(format!("unknown channel '{raw}'")))
        })?;

    let minutes = query.minutes.unwrap_or(180).clamp(1, 7 * 24 * 60);
    let limit = query.limit.unwrap_or(500).clamp(1, 2000) as i64;
    let window_start = Utc::now() - Duration::minutes(minutes);

    let config = thresholds::get(&state.db, channel)
        .await
        .map_err(map_db_error)?;

    let rows: Vec<ReadingRow> = sqlx::query_as(
        r#"
        SELECT id, temperature, humidity, signal_strength, recorded_at, source, gateway_id, sensor_id
        FROM readings
        WHERE channel = $1 AND recorded_at >= $2
        ORDER BY recorded_at ASC
        LIMIT $3
        "#,
    )
    .bind(channel.as_str())
    .bind(window_start)
    .bind(limit)
    .fetch_all(&state.db)
    .await
    .map_err(map_db_error)?;

    let readings = rows
        .into_iter()
        .map(|row| ReadingResponse {
            id: row.id,
            channel,
            temperature: row.temperature,
            humidity: row.humidity,
            signal_strength: row.signal_strength,
            recorded_at: row.recorded_at.to_rfc3339(),
            source: row.source,
            gateway_id: row.gateway_id,
            sensor_id: row.sensor_id,
            status: evaluate_range(row.temperature, &config),
        })
        .collect();

    Ok(Json(ReadingsResponse {
        channel,
        config,
        readings,
    }))
}

#[utoipa::path(
    get,
    path = "/api/readings/latest",
    tag = "readings",
    responses((status = 200, description = "Latest state per channel", body = Vec<LatestEntry>))
)]
pub(crate) async fn latest_readings(State(state): State<AppState>) -> Json<Vec<LatestEntry>> {
    Json(state.broadcaster.latest_entries())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/readings", post(submit_readings).get(list_readings))
        .route("/readings/latest", get(latest_readings))
}
