use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use subtle::ConstantTimeEq;

use crate::channel::{Reading, ReadingSource};
use crate::error::bad_request;
use crate::services::{device_registry, ingest, normalizer};
use crate::state::AppState;

const TOKEN_HEADER: &str = "x-gateway-token";

#[derive(Debug, Clone, serde::Deserialize, utoipa::IntoParams)]
pub(crate) struct GatewayQuery {
    token: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct GatewayRelayResponse {
    pub ok: bool,
    pub gateway_id: Option<String>,
    /// Sensor rows found in the envelope, including malformed ones.
    pub received: usize,
    pub ingested: usize,
    /// Sensor ids that did not resolve to an enabled device mapping.
    pub unmatched: Vec<String>,
}

/// Pulls the shared token from wherever the gateway firmware can put it:
/// header, query string, or a top-level body field.
fn presented_token<'a>(
    headers: &'a HeaderMap,
    query: &'a GatewayQuery,
    body: &'a JsonValue,
) -> Option<&'a str> {
    if let Some(value) = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(value);
    }
    if let Some(value) = query.token.as_deref() {
        return Some(value);
    }
    body.get("token").and_then(JsonValue::as_str)
}

fn token_matches(expected: &str, presented: Option<&str>) -> bool {
    match presented {
        Some(presented) => expected.as_bytes().ct_eq(presented.as_bytes()).into(),
        None => false,
    }
}

#[utoipa::path(
    post,
    path = "/api/gateway",
    tag = "gateway",
    params(GatewayQuery),
    responses(
        (status = 200, description = "Relay processed", body = GatewayRelayResponse),
        (status = 400, description = "Unrecognized gateway payload"),
        (status = 401, description = "Missing or invalid gateway token")
    )
)]
pub(crate) async fn relay(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    Json(payload): Json<JsonValue>,
) -> Result<Json<GatewayRelayResponse>, (StatusCode, String)> {
    if let Some(expected) = state.config.gateway_token.as_deref() {
        if !token_matches(expected, presented_token(&headers, &query, &payload)) {
            return Err((
                StatusCode::UNAUTHORIZED,
                "invalid gateway token".to_string(),
            ));
        }
    }

    let received_at = Utc::now();
    let Some(envelope) = normalizer::normalize_gateway(&payload, received_at) else {
        return Err(bad_request("unrecognized gateway payload"));
    };

    let mut ingested = 0usize;
    let mut matched = 0usize;
    let mut unmatched: Vec<String> = Vec::new();

    for row in &envelope.rows {
        let mapping = match device_registry::resolve(&state.db, &row.sensor_id).await {
            Ok(mapping) => mapping,
            Err(err) => {
                tracing::warn!(sensor_id = %row.sensor_id, error = %err, "device lookup failed");
                unmatched.push(row.sensor_id.clone());
                continue;
            }
        };
        let Some(mapping) = mapping else {
            unmatched.push(row.sensor_id.clone());
            continue;
        };
        matched += 1;

        let reading = Reading {
            channel: mapping.channel,
            temperature: row.temperature,
            recorded_at: row.recorded_at,
            source: ReadingSource::Gateway,
            gateway_id: envelope.gateway_id.clone(),
            sensor_id: Some(row.sensor_id.clone()),
            humidity: row.humidity,
            signal_strength: row.signal_strength,
        };
        // Gateways cannot act on errors; a failed row reduces the ingested
        // count instead of failing the batch.
        match ingest::ingest_reading(&state, reading).await {
            Ok(()) => ingested += 1,
            Err(err) => {
                tracing::warn!(sensor_id = %row.sensor_id, error = %err, "gateway row ingest failed");
            }
        }
    }

    record_gateway_event(
        &state,
        &payload,
        envelope.gateway_id.as_deref(),
        envelope.parsed_rows,
        matched,
        ingested,
        &unmatched,
        received_at,
    )
    .await;

    Ok(Json(GatewayRelayResponse {
        ok: true,
        gateway_id: envelope.gateway_id,
        received: envelope.parsed_rows,
        ingested,
        unmatched,
    }))
}

/// One diagnostic record per relay call, unmatched rows included, no matter
/// how many readings made it through. Failures only log; the gateway still
/// gets its counts.
async fn record_gateway_event(
    state: &AppState,
    payload: &JsonValue,
    gateway_id: Option<&str>,
    parsed_rows: usize,
    matched_rows: usize,
    ingested_rows: usize,
    unmatched: &[String],
    received_at: chrono::DateTime<chrono::Utc>,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO gateway_events (
            gateway_id, payload, parsed_rows, matched_rows, ingested_rows, unmatched, received_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(gateway_id)
    .bind(sqlx::types::Json(payload.clone()))
    .bind(parsed_rows as i32)
    .bind(matched_rows as i32)
    .bind(ingested_rows as i32)
    .bind(sqlx::types::Json(json!(unmatched)))
    .bind(received_at)
    .execute(&state.db)
    .await;

    if let Err(err) = result {
        tracing::warn!(error = %err, "failed to record gateway event");
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", post(relay))
}
