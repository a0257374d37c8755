use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::channel::EquipmentChannel;
use crate::error::{bad_request, map_db_error};
use crate::state::AppState;

#[derive(Debug, Clone, serde::Deserialize, utoipa::IntoParams)]
pub(crate) struct AlertsQuery {
    channel: Option<String>,
    #[param(minimum = 1, maximum = 250)]
    limit: Option<u32>,
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: i64,
    channel: String,
    direction: String,
    temperature: f64,
    min_temp: f64,
    max_temp: f64,
    minutes_out_of_range: i64,
    message: String,
    source: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct AlertResponse {
    id: i64,
    channel: String,
    direction: String,
    temperature: f64,
    min_temp: f64,
    max_temp: f64,
    minutes_out_of_range: i64,
    message: String,
    source: String,
    created_at: String,
}

impl From<AlertRow> for AlertResponse {
    fn from(row: AlertRow) -> Self {
        Self {
            id: row.id,
            channel: row.channel,
            direction: row.direction,
            temperature: row.temperature,
            min_temp: row.min_temp,
            max_temp: row.max_temp,
            minutes_out_of_range: row.minutes_out_of_range,
            message: row.message,
            source: row.source,
            created_at: row.created_at.to_rfc3339(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/alerts",
    tag = "alerts",
    params(AlertsQuery),
    responses(
        (status = 200, description = "Alert events, most recent first", body = Vec<AlertResponse>),
        (status = 400, description = "Unknown channel")
    )
)]
pub(crate) async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<AlertResponse>>, (StatusCode, String)> {
    let channel = match query.channel.as_deref() {
        Some(raw) => Some(
            EquipmentChannel::parse(raw)
                .ok_or_else(|| bad_request(format!("unknown channel '{raw}'")))?,
        ),
        None => None,
    };
    let limit = query.limit.unwrap_or(50).clamp(1, 250) as i64;

    let rows: Vec<AlertRow> = sqlx::query_as(
        r#"
        SELECT id, channel, direction, temperature, min_temp, max_temp, minutes_out_of_range, message, source, created_at
        FROM alert_events
        WHERE ($1::text IS NULL OR channel = $1)
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(channel.map(|c| c.as_str()))
    .bind(limit)
    .fetch_all(&state.db)
    .await
    .map_err(map_db_error)?;

    Ok(Json(rows.into_iter().map(AlertResponse::from).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/alerts", get(list_alerts))
}
