use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};

use crate::channel::{EquipmentChannel, ThresholdConfig, ThresholdUpdate};
use crate::error::{bad_request, map_db_error};
use crate::services::thresholds;
use crate::state::AppState;

#[derive(Debug, Clone, serde::Deserialize, utoipa::IntoParams)]
pub(crate) struct ConfigQuery {
    channel: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/config",
    tag = "config",
    params(ConfigQuery),
    responses(
        (status = 200, description = "Effective threshold configs", body = Vec<ThresholdConfig>),
        (status = 400, description = "Unknown channel")
    )
)]
pub(crate) async fn list_configs(
    State(state): State<AppState>,
    Query(query): Query<ConfigQuery>,
) -> Result<Json<Vec<ThresholdConfig>>, (StatusCode, String)> {
    let configs = match query.channel.as_deref() {
        Some(raw) => {
            let channel = EquipmentChannel::parse(raw)
                .ok_or_else(|| bad_request(format!("unknown channel '{raw}'")))?;
            vec![thresholds::get(&state.db, channel)
                .await
                .map_err(map_db_error)?]
        }
        None => thresholds::get_all(&state.db).await.map_err(map_db_error)?,
    };
    Ok(Json(configs))
}

#[utoipa::path(
    put,
    path = "/api/config/{channel}",
    tag = "config",
    params(("channel" = String, Path, description = "Equipment channel")),
    request_body = ThresholdUpdate,
    responses(
        (status = 200, description = "Merged config", body = ThresholdConfig),
        (status = 400, description = "Unknown channel or invalid config")
    )
)]
pub(crate) async fn update_config(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Json(update): Json<ThresholdUpdate>,
) -> Result<Json<ThresholdConfig>, (StatusCode, String)> {
    let channel = EquipmentChannel::parse(&channel)
        .ok_or_else(|| bad_request(format!("unknown channel '{channel}'")))?;

    match thresholds::set(&state.db, channel, &update)
        .await
        .map_err(map_db_error)?
    {
        Ok(merged) => Ok(Json(merged)),
        Err(reason) => Err(bad_request(reason)),
    }
}

#[utoipa::path(
    delete,
    path = "/api/config/{channel}",
    tag = "config",
    params(("channel" = String, Path, description = "Equipment channel")),
    responses(
        (status = 200, description = "Config reset to defaults", body = ThresholdConfig),
        (status = 400, description = "Unknown channel")
    )
)]
pub(crate) async fn reset_config(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<ThresholdConfig>, (StatusCode, String)> {
    let channel = EquipmentChannel::parse(&channel)
        .ok_or_else(|| bad_request(format!("unknown channel '{channel}'")))?;
    let defaults = thresholds::reset(&state.db, channel)
        .await
        .map_err(map_db_error)?;
    Ok(Json(defaults))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/config", get(list_configs))
        .route("/config/{channel}", put(update_config).delete(reset_config))
}
