use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::{bad_request, map_db_error, not_found};
use crate::services::device_registry::{self, DeviceMapping, DeviceRegistration, DeviceUpdate};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/devices",
    tag = "devices",
    responses((status = 200, description = "Registered device mappings", body = Vec<DeviceMapping>))
)]
pub(crate) async fn list_devices(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeviceMapping>>, (StatusCode, String)> {
    Ok(Json(
        device_registry::list(&state.db).await.map_err(map_db_error)?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/devices",
    tag = "devices",
    request_body = DeviceRegistration,
    responses(
        (status = 200, description = "Registered mapping", body = DeviceMapping),
        (status = 400, description = "Invalid registration")
    )
)]
pub(crate) async fn register_device(
    State(state): State<AppState>,
    Json(request): Json<DeviceRegistration>,
) -> Result<Json<DeviceMapping>, (StatusCode, String)> {
    let valid = device_registry::validate_registration(&request).map_err(bad_request)?;
    let mapping = device_registry::register(&state.db, &valid)
        .await
        .map_err(map_db_error)?;
    Ok(Json(mapping))
}

#[utoipa::path(
    put,
    path = "/api/devices/{sensor_id}",
    tag = "devices",
    params(("sensor_id" = String, Path, description = "Sensor id")),
    request_body = DeviceUpdate,
    responses(
        (status = 200, description = "Updated mapping", body = DeviceMapping),
        (status = 400, description = "Invalid update"),
        (status = 404, description = "Unknown sensor id")
    )
)]
pub(crate) async fn update_device(
    State(state): State<AppState>,
    Path(sensor_id): Path<String>,
    Json(update): Json<DeviceUpdate>,
) -> Result<Json<DeviceMapping>, (StatusCode, String)> {
    match device_registry::update(&state.db, &sensor_id, &update)
        .await
        .map_err(map_db_error)?
    {
        Ok(Some(mapping)) => Ok(Json(mapping)),
        Ok(None) => Err(not_found(format!("no device mapping for '{sensor_id}'"))),
        Err(reason) => Err(bad_request(reason)),
    }
}

#[utoipa::path(
    delete,
    path = "/api/devices/{sensor_id}",
    tag = "devices",
    params(("sensor_id" = String, Path, description = "Sensor id")),
    responses(
        (status = 204, description = "Mapping removed"),
        (status = 404, description = "Unknown sensor id")
    )
)]
pub(crate) async fn remove_device(
    State(state): State<AppState>,
    Path(sensor_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let removed = device_registry::remove(&state.db, &sensor_id)
        .await
        .map_err(map_db_error)?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("no device mapping for '{sensor_id}'")))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/devices", get(list_devices).post(register_device))
        .route(
            "/devices/{sensor_id}",
            axum::routing::put(update_device).delete(remove_device),
        )
}
