use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::healthz_handler,
        crate::routes::readings::submit_readings,
        crate::routes::readings::list_readings,
        crate::routes::readings::latest_readings,
        crate::routes::gateway::relay,
        crate::routes::thresholds::list_configs,
        crate::routes::thresholds::update_config,
        crate::routes::thresholds::reset_config,
        crate::routes::devices::list_devices,
        crate::routes::devices::register_device,
        crate::routes::devices::update_device,
        crate::routes::devices::remove_device,
        crate::routes::alerts::list_alerts,
        crate::routes::stream::stream_events,
    ),
    components(schemas(
        crate::channel::EquipmentChannel,
        crate::channel::Direction,
        crate::channel::ReadingSource,
        crate::channel::ThresholdConfig,
        crate::channel::ThresholdUpdate,
        crate::services::broadcaster::ChannelSnapshot,
        crate::services::broadcaster::LatestEntry,
        crate::services::device_registry::DeviceMapping,
        crate::services::device_registry::DeviceRegistration,
        crate::services::device_registry::DeviceUpdate,
        crate::routes::health::HealthResponse,
        crate::routes::readings::IngestResponse,
        crate::routes::readings::ReadingResponse,
        crate::routes::readings::ReadingsResponse,
        crate::routes::gateway::GatewayRelayResponse,
        crate::routes::alerts::AlertResponse,
    )),
    tags(
        (name = "readings", description = "Temperature reading ingestion and history"),
        (name = "gateway", description = "LoRa gateway relay ingestion"),
        (name = "config", description = "Per-channel threshold configuration"),
        (name = "devices", description = "Sensor to channel device mappings"),
        (name = "alerts", description = "Emitted temperature alerts"),
        (name = "stream", description = "Live dashboard feed")
    ),
    info(
        title = "templog-server-rs",
        description = "Kitchen equipment temperature monitoring and alerting"
    )
)]
pub struct ApiDoc;

pub fn openapi_json() -> serde_json::Value {
    serde_json::to_value(ApiDoc::openapi()).unwrap_or_default()
}

async fn serve_openapi() -> Json<serde_json::Value> {
    Json(openapi_json())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(serve_openapi))
}
