pub mod alerts;
pub mod devices;
pub mod gateway;
pub mod health;
pub mod readings;
pub mod stream;
pub mod thresholds;

use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest(
            "/api",
            Router::new()
                .merge(readings::router())
                .merge(gateway::router())
                .merge(thresholds::router())
                .merge(devices::router())
                .merge(alerts::router())
                .merge(stream::router())
                .merge(crate::openapi::router()),
        )
        .with_state(state)
}

#[cfg(test)]
mod validation_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::{get, post, put};
    use std::sync::OnceLock;
    use tower::ServiceExt;

    static STATE: OnceLock<AppState> = OnceLock::new();

    fn state() -> AppState {
        STATE.get_or_init(crate::test_support::test_state).clone()
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn direct_submission_rejects_zero_valid_readings() {
        let app = Router::new()
            .route("/api/readings", post(readings::submit_readings))
            .with_state(state());

        for body in ["{}", "[]", r#"{"readings": [{"channel": "sauna", "temp": 1}]}"#] {
            let resp = app
                .clone()
                .oneshot(json_request("POST", "/api/readings", body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
        }
    }

    #[tokio::test]
    async fn gateway_relay_rejects_bad_token() {
        let app = Router::new()
            .route("/api/gateway", post(gateway::relay))
            .with_state(state());

        // test_state configures the shared token; none presented here.
        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/gateway", r#"{"sensors": []}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/gateway?token=wrong",
                r#"{"sensors": []}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn gateway_relay_rejects_unparsable_envelope() {
        let app = Router::new()
            .route("/api/gateway", post(gateway::relay))
            .with_state(state());

        let mut request = json_request("POST", "/api/gateway", r#"{"gatewayId": "gw-1"}"#);
        request.headers_mut().insert(
            "x-gateway-token",
            crate::test_support::TEST_GATEWAY_TOKEN.parse().unwrap(),
        );
        let resp = app.oneshot(request).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn readings_list_requires_known_channel() {
        let app = Router::new()
            .route("/api/readings", get(readings::list_readings))
            .with_state(state());

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/api/readings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/readings?channel=oven")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn config_update_rejects_unknown_channel() {
        let app = Router::new()
            .route("/api/config/{channel}", put(thresholds::update_config))
            .with_state(state());

        let resp = app
            .oneshot(json_request("PUT", "/api/config/oven", "{}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn device_registration_rejects_invalid_fields() {
        let app = Router::new()
            .route("/api/devices", post(devices::register_device))
            .with_state(state());

        let cases = [
            r#"{"sensor_id": "", "hardware_model": "LHT65", "channel": "chiller"}"#,
            r#"{"sensor_id": "s-1", "hardware_model": "WSD500A", "channel": "chiller"}"#,
            r#"{"sensor_id": "s-1", "hardware_model": "LHT65", "channel": "walk-in"}"#,
        ];
        for body in cases {
            let resp = app
                .clone()
                .oneshot(json_request("POST", "/api/devices", body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
        }
    }
}
