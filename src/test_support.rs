use std::sync::Arc;

use crate::config::CoreConfig;
use crate::db;
use crate::services::alarm_tracker::AlarmTracker;
use crate::services::broadcaster::LiveBroadcaster;
use crate::services::notifier::NotifierGateway;
use crate::state::AppState;

pub const TEST_GATEWAY_TOKEN: &str = "test-gateway-token";

pub fn test_config() -> CoreConfig {
    CoreConfig {
        database_url: "postgresql://postgres@localhost/postgres".to_string(),
        gateway_token: Some(TEST_GATEWAY_TOKEN.to_string()),
        notify_webhook_url: None,
        notify_recipient_group: "kitchen-operators".to_string(),
        heartbeat_interval_seconds: 15,
        snapshot_seed_minutes: 60,
    }
}

pub fn test_state() -> AppState {
    let config = test_config();
    let pool = db::connect_lazy(&config.database_url).expect("connect_lazy");
    let notifier = Arc::new(NotifierGateway::new(
        reqwest::Client::new(),
        config.notify_webhook_url.clone(),
        config.notify_recipient_group.clone(),
    ));

    AppState {
        config,
        db: pool,
        tracker: Arc::new(AlarmTracker::new()),
        broadcaster: Arc::new(LiveBroadcaster::new()),
        notifier,
    }
}
