use crate::config::CoreConfig;
use crate::services::alarm_tracker::AlarmTracker;
use crate::services::broadcaster::LiveBroadcaster;
use crate::services::notifier::NotifierGateway;
use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: CoreConfig,
    pub db: PgPool,
    pub tracker: Arc<AlarmTracker>,
    pub broadcaster: Arc<LiveBroadcaster>,
    pub notifier: Arc<NotifierGateway>,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.db.clone()
    }
}
