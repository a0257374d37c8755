use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub database_url: String,
    /// Shared secret for the gateway relay endpoint. Unset disables ingestion
    /// authentication entirely (the relay accepts any caller).
    pub gateway_token: Option<String>,
    pub notify_webhook_url: Option<String>,
    pub notify_recipient_group: String,
    pub heartbeat_interval_seconds: u64,
    /// How far back to look when seeding the live snapshot map at startup.
    pub snapshot_seed_minutes: i64,
}

impl CoreConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env_optional_string("TEMPLOG_DATABASE_URL")
            .context("TEMPLOG_DATABASE_URL must be set")?;
        let gateway_token = env_optional_string("TEMPLOG_GATEWAY_TOKEN");
        let notify_webhook_url = env_optional_string("TEMPLOG_NOTIFY_WEBHOOK_URL");
        let notify_recipient_group =
            env_string("TEMPLOG_NOTIFY_GROUP", "kitchen-operators");
        let heartbeat_interval_seconds =
            env_u64("TEMPLOG_HEARTBEAT_INTERVAL_SECONDS", 15).clamp(1, 300);
        let snapshot_seed_minutes =
            env_u64("TEMPLOG_SNAPSHOT_SEED_MINUTES", 24 * 60).clamp(1, 7 * 24 * 60) as i64;

        Ok(Self {
            database_url,
            gateway_token,
            notify_webhook_url,
            notify_recipient_group,
            heartbeat_interval_seconds,
            snapshot_seed_minutes,
        })
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_optional_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
