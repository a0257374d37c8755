use serde_json::json;

use crate::channel::AlertEvent;

/// Push-notification transport boundary. Delivery is a black box behind a
/// webhook: we post the alert and the recipient group, and whatever is on the
/// other side (ntfy, a push relay, a chat hook) fans it out to operators.
pub struct NotifierGateway {
    http: reqwest::Client,
    webhook_url: Option<String>,
    recipient_group: String,
}

impl NotifierGateway {
    pub fn new(http: reqwest::Client, webhook_url: Option<String>, recipient_group: String) -> Self {
        Self {
            http,
            webhook_url,
            recipient_group,
        }
    }

    /// Fire-and-forget delivery. Runs on its own task so the ingestion path
    /// never waits on the transport; failures are logged and swallowed — an
    /// alert that was decided is never undone because delivery failed.
    pub fn notify(&self, alert: &AlertEvent) {
        let Some(url) = self.webhook_url.clone() else {
            tracing::debug!(channel = %alert.channel, "notify webhook not configured; skipping");
            return;
        };

        let payload = json!({
            "group": self.recipient_group,
            "channel": alert.channel,
            "direction": alert.direction,
            "temperature": alert.temperature,
            "message": alert.message,
            "created_at": alert.created_at.to_rfc3339(),
        });
        let http = self.http.clone();
        let channel = alert.channel;

        tokio::spawn(async move {
            match http.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(channel = %channel, "alert notification delivered");
                }
                Ok(response) => {
                    tracing::warn!(
                        channel = %channel,
                        status = %response.status(),
                        "alert notification rejected by webhook"
                    );
                }
                Err(err) => {
                    tracing::warn!(channel = %channel, error = %err, "alert notification failed");
                }
            }
        });
    }
}
