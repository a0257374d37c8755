use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::channel::{AlertEvent, Direction, EquipmentChannel, ReadingSource, ALL_CHANNELS};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Latest known reading + evaluated status for one channel, as shown on live
/// dashboards and in the connect-time snapshot.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ChannelSnapshot {
    pub channel: EquipmentChannel,
    pub temperature: f64,
    pub humidity: Option<f64>,
    pub signal_strength: Option<f64>,
    pub recorded_at: String,
    pub source: ReadingSource,
    pub status: Direction,
}

/// One entry per channel for `GET /api/readings/latest` and the stream
/// snapshot; `status` is `"no-data"` until a first reading arrives.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct LatestEntry {
    pub channel: EquipmentChannel,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading: Option<ChannelSnapshot>,
}

#[derive(Debug, Clone)]
pub enum LiveEvent {
    Reading(ChannelSnapshot),
    Alert(JsonValue),
    Heartbeat(DateTime<Utc>),
}

impl LiveEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            LiveEvent::Reading(_) => "reading",
            LiveEvent::Alert(_) => "alert",
            LiveEvent::Heartbeat(_) => "heartbeat",
        }
    }

    pub fn data(&self) -> JsonValue {
        match self {
            LiveEvent::Reading(snapshot) => {
                serde_json::to_value(snapshot).unwrap_or(JsonValue::Null)
            }
            LiveEvent::Alert(payload) => payload.clone(),
            LiveEvent::Heartbeat(at) => json!({ "at": at.to_rfc3339() }),
        }
    }
}

/// Fan-out of live state to subscribed dashboards. Publishing never blocks:
/// the broadcast channel drops the oldest events on slow receivers, and a
/// dropped receiver leaves the set on its own. Subscribers always start from
/// a fresh snapshot, never a backlog.
pub struct LiveBroadcaster {
    tx: broadcast::Sender<LiveEvent>,
    latest: RwLock<HashMap<EquipmentChannel, ChannelSnapshot>>,
}

impl LiveBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tx,
            latest: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a live consumer. The returned snapshot reflects every
    /// channel at subscription time and must be delivered before any
    /// streamed events.
    pub fn subscribe(&self) -> (Vec<LatestEntry>, broadcast::Receiver<LiveEvent>) {
        (self.latest_entries(), self.tx.subscribe())
    }

    pub fn latest_entries(&self) -> Vec<LatestEntry> {
        let latest = match self.latest.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        ALL_CHANNELS
            .into_iter()
            .map(|channel| match latest.get(&channel) {
                Some(snapshot) => LatestEntry {
                    channel,
                    status: snapshot.status.as_str().to_string(),
                    reading: Some(snapshot.clone()),
                },
                None => LatestEntry {
                    channel,
                    status: "no-data".to_string(),
                    reading: None,
                },
            })
            .collect()
    }

    pub fn publish_reading(&self, snapshot: ChannelSnapshot) {
        self.store_latest(snapshot.clone());
        // send only fails when nobody is subscribed, which is fine.
        let _ = self.tx.send(LiveEvent::Reading(snapshot));
    }

    /// Seeds the latest map without emitting an event (startup restore).
    pub fn store_latest(&self, snapshot: ChannelSnapshot) {
        let mut latest = match self.latest.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        latest.insert(snapshot.channel, snapshot);
    }

    pub fn publish_alert(&self, alert: &AlertEvent) {
        let payload = json!({
            "channel": alert.channel,
            "direction": alert.direction,
            "temperature": alert.temperature,
            "min_temp": alert.min_temp,
            "max_temp": alert.max_temp,
            "minutes_out_of_range": alert.minutes_out_of_range,
            "message": alert.message,
            "source": alert.source,
            "created_at": alert.created_at.to_rfc3339(),
        });
        let _ = self.tx.send(LiveEvent::Alert(payload));
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Emits heartbeat events until cancelled so consumers (and any proxy in
    /// between) can detect a dead connection.
    pub fn start_heartbeat(self: std::sync::Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let broadcaster = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let _ = broadcaster.tx.send(LiveEvent::Heartbeat(Utc::now()));
                    }
                }
            }
        });
    }
}

impl Default for LiveBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn snapshot(channel: EquipmentChannel, temperature: f64) -> ChannelSnapshot {
        ChannelSnapshot {
            channel,
            temperature,
            humidity: None,
            signal_strength: None,
            recorded_at: "2026-03-01T10:00:00+00:00".to_string(),
            source: ReadingSource::DirectApi,
            status: Direction::Normal,
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_readings() {
        let broadcaster = LiveBroadcaster::new();
        let (_, mut rx) = broadcaster.subscribe();

        broadcaster.publish_reading(snapshot(EquipmentChannel::Chiller, 3.2));
        match rx.recv().await.expect("event") {
            LiveEvent::Reading(received) => {
                assert_eq!(received.channel, EquipmentChannel::Chiller);
                assert_eq!(received.temperature, 3.2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn snapshot_covers_every_channel_with_no_data_placeholder() {
        let broadcaster = LiveBroadcaster::new();
        broadcaster.publish_reading(snapshot(EquipmentChannel::Freezer, -18.0));

        let (entries, _rx) = broadcaster.subscribe();
        assert_eq!(entries.len(), ALL_CHANNELS.len());
        let freezer = entries
            .iter()
            .find(|e| e.channel == EquipmentChannel::Freezer)
            .expect("freezer entry");
        assert_eq!(freezer.status, "normal");
        assert!(freezer.reading.is_some());
        let chiller = entries
            .iter()
            .find(|e| e.channel == EquipmentChannel::Chiller)
            .expect("chiller entry");
        assert_eq!(chiller.status, "no-data");
        assert!(chiller.reading.is_none());
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_block_or_fail() {
        let broadcaster = LiveBroadcaster::new();
        assert_eq!(broadcaster.subscriber_count(), 0);
        broadcaster.publish_reading(snapshot(EquipmentChannel::Chiller, 4.0));
        // Latest state is still retained for the next subscriber.
        let (entries, _rx) = broadcaster.subscribe();
        let chiller = entries
            .iter()
            .find(|e| e.channel == EquipmentChannel::Chiller)
            .expect("chiller entry");
        assert!(chiller.reading.is_some());
    }

    #[tokio::test]
    async fn heartbeat_events_flow_until_cancelled() {
        let broadcaster = Arc::new(LiveBroadcaster::new());
        let cancel = CancellationToken::new();
        let (_, mut rx) = broadcaster.subscribe();

        broadcaster.clone().start_heartbeat(Duration::from_millis(10), cancel.clone());
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("heartbeat within timeout")
            .expect("open channel");
        assert_eq!(event.event_name(), "heartbeat");
        cancel.cancel();
    }

    #[tokio::test]
    async fn dropped_receiver_leaves_the_fanout_set() {
        let broadcaster = LiveBroadcaster::new();
        let (_, rx) = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);
        drop(rx);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
