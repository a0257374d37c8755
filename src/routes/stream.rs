use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::stream::Stream;
use futures::StreamExt;
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::state::AppState;

/// Live feed for dashboards: a `snapshot` event with the current per-channel
/// state first, then `reading` / `alert` / `heartbeat` events as they happen.
/// A reconnecting consumer gets fresh state, never a backlog; receivers that
/// lag too far simply skip the missed events.
#[utoipa::path(
    get,
    path = "/api/stream",
    tag = "stream",
    responses((status = 200, description = "Server-sent event stream"))
)]
pub(crate) async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (snapshot, rx) = state.broadcaster.subscribe();
    let snapshot_json =
        serde_json::to_string(&snapshot).unwrap_or_else(|_| "[]".to_string());
    let first = futures::stream::once(async move {
        Ok(Event::default().event("snapshot").data(snapshot_json))
    });

    let live = BroadcastStream::new(rx).filter_map(|item| async move {
        match item {
            Ok(event) => Some(Ok(Event::default()
                .event(event.event_name())
                .data(event.data().to_string()))),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "live subscriber lagged; dropping missed events");
                None
            }
        }
    });

    Sse::new(first.chain(live)).keep_alive(KeepAlive::default())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/stream", get(stream_events))
}
