/// Monitoring endpoints
///
/// `GET /api/status` returns one snapshot. `GET /api/events` streams every
/// monitoring broadcast as server-sent events, starting with the current
/// snapshot. The bus subscription lives as long as the client stream.

use crate::{
    api::AppState,
    runtime::{MonitorEvent, SystemStatus},
};
use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::get,
    Router,
};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};

/// Events buffered per client before new ones are dropped
const CLIENT_BUFFER: usize = 64;

pub fn create_monitoring_routes() -> Router<AppState> {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/events", get(stream_events))
}

/// GET /api/status
async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(state.system.get_system_status().await)
}

/// GET /api/events
async fn stream_events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let (tx, rx) = mpsc::channel::<MonitorEvent>(CLIENT_BUFFER);

    let initial = MonitorEvent::SystemStatus(state.system.get_system_status().await);
    if let Err(e) = tx.try_send(initial) {
        tracing::warn!("⚠️ Could not queue initial status for event stream: {}", e);
    }

    let subscription = state.system.subscribe_to_updates(move |event| {
        tx.try_send(event.clone())
            .map_err(|e| anyhow::anyhow!("event stream client not keeping up: {}", e))
    });
    tracing::info!("📡 Event stream client connected (subscriber {})", subscription.id());

    let stream = ReceiverStream::new(rx).map(move |event| {
        // Dropped together with the stream when the client disconnects
        let _keep = &subscription;
        Event::default().event(event.name()).json_data(&event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
