use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::errors::AppError;
use crate::services::views;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
}

// GET /api/events: SSE stream of booking changes and analysis markers
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Auth via query param (EventSource can't set headers)
    let token = query.token.as_deref().unwrap_or("");
    if token != state.config.admin_token {
        return Err(AppError::Unauthorized);
    }

    // Subscribe before taking the snapshot so no change falls in between.
    let rx = state.store.subscribe();

    let snapshot = state.store.snapshot();
    let initial = serde_json::json!({
        "bookings": views::chronological(&snapshot),
        "analyzing": state.enricher.in_flight_ids(),
    });
    let snapshot_stream = tokio_stream::once(Ok::<_, Infallible>(
        Event::default()
            .data(initial.to_string())
            .event("snapshot"),
    ));

    let live_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event(event.name())))
        }
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "event stream subscriber lagged");
            None
        }
    });

    let keepalive_stream = IntervalStream::new(tokio::time::interval(Duration::from_secs(30)))
        .map(|_| Ok(Event::default().comment("keepalive")));

    let combined = snapshot_stream.chain(live_stream);
    let merged = StreamExt::merge(combined, keepalive_stream);

    Ok(Sse::new(merged))
}
