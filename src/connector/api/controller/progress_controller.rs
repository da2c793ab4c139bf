use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use futures_util::stream::{self, Stream};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::connector::api::container::Container;
use crate::connector::api::error::ApiError;
use crate::domain::models::StatusUpdate;

struct EventsState {
    container: Arc<Container>,
    repository_id: String,
    receiver: broadcast::Receiver<StatusUpdate>,
    snapshot: Option<StatusUpdate>,
    /// Stage order of the last emitted update; older replays are dropped.
    last_stage: u8,
    done: bool,
}

/// `GET /api/repositories/{id}/events` — push status updates over SSE.
///
/// The subscriber gets the current status as an immediate snapshot, then
/// every later update until a terminal status closes the stream. A
/// subscriber that falls behind the channel buffer is resynchronized with a
/// fresh snapshot instead of a replay.
pub async fn repository_events(
    State(container): State<Arc<Container>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    // Unknown ids fail before a stream is opened.
    container.list_use_case().find(&id).await?;

    // Subscribe before reading the snapshot: an update landing between the
    // two is then delivered twice rather than lost.
    let receiver = container.progress().subscribe(&id).await;
    let repository = container.list_use_case().find(&id).await?;
    let snapshot = StatusUpdate::new(
        repository.id(),
        repository.status(),
        repository.status_message(),
    );

    let state = EventsState {
        container,
        repository_id: id,
        receiver,
        snapshot: Some(snapshot),
        last_stage: 0,
        done: false,
    };

    let events = stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        if let Some(snapshot) = state.snapshot.take() {
            state.last_stage = snapshot.status.stage_order();
            state.done = snapshot.is_terminal();
            return Some((Ok(status_event(&snapshot)), state));
        }
        loop {
            match state.receiver.recv().await {
                Ok(update) => {
                    // Within one run stages only move forward, so anything
                    // behind the snapshot is a replay of covered state.
                    if update.status.stage_order() < state.last_stage {
                        continue;
                    }
                    state.last_stage = update.status.stage_order();
                    state.done = update.is_terminal();
                    return Some((Ok(status_event(&update)), state));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(
                        "Events subscriber for {} lagged by {} updates; resyncing",
                        state.repository_id, skipped
                    );
                    // A fresh receiver only sees future updates; the new
                    // snapshot covers everything missed in between.
                    state.receiver = state
                        .container
                        .progress()
                        .subscribe(&state.repository_id)
                        .await;
                    match state
                        .container
                        .list_use_case()
                        .find(&state.repository_id)
                        .await
                    {
                        Ok(repository) => {
                            let update = StatusUpdate::new(
                                repository.id(),
                                repository.status(),
                                repository.status_message(),
                            );
                            state.last_stage = update.status.stage_order();
                            state.done = update.is_terminal();
                            return Some((Ok(status_event(&update)), state));
                        }
                        // Deleted mid-stream; nothing left to report.
                        Err(_) => return None,
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(events))
}

fn status_event(update: &StatusUpdate) -> Event {
    match Event::default().event("status").json_data(update) {
        Ok(event) => event,
        Err(e) => {
            warn!("Failed to encode status event: {}", e);
            Event::default().event("status").data("{}")
        }
    }
}
