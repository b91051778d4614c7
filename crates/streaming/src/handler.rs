//! SSE handler - one subscription per connected client

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::HeaderMap;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use contracts::Event;
use dispatcher::{DispatcherHandle, SubscriptionKey};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::encoder;
use crate::error::ApiError;
use crate::state::AppState;

const LAST_EVENT_ID: &str = "last-event-id";

#[derive(Debug, Default, Deserialize)]
pub struct ResumeQuery {
    #[serde(rename = "lastEventId")]
    pub last_event_id: Option<String>,
}

/// Last seen id: the `Last-Event-ID` header, else the `lastEventId` query
fn last_event_id(headers: &HeaderMap, query: ResumeQuery) -> String {
    headers
        .get(LAST_EVENT_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or(query.last_event_id)
        .unwrap_or_default()
}

/// `GET {prefix}/:channel`
#[instrument(name = "sse_stream", skip_all, fields(channel = %channel))]
pub async fn stream_channel(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Query(query): Query<ResumeQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let last_event_id = last_event_id(&headers, query);
    let subscriber = state
        .dispatcher()
        .subscribe(channel, last_event_id.as_str())
        .await?;
    let (key, receiver) = subscriber.into_parts();

    debug!(subscription = %key.id, last_event_id = %last_event_id, "Client connected");

    let stream = SubscriptionStream {
        key,
        events: receiver.into_stream().boxed(),
        dispatcher: state.dispatcher().clone(),
        finished: false,
    };
    let mut sse = Sse::new(stream);
    if !state.keep_alive().is_zero() {
        sse = sse.keep_alive(KeepAlive::new().interval(state.keep_alive()));
    }

    Ok((
        [
            (CONTENT_TYPE, "text/event-stream; charset=utf-8"),
            (CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        ],
        sse,
    ))
}

/// The body of one SSE response
///
/// Ends when the delivery path closes or an event cannot be encoded.
/// Dropping it (client gone, server draining) unsubscribes.
pub struct SubscriptionStream {
    key: SubscriptionKey,
    events: BoxStream<'static, Event>,
    dispatcher: DispatcherHandle,
    finished: bool,
}

impl Stream for SubscriptionStream {
    type Item = Result<SseEvent, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.events.poll_next_unpin(cx) {
            Poll::Ready(Some(event)) => match encoder::encode(&event) {
                Ok(frame) => Poll::Ready(Some(Ok(frame))),
                Err(e) => {
                    warn!(
                        subscription = %this.key.id,
                        channel = %this.key.channel,
                        event_id = %event.id,
                        error = %e,
                        "Encode failed, ending stream"
                    );
                    this.finished = true;
                    Poll::Ready(None)
                }
            },
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        debug!(subscription = %self.key.id, channel = %self.key.channel, "Client disconnected");
        self.dispatcher.unsubscribe_detached(self.key.clone());
    }
}
