use std::convert::Infallible;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::{future, Stream, StreamExt};

use crate::translator::WireFrame;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Turns wire frames into SSE events
pub trait EventFormatter: Send + Sync + 'static {
    /// `None` drops the frame from the stream.
    fn format_frame(&self, frame: &WireFrame) -> Option<Event>;
}

/// Wrap a frame stream into an SSE response with caching and proxy
/// buffering disabled. Headers go out as soon as the response is returned.
pub fn create_sse_stream<S, F>(frames: S, formatter: F) -> Response
where
    S: Stream<Item = WireFrame> + Send + 'static,
    F: EventFormatter,
{
    let events = frames.filter_map(move |frame| {
        future::ready(formatter.format_frame(&frame).map(Ok::<_, Infallible>))
    });

    let keep_alive = KeepAlive::new()
        .interval(KEEP_ALIVE_INTERVAL)
        .text("keep-alive");

    (
        [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (
                HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        Sse::new(events).keep_alive(keep_alive),
    )
        .into_response()
}
