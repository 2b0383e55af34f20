//! Wire encoder
//!
//! Frames [`StreamEvent`]s as Server-Sent Events for the client, one frame per
//! event, and pumps them into the response body.

use crate::relay::events::StreamEvent;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// SSE stream termination signal
pub const SSE_DONE_SIGNAL: &str = "[DONE]";

/// Sender half feeding the HTTP response body
pub type ClientSink = mpsc::Sender<Result<Bytes, std::io::Error>>;

/// Serialize one event into a `data: <json>\n\n` frame
pub fn encode_event(event: &StreamEvent) -> Bytes {
    match serde_json::to_string(event) {
        Ok(json) => Bytes::from(format!("data: {}\n\n", json)),
        Err(e) => {
            // Events only hold strings and JSON values, so this is unreachable in practice
            error!(error = %e, "Failed to serialize stream event");
            Bytes::from_static(b"data: {\"type\":\"error\",\"errorText\":\"encoding failed\"}\n\n")
        }
    }
}

/// The frame written after the terminal event
pub fn done_frame() -> Bytes {
    Bytes::from(format!("data: {}\n\n", SSE_DONE_SIGNAL))
}

/// Frames an event stream, appending the done frame after `Finish`
pub fn encode_stream<S>(events: S) -> impl Stream<Item = Bytes> + Send + 'static
where
    S: Stream<Item = StreamEvent> + Send + 'static,
{
    events.flat_map(|event| {
        let mut frames = vec![encode_event(&event)];
        if event.is_terminal() {
            frames.push(done_frame());
        }
        futures_util::stream::iter(frames)
    })
}

/// How a client branch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientOutcome {
    /// Every frame was delivered
    Completed {
        /// Frames written
        frames: usize,
    },
    /// The client went away; remaining frames were dropped
    Disconnected {
        /// Frames written before the disconnect
        frames: usize,
    },
}

/// Write encoded frames into the client sink until the events end or the client disconnects
///
/// A closed sink is normal early termination of this branch only: it is logged
/// and the pump returns.
pub async fn pump_to_client<S>(events: S, sink: ClientSink) -> ClientOutcome
where
    S: Stream<Item = StreamEvent> + Send + 'static,
{
    let frames = encode_stream(events);
    futures_util::pin_mut!(frames);

    let mut written = 0;
    while let Some(frame) = frames.next().await {
        if sink.send(Ok(frame)).await.is_err() {
            debug!(frames = written, "Client disconnected, stopping client branch");
            return ClientOutcome::Disconnected { frames: written };
        }
        written += 1;
    }

    ClientOutcome::Completed { frames: written }
}
