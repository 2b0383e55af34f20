//! Wire decoder
//!
//! Turns the upstream's line-oriented `<tag>:<json>\n` stream into
//! [`StreamEvent`]s. Decoding is best-effort: a bad line is logged and either
//! recovered or skipped, never allowed to end the stream.
//!
//! Event ordering guarantees, per decoded response:
//! - `StartStep` precedes the first content event
//! - every text id sees exactly one `TextStart`, its deltas, then one `TextEnd`
//! - the stream always ends with `FinishStep` (when a step was started) and `Finish`

use crate::relay::events::{
    StreamEvent, TextPayload, TitlePayload, ToolCallPayload, ToolResultPayload,
};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use tracing::{debug, warn};
use uuid::Uuid;

/// Text content
pub const TAG_TEXT: &str = "0";
/// In-stream error message
pub const TAG_ERROR: &str = "3";
/// Tool call
pub const TAG_TOOL_CALL: &str = "9";
/// Tool result
pub const TAG_TOOL_RESULT: &str = "a";
/// Explicit end of the response
pub const TAG_FINISH: &str = "d";
/// Upstream step end; step markers are synthesized instead
pub const TAG_FINISH_STEP: &str = "e";
/// Upstream step start; step markers are synthesized instead
pub const TAG_START_STEP: &str = "f";
/// Suggested conversation title
pub const TAG_TITLE: &str = "t";

/// Incremental decoder state for one upstream response
#[derive(Debug, Default)]
pub struct WireDecoder {
    buffer: Vec<u8>,
    open_text_id: Option<String>,
    step_started: bool,
    finished: bool,
}

impl WireDecoder {
    /// Create a decoder with empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminal sequence has been emitted
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one chunk of bytes and return the events for every line it completes
    ///
    /// Partial lines stay buffered until a later chunk (or [`finish`](Self::finish))
    /// completes them.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend_from_slice(chunk);

        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            self.decode_line(&line[..newline_pos], &mut events);
            if self.finished {
                self.buffer.clear();
                break;
            }
        }

        events
    }

    /// Signal end of input: decode any unterminated last line, then emit the terminal sequence
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.decode_line(&line, &mut events);
        }
        self.terminate(&mut events);

        events
    }

    fn decode_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        if self.finished {
            return;
        }

        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return;
        }

        let Some((tag, payload)) = line.split_once(':') else {
            debug!(line = %line, "Skipping wire line without a tag");
            return;
        };

        match tag.trim() {
            TAG_TEXT => {
                let delta = decode_text(payload);
                self.push_text(delta, events);
            }
            TAG_TITLE => match serde_json::from_str::<TitlePayload>(payload) {
                Ok(title) => {
                    if let Some(title) = title.into_title() {
                        events.push(StreamEvent::title(title));
                    }
                }
                Err(e) => warn!(error = %e, "Ignoring malformed title payload"),
            },
            TAG_TOOL_CALL => match serde_json::from_str::<ToolCallPayload>(payload) {
                Ok(call) => {
                    self.close_text(events);
                    self.start_step(events);
                    events.push(StreamEvent::ToolInputAvailable {
                        tool_call_id: call.tool_call_id,
                        tool_name: call.tool_name,
                        input: call.args,
                    });
                }
                Err(e) => warn!(error = %e, "Ignoring malformed tool call payload"),
            },
            TAG_TOOL_RESULT => match serde_json::from_str::<ToolResultPayload>(payload) {
                Ok(result) => {
                    self.close_text(events);
                    self.start_step(events);
                    events.push(StreamEvent::ToolOutputAvailable {
                        tool_call_id: result.tool_call_id,
                        output: result.result,
                    });
                }
                Err(e) => warn!(error = %e, "Ignoring malformed tool result payload"),
            },
            TAG_ERROR => {
                let error_text = decode_text(payload);
                events.push(StreamEvent::Error { error_text });
            }
            TAG_FINISH => self.terminate(events),
            TAG_START_STEP | TAG_FINISH_STEP => {}
            other => debug!(tag = %other, "Skipping wire line with unknown tag"),
        }
    }

    fn start_step(&mut self, events: &mut Vec<StreamEvent>) {
        if !self.step_started {
            self.step_started = true;
            events.push(StreamEvent::StartStep);
        }
    }

    /// Append a text delta, opening the step and text part on first use
    ///
    /// An empty delta (from `""`, `null` or an unusable payload) adds nothing
    /// to the text, so no event is emitted for it and no step or text part is
    /// opened on its account.
    fn push_text(&mut self, delta: String, events: &mut Vec<StreamEvent>) {
        if delta.is_empty() {
            return;
        }
        self.start_step(events);

        let id = match &self.open_text_id {
            Some(id) => id.clone(),
            None => {
                let id = Uuid::new_v4().to_string();
                events.push(StreamEvent::TextStart { id: id.clone() });
                self.open_text_id = Some(id.clone());
                id
            }
        };
        events.push(StreamEvent::TextDelta { id, delta });
    }

    fn close_text(&mut self, events: &mut Vec<StreamEvent>) {
        if let Some(id) = self.open_text_id.take() {
            events.push(StreamEvent::TextEnd { id });
        }
    }

    fn terminate(&mut self, events: &mut Vec<StreamEvent>) {
        if self.finished {
            return;
        }
        self.close_text(events);
        if self.step_started {
            events.push(StreamEvent::FinishStep);
        }
        events.push(StreamEvent::Finish);
        self.finished = true;
    }
}

/// Decode a text payload; malformed JSON becomes the literal text minus surrounding quotes
pub fn decode_text(payload: &str) -> String {
    match serde_json::from_str::<TextPayload>(payload) {
        Ok(parsed) => parsed.into_text(),
        Err(e) => {
            warn!(error = %e, "Malformed text payload, using it literally");
            strip_quotes(payload.trim()).to_string()
        }
    }
}

fn strip_quotes(raw: &str) -> &str {
    let raw = raw.strip_prefix('"').unwrap_or(raw);
    raw.strip_suffix('"').unwrap_or(raw)
}

/// Decode a byte stream lazily into events
///
/// A read error ends the input early; the terminal sequence is still emitted
/// so consumers always see `Finish`.
pub fn decode_stream<S, E>(source: S) -> impl Stream<Item = StreamEvent> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let mut decoder = WireDecoder::new();
        let mut source = Box::pin(source);

        while let Some(chunk) = source.next().await {
            match chunk {
                Ok(bytes) => {
                    for event in decoder.push(&bytes) {
                        yield event;
                    }
                    if decoder.is_finished() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Upstream stream failed, ending response early");
                    break;
                }
            }
        }

        for event in decoder.finish() {
            yield event;
        }
    }
}
