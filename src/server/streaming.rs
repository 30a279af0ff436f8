//! Server-sent event streaming for OpenAI chat completions

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};

use crate::config::{FaultKind, FaultSpec};
use crate::providers::{mock_id, stream_pieces, ChatCompletionChunk};

pub const DONE_MARKER: &str = "[DONE]";

/// Content chunks emitted before a `STREAM_DROP_AFTER` without `after_chunks`
const DEFAULT_DROP_AFTER: usize = 1;

/// `data:` payloads of a chat completion stream, in order.
///
/// A normal stream is a role chunk, one chunk per word, a finish chunk
/// and `[DONE]`. Stream faults alter that sequence.
pub fn chat_stream_frames(model: &str, text: &str, fault: Option<&FaultSpec>) -> Vec<String> {
    let id = mock_id("chatcmpl_mock_");
    let encode = |chunk: &ChatCompletionChunk| serde_json::to_string(chunk).unwrap_or_default();

    let mut content: Vec<String> = stream_pieces(text)
        .iter()
        .map(|piece| encode(&ChatCompletionChunk::content(&id, model, piece)))
        .collect();

    let mut frames = vec![encode(&ChatCompletionChunk::role(&id, model))];

    match fault.map(|f| (&f.kind, f.after_chunks)) {
        Some((FaultKind::StreamDropAfter, after)) => {
            content.truncate(after.unwrap_or(DEFAULT_DROP_AFTER));
            frames.extend(content);
            return frames;
        }
        Some((FaultKind::StreamDuplicateChunk, _)) => {
            if let Some(first) = content.first().cloned() {
                content.insert(0, first);
            }
        }
        _ => {}
    }

    frames.extend(content);
    frames.push(encode(&ChatCompletionChunk::finish(&id, model)));
    frames.push(DONE_MARKER.to_string());
    frames
}

pub fn sse_response(frames: Vec<String>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = frames
        .into_iter()
        .map(|data| Ok::<_, Infallible>(Event::default().data(data)));
    Sse::new(stream::iter(events)).keep_alive(KeepAlive::default())
}
