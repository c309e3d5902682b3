//! Chat stream relay.
//!
//! DESIGN
//! ======
//! `POST /api/chat` takes the dashboard's message list, sends the latest
//! user message to the backend's `/chat/stream`, and rewrites the backend's
//! SSE answer into the data-stream protocol the chat widget consumes:
//!
//! ```text
//! data: {"type":"content","content":"Hi"}   ->  0:"Hi"
//! data: {"type":"error","content":"boom"}   ->  3:"boom"
//! data: [DONE]                              ->  d:{"finishReason":"stop"}
//! ```
//!
//! The finish line is emitted exactly once: on `[DONE]`, or when the
//! upstream ends (cleanly or not) without one. Backend `Set-Cookie` headers
//! are forwarded so tokens renewed while answering reach the browser.

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use frames::{ChatRequest, DATA_STREAM_FINISH, SseDecoder, SseEvent, encode_data_stream_chunk};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::cookies::forward_set_cookies;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Content of the last `user` message, or empty when there is none.
#[must_use]
pub fn last_user_question(messages: &[ChatMessage]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map_or("", |m| m.content.as_str())
}

// =============================================================================
// TRANSFORM
// =============================================================================

/// Incremental SSE to data-stream rewriter.
#[derive(Debug, Default)]
pub struct DataStreamTransform {
    decoder: SseDecoder,
    finished: bool,
}

impl DataStreamTransform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Rewrite one upstream chunk. Input after `[DONE]` is ignored.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        if self.finished {
            return String::new();
        }
        let events = self.decoder.push(bytes);
        self.encode(events)
    }

    /// Flush the buffered tail and close the stream.
    pub fn finish(&mut self) -> String {
        if self.finished {
            return String::new();
        }
        let tail = self.decoder.finish();
        let mut out = self.encode(tail);
        if !self.finished {
            out.push_str(DATA_STREAM_FINISH);
            self.finished = true;
        }
        out
    }

    fn encode(&mut self, events: impl IntoIterator<Item = SseEvent>) -> String {
        let mut out = String::new();
        for event in events {
            match event {
                SseEvent::Chunk(chunk) => {
                    if let Some(line) = encode_data_stream_chunk(&chunk) {
                        out.push_str(&line);
                    }
                }
                SseEvent::Done => {
                    out.push_str(DATA_STREAM_FINISH);
                    self.finished = true;
                    break;
                }
            }
        }
        out
    }
}

/// Drive the transform over an upstream byte stream. The upstream is dropped
/// as soon as the finish line has been produced.
pub(crate) fn data_stream<S, B, E>(upstream: S) -> impl Stream<Item = Result<String, std::convert::Infallible>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    futures::stream::unfold(Some((upstream, DataStreamTransform::new())), |state| async move {
        let (mut upstream, mut transform) = state?;
        loop {
            match upstream.next().await {
                Some(Ok(bytes)) => {
                    let out = transform.push(bytes.as_ref());
                    if transform.is_finished() {
                        return Some((Ok(out), None));
                    }
                    if !out.is_empty() {
                        return Some((Ok(out), Some((upstream, transform))));
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "chat upstream failed mid-stream");
                    return Some((Ok(transform.finish()), None));
                }
                None => return Some((Ok(transform.finish()), None)),
            }
        }
    })
}

// =============================================================================
// HANDLER
// =============================================================================

/// `POST /api/chat`
pub async fn chat(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<ChatBody>) -> Response {
    let request = ChatRequest { question: last_user_question(&body.messages).to_owned(), session_id: None };

    let mut upstream = state
        .http
        .post(state.config.backend_endpoint(frames::CHAT_STREAM))
        .json(&request);
    if let Some(cookies) = headers.get(COOKIE) {
        upstream = upstream.header(COOKIE, cookies.clone());
    }

    let response = match upstream.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "chat relay could not reach backend");
            return (StatusCode::BAD_GATEWAY, Json(json!({ "error": "Failed to connect to backend" }))).into_response();
        }
    };

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        tracing::warn!(%status, "chat backend rejected request");
        return (status, Json(json!({ "error": text }))).into_response();
    }

    let backend_headers = response.headers().clone();
    let body = Body::from_stream(data_stream(Box::pin(response.bytes_stream())));
    let mut relayed = (
        [(CONTENT_TYPE, "text/plain; charset=utf-8"), (CACHE_CONTROL, "no-cache")],
        body,
    )
        .into_response();
    forward_set_cookies(&backend_headers, relayed.headers_mut());
    relayed
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
