//! Backend wire contract shared by the edge server and the session client.
//!
//! This crate owns the shapes exchanged with the analytics backend: the auth
//! response bodies, the session cookie names, and the `text/event-stream`
//! chunk format of `/chat/stream`. Both `gatehouse` (which relays the stream)
//! and `session` (which consumes it) decode SSE through [`SseDecoder`], so a
//! partial line split across network reads is handled in exactly one place.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// COOKIES & ENDPOINTS
// =============================================================================

/// Cookie carrying the short-lived access token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
/// Cookie carrying the long-lived refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
/// Both session cookies, in the order they are expired.
pub const SESSION_COOKIES: [&str; 2] = [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE];

/// Default route prefix of the backend API.
pub const DEFAULT_API_PREFIX: &str = "/api/v1";

pub const AUTH_LOGIN: &str = "/auth/login";
pub const AUTH_LOGOUT: &str = "/auth/logout";
pub const AUTH_VERIFY: &str = "/auth/verify";
pub const AUTH_REFRESH: &str = "/auth/refresh";
pub const AUTH_ACADEMIC_STATUS: &str = "/auth/academic-status";
pub const AUTH_REGISTER_ACADEMIC: &str = "/auth/register-academic";
pub const CHAT_STREAM: &str = "/chat/stream";

/// Routes that create, check, renew or end the session itself.
pub const SESSION_LIFECYCLE_ENDPOINTS: [&str; 5] =
    [AUTH_LOGIN, AUTH_LOGOUT, AUTH_VERIFY, AUTH_REFRESH, AUTH_REGISTER_ACADEMIC];

/// Returns `true` for backend routes that own the session lifecycle.
///
/// A 401 from one of these is terminal: it never triggers a token refresh.
/// Other `/auth/*` routes, such as academic status, are ordinary data calls.
#[must_use]
pub fn is_auth_endpoint(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    let path = path.trim_end_matches('/');
    SESSION_LIFECYCLE_ENDPOINTS.contains(&path)
}

// =============================================================================
// AUTH BODIES
// =============================================================================

/// Body returned by login, verify, refresh and registration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Login credentials. The backend accepts either a shared password or an
/// academic email address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    Password { password: String },
    Email { email: String },
}

/// Body returned by logout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Academic quota information for the current session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicStatus {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub queries_remaining: Option<i64>,
    #[serde(default)]
    pub daily_limit: Option<i64>,
}

/// Registration request for an academic account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAcademicRequest {
    pub email: String,
}

/// Request body of `/chat/stream`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

// =============================================================================
// STREAM CHUNKS
// =============================================================================

/// Kind of a chunk on the chat event stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Start,
    Content,
    Sql,
    Complete,
    Error,
    /// Any type this crate does not know about.
    #[serde(other)]
    Unknown,
}

/// One `data:` payload of the chat event stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// A decoded event from the chat stream.
#[derive(Clone, Debug, PartialEq)]
pub enum SseEvent {
    Chunk(StreamChunk),
    /// The `[DONE]` sentinel. Nothing after it is meaningful.
    Done,
}

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Parse one complete SSE line. Non-data lines and unparsable payloads yield
/// `None`.
#[must_use]
pub fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let data = line.strip_prefix(DATA_PREFIX)?.trim();
    if data == DONE_SENTINEL {
        return Some(SseEvent::Done);
    }
    serde_json::from_str::<StreamChunk>(data)
        .ok()
        .map(SseEvent::Chunk)
}

/// Incremental SSE line decoder.
///
/// Bytes are buffered until a newline arrives, so a line (or a multi-byte
/// UTF-8 character) split across reads decodes once it is complete.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            if let Some(event) = parse_sse_line(&text) {
                events.push(event);
            }
        }
        events
    }

    /// Drain whatever is left once the upstream has ended.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&rest);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        parse_sse_line(text)
    }
}

// =============================================================================
// DATA STREAM PROTOCOL
// =============================================================================

/// Finish line of the data-stream protocol.
pub const DATA_STREAM_FINISH: &str = "d:{\"finishReason\":\"stop\"}\n";

/// Encode a stream chunk as a data-stream protocol line.
///
/// Only non-empty `content` chunks (code `0`) and `error` chunks (code `3`)
/// are carried; everything else is dropped.
#[must_use]
pub fn encode_data_stream_chunk(chunk: &StreamChunk) -> Option<String> {
    match chunk.kind {
        ChunkKind::Content => {
            let content = chunk.content.as_deref().filter(|c| !c.is_empty())?;
            Some(format!("0:{}\n", Value::String(content.to_owned())))
        }
        ChunkKind::Error => {
            let message = chunk
                .content
                .as_deref()
                .filter(|c| !c.is_empty())
                .unwrap_or("Unknown error");
            Some(format!("3:{}\n", Value::String(message.to_owned())))
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
