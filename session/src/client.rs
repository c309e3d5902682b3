//! Session-aware API client.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every call the application makes to the backend goes through
//! [`ApiClient`]. Cookies live in the client's own cookie store, exactly as a
//! browser would keep them, so the client never inspects the tokens.
//!
//! REFRESH FLOW
//! ============
//! A 401 on a non-auth call enters the [`RefreshGate`]. The leader spawns the
//! refresh onto the runtime, so it runs to completion even if the caller that
//! started it is cancelled, and waits on the outcome like every other queued
//! caller. The refresh request itself runs in a second task that the leader
//! joins, so a panic in it is settled as an ordinary refresh failure.
//!
//! On success each caller replays its own request once; a second 401 on that
//! replay is returned as `auth_error` without another refresh. On failure the
//! session is reset and the navigator is sent to the login path before any
//! caller is released.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use frames::{
    AUTH_ACADEMIC_STATUS, AUTH_LOGIN, AUTH_LOGOUT, AUTH_REFRESH, AUTH_REGISTER_ACADEMIC, AUTH_VERIFY,
    AcademicStatus, AuthResponse, CHAT_STREAM, ChatRequest, Credentials, LogoutResponse, RegisterAcademicRequest,
    SseDecoder, SseEvent, StreamChunk,
};
use futures::{Stream, StreamExt};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::gate::{RefreshGate, RefreshLeader, RefreshOutcome, RefreshState, Ticket};
use crate::navigator::{FullNavigation, Navigator};
use crate::store::{AcademicUser, AuthState, AuthStore};

/// Header carrying the chat session id on every call.
pub const SESSION_ID_HEADER: &str = "X-Session-ID";

const CONNECT_FAILED: &str = "Failed to connect to server";

/// Decoded chat answer, chunk by chunk, ending at `[DONE]`.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ApiError>> + Send>>;

// =============================================================================
// CALL
// =============================================================================

/// Everything needed to (re)issue one request.
#[derive(Debug, Clone)]
struct Call {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl Call {
    fn new(method: Method, path: &str) -> Self {
        Self { method, path: path.to_owned(), query: Vec::new(), body: None }
    }

    fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn is_auth(&self) -> bool {
        frames::is_auth_endpoint(&self.path)
    }
}

// =============================================================================
// CLIENT
// =============================================================================

struct ClientInner {
    http: reqwest::Client,
    config: ClientConfig,
    gate: RefreshGate,
    store: AuthStore,
    navigator: Arc<dyn Navigator>,
    fallback: Option<Arc<FullNavigation>>,
    session_id: Mutex<Option<String>>,
}

/// Handle on the session coordinator. Clones share one cookie store, one
/// refresh gate and one auth store.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

pub struct ApiClientBuilder {
    config: ClientConfig,
    navigator: Option<Arc<dyn Navigator>>,
}

impl ApiClientBuilder {
    /// Install the host's navigation. Without one, [`FullNavigation`] is used.
    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// # Errors
    ///
    /// Returns the underlying error if the HTTP client cannot be constructed
    /// (for example, when the TLS backend fails to initialize).
    pub fn build(self) -> Result<ApiClient, reqwest::Error> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(self.config.timeout)
            .build()?;
        let (navigator, fallback) = match self.navigator {
            Some(navigator) => (navigator, None),
            None => {
                let fallback = Arc::new(FullNavigation::new());
                (fallback.clone() as Arc<dyn Navigator>, Some(fallback))
            }
        };
        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                http,
                config: self.config,
                gate: RefreshGate::new(),
                store: AuthStore::new(),
                navigator,
                fallback,
                session_id: Mutex::new(None),
            }),
        })
    }
}

impl ApiClient {
    #[must_use]
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder { config, navigator: None }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &AuthStore {
        &self.inner.store
    }

    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.inner.store.snapshot()
    }

    #[must_use]
    pub fn refresh_state(&self) -> RefreshState {
        self.inner.gate.state()
    }

    /// The built-in navigation, when the host installed none. Its
    /// [`FullNavigation::last_location`] is the page a full reload would load.
    #[must_use]
    pub fn full_navigation(&self) -> Option<&FullNavigation> {
        self.inner.fallback.as_deref()
    }

    /// Callers currently queued behind an in-flight refresh.
    #[must_use]
    pub fn queued_callers(&self) -> usize {
        self.inner.gate.pending_len()
    }

    pub fn set_session_id(&self, id: impl Into<String>) {
        *self.lock_session_id() = Some(id.into());
    }

    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.lock_session_id().clone()
    }

    fn lock_session_id(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.inner
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // GENERIC CALLS
    // =========================================================================

    /// `GET` a JSON resource.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`] once refresh recovery (if any) is
    /// exhausted.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, ApiError> {
        let mut call = Call::new(Method::GET, path);
        call.query = query
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        self.execute(&call).await
    }

    /// `POST` a JSON body and decode the JSON answer.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`]; a body that cannot be serialized
    /// is reported as `api_error`.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let call = Call::new(Method::POST, path).with_body(to_json(body)?);
        self.execute(&call).await
    }

    /// `DELETE` a resource.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(&Call::new(Method::DELETE, path)).await
    }

    async fn execute<T: DeserializeOwned>(&self, call: &Call) -> Result<T, ApiError> {
        let response = self.send(call).await?;
        if response.status() == StatusCode::UNAUTHORIZED && call.is_auth() {
            tracing::warn!(path = %call.path, "auth endpoint rejected the session");
            self.expire_session();
        }
        decode(response).await
    }

    /// Send with 401 recovery: at most one refresh and one replay per call.
    async fn send(&self, call: &Call) -> Result<Response, ApiError> {
        let response = self.send_raw(call).await?;
        if response.status() != StatusCode::UNAUTHORIZED || call.is_auth() {
            return Ok(response);
        }

        tracing::debug!(path = %call.path, "401 received; joining refresh");
        self.recover().await?;
        self.send_raw(call).await
    }

    async fn send_raw(&self, call: &Call) -> Result<Response, ApiError> {
        let mut request = self
            .inner
            .http
            .request(call.method.clone(), self.inner.config.endpoint(&call.path));
        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        if let Some(id) = self.session_id() {
            request = request.header(SESSION_ID_HEADER, id);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    // =========================================================================
    // REFRESH
    // =========================================================================

    /// Wait for a refresh to settle, leading it if none is in flight.
    async fn recover(&self) -> Result<(), ApiError> {
        let waiter = match self.inner.gate.enter() {
            Ticket::Follower(waiter) => waiter,
            Ticket::Leader(leader) => {
                // The leader queues itself like any other caller, then hands
                // the refresh to its own task.
                let waiter = leader.waiter();
                let client = self.clone();
                tokio::spawn(async move { client.lead_refresh(leader).await });
                waiter
            }
        };

        match waiter.wait().await {
            RefreshOutcome::Refreshed => Ok(()),
            RefreshOutcome::Failed(reason) => Err(ApiError::auth(reason)),
        }
    }

    async fn lead_refresh(&self, leader: RefreshLeader) {
        let client = self.clone();
        self.lead_with(leader, async move { client.request_refresh().await })
            .await;
    }

    /// Run one refresh attempt on its own task and settle the gate with its
    /// result. A panicking attempt counts as a failed refresh.
    async fn lead_with<F>(&self, leader: RefreshLeader, attempt: F)
    where
        F: Future<Output = Result<bool, ApiError>> + Send + 'static,
    {
        let outcome = match tokio::spawn(attempt).await {
            Ok(Ok(true)) => RefreshOutcome::Refreshed,
            Ok(Ok(false)) => RefreshOutcome::Failed("session could not be refreshed".into()),
            Ok(Err(e)) => RefreshOutcome::Failed(e.message()),
            Err(e) => {
                tracing::error!(error = %e, "refresh task aborted");
                RefreshOutcome::Failed("session refresh aborted".into())
            }
        };

        if outcome.is_refreshed() {
            self.inner.store.set_authenticated(true);
        } else {
            self.expire_session();
        }

        let refreshed = outcome.is_refreshed();
        let released = leader.settle(outcome);
        if refreshed {
            tracing::info!(released, "session refreshed; replaying queued calls");
        } else {
            tracing::warn!(released, "session refresh failed; rejecting queued calls");
        }
    }

    /// One `POST /auth/refresh`. `Ok(false)` when the backend declines.
    async fn request_refresh(&self) -> Result<bool, ApiError> {
        let response = self.send_raw(&Call::new(Method::POST, AUTH_REFRESH)).await?;
        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "refresh rejected");
            return Ok(false);
        }
        let body = response.json::<AuthResponse>().await.unwrap_or_default();
        Ok(body.authenticated)
    }

    fn expire_session(&self) {
        self.inner.store.reset();
        self.inner.navigator.navigate(&self.inner.config.login_path);
    }

    // =========================================================================
    // AUTH OPERATIONS
    // =========================================================================

    /// Log in with a password or an academic email. Failures land in the
    /// store's `error` field.
    pub async fn login(&self, credentials: Credentials) -> bool {
        let store = &self.inner.store;
        store.set_loading(true);
        store.set_error(None);

        let result = match to_json(&credentials) {
            Ok(body) => self.auth_call(Call::new(Method::POST, AUTH_LOGIN).with_body(body)).await,
            Err(e) => Err(e),
        };
        self.settle_login(result, "Login failed")
    }

    /// Register an academic account; the backend logs the new user in.
    pub async fn register_academic(&self, email: &str) -> bool {
        let store = &self.inner.store;
        store.set_loading(true);
        store.set_error(None);

        let request = RegisterAcademicRequest { email: email.to_owned() };
        let result = match to_json(&request) {
            Ok(body) => {
                self.auth_call(Call::new(Method::POST, AUTH_REGISTER_ACADEMIC).with_body(body))
                    .await
            }
            Err(e) => Err(e),
        };
        self.settle_login(result, "Registration failed")
    }

    fn settle_login(&self, result: Result<AuthResponse, ApiError>, fallback: &str) -> bool {
        let store = &self.inner.store;
        let authenticated = match result {
            Ok(body) if body.authenticated => {
                store.set_authenticated(true);
                true
            }
            Ok(body) => {
                store.set_error(Some(body.message.unwrap_or_else(|| fallback.to_owned())));
                false
            }
            Err(ApiError::Network(e)) => {
                tracing::error!(error = %e, "login request failed");
                store.set_error(Some(CONNECT_FAILED.to_owned()));
                false
            }
            Err(e) => {
                store.set_error(Some(e.message()));
                false
            }
        };
        store.set_loading(false);
        authenticated
    }

    /// Ask the backend whether the current cookies form a valid session.
    pub async fn verify(&self) -> bool {
        let store = &self.inner.store;
        store.set_loading(true);

        let authenticated = match self.auth_call(Call::new(Method::GET, AUTH_VERIFY)).await {
            Ok(body) => body.authenticated,
            Err(e) => {
                tracing::debug!(error = %e, "verify failed");
                false
            }
        };
        store.set_authenticated(authenticated);
        store.set_loading(false);
        authenticated
    }

    /// Refresh the session explicitly. Joins an in-flight refresh instead of
    /// starting a second one.
    ///
    /// Shares the interceptor's failure handling: when the refresh fails the
    /// store is reset and the navigator is sent to the login path before
    /// `false` is returned.
    pub async fn refresh(&self) -> bool {
        self.recover().await.is_ok()
    }

    /// Best-effort backend logout. Local state is reset regardless.
    pub async fn logout(&self) {
        match self.send_raw(&Call::new(Method::POST, AUTH_LOGOUT)).await {
            Ok(response) if !response.status().is_success() => {
                tracing::debug!(status = %response.status(), "logout rejected by backend");
            }
            Ok(response) => {
                let body = response.json::<LogoutResponse>().await.unwrap_or_default();
                tracing::debug!(message = ?body.message, "logged out");
            }
            Err(e) => tracing::debug!(error = %e, "logout request failed"),
        }
        self.inner.store.reset();
    }

    /// Fetch academic quota information and mirror it into the store.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`]. A 401 goes through refresh and
    /// one replay like any other data call.
    pub async fn fetch_academic_status(&self) -> Result<AcademicStatus, ApiError> {
        let status: AcademicStatus = self
            .execute(&Call::new(Method::GET, AUTH_ACADEMIC_STATUS))
            .await?;
        if let (Some(email), Some(tier), Some(queries_remaining), Some(daily_limit)) = (
            status.email.clone(),
            status.tier.clone(),
            status.queries_remaining,
            status.daily_limit,
        ) {
            self.inner
                .store
                .set_academic_user(AcademicUser { email, tier, queries_remaining, daily_limit });
        }
        Ok(status)
    }

    /// Auth endpoints answer `{authenticated, message}` even when rejecting,
    /// so a parsable body with a message is a result, not an error.
    async fn auth_call(&self, call: Call) -> Result<AuthResponse, ApiError> {
        let response = self.send_raw(&call).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;

        let parsed = serde_json::from_str::<AuthResponse>(&text);
        match parsed {
            Ok(body) if status.is_success() || body.message.is_some() => Ok(body),
            Ok(_) => Err(ApiError::from_response(status, &headers, &text)),
            Err(e) if status.is_success() => Err(ApiError::Api { message: e.to_string(), status: Some(status.as_u16()) }),
            Err(_) => Err(ApiError::from_response(status, &headers, &text)),
        }
    }

    // =========================================================================
    // CHAT
    // =========================================================================

    /// Post a question to the chat endpoint and stream the answer.
    ///
    /// # Errors
    ///
    /// Returns the classified [`ApiError`] if the stream cannot be opened.
    /// Failures after that arrive as stream items.
    pub async fn stream_chat(&self, question: &str) -> Result<ChatStream, ApiError> {
        let request = ChatRequest { question: question.to_owned(), session_id: self.session_id() };
        let call = Call::new(Method::POST, CHAT_STREAM).with_body(to_json(&request)?);
        let response = self.send(&call).await?;
        let response = ensure_success(response).await?;
        Ok(chat_stream(Box::pin(response.bytes_stream())))
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Api { message: e.to_string(), status: None })
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_response(status, &headers, &body))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = ensure_success(response).await?;
    let status = response.status().as_u16();
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ApiError::Api { message: e.to_string(), status: Some(status) })
}

struct ChatState<S> {
    body: S,
    decoder: SseDecoder,
    queue: VecDeque<StreamChunk>,
    done: bool,
}

impl<S> ChatState<S> {
    fn absorb(&mut self, events: impl IntoIterator<Item = SseEvent>) {
        for event in events {
            if self.done {
                break;
            }
            match event {
                SseEvent::Chunk(chunk) => self.queue.push_back(chunk),
                SseEvent::Done => self.done = true,
            }
        }
    }
}

/// Decode a raw SSE byte stream into chunks, stopping at `[DONE]`.
pub(crate) fn chat_stream<S, B, E>(body: S) -> ChatStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send,
    E: Send,
    ApiError: From<E>,
{
    let state = ChatState { body, decoder: SseDecoder::new(), queue: VecDeque::new(), done: false };
    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.queue.pop_front() {
                return Some((Ok(chunk), state));
            }
            if state.done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.push(bytes.as_ref());
                    state.absorb(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(ApiError::from(e)), state));
                }
                None => {
                    let tail = state.decoder.finish();
                    state.absorb(tail);
                    state.done = true;
                }
            }
        }
    }))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
