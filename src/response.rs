//! Outgoing HTTP response type, the [`IntoResponse`] conversion trait, and the
//! per-request [`ResponseState`].
//!
//! Handlers return something that converts into a [`Response`]. The
//! dispatcher commits exactly one of them through [`ResponseState`]: the first
//! terminal write wins and every later write is a no-op, so a middleware
//! short-circuit and a handler result can never both reach the socket.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;
use tracing::{error, warn};

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
#[derive(Clone, Copy, Debug)]
pub enum ContentType {
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use http::StatusCode;
/// use pathwise::Response;
///
/// Response::json(&serde_json::json!({ "id": 1 }));
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(&serde_json::json!({ "id": 42 }));
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    pub(crate) body: Vec<u8>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: StatusCode,
}

impl Response {
    /// `200 OK`, `application/json`.
    ///
    /// A value that fails to serialize yields `500` with an empty body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::builder().json(value)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// `200 OK`, `text/html; charset=utf-8`.
    pub fn html(body: impl Into<String>) -> Self {
        Self::builder().bytes(ContentType::Html, body.into().into_bytes())
    }

    /// `200 OK`, `application/xml`.
    pub fn xml(body: impl Into<String>) -> Self {
        Self::builder().bytes(ContentType::Xml, body.into().into_bytes())
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Vec::new(), headers: Vec::new(), status: code }
    }

    /// `200 OK` with an empty JSON-typed body: what a handler that returns
    /// nothing produces.
    pub fn empty() -> Self {
        Self::builder().bytes(ContentType::Json, Vec::new())
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parses the body as JSON, mainly for assertions in tests.
    pub fn body_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Converts into the hyper response type. Headers that are not valid
    /// HTTP are dropped with a warning.
    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = self.status;
        let headers = res.headers_mut();
        for (name, value) in self.headers {
            match (
                http::HeaderName::from_bytes(name.as_bytes()),
                http::HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => { headers.append(name, value); }
                _ => warn!(header = %name, "dropping invalid response header"),
            }
        }
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method that sets the content type.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(body) => self.finish(ContentType::Json.as_str(), body),
            Err(e) => {
                error!("response serialization failed: {e}");
                Response::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Text.as_str(), body.into().into_bytes())
    }

    /// Terminate with a typed body. Use this for XML, HTML, binary, etc.
    pub fn bytes(self, content_type: ContentType, body: Vec<u8>) -> Response {
        self.finish(content_type.as_str(), body)
    }

    /// Terminate with a body of an arbitrary media type.
    pub fn raw(self, content_type: &str, body: Vec<u8>) -> Response {
        self.finish(content_type, body)
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        Response { body: Vec::new(), headers: self.headers, status: self.status }
    }

    fn finish(self, content_type: &str, body: Vec<u8>) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Structured values become JSON, primitives become text, and `()` becomes an
/// empty `200`.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for () {
    fn into_response(self) -> Response { Response::empty() }
}

impl IntoResponse for serde_json::Value {
    fn into_response(self) -> Response { Response::json(&self) }
}

/// Return a status directly from a handler: `return StatusCode::NO_CONTENT`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

macro_rules! primitive_as_text {
    ($($t:ty),*) => {
        $(impl IntoResponse for $t {
            fn into_response(self) -> Response { Response::text(self.to_string()) }
        })*
    };
}

primitive_as_text!(bool, i32, i64, u32, u64, f64);

/// Serializes any `T: Serialize` as a JSON body.
///
/// ```rust,ignore
/// async fn show(req: Request) -> Result<Json<User>, Fault> {
///     Ok(Json(User { id: 1, name: "alice".into() }))
/// }
/// ```
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response { Response::json(&self.0) }
}

// ── ResponseState ─────────────────────────────────────────────────────────────

/// Accumulated status and headers plus the sent flag for one request.
///
/// At most one terminal write (`send`, `json`, `text`, `file`, …) succeeds;
/// the rest return `false` and change nothing.
#[derive(Debug)]
pub struct ResponseState {
    status: StatusCode,
    headers: Vec<(String, String)>,
    sent: Option<Response>,
}

impl ResponseState {
    pub fn new() -> Self {
        Self { status: StatusCode::OK, headers: Vec::new(), sent: None }
    }

    /// Sets the status used by the next body-only write. Ignored once sent.
    pub fn status(&mut self, code: StatusCode) -> &mut Self {
        if self.sent.is_none() {
            self.status = code;
        }
        self
    }

    /// Adds a header merged into the terminal write. Ignored once sent.
    pub fn header(&mut self, name: &str, value: &str) -> &mut Self {
        if self.sent.is_none() {
            self.headers.push((name.to_owned(), value.to_owned()));
        }
        self
    }

    pub fn is_sent(&self) -> bool {
        self.sent.is_some()
    }

    /// Commits `response`. Pending headers the response does not set itself
    /// are merged in. Returns `false` when something was already sent.
    pub fn send(&mut self, mut response: Response) -> bool {
        if self.sent.is_some() {
            return false;
        }
        for (name, value) in self.headers.drain(..) {
            if response.header(&name).is_none() {
                response.headers.push((name, value));
            }
        }
        self.sent = Some(response);
        true
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> bool {
        let response = Response::builder().status(self.status).json(value);
        self.send(response)
    }

    pub fn text(&mut self, body: impl Into<String>) -> bool {
        let response = Response::builder().status(self.status).text(body);
        self.send(response)
    }

    pub fn html(&mut self, body: impl Into<String>) -> bool {
        let response = Response::builder()
            .status(self.status)
            .bytes(ContentType::Html, body.into().into_bytes());
        self.send(response)
    }

    pub fn file(&mut self, content_type: &str, contents: Vec<u8>) -> bool {
        let response = Response::builder().status(self.status).raw(content_type, contents);
        self.send(response)
    }

    /// The committed response, or an empty body with the pending status and
    /// headers when nothing was written.
    pub fn finish(mut self) -> Response {
        match self.sent.take() {
            Some(response) => response,
            None => {
                let mut response = Response::empty();
                response.status = self.status;
                response.headers.extend(self.headers);
                response
            }
        }
    }
}

impl Default for ResponseState {
    fn default() -> Self { Self::new() }
}

/// A [`ResponseState`] shared by the dispatcher and the [`Request`](crate::Request)
/// it hands to middleware, hooks and the handler, so a write made anywhere
/// is the one the dispatcher commits.
#[derive(Clone, Debug, Default)]
pub struct SharedResponse(Arc<Mutex<ResponseState>>);

impl SharedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state. A panic while it was held does not lose the writes
    /// made before it.
    pub fn lock(&self) -> MutexGuard<'_, ResponseState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_sent(&self) -> bool {
        self.lock().is_sent()
    }

    /// Moves the state out, leaving a fresh one behind, and resolves it.
    pub(crate) fn finish(&self) -> Response {
        std::mem::take(&mut *self.lock()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_terminal_write_is_ignored() {
        let mut state = ResponseState::new();
        assert!(state.json(&serde_json::json!({ "first": true })));
        assert!(!state.text("second"));
        state.status(StatusCode::IM_A_TEAPOT).header("x-late", "1");

        let res = state.finish();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body_json(), Some(serde_json::json!({ "first": true })));
        assert_eq!(res.header("x-late"), None);
    }

    #[test]
    fn pending_status_and_headers_apply_to_the_write() {
        let mut state = ResponseState::new();
        state.status(StatusCode::CREATED).header("location", "/users/7");
        state.text("made");

        let res = state.finish();
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.header("Location"), Some("/users/7"));
        assert_eq!(res.body(), b"made");
    }

    #[test]
    fn nothing_written_yields_empty_ok() {
        let res = ResponseState::new().finish();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.body().is_empty());
        assert_eq!(res.header("content-type"), Some("application/json"));
    }

    #[test]
    fn clones_share_one_state() {
        let shared = SharedResponse::new();
        let seen_by_handler = shared.clone();
        seen_by_handler.lock().status(StatusCode::ACCEPTED).text("queued");

        assert!(shared.is_sent());
        assert!(!shared.lock().send(Response::text("late")));
        let res = shared.finish();
        assert_eq!(res.status_code(), StatusCode::ACCEPTED);
        assert_eq!(res.body(), b"queued");
    }

    #[test]
    fn values_and_primitives_convert() {
        let res = serde_json::json!({ "a": 1 }).into_response();
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(42_i64.into_response().body(), b"42");
        assert!(().into_response().body().is_empty());
    }
}
