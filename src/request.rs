//! Incoming request context.
//!
//! One [`Request`] is built per HTTP request, owned by that request's task,
//! and handed by `&mut` to middleware and hooks before the handler takes it
//! by value. Nothing here is shared between requests.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::MutexGuard;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::method::Method;
use crate::pattern::{normalize_path, Params};
use crate::response::{ResponseState, SharedResponse};

/// A file part of a `multipart/form-data` body.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    /// Form field name, with any `[]` suffix removed.
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Extension of the client-supplied file name, if it has one.
    pub fn extension(&self) -> Option<&str> {
        self.file_name.as_deref()?.rsplit_once('.').map(|(_, ext)| ext)
    }
}

/// An incoming HTTP request.
pub struct Request {
    method: Method,
    path: String,
    raw_path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    raw_body: Bytes,
    body: Map<String, Value>,
    files: Vec<UploadedFile>,
    params: Params,
    remote_addr: Option<SocketAddr>,
    locale: String,
    response: SharedResponse,
}

impl Request {
    /// Builds the context and parses the body according to its
    /// `Content-Type`. Parse failures leave an empty body.
    pub async fn from_http(method: Method, req: http::Request<Bytes>, remote_addr: Option<SocketAddr>) -> Self {
        let (parts, raw_body) = req.into_parts();
        let raw_path = parts.uri.path().to_owned();
        let query = parts.uri.query()
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default();
        let headers: Vec<(String, String)> = parts.headers.iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect();

        let content_type = headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.clone());
        let (body, files) = match content_type {
            Some(ct) => parse_body(&ct, raw_body.clone()).await,
            None => (Map::new(), Vec::new()),
        };

        Self {
            method,
            path: normalize_path(&raw_path),
            raw_path,
            query,
            headers,
            raw_body,
            body,
            files,
            params: Params::default(),
            remote_addr,
            locale: String::new(),
            response: SharedResponse::new(),
        }
    }

    pub(crate) fn set_route(&mut self, path: String, params: Params) {
        self.path = path;
        self.params = params;
    }

    pub fn method(&self) -> Method { self.method }

    /// Normalized path below the mount prefix, e.g. `/users/42`.
    pub fn path(&self) -> &str { &self.path }

    /// The path exactly as received.
    pub fn raw_path(&self) -> &str { &self.raw_path }

    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    // ── Route parameters ─────────────────────────────────────────────────

    /// A named path parameter: `users/[id]` on `/users/42` gives
    /// `param("id") == Some("42")`. Absent optionals are `None`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Segments captured by a trailing `[...]`.
    pub fn wildcard(&self) -> Option<&[String]> {
        self.params.wildcard()
    }

    // ── Query ────────────────────────────────────────────────────────────

    /// First query value for `name`.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    // ── Client ───────────────────────────────────────────────────────────

    /// Token of an `Authorization: Bearer …` header.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")?.strip_prefix("Bearer ")
    }

    /// Client address: first `X-Forwarded-For` hop, then the peer address,
    /// then `localhost`.
    pub fn ip(&self) -> String {
        if let Some(first) = self.ips().into_iter().next() {
            return first.to_owned();
        }
        match self.remote_addr {
            Some(addr) => addr.ip().to_string(),
            None => "localhost".to_owned(),
        }
    }

    /// Every `X-Forwarded-For` hop.
    pub fn ips(&self) -> Vec<&str> {
        self.header("x-forwarded-for")
            .map(|v| v.split(',').map(str::trim).filter(|ip| !ip.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// `X-Forwarded-Proto`, defaulting to `http`.
    pub fn protocol(&self) -> &str {
        self.header("x-forwarded-proto").unwrap_or("http")
    }

    pub fn host(&self) -> Option<&str> {
        self.header("host")
    }

    pub fn referrer(&self) -> Option<&str> {
        self.header("referer")
    }

    /// `protocol://host/raw-path?query`.
    pub fn full_url(&self) -> String {
        let host = self.host().unwrap_or("localhost");
        let mut url = format!("{}://{host}{}", self.protocol(), self.raw_path);
        if let Ok(query) = serde_urlencoded::to_string(&self.query) {
            if !query.is_empty() {
                url.push('?');
                url.push_str(&query);
            }
        }
        url
    }

    // ── Content negotiation ──────────────────────────────────────────────

    /// The first of `types` listed verbatim in the `Accept` header.
    pub fn accepts<'a>(&self, types: &[&'a str]) -> Option<&'a str> {
        let accept: Vec<&str> = self.header("accept")
            .map(|v| v.split(',').map(|t| t.trim()).collect())
            .unwrap_or_default();
        types.iter().copied().find(|t| accept.contains(t))
    }

    pub fn wants_json(&self) -> bool {
        self.accepts(&["application/json"]).is_some()
    }

    // ── Body ─────────────────────────────────────────────────────────────

    pub fn raw_body(&self) -> &[u8] {
        &self.raw_body
    }

    /// Parsed body fields.
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Deserializes the raw body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.raw_body)
    }

    pub fn input(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Query pairs, then route parameters, then body fields; later sources
    /// win on key collisions.
    pub fn inputs(&self) -> Map<String, Value> {
        let mut all: Map<String, Value> = self.query.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        if let Value::Object(params) = self.params.to_json() {
            all.extend(params);
        }
        all.extend(self.body.clone());
        all
    }

    pub fn has(&self, key: &str) -> bool {
        self.body.contains_key(key)
    }

    pub fn has_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has(k))
    }

    pub fn missing(&self, key: &str) -> bool {
        !self.has(key)
    }

    /// Present, not null and not an empty string.
    pub fn filled(&self, key: &str) -> bool {
        match self.body.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    pub fn any_filled(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.filled(k))
    }

    pub fn only(&self, keys: &[&str]) -> Map<String, Value> {
        self.body.iter()
            .filter(|(k, _)| keys.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn except(&self, keys: &[&str]) -> Map<String, Value> {
        self.body.iter()
            .filter(|(k, _)| !keys.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Adds the fields of `data` the body does not already have.
    pub fn merge_if_missing(&mut self, data: Map<String, Value>) {
        for (k, v) in data {
            self.body.entry(k).or_insert(v);
        }
    }

    // ── Files ────────────────────────────────────────────────────────────

    /// First file uploaded under `field`.
    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == field)
    }

    /// Every file uploaded under `field`.
    pub fn files(&self, field: &str) -> Vec<&UploadedFile> {
        self.files.iter().filter(|f| f.field == field).collect()
    }

    // ── Locale and response ──────────────────────────────────────────────

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.locale = locale.into();
    }

    /// Pending response status and headers, and the terminal write.
    ///
    /// Middleware and hooks may add headers here or send a response
    /// outright, which ends the request before the next stage. A handler may
    /// write here too; its first write wins over the value it returns. Do
    /// not hold the guard across an `.await`.
    pub fn response(&self) -> MutexGuard<'_, ResponseState> {
        self.response.lock()
    }

    pub(crate) fn response_handle(&self) -> SharedResponse {
        self.response.clone()
    }
}

async fn parse_body(content_type: &str, raw: Bytes) -> (Map<String, Value>, Vec<UploadedFile>) {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "application/json" => match serde_json::from_slice(&raw) {
            Ok(Value::Object(map)) => (map, Vec::new()),
            _ => (Map::new(), Vec::new()),
        },
        "application/x-www-form-urlencoded" => {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&raw).unwrap_or_default();
            let mut body = Map::new();
            for (name, value) in pairs {
                insert_field(&mut body, &name, Value::String(value));
            }
            (body, Vec::new())
        }
        "multipart/form-data" => match parse_multipart(content_type, raw).await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("multipart body rejected: {e}");
                (Map::new(), Vec::new())
            }
        },
        _ => (Map::new(), Vec::new()),
    }
}

async fn parse_multipart(content_type: &str, raw: Bytes) -> multer::Result<(Map<String, Value>, Vec<UploadedFile>)> {
    let boundary = multer::parse_boundary(content_type)?;
    let stream = futures_util::stream::once(async move { Ok::<Bytes, Infallible>(raw) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut body = Map::new();
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else { continue };
        if field.file_name().is_some() {
            let file_name = field.file_name().map(str::to_owned);
            let content_type = field.content_type().map(ToString::to_string);
            let data = field.bytes().await?;
            files.push(UploadedFile {
                field: name.strip_suffix("[]").unwrap_or(&name).to_owned(),
                file_name,
                content_type,
                data,
            });
        } else {
            let text = field.text().await?;
            insert_field(&mut body, &name, Value::String(text));
        }
    }
    Ok((body, files))
}

/// `name[]` fields collect into an array under `name`; plain fields keep
/// their first value.
fn insert_field(body: &mut Map<String, Value>, name: &str, value: Value) {
    match name.strip_suffix("[]") {
        Some(base) => {
            let slot = body.entry(base.to_owned()).or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = slot {
                items.push(value);
            }
        }
        None => {
            body.entry(name.to_owned()).or_insert(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn request(builder: http::request::Builder, body: &str) -> Request {
        let req = builder.body(Bytes::from(body.to_owned())).unwrap();
        Request::from_http(Method::Post, req, Some("10.0.0.9:5000".parse().unwrap())).await
    }

    #[tokio::test]
    async fn malformed_json_is_an_empty_body() {
        let req = request(
            http::Request::builder().uri("/users").header("content-type", "application/json"),
            "{ nope",
        ).await;
        assert!(req.body().is_empty());
    }

    #[tokio::test]
    async fn urlencoded_array_fields() {
        let req = request(
            http::Request::builder()
                .uri("/tags?page=2")
                .header("content-type", "application/x-www-form-urlencoded"),
            "tag[]=a&tag[]=b&name=x&name=y",
        ).await;
        assert_eq!(req.input("tag"), Some(&serde_json::json!(["a", "b"])));
        assert_eq!(req.input("name"), Some(&serde_json::json!("x")));
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.inputs().get("page"), Some(&serde_json::json!("2")));
    }

    #[tokio::test]
    async fn multipart_fields_and_files() {
        let body = "--XB\r\n\
            Content-Disposition: form-data; name=\"title\"\r\n\r\n\
            hello\r\n\
            --XB\r\n\
            Content-Disposition: form-data; name=\"docs[]\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            aaa\r\n\
            --XB\r\n\
            Content-Disposition: form-data; name=\"docs[]\"; filename=\"b.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            bb\r\n\
            --XB--\r\n";
        let req = request(
            http::Request::builder().uri("/upload").header("content-type", "multipart/form-data; boundary=XB"),
            body,
        ).await;
        assert_eq!(req.input("title"), Some(&serde_json::json!("hello")));
        let docs = req.files("docs");
        assert_eq!(docs.len(), 2);
        assert_eq!(req.file("docs").and_then(|f| f.file_name.as_deref()), Some("a.txt"));
        assert_eq!(docs[1].size(), 2);
        assert_eq!(docs[1].extension(), Some("txt"));
    }

    #[tokio::test]
    async fn ip_prefers_forwarded_for() {
        let req = request(http::Request::builder().uri("/"), "").await;
        assert_eq!(req.ip(), "10.0.0.9");

        let req = request(
            http::Request::builder().uri("/").header("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            "",
        ).await;
        assert_eq!(req.ip(), "203.0.113.7");
        assert_eq!(req.ips(), vec!["203.0.113.7", "10.0.0.1"]);
    }

    #[tokio::test]
    async fn negotiation_and_filled() {
        let req = request(
            http::Request::builder()
                .uri("/")
                .header("accept", "text/html, application/json")
                .header("authorization", "Bearer abc")
                .header("content-type", "application/json"),
            r#"{"name":"","age":3,"nick":null}"#,
        ).await;
        assert!(req.wants_json());
        assert_eq!(req.bearer_token(), Some("abc"));
        assert!(req.has("name") && !req.filled("name"));
        assert!(req.filled("age"));
        assert!(!req.filled("nick"));
        assert_eq!(req.only(&["age"]).len(), 1);
        assert_eq!(req.except(&["age"]).len(), 2);
    }
}
