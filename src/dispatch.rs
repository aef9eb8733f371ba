//! Per-request pipeline.
//!
//! ```text
//! RECEIVED → STATIC_CHECK → ROUTE_RESOLUTION → MIDDLEWARE → HANDLER_INVOKE → RESPONSE_WRITTEN
//!                 │                 │                │              │
//!                 └─ static file    └─ 404 payload   └─ Fault ──────┴─→ early response / 500
//! ```
//!
//! Misses never reach middleware. A [`Fault::Early`] is sent as is; a
//! [`Fault::Internal`] or a panic becomes the configured server-error page.

use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use http::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, error, field, info_span, warn, Instrument, Span};

use crate::config::{ServerErrorConfig, Settings};
use crate::controller::{Controller, ControllerRegistry};
use crate::error::Fault;
use crate::handler::BoxedHandler;
use crate::method::Method;
use crate::middleware::{self, Middleware};
use crate::pattern::normalize_path;
use crate::request::Request;
use crate::response::Response;
use crate::route::Resolve;
use crate::static_files::StaticFiles;

/// Replaces the server-error page for internal faults.
pub type ErrorHandler = Arc<dyn Fn(&Fault) -> Response + Send + Sync + 'static>;

/// Where a request is in the pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Received,
    StaticCheck,
    RouteResolution,
    Middleware,
    HandlerInvoke,
    ResponseWritten,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received        => "received",
            Self::StaticCheck     => "static_check",
            Self::RouteResolution => "route_resolution",
            Self::Middleware      => "middleware",
            Self::HandlerInvoke   => "handler_invoke",
            Self::ResponseWritten => "response_written",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn enter(stage: &mut Stage, next: Stage) {
    *stage = next;
    Span::current().record("stage", next.as_str());
    debug!(stage = %next, "stage");
}

// ── Error pages ──────────────────────────────────────────────────────────────

/// Not-found and server-error payloads.
#[derive(Clone, Debug)]
pub struct ErrorPages {
    not_found: Option<Value>,
    server_error: ServerErrorConfig,
    expose_details: bool,
}

impl ErrorPages {
    pub fn from_settings(settings: &Settings) -> Self {
        let nf = &settings.app.not_found;
        Self {
            not_found: nf.enable.then(|| json!({ "status": false, "code": nf.code, "message": nf.message })),
            server_error: settings.app.server_error.clone(),
            expose_details: settings.app.server_error.debug && !settings.is_production(),
        }
    }

    /// Replaces the not-found payload.
    pub fn set_not_found(&mut self, payload: Value) {
        self.not_found = Some(payload);
    }

    pub fn not_found(&self) -> Response {
        match &self.not_found {
            Some(payload) => Response::builder().status(StatusCode::NOT_FOUND).json(payload),
            None => Response::status(StatusCode::NOT_FOUND),
        }
    }

    /// `{status, code, message}`, plus `details` and `stack` when debugging
    /// outside production.
    pub fn server_error(&self, fault: &Fault) -> Response {
        if !self.server_error.enable {
            return Response::status(StatusCode::INTERNAL_SERVER_ERROR);
        }
        let mut payload = json!({
            "status": false,
            "code": self.server_error.code,
            "message": self.server_error.message,
        });
        if self.expose_details {
            let stack = fault.chain();
            payload["details"] = json!(stack.first());
            payload["stack"] = json!(stack);
        }
        Response::builder().status(StatusCode::INTERNAL_SERVER_ERROR).json(&payload)
    }
}

// ── Dispatcher ───────────────────────────────────────────────────────────────

/// Turns one HTTP request into one response. Shared by every connection
/// task; holds no per-request state.
pub struct Dispatcher {
    resolver: Arc<dyn Resolve>,
    controllers: ControllerRegistry,
    middleware: Vec<Arc<dyn Middleware>>,
    static_files: Option<StaticFiles>,
    prefix: String,
    pages: ErrorPages,
    error_handler: Option<ErrorHandler>,
}

impl Dispatcher {
    /// A dispatcher with the built-in middleware chain from `settings`.
    pub fn new(resolver: Arc<dyn Resolve>, controllers: ControllerRegistry, settings: &Settings) -> Self {
        Self {
            resolver,
            controllers,
            middleware: middleware::builtin(settings),
            static_files: StaticFiles::from_config(&settings.server_static),
            prefix: settings.route.normalized_prefix(),
            pages: ErrorPages::from_settings(settings),
            error_handler: None,
        }
    }

    /// Appends middleware after those already in the chain.
    pub fn with_middleware(mut self, extra: Vec<Arc<dyn Middleware>>) -> Self {
        self.middleware.extend(extra);
        self
    }

    pub fn with_not_found(mut self, payload: Value) -> Self {
        self.pages.set_not_found(payload);
        self
    }

    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub async fn handle(&self, req: http::Request<Bytes>, remote_addr: Option<SocketAddr>) -> Response {
        let span = info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            stage = field::Empty,
        );
        async move {
            let response = self.run(req, remote_addr).await;
            Span::current().record("stage", Stage::ResponseWritten.as_str());
            debug!(status = response.status_code().as_u16(), "response written");
            response
        }
        .instrument(span)
        .await
    }

    async fn run(&self, req: http::Request<Bytes>, remote_addr: Option<SocketAddr>) -> Response {
        let mut stage = Stage::Received;
        Span::current().record("stage", stage.as_str());
        let raw_path = req.uri().path().to_owned();

        enter(&mut stage, Stage::StaticCheck);
        if let Some(files) = self.static_files.as_ref().filter(|f| f.claims(&raw_path)) {
            return match files.serve(&raw_path).await {
                Some(res) => res,
                None => self.pages.not_found(),
            };
        }

        enter(&mut stage, Stage::RouteResolution);
        let Ok(method) = Method::try_from(req.method()) else {
            return Response::status(StatusCode::METHOD_NOT_ALLOWED);
        };
        let Some(route_path) = strip_prefix(&self.prefix, &raw_path) else {
            debug!("outside the mount prefix");
            return self.pages.not_found();
        };
        let Some(hit) = self.resolver.resolve(method, &route_path) else {
            debug!(route = %route_path, "no route");
            return self.pages.not_found();
        };
        let Some(controller) = self.controllers.get(&hit.controller) else {
            warn!(controller = %hit.controller, "routed controller is not registered");
            return self.pages.not_found();
        };
        let Some(handler) = controller.handler(method).cloned() else {
            warn!(controller = %hit.controller, %method, "controller declares no handler for method");
            return self.pages.not_found();
        };

        let mut request = Request::from_http(method, req, remote_addr).await;
        request.set_route(route_path, hit.params);

        let outcome = AssertUnwindSafe(self.invoke(&controller, handler, request, &mut stage))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(fault)) => self.render_fault(fault, stage),
            Err(panic) => self.render_fault(Fault::internal(panic_message(panic.as_ref())), stage),
        }
    }

    async fn invoke(
        &self,
        controller: &Controller,
        handler: BoxedHandler,
        mut req: Request,
        stage: &mut Stage,
    ) -> Result<Response, Fault> {
        enter(stage, Stage::Middleware);
        let response = req.response_handle();
        for m in &self.middleware {
            m.before(&mut req).inspect_err(|_| debug!(middleware = m.name(), "request ended by middleware"))?;
            if response.is_sent() {
                debug!(middleware = m.name(), "response written by middleware");
                return Ok(response.finish());
            }
        }

        if let Some(hooks) = controller.middleware_for(req.method()) {
            for hook in hooks {
                hook(&mut req)?;
                if response.is_sent() {
                    debug!("response written by controller hook");
                    return Ok(response.finish());
                }
            }
        }

        enter(stage, Stage::HandlerInvoke);
        let returned = handler.call(req).await?;
        // A no-op when the handler already wrote through the request.
        response.lock().send(returned);
        Ok(response.finish())
    }

    fn render_fault(&self, fault: Fault, stage: Stage) -> Response {
        match fault {
            Fault::Early(response) => response,
            fault @ Fault::Internal(_) => {
                error!(%stage, chain = ?fault.chain(), "request failed: {fault}");
                match &self.error_handler {
                    Some(handler) => handler(&fault),
                    None => self.pages.server_error(&fault),
                }
            }
        }
    }
}

/// The normalized path below `prefix`, or `None` when the path is outside
/// it. Both `/api` and `/api/` map to `/`.
fn strip_prefix(prefix: &str, raw_path: &str) -> Option<String> {
    let path = normalize_path(raw_path);
    if prefix == "/" {
        return Some(path);
    }
    match path.strip_prefix(prefix)? {
        "" => Some("/".to_owned()),
        rest if rest.starts_with('/') => Some(rest.to_owned()),
        _ => None,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic.downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned());
    format!("handler panicked: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_segment_aware() {
        assert_eq!(strip_prefix("/api", "/api").as_deref(), Some("/"));
        assert_eq!(strip_prefix("/api", "/api/").as_deref(), Some("/"));
        assert_eq!(strip_prefix("/api", "/api/users/").as_deref(), Some("/users"));
        assert_eq!(strip_prefix("/api", "/apix/users"), None);
        assert_eq!(strip_prefix("/api", "/users"), None);
        assert_eq!(strip_prefix("/", "users//"), Some("/users".to_owned()));
    }

    #[test]
    fn server_error_details_only_when_debugging() {
        let mut settings = Settings::default();
        let fault = Fault::internal("db down");

        let body = ErrorPages::from_settings(&settings).server_error(&fault).body_json().unwrap();
        assert_eq!(body, json!({ "status": false, "code": "server_error", "message": "An unexpected error occurred" }));

        settings.app.server_error.debug = true;
        let body = ErrorPages::from_settings(&settings).server_error(&fault).body_json().unwrap();
        assert_eq!(body["details"], "db down");
        assert_eq!(body["stack"], json!(["db down"]));

        settings.mode = crate::config::Mode::Production;
        let body = ErrorPages::from_settings(&settings).server_error(&fault).body_json().unwrap();
        assert!(body.get("stack").is_none());
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "handler panicked: boom");
    }
}
