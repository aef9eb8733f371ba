//! # pathwise
//!
//! File-system routing for HTTP services: the controller tree *is* the
//! route table.
//!
//! ```text
//! app/main/controllers/index.rs                  → GET /
//! app/main/controllers/users/active.rs           → /users/active
//! app/main/controllers/users/[id]/index.rs       → /users/:id
//! app/main/controllers/users/[id]/posts/{page}.rs → /users/:id/posts/:page?
//! app/main/controllers/files/[...].rs            → /files/*
//! ```
//!
//! A file serves the verbs it declares (`pub async fn get(…)`, `post`, …).
//! When several files match a path, the most specific one wins: static
//! before dynamic, wildcards last.
//!
//! ## Two modes, one answer
//!
//! - **Development** rescans the tree on every request, so edits are live.
//! - **Production** loads a manifest compiled offline (`pathwise routes
//!   build`) into radix trees.
//!
//! Both resolve every request to the same controller with the same
//! parameters.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use pathwise::{App, Controller, ControllerRegistry, Fault, Request, Settings};
//! use serde_json::{json, Value};
//!
//! async fn show(req: Request) -> Result<Value, Fault> {
//!     Ok(json!({ "id": req.param("id") }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pathwise::Error> {
//!     let registry = ControllerRegistry::new()
//!         .register("main/users/[id]/index", Controller::new().get(show));
//!
//!     App::new(Settings::default()).controllers(registry).serve().await
//! }
//! ```

mod app;
mod controller;
mod discover;
mod dispatch;
mod error;
mod handler;
mod manifest;
mod method;
mod pattern;
mod request;
mod resolver;
mod response;
mod route;
mod router;
mod server;
mod specificity;
mod static_files;

pub mod config;
pub mod middleware;

pub use app::App;
pub use config::{Mode, Settings};
pub use controller::{Controller, ControllerRegistry};
pub use discover::{discover, extract_methods, ControllerFile, ControllerRef, MethodSet};
pub use dispatch::{Dispatcher, ErrorHandler, ErrorPages, Stage};
pub use error::{Error, Fault};
pub use handler::{Handler, Hook};
pub use manifest::{ManifestEntry, ManifestError, RouteManifest};
pub use method::Method;
pub use pattern::{normalize_path, CompiledPattern, Params, RoutePattern, Segment, TranslateError};
pub use request::{Request, UploadedFile};
pub use resolver::{sorted_candidates, Candidate, DevResolver};
pub use response::{ContentType, IntoResponse, Json, Response, ResponseBuilder, ResponseState, SharedResponse};
pub use route::{MatchResult, Resolve, RouteDefinition};
pub use router::ManifestRouter;
pub use server::Server;
pub use specificity::{compare_routes, sort_by_specificity};
pub use static_files::StaticFiles;
