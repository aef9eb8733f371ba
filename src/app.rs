//! Application bootstrap.
//!
//! ```rust,ignore
//! let settings = Settings::load(Path::new("pathwise.toml"))?;
//! App::new(settings)
//!     .controllers(controllers::registry())
//!     .not_found(json!({ "status": false, "message": "nothing here" }))
//!     .serve()
//!     .await?;
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::{Mode, Settings};
use crate::controller::ControllerRegistry;
use crate::discover::ControllerRef;
use crate::dispatch::{Dispatcher, ErrorHandler};
use crate::error::{Error, Fault};
use crate::manifest::RouteManifest;
use crate::middleware::Middleware;
use crate::resolver::{self, DevResolver};
use crate::response::Response;
use crate::route::Resolve;
use crate::router::ManifestRouter;
use crate::server::Server;

pub struct App {
    settings: Settings,
    controllers: ControllerRegistry,
    middleware: Vec<Arc<dyn Middleware>>,
    not_found: Option<Value>,
    error_handler: Option<ErrorHandler>,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            controllers: ControllerRegistry::new(),
            middleware: Vec::new(),
            not_found: None,
            error_handler: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn controllers(mut self, registry: ControllerRegistry) -> Self {
        self.controllers = registry;
        self
    }

    /// Adds middleware that runs after the built-in chain.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Replaces the configured not-found payload.
    pub fn not_found(mut self, payload: Value) -> Self {
        self.not_found = Some(payload);
        self
    }

    /// Renders internal faults instead of the configured server-error page.
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Fault) -> Response + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Builds the dispatcher for the configured mode.
    ///
    /// Production reads the route manifest. When it is missing or corrupt a
    /// fresh one is compiled and written, and [`Error::ManifestRebuilt`] is
    /// returned: the process is expected to exit and restart against it.
    pub fn build(self) -> Result<Dispatcher, Error> {
        let (resolver, routed) = self.resolver()?;
        for controller in routed.iter().filter(|c| self.controllers.get(c).is_none()) {
            warn!(%controller, "routed controller has no registered implementation");
        }

        let mut dispatcher = Dispatcher::new(resolver, self.controllers, &self.settings)
            .with_middleware(self.middleware);
        if let Some(payload) = self.not_found {
            dispatcher = dispatcher.with_not_found(payload);
        }
        if let Some(handler) = self.error_handler {
            dispatcher = dispatcher.with_error_handler(handler);
        }
        Ok(dispatcher)
    }

    /// Builds, binds the configured address and serves until shutdown.
    pub async fn serve(self) -> Result<(), Error> {
        let server = Server::bind(&self.settings.server.addr)?;
        server.serve(self.build()?).await
    }

    fn resolver(&self) -> Result<(Arc<dyn Resolve>, Vec<ControllerRef>), Error> {
        match self.settings.mode {
            Mode::Development => {
                let config = self.settings.controllers.clone();
                let routed = resolver::sorted_candidates(&config)
                    .into_iter()
                    .map(|c| c.file.controller)
                    .collect();
                info!(root = %config.root.display(), "development mode, resolving against the controller tree");
                Ok((Arc::new(DevResolver::new(config)), routed))
            }
            Mode::Production => {
                let path = &self.settings.manifest.path;
                let loaded = RouteManifest::load(path)
                    .and_then(|manifest| Ok((ManifestRouter::from_manifest(&manifest)?, manifest)));
                match loaded {
                    Ok((router, manifest)) => {
                        let routed = manifest.entries().iter().map(|e| e.controller.clone()).collect();
                        Ok((Arc::new(router), routed))
                    }
                    Err(e) if e.needs_rebuild() => {
                        warn!("route manifest unusable, rebuilding: {e}");
                        let manifest = RouteManifest::compile(&self.settings.controllers);
                        manifest.write(path)?;
                        Err(Error::ManifestRebuilt { path: path.clone(), entries: manifest.len() })
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}
