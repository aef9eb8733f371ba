//! Controllers and the registry that maps controller files to them.
//!
//! The filesystem decides *which* controller a request reaches; the registry
//! holds *what* that controller does. Each source file under the controller
//! tree is registered under its `module/route` key:
//!
//! ```rust,ignore
//! let registry = ControllerRegistry::new()
//!     .register("main/index", Controller::new().get(home))
//!     .register("main/users/[id]/index", Controller::new()
//!         .get(show_user)
//!         .delete(delete_user)
//!         .before(Method::Delete, require_admin));
//! ```
//!
//! A key that is routed but has no registered controller, or a controller
//! without a handler for the routed verb, is answered as not found.

use std::collections::HashMap;
use std::sync::Arc;

use crate::discover::{ControllerRef, MethodSet};
use crate::error::Fault;
use crate::handler::{BoxedHandler, Handler, Hook};
use crate::method::Method;
use crate::request::Request;

/// The actions of one controller file, keyed by verb.
#[derive(Clone, Default)]
pub struct Controller {
    handlers: HashMap<Method, BoxedHandler>,
    hooks: HashMap<Method, Vec<Hook>>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(self, handler: impl Handler) -> Self { self.on(Method::Get, handler) }
    pub fn post(self, handler: impl Handler) -> Self { self.on(Method::Post, handler) }
    pub fn put(self, handler: impl Handler) -> Self { self.on(Method::Put, handler) }
    pub fn patch(self, handler: impl Handler) -> Self { self.on(Method::Patch, handler) }
    pub fn delete(self, handler: impl Handler) -> Self { self.on(Method::Delete, handler) }

    /// Registers `handler` for `method`, replacing any earlier one.
    pub fn on(mut self, method: Method, handler: impl Handler) -> Self {
        self.handlers.insert(method, handler.into_boxed_handler());
        self
    }

    /// Adds a check that runs before the `method` handler. Hooks run in the
    /// order they were added; the first `Err` ends the request.
    pub fn before<F>(mut self, method: Method, hook: F) -> Self
    where
        F: Fn(&mut Request) -> Result<(), Fault> + Send + Sync + 'static,
    {
        self.hooks.entry(method).or_default().push(Arc::new(hook));
        self
    }

    pub fn handler(&self, method: Method) -> Option<&BoxedHandler> {
        self.handlers.get(&method)
    }

    /// The hooks declared for `method`, if any.
    pub fn middleware_for(&self, method: Method) -> Option<&[Hook]> {
        self.hooks.get(&method).map(Vec::as_slice).filter(|hooks| !hooks.is_empty())
    }

    pub fn methods(&self) -> MethodSet {
        self.handlers.keys().copied().collect()
    }
}

/// Controllers by `module/route` key. Built once at startup.
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    controllers: HashMap<ControllerRef, Arc<Controller>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `controller` under `key` (`"main/users/[id]/index"`).
    ///
    /// # Panics
    ///
    /// Panics if `key` has no `module/` part.
    pub fn register(mut self, key: &str, controller: Controller) -> Self {
        let key: ControllerRef = key.parse()
            .unwrap_or_else(|e| panic!("invalid controller key `{key}`: {e}"));
        self.controllers.insert(key, Arc::new(controller));
        self
    }

    pub fn get(&self, key: &ControllerRef) -> Option<Arc<Controller>> {
        self.controllers.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ControllerRef> {
        self.controllers.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;

    async fn ok(_: Request) -> Result<Response, Fault> {
        Ok(Response::text("ok"))
    }

    #[test]
    fn capabilities_are_optional() {
        let controller = Controller::new()
            .get(ok)
            .delete(ok)
            .before(Method::Delete, |_| Ok(()));
        assert!(controller.handler(Method::Get).is_some());
        assert!(controller.handler(Method::Post).is_none());
        assert!(controller.middleware_for(Method::Get).is_none());
        assert_eq!(controller.middleware_for(Method::Delete).map(<[Hook]>::len), Some(1));
        assert_eq!(controller.methods(), MethodSet::from([Method::Get, Method::Delete]));
    }

    #[test]
    fn registry_looks_up_by_key() {
        let registry = ControllerRegistry::new().register("main/users/[id]/index", Controller::new().get(ok));
        let key = ControllerRef::new("main", "users/[id]/index");
        assert!(registry.get(&key).is_some());
        assert!(registry.get(&ControllerRef::new("admin", "users/[id]/index")).is_none());
    }

    #[test]
    #[should_panic(expected = "invalid controller key")]
    fn register_rejects_keys_without_module() {
        let _ = ControllerRegistry::new().register("index", Controller::new());
    }
}
