//! Route definitions and the resolution seam shared by both routing modes.

use crate::discover::{ControllerRef, MethodSet};
use crate::method::Method;
use crate::pattern::{CompiledPattern, Params, RoutePattern};

/// One invocable endpoint: a controller, the verbs it serves, and the
/// pattern its file path translates to.
#[derive(Clone, Debug)]
pub struct RouteDefinition {
    pub methods: MethodSet,
    pub pattern: CompiledPattern,
    pub controller: ControllerRef,
}

impl RouteDefinition {
    pub fn new(controller: ControllerRef, pattern: CompiledPattern, methods: MethodSet) -> Self {
        Self { methods, pattern, controller }
    }

    pub fn route_pattern(&self) -> &RoutePattern {
        self.pattern.pattern()
    }

    pub fn supports(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }
}

/// The controller chosen for a request and the parameters its path yielded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    pub controller: ControllerRef,
    pub params: Params,
}

/// Maps a method and a prefix-stripped, normalized path to a controller.
///
/// Implemented by the live filesystem resolver (development) and by the
/// manifest-backed radix router (production); both must answer identically
/// for the same controller tree.
pub trait Resolve: Send + Sync {
    fn resolve(&self, method: Method, path: &str) -> Option<MatchResult>;
}
