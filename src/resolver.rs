//! Development-mode resolver: rescans the controller tree on every request.
//!
//! Edits to the tree (new files, renamed brackets, added verbs) take effect
//! on the next request without a rebuild. The price is a directory walk and
//! some file reads per request, which is why production uses the manifest
//! router instead.

use tracing::{debug, warn};

use crate::config::ControllersConfig;
use crate::discover::{self, ControllerFile};
use crate::method::Method;
use crate::pattern::{CompiledPattern, RoutePattern};
use crate::route::{MatchResult, Resolve};
use crate::specificity;

/// A discovered controller file with its compiled pattern.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub file: ControllerFile,
    pub pattern: CompiledPattern,
}

/// Discovers, translates and sorts the controller tree. Files whose names
/// do not translate are logged and left out.
pub fn sorted_candidates(config: &ControllersConfig) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = discover::discover(config)
        .into_iter()
        .filter_map(|file| {
            let compiled = RoutePattern::from_file_path(file.controller.route())
                .and_then(|pattern| pattern.compile());
            match compiled {
                Ok(pattern) => Some(Candidate { file, pattern }),
                Err(e) => {
                    warn!(controller = %file.controller, "skipping controller: {e}");
                    None
                }
            }
        })
        .collect();
    specificity::sort_by_specificity(&mut candidates, |c| &c.file.controller);
    candidates
}

/// Resolves against the live controller tree.
#[derive(Clone, Debug)]
pub struct DevResolver {
    config: ControllersConfig,
}

impl DevResolver {
    pub fn new(config: ControllersConfig) -> Self {
        Self { config }
    }
}

impl Resolve for DevResolver {
    /// First candidate whose pattern matches `path` and whose source declares
    /// `method`. A candidate that matches the path but not the method does
    /// not end the search: a later, overlapping controller may serve it.
    fn resolve(&self, method: Method, path: &str) -> Option<MatchResult> {
        for candidate in sorted_candidates(&self.config) {
            let Some(params) = candidate.pattern.matches(path) else { continue };
            match discover::read_methods(&candidate.file.path) {
                Ok(methods) if methods.contains(&method) => {
                    debug!(controller = %candidate.file.controller, %method, path, "resolved");
                    return Some(MatchResult { controller: candidate.file.controller, params });
                }
                Ok(_) => {
                    debug!(controller = %candidate.file.controller, %method, "method not declared, trying next candidate");
                }
                Err(e) => {
                    warn!(path = %candidate.file.path.display(), "unreadable controller: {e}");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(files: &[(&str, &str)]) -> (tempfile::TempDir, DevResolver) {
        let root = tempfile::tempdir().unwrap();
        for (path, source) in files {
            let full = root.path().join("main/controllers").join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, source).unwrap();
        }
        let config = ControllersConfig { root: root.path().to_owned(), ..ControllersConfig::default() };
        (root, DevResolver::new(config))
    }

    #[test]
    fn static_route_is_not_shadowed() {
        let (_root, resolver) = tree(&[
            ("users/[id].rs", "pub async fn get() {}"),
            ("users/active.rs", "pub async fn get() {}"),
        ]);
        let hit = resolver.resolve(Method::Get, "/users/active").unwrap();
        assert_eq!(hit.controller.route(), "users/active");
        assert!(hit.params.is_empty());

        let hit = resolver.resolve(Method::Get, "/users/9").unwrap();
        assert_eq!(hit.controller.route(), "users/[id]");
        assert_eq!(hit.params.get("id"), Some("9"));
    }

    #[test]
    fn falls_through_to_a_later_candidate_serving_the_method() {
        let (_root, resolver) = tree(&[
            ("users/active.rs", "pub async fn get() {}"),
            ("users/[id].rs", "pub async fn delete() {}"),
        ]);
        let hit = resolver.resolve(Method::Delete, "/users/active").unwrap();
        assert_eq!(hit.controller.route(), "users/[id]");
        assert_eq!(hit.params.get("id"), Some("active"));
    }

    #[test]
    fn unsupported_method_is_a_miss() {
        let (_root, resolver) = tree(&[
            ("users/[id]/index.rs", "pub async fn get() {}"),
            ("users/[id]/edit.rs", "pub async fn post() {}"),
        ]);
        assert!(resolver.resolve(Method::Post, "/users/42").is_none());
        assert!(resolver.resolve(Method::Post, "/users/42/edit").is_some());
    }

    #[test]
    fn badly_named_files_are_skipped() {
        let (_root, resolver) = tree(&[
            ("user-[id].rs", "pub async fn get() {}"),
            ("index.rs", "pub async fn get() {}"),
        ]);
        assert_eq!(sorted_candidates(&resolver.config).len(), 1);
        assert!(resolver.resolve(Method::Get, "/").is_some());
    }
}
