//! Production router: the route manifest loaded into radix trees.
//!
//! One tree per HTTP method, O(path-length) lookup via [`matchit`]. Built once
//! at startup and never mutated, so it is shared across connection tasks
//! without locking.
//!
//! # Keeping first-match precedence
//!
//! The manifest is ordered most-specific-first and the development resolver
//! takes the first entry that matches. A radix tree has its own precedence
//! (static before parameter, per segment), which can disagree with the
//! manifest order when two dynamic routes overlap. To answer exactly like the
//! linear scan, the loader records, for every entry, the earlier entries of
//! the same method that can match a common path ("shadows"). After a tree
//! hit only those are re-checked; for typical trees the list is empty.

use std::collections::{HashMap, HashSet};

use matchit::Router as MatchitRouter;
use tracing::{debug, info, warn};

use crate::manifest::{ManifestError, RouteManifest};
use crate::method::Method;
use crate::pattern::normalize_path;
use crate::route::{MatchResult, Resolve, RouteDefinition};

/// The routes of one method.
struct MethodTree {
    tree: MatchitRouter<usize>,
    /// Earlier overlapping entries, ascending, indexed by entry.
    shadows: HashMap<usize, Vec<usize>>,
    /// Entries the tree rejected, ascending; checked by linear scan.
    overflow: Vec<usize>,
}

/// Manifest-backed [`Resolve`] implementation.
pub struct ManifestRouter {
    routes: Vec<RouteDefinition>,
    trees: HashMap<Method, MethodTree>,
}

impl ManifestRouter {
    pub fn from_manifest(manifest: &RouteManifest) -> Result<Self, ManifestError> {
        let router = Self::new(manifest.definitions()?);
        info!(routes = router.routes.len(), "route manifest loaded");
        Ok(router)
    }

    /// Builds the trees from definitions already in specificity order.
    pub fn new(routes: Vec<RouteDefinition>) -> Self {
        let methods: HashSet<Method> = routes.iter().flat_map(|r| r.methods.iter().copied()).collect();
        let trees = methods.into_iter()
            .map(|method| (method, build_tree(&routes, method)))
            .collect();
        Self { routes, trees }
    }

    pub fn routes(&self) -> &[RouteDefinition] {
        &self.routes
    }
}

fn build_tree(routes: &[RouteDefinition], method: Method) -> MethodTree {
    let indices: Vec<usize> = routes.iter()
        .enumerate()
        .filter(|(_, r)| r.supports(method))
        .map(|(i, _)| i)
        .collect();

    let mut tree = MatchitRouter::new();
    let mut taken: HashSet<String> = HashSet::new();
    let mut overflow = Vec::new();
    for &i in &indices {
        for key in routes[i].route_pattern().radix_routes() {
            // An earlier entry with the same radix key matches the same paths
            // and wins anyway.
            if !taken.insert(key.clone()) {
                continue;
            }
            if let Err(e) = tree.insert(key.as_str(), i) {
                warn!(%method, controller = %routes[i].controller, route = %key, "radix insert rejected, using linear fallback: {e}");
                if overflow.last() != Some(&i) {
                    overflow.push(i);
                }
            }
        }
    }

    let mut shadows = HashMap::new();
    for (pos, &i) in indices.iter().enumerate() {
        let earlier: Vec<usize> = indices[..pos].iter()
            .copied()
            .filter(|&j| routes[j].route_pattern().overlaps(routes[i].route_pattern()))
            .collect();
        if !earlier.is_empty() {
            shadows.insert(i, earlier);
        }
    }

    MethodTree { tree, shadows, overflow }
}

impl Resolve for ManifestRouter {
    fn resolve(&self, method: Method, path: &str) -> Option<MatchResult> {
        let methods = self.trees.get(&method)?;
        let path = normalize_path(path);
        let matches = |i: usize| self.routes[i].pattern.matches(&path).is_some();

        let mut best = methods.tree.at(path.as_str()).ok().map(|m| *m.value);
        if let Some(hit) = best {
            let shadowed = methods.shadows.get(&hit)
                .and_then(|earlier| earlier.iter().copied().find(|&j| matches(j)));
            if shadowed.is_some() {
                best = shadowed;
            }
        }
        for &j in &methods.overflow {
            if best.is_some_and(|b| b <= j) {
                break;
            }
            if matches(j) {
                best = Some(j);
                break;
            }
        }

        let route = &self.routes[best?];
        let params = route.pattern.matches(&path)?;
        debug!(controller = %route.controller, %method, path = %path, "resolved");
        Some(MatchResult { controller: route.controller.clone(), params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestEntry;

    fn router(entries: &[(&str, &str, &[Method])]) -> ManifestRouter {
        let manifest = RouteManifest::from_entries(
            entries.iter()
                .map(|(controller, path, methods)| ManifestEntry {
                    controller: controller.parse().unwrap(),
                    path: (*path).to_owned(),
                    methods: methods.to_vec(),
                })
                .collect(),
        );
        ManifestRouter::from_manifest(&manifest).unwrap()
    }

    #[test]
    fn exact_and_param_lookup() {
        let r = router(&[
            ("main/users/active", "/users/active", &[Method::Get]),
            ("main/users/[id]/index", "/users/:id", &[Method::Get, Method::Delete]),
        ]);
        assert_eq!(r.resolve(Method::Get, "/users/active").unwrap().controller.route(), "users/active");
        let hit = r.resolve(Method::Delete, "/users/7").unwrap();
        assert_eq!(hit.params.get("id"), Some("7"));
        assert!(r.resolve(Method::Post, "/users/7").is_none());
    }

    #[test]
    fn optional_segment_registers_both_forms() {
        let r = router(&[("main/users/[id]/posts/{page}", "/users/:id/posts/:page?", &[Method::Get])]);
        assert!(!r.resolve(Method::Get, "/users/42/posts").unwrap().params.contains("page"));
        assert_eq!(r.resolve(Method::Get, "/users/42/posts/3").unwrap().params.get("page"), Some("3"));
    }

    #[test]
    fn manifest_order_beats_radix_precedence() {
        // Sorted order puts `[a]/x` first; a radix tree alone would prefer the
        // static `y` segment of `y/[b]`.
        let r = router(&[
            ("main/[a]/x", "/:a/x", &[Method::Get]),
            ("main/y/[b]", "/y/:b", &[Method::Get]),
        ]);
        assert_eq!(r.resolve(Method::Get, "/y/x").unwrap().controller.route(), "[a]/x");
        assert_eq!(r.resolve(Method::Get, "/y/z").unwrap().controller.route(), "y/[b]");
    }

    #[test]
    fn wildcard_catches_the_rest() {
        let r = router(&[("main/files/[...]", "/files/*", &[Method::Get])]);
        let hit = r.resolve(Method::Get, "/files/a/b").unwrap();
        assert_eq!(hit.params.wildcard().map(<[String]>::len), Some(2));
        assert!(r.resolve(Method::Get, "/files").is_none());
    }

    #[test]
    fn root_index_matches_with_and_without_slash() {
        let r = router(&[("main/index", "/", &[Method::Get])]);
        assert!(r.resolve(Method::Get, "/").is_some());
        assert!(r.resolve(Method::Get, "").is_some());
    }
}
