//! Route specificity ordering.
//!
//! Resolution is first-match-wins, so candidates are tried most specific
//! first. Rules, applied in order:
//!
//! 1. static routes before any route with a `[` or `{` segment;
//! 2. routes without a `[...]` wildcard before routes with one;
//! 3. more literal segments first;
//! 4. two wildcard routes: deeper first, then reverse lexicographic;
//! 5. otherwise: shallower first, then lexicographic.
//!
//! The comparison runs on the route file path (`users/[id]/index`), so the
//! development scan and the compiled manifest order identically. The module
//! name breaks ties between equal route paths in different modules.

use std::cmp::Ordering;

use crate::discover::ControllerRef;

struct Shape {
    is_static: bool,
    wildcard: bool,
    literal_segments: usize,
    depth: usize,
}

impl Shape {
    fn of(route: &str) -> Self {
        let is_dynamic = |s: &str| s.contains('[') || s.contains('{');
        Self {
            is_static: !is_dynamic(route),
            wildcard: route.contains("[...]"),
            literal_segments: route.split('/').filter(|s| !is_dynamic(s)).count(),
            depth: route.split('/').count(),
        }
    }
}

/// Orders two route file paths, most specific first.
pub fn compare_routes(a: &str, b: &str) -> Ordering {
    let (sa, sb) = (Shape::of(a), Shape::of(b));
    sb.is_static.cmp(&sa.is_static)
        .then(sa.wildcard.cmp(&sb.wildcard))
        .then(sb.literal_segments.cmp(&sa.literal_segments))
        .then_with(|| {
            if sa.wildcard && sb.wildcard {
                sb.depth.cmp(&sa.depth).then_with(|| b.cmp(a))
            } else {
                sa.depth.cmp(&sb.depth).then_with(|| a.cmp(b))
            }
        })
}

/// Orders two controllers, most specific first.
pub fn compare(a: &ControllerRef, b: &ControllerRef) -> Ordering {
    compare_routes(a.route(), b.route()).then_with(|| a.module().cmp(b.module()))
}

/// Stable sort of `items` by the specificity of the controller `key` returns.
pub fn sort_by_specificity<T>(items: &mut [T], key: impl Fn(&T) -> &ControllerRef) {
    items.sort_by(|a, b| compare(key(a), key(b)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(routes: &[&str]) -> Vec<String> {
        let mut refs: Vec<ControllerRef> = routes.iter().map(|r| ControllerRef::new("main", *r)).collect();
        sort_by_specificity(&mut refs, |r| r);
        refs.into_iter().map(|r| r.route().to_owned()).collect()
    }

    #[test]
    fn static_beats_dynamic_with_shared_prefix() {
        assert_eq!(sorted(&["users/[id]", "users/active"]), vec!["users/active", "users/[id]"]);
    }

    #[test]
    fn wildcards_sort_after_other_dynamic_routes() {
        assert_eq!(
            sorted(&["[...]", "files/[...]", "[id]", "users"]),
            vec!["users", "[id]", "files/[...]", "[...]"]
        );
    }

    #[test]
    fn more_literal_segments_first() {
        assert_eq!(
            sorted(&["[a]/[b]/index", "users/[id]/posts/index", "users/[id]/index"]),
            vec!["users/[id]/posts/index", "users/[id]/index", "[a]/[b]/index"]
        );
    }

    #[test]
    fn deeper_wildcards_first_then_reverse_lexicographic() {
        assert_eq!(
            sorted(&["a/[x]/[...]", "a/b/[...]", "a/c/[...]", "a/[...]"]),
            vec!["a/c/[...]", "a/b/[...]", "a/[x]/[...]", "a/[...]"]
        );
    }

    #[test]
    fn shallower_first_then_lexicographic() {
        assert_eq!(
            sorted(&["[b]/x", "[a]/x", "[a]/[b]/[c]", "[id]"]),
            vec!["[a]/x", "[b]/x", "[id]", "[a]/[b]/[c]"]
        );
    }

    #[test]
    fn module_breaks_route_ties() {
        let mut refs = vec![ControllerRef::new("main", "index"), ControllerRef::new("admin", "index")];
        sort_by_specificity(&mut refs, |r| r);
        assert_eq!(refs[0].module(), "admin");
    }
}
