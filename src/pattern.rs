//! Route pattern translation.
//!
//! A controller's position in the tree is its route. File paths use bracket
//! syntax, the stored manifest uses marker syntax, and both parse into the
//! same [`RoutePattern`]:
//!
//! | file path segment | manifest segment | meaning                               |
//! |-------------------|------------------|---------------------------------------|
//! | `users`           | `users`          | literal                               |
//! | `[id]`            | `:id`            | required capture                      |
//! | `{page}`          | `:page?`         | optional capture, separator optional  |
//! | `[...]`           | `*`              | rest of the path, as a list           |
//!
//! A trailing `index` collapses onto its parent, so `users/index` is `/users`
//! and a lone `index` is the root.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use thiserror::Error;

/// Key under which the wildcard capture is exposed.
pub const WILDCARD_KEY: &str = "wildcard";

const INDEX: &str = "index";

/// Why a route could not be translated.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TranslateError {
    #[error("segment `{0}` mixes literal text with a parameter")]
    MixedSegment(String),
    #[error("invalid parameter name `{0}`")]
    InvalidName(String),
    #[error("parameter `{0}` is captured more than once")]
    DuplicateName(String),
    #[error("wildcard must be the final segment")]
    WildcardNotLast,
    #[error("pattern failed to compile: {0}")]
    Compile(String),
}

/// One path segment of a route.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Segment {
    Static(String),
    Param(String),
    Optional(String),
    Wildcard,
}

impl Segment {
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, Self::Static(_))
    }

    fn from_file_segment(raw: &str) -> Result<Self, TranslateError> {
        if raw == "[...]" {
            return Ok(Self::Wildcard);
        }
        if let Some(name) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return Ok(Self::Param(checked_name(name)?));
        }
        if let Some(name) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            return Ok(Self::Optional(checked_name(name)?));
        }
        checked_static(raw)
    }

    fn from_manifest_segment(raw: &str) -> Result<Self, TranslateError> {
        if raw == "*" {
            return Ok(Self::Wildcard);
        }
        if let Some(rest) = raw.strip_prefix(':') {
            return match rest.strip_suffix('?') {
                Some(name) => Ok(Self::Optional(checked_name(name)?)),
                None => Ok(Self::Param(checked_name(rest)?)),
            };
        }
        checked_static(raw)
    }
}

fn checked_name(name: &str) -> Result<String, TranslateError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name.to_owned())
    } else {
        Err(TranslateError::InvalidName(name.to_owned()))
    }
}

fn checked_static(raw: &str) -> Result<Segment, TranslateError> {
    if raw.contains(['[', ']', '{', '}']) {
        return Err(TranslateError::MixedSegment(raw.to_owned()));
    }
    Ok(Segment::Static(raw.to_owned()))
}

/// Trims surrounding slashes (either kind) and re-roots the path: `"a/b/"` →
/// `"/a/b"`, `""` → `"/"`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches(|c| c == '/' || c == '\\');
    if trimmed.is_empty() {
        "/".to_owned()
    } else {
        format!("/{trimmed}")
    }
}

/// The matchable form of a route.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RoutePattern {
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Translates a controller-tree-relative path without extension, e.g.
    /// `users/[id]/posts/{page}`.
    pub fn from_file_path(path: &str) -> Result<Self, TranslateError> {
        let mut raw: Vec<&str> = path.split(['/', '\\']).filter(|s| !s.is_empty()).collect();
        if raw.last() == Some(&INDEX) {
            raw.pop();
        }
        let segments = raw.into_iter()
            .map(Segment::from_file_segment)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(segments)
    }

    /// Parses the stored manifest form, e.g. `/users/:id/posts/:page?`.
    pub fn from_manifest_path(path: &str) -> Result<Self, TranslateError> {
        let segments = path.split('/')
            .filter(|s| !s.is_empty())
            .map(Segment::from_manifest_segment)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(segments)
    }

    fn new(segments: Vec<Segment>) -> Result<Self, TranslateError> {
        let mut seen: Vec<&str> = Vec::new();
        for (i, segment) in segments.iter().enumerate() {
            let name = match segment {
                Segment::Static(_) => continue,
                Segment::Param(name) | Segment::Optional(name) => name.as_str(),
                Segment::Wildcard => {
                    if i + 1 != segments.len() {
                        return Err(TranslateError::WildcardNotLast);
                    }
                    WILDCARD_KEY
                }
            };
            if seen.contains(&name) {
                return Err(TranslateError::DuplicateName(name.to_owned()));
            }
            seen.push(name);
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// No dynamic segment at all.
    pub fn is_static(&self) -> bool {
        self.segments.iter().all(|s| !s.is_dynamic())
    }

    /// Stored manifest form: `/users/:id/posts/:page?`, `/files/*`, `/`.
    pub fn to_manifest_path(&self) -> String {
        let parts: Vec<String> = self.segments.iter()
            .map(|segment| match segment {
                Segment::Static(s) => s.clone(),
                Segment::Param(name) => format!(":{name}"),
                Segment::Optional(name) => format!(":{name}?"),
                Segment::Wildcard => "*".to_owned(),
            })
            .collect();
        format!("/{}", parts.join("/"))
    }

    /// Bracket form: `users/[id]/posts/{page}`, `files/[...]`, `index`.
    pub fn to_file_path(&self) -> String {
        let mut parts: Vec<String> = self.segments.iter()
            .map(|segment| match segment {
                Segment::Static(s) => s.clone(),
                Segment::Param(name) => format!("[{name}]"),
                Segment::Optional(name) => format!("{{{name}}}"),
                Segment::Wildcard => "[...]".to_owned(),
            })
            .collect();
        // A literal trailing `index` would otherwise collapse on re-parse.
        if parts.last().is_none_or(|last| last == INDEX) {
            parts.push(INDEX.to_owned());
        }
        parts.join("/")
    }

    /// Parameter names replaced by placeholders; equal shapes match equal
    /// path sets.
    pub fn shape(&self) -> String {
        let parts: Vec<&str> = self.segments.iter()
            .map(|segment| match segment {
                Segment::Static(s) => s.as_str(),
                Segment::Param(_) => ":",
                Segment::Optional(_) => ":?",
                Segment::Wildcard => "*",
            })
            .collect();
        format!("/{}", parts.join("/"))
    }

    /// Every concrete segment list this pattern stands for: each optional
    /// segment is either present (as a required capture) or absent.
    /// Entries keep their index in the original pattern.
    fn expansions(&self) -> Vec<Vec<(usize, &Segment)>> {
        let mut out: Vec<Vec<(usize, &Segment)>> = vec![Vec::new()];
        for (i, segment) in self.segments.iter().enumerate() {
            if let Segment::Optional(_) = segment {
                let mut with = out.clone();
                for expansion in &mut with {
                    expansion.push((i, segment));
                }
                out.extend(with);
            } else {
                for expansion in &mut out {
                    expansion.push((i, segment));
                }
            }
        }
        out
    }

    /// Whether some concrete path is matched by both patterns.
    pub fn overlaps(&self, other: &RoutePattern) -> bool {
        let ours = self.expansions();
        let theirs = other.expansions();
        ours.iter().any(|a| {
            let a: Vec<&Segment> = a.iter().map(|(_, s)| *s).collect();
            theirs.iter().any(|b| {
                let b: Vec<&Segment> = b.iter().map(|(_, s)| *s).collect();
                shapes_overlap(&a, &b)
            })
        })
    }

    /// Route strings for the radix tree. Parameters are named after their
    /// segment position (`p0`, `p1`, …) so that routes differing only in
    /// parameter names share a tree slot.
    pub fn radix_routes(&self) -> Vec<String> {
        self.expansions()
            .into_iter()
            .map(|expansion| {
                let parts: Vec<String> = expansion.into_iter()
                    .map(|(i, segment)| match segment {
                        Segment::Static(s) => s.clone(),
                        Segment::Param(_) | Segment::Optional(_) => format!("{{p{i}}}"),
                        Segment::Wildcard => format!("{{*p{i}}}"),
                    })
                    .collect();
                format!("/{}", parts.join("/"))
            })
            .collect()
    }

    /// Compiles the anchored matcher.
    pub fn compile(&self) -> Result<CompiledPattern, TranslateError> {
        let mut source = String::from("^");
        let mut captures = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Static(s) => {
                    source.push('/');
                    source.push_str(&regex::escape(s));
                }
                Segment::Param(name) => {
                    source.push_str("/([^/]+)");
                    captures.push(Capture::Named(name.clone()));
                }
                Segment::Optional(name) => {
                    source.push_str("(?:/([^/]+))?");
                    captures.push(Capture::Named(name.clone()));
                }
                Segment::Wildcard => {
                    source.push_str("/(.+)");
                    captures.push(Capture::Wildcard);
                }
            }
        }
        source.push('$');
        let regex = Regex::new(&source).map_err(|e| TranslateError::Compile(e.to_string()))?;
        Ok(CompiledPattern { pattern: self.clone(), regex, captures })
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_manifest_path())
    }
}

fn shapes_overlap(a: &[&Segment], b: &[&Segment]) -> bool {
    match (a.first(), b.first()) {
        (None, None) => true,
        (Some(Segment::Wildcard), _) => !b.is_empty(),
        (_, Some(Segment::Wildcard)) => !a.is_empty(),
        (None, _) | (_, None) => false,
        (Some(x), Some(y)) => {
            let compatible = match (x, y) {
                (Segment::Static(x), Segment::Static(y)) => x == y,
                _ => true,
            };
            compatible && shapes_overlap(&a[1..], &b[1..])
        }
    }
}

#[derive(Clone, Debug)]
enum Capture {
    Named(String),
    Wildcard,
}

/// A [`RoutePattern`] with its anchored regex.
#[derive(Clone, Debug)]
pub struct CompiledPattern {
    pattern: RoutePattern,
    regex: Regex,
    captures: Vec<Capture>,
}

impl CompiledPattern {
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Full-string match of `path` (normalized first). Captures are
    /// percent-decoded; optional captures that did not match are absent.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let path = normalize_path(path);
        let subject = if path == "/" { "" } else { path.as_str() };
        let caps = self.regex.captures(subject)?;

        let mut params = Params::default();
        for (i, capture) in self.captures.iter().enumerate() {
            let Some(m) = caps.get(i + 1) else { continue };
            match capture {
                Capture::Named(name) => {
                    params.values.insert(name.clone(), decode(m.as_str()));
                }
                Capture::Wildcard => {
                    params.wildcard = Some(m.as_str().split('/').map(decode).collect());
                }
            }
        }
        Some(params)
    }
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_owned())
}

/// Path parameters captured by a match.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Params {
    values: BTreeMap<String, String>,
    wildcard: Option<Vec<String>>,
}

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Segments captured by a trailing `[...]`, in order.
    pub fn wildcard(&self) -> Option<&[String]> {
        self.wildcard.as_deref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name) || (name == WILDCARD_KEY && self.wildcard.is_some())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len() + usize::from(self.wildcard.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Object form; the wildcard appears as an array under `wildcard`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map: serde_json::Map<String, serde_json::Value> = self.values.iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        if let Some(rest) = &self.wildcard {
            map.insert(WILDCARD_KEY.to_owned(), serde_json::json!(rest));
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(path: &str) -> CompiledPattern {
        RoutePattern::from_file_path(path).unwrap().compile().unwrap()
    }

    #[test]
    fn literal_segments_map_unchanged() {
        let p = compiled("users/active");
        assert!(p.matches("/users/active").unwrap().is_empty());
        assert!(p.matches("/users").is_none());
        assert!(p.matches("/users/active/more").is_none());
    }

    #[test]
    fn index_collapses_to_parent() {
        assert_eq!(RoutePattern::from_file_path("users/index").unwrap().to_manifest_path(), "/users");
        let root = compiled("index");
        assert!(root.matches("/").is_some());
        assert!(root.matches("").is_some());
        assert!(root.matches("/x").is_none());
    }

    #[test]
    fn required_and_optional_captures() {
        let p = compiled("users/[id]/posts/{page}");

        let without = p.matches("/users/42/posts").unwrap();
        assert_eq!(without.get("id"), Some("42"));
        assert!(!without.contains("page"));
        assert_eq!(without.len(), 1);

        let with = p.matches("/users/42/posts/3").unwrap();
        assert_eq!(with.get("id"), Some("42"));
        assert_eq!(with.get("page"), Some("3"));

        assert!(p.matches("/users/posts").is_none());
    }

    #[test]
    fn optional_segment_makes_separator_optional() {
        let p = compiled("users/{id}");
        assert!(p.matches("/users").is_some());
        assert_eq!(p.matches("/users/id-value").unwrap().get("id"), Some("id-value"));
    }

    #[test]
    fn wildcard_collects_remaining_segments() {
        let p = compiled("files/[...]");
        let params = p.matches("/files/a/b/c.txt").unwrap();
        assert_eq!(params.wildcard(), Some(&["a".to_owned(), "b".to_owned(), "c.txt".to_owned()][..]));
        assert_eq!(params.to_json()["wildcard"], serde_json::json!(["a", "b", "c.txt"]));
        assert!(p.matches("/files").is_none());
    }

    #[test]
    fn captures_are_percent_decoded() {
        let p = compiled("tags/[name]");
        assert_eq!(p.matches("/tags/rust%20lang").unwrap().get("name"), Some("rust lang"));
    }

    #[test]
    fn manifest_syntax_round_trips() {
        for file in ["index", "users/[id]/index", "users/[id]/posts/{page}", "files/[...]", "a/index/index"] {
            let pattern = RoutePattern::from_file_path(file).unwrap();
            let stored = pattern.to_manifest_path();
            let parsed = RoutePattern::from_manifest_path(&stored).unwrap();
            assert_eq!(parsed, pattern, "{file}");
            assert_eq!(RoutePattern::from_file_path(&parsed.to_file_path()).unwrap(), pattern);
        }
    }

    #[test]
    fn rejects_malformed_segments() {
        assert_eq!(
            RoutePattern::from_file_path("user-[id]"),
            Err(TranslateError::MixedSegment("user-[id]".to_owned()))
        );
        assert_eq!(RoutePattern::from_file_path("[...]/x"), Err(TranslateError::WildcardNotLast));
        assert_eq!(
            RoutePattern::from_file_path("[id]/[id]"),
            Err(TranslateError::DuplicateName("id".to_owned()))
        );
        assert!(matches!(RoutePattern::from_file_path("[1x]"), Err(TranslateError::InvalidName(_))));
    }

    #[test]
    fn shape_ignores_parameter_names() {
        let a = RoutePattern::from_file_path("users/[id]").unwrap();
        let b = RoutePattern::from_file_path("users/[slug]").unwrap();
        assert_eq!(a.shape(), b.shape());
    }

    #[test]
    fn overlap_detection() {
        let p = |s: &str| RoutePattern::from_file_path(s).unwrap();
        assert!(p("users/[id]").overlaps(&p("users/active")));
        assert!(!p("users/[id]").overlaps(&p("posts/[id]")));
        assert!(p("users/{page}").overlaps(&p("users")));
        assert!(p("[...]").overlaps(&p("a/b/c")));
        assert!(!p("files/[...]").overlaps(&p("files")));
        assert!(p("[a]/x").overlaps(&p("y/[b]")));
    }

    #[test]
    fn radix_routes_expand_optionals() {
        let routes = RoutePattern::from_file_path("users/[id]/posts/{page}").unwrap().radix_routes();
        assert_eq!(routes, vec!["/users/{p1}/posts", "/users/{p1}/posts/{p3}"]);
        assert_eq!(RoutePattern::from_file_path("index").unwrap().radix_routes(), vec!["/"]);
        assert_eq!(RoutePattern::from_file_path("files/[...]").unwrap().radix_routes(), vec!["/files/{*p1}"]);
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("//api//"), "/api");
        assert_eq!(normalize_path("\\a\\"), "/a");
    }
}
