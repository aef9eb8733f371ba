//! Route manifest: compiled once offline, loaded at every production start.
//!
//! The manifest is one run of the development scan, frozen. Entries are
//! written in specificity order, so reading them back in order reproduces
//! the scan's first-match precedence exactly.
//!
//! ```json
//! [
//!   { "controller": "main/users/active", "path": "/users/active", "method": ["GET"] },
//!   { "controller": "main/users/[id]/index", "path": "/users/:id", "method": ["GET", "DELETE"] },
//!   { "controller": "main/files/[...]", "path": "/files/*", "method": ["GET"] }
//! ]
//! ```

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ControllersConfig;
use crate::discover::{self, ControllerRef, MethodSet};
use crate::method::Method;
use crate::pattern::{RoutePattern, TranslateError};
use crate::resolver;
use crate::route::RouteDefinition;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no route manifest at {}", .0.display())]
    Missing(PathBuf),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt route manifest {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("encoding route manifest: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("entry `{controller}` has an invalid path `{path}`: {source}")]
    Entry {
        controller: ControllerRef,
        path: String,
        #[source]
        source: TranslateError,
    },

    #[error("entry `{controller}` does not translate to its stored path `{path}`")]
    Mismatch { controller: ControllerRef, path: String },
}

impl ManifestError {
    /// Missing or unreadable as a route table; production rebuilds on these.
    pub fn needs_rebuild(&self) -> bool {
        !matches!(self, Self::Encode(_))
    }
}

/// One stored route.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ManifestEntry {
    pub controller: ControllerRef,
    pub path: String,
    #[serde(rename = "method")]
    pub methods: Vec<Method>,
}

/// The ordered route table.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RouteManifest {
    entries: Vec<ManifestEntry>,
}

impl RouteManifest {
    /// Walks the controller tree and builds the table.
    ///
    /// A controller that cannot be read gets an empty method set rather than
    /// failing the build. Entries whose `(shape, methods)` pair was already
    /// seen are dropped; the earlier one is the more specific.
    pub fn compile(config: &ControllersConfig) -> Self {
        let mut seen: HashSet<(String, Vec<Method>)> = HashSet::new();
        let mut entries = Vec::new();

        for candidate in resolver::sorted_candidates(config) {
            let methods: Vec<Method> = match discover::read_methods(&candidate.file.path) {
                Ok(methods) => methods.into_iter().collect(),
                Err(e) => {
                    warn!(path = %candidate.file.path.display(), "unreadable controller, no methods recorded: {e}");
                    Vec::new()
                }
            };
            let pattern = candidate.pattern.pattern();
            if !seen.insert((pattern.shape(), methods.clone())) {
                debug!(controller = %candidate.file.controller, "duplicate route shape, skipped");
                continue;
            }
            entries.push(ManifestEntry {
                controller: candidate.file.controller,
                path: pattern.to_manifest_path(),
                methods,
            });
        }

        Self { entries }
    }

    pub fn from_entries(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String, ManifestError> {
        serde_json::to_string_pretty(self).map_err(ManifestError::Encode)
    }

    /// Writes the manifest, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<(), ManifestError> {
        let io_err = |source| ManifestError::Io { path: path.to_owned(), source };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut json = self.to_json()?;
        json.push('\n');
        std::fs::write(path, json).map_err(io_err)?;
        info!(path = %path.display(), routes = self.entries.len(), "route manifest written");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ManifestError::Missing(path.to_owned()));
            }
            Err(source) => return Err(ManifestError::Io { path: path.to_owned(), source }),
        };
        serde_json::from_str(&content).map_err(|source| ManifestError::Corrupt {
            path: path.to_owned(),
            source,
        })
    }

    /// Rebuilds route definitions, in order, from the stored paths.
    ///
    /// Each stored path is parsed back into a pattern and must agree with the
    /// bracket-syntax route of its controller.
    pub fn definitions(&self) -> Result<Vec<RouteDefinition>, ManifestError> {
        self.entries.iter()
            .map(|entry| {
                let entry_err = |source| ManifestError::Entry {
                    controller: entry.controller.clone(),
                    path: entry.path.clone(),
                    source,
                };
                let pattern = RoutePattern::from_manifest_path(&entry.path).map_err(entry_err)?;
                if RoutePattern::from_file_path(entry.controller.route()).ok().as_ref() != Some(&pattern) {
                    return Err(ManifestError::Mismatch {
                        controller: entry.controller.clone(),
                        path: entry.path.clone(),
                    });
                }
                let compiled = pattern.compile().map_err(entry_err)?;
                let methods: MethodSet = entry.methods.iter().copied().collect();
                Ok(RouteDefinition::new(entry.controller.clone(), compiled, methods))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(controller: &str, path: &str, methods: &[Method]) -> ManifestEntry {
        ManifestEntry {
            controller: controller.parse().unwrap(),
            path: path.to_owned(),
            methods: methods.to_vec(),
        }
    }

    #[test]
    fn wire_format_uses_method_key() {
        let manifest = RouteManifest::from_entries(vec![entry("main/users/[id]/index", "/users/:id", &[Method::Get, Method::Delete])]);
        let json: serde_json::Value = serde_json::from_str(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "controller": "main/users/[id]/index", "path": "/users/:id", "method": ["GET", "DELETE"] }])
        );
    }

    #[test]
    fn load_distinguishes_missing_from_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");
        assert!(matches!(RouteManifest::load(&path), Err(ManifestError::Missing(_))));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(RouteManifest::load(&path), Err(ManifestError::Corrupt { .. })));
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".dist/routes.json");
        let manifest = RouteManifest::from_entries(vec![entry("main/index", "/", &[Method::Get])]);
        manifest.write(&path).unwrap();
        assert_eq!(RouteManifest::load(&path).unwrap(), manifest);
    }

    #[test]
    fn definitions_reject_disagreeing_entries() {
        let manifest = RouteManifest::from_entries(vec![entry("main/users/[id]", "/users/:slug", &[Method::Get])]);
        assert!(matches!(manifest.definitions(), Err(ManifestError::Mismatch { .. })));

        let manifest = RouteManifest::from_entries(vec![entry("main/users/[id]", "/users/:1d", &[Method::Get])]);
        assert!(matches!(manifest.definitions(), Err(ManifestError::Entry { .. })));
    }

    #[test]
    fn compile_dedups_identical_shapes_keeping_the_first() {
        let root = tempfile::tempdir().unwrap();
        for route in ["users/[id].rs", "users/[slug].rs", "users/[name]/index.rs"] {
            let full = root.path().join("main/controllers").join(route);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, "pub async fn get() {}").unwrap();
        }
        let config = ControllersConfig { root: root.path().to_owned(), ..ControllersConfig::default() };

        let manifest = RouteManifest::compile(&config);
        // `users/[name]/index` has the most literal segments, so it sorts first.
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.entries()[0].controller.route(), "users/[name]/index");
    }
}
