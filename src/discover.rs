//! Controller tree walk and static method inspection.
//!
//! ```text
//! app/                      ← controllers.root
//!   main/                   ← feature module
//!     controllers/          ← controllers.dir
//!       index.rs            → main/index            → /
//!       users/[id]/index.rs → main/users/[id]/index → /users/:id
//! ```
//!
//! A controller file declares one function per verb it serves
//! (`pub async fn get(…)`, `pub async fn post(…)`). Which verbs a file serves
//! is decided by scanning its source text, never by running it.

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::ControllersConfig;
use crate::method::Method;

/// Verbs a controller implements, in canonical order.
pub type MethodSet = BTreeSet<Method>;

static VERB_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bfn\s+(get|post|put|patch|delete)\b\s*[(<]").expect("verb pattern is valid")
});

/// Verbs declared in a controller's source.
pub fn extract_methods(source: &str) -> MethodSet {
    VERB_DECL.captures_iter(source)
        .filter_map(|caps| Method::from_token(&caps[1]))
        .collect()
}

/// Reads `path` and extracts its verbs.
pub fn read_methods(path: &Path) -> io::Result<MethodSet> {
    Ok(extract_methods(&std::fs::read_to_string(path)?))
}

#[derive(Debug, Error)]
#[error("controller reference `{0}` must look like `module/route`")]
pub struct InvalidControllerRef(String);

/// Registry key of a controller: its module plus its route file path
/// (bracket syntax, no extension). Written as `main/users/[id]/index`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct ControllerRef {
    module: String,
    route: String,
}

impl ControllerRef {
    pub fn new(module: impl Into<String>, route: impl Into<String>) -> Self {
        Self { module: module.into(), route: route.into() }
    }

    pub fn module(&self) -> &str { &self.module }

    /// Route file path relative to the module's controller directory.
    pub fn route(&self) -> &str { &self.route }
}

impl std::str::FromStr for ControllerRef {
    type Err = InvalidControllerRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((module, route)) if !module.is_empty() && !route.is_empty() => {
                Ok(Self::new(module, route))
            }
            _ => Err(InvalidControllerRef(s.to_owned())),
        }
    }
}

impl TryFrom<String> for ControllerRef {
    type Error = InvalidControllerRef;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ControllerRef> for String {
    fn from(r: ControllerRef) -> Self {
        r.to_string()
    }
}

impl fmt::Display for ControllerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module, self.route)
    }
}

/// A controller source file found on disk.
#[derive(Clone, Debug)]
pub struct ControllerFile {
    pub controller: ControllerRef,
    pub path: PathBuf,
}

/// Enumerates every controller file of every module under the root.
///
/// A missing root is an empty tree. Walk errors are logged and skipped.
/// Output order is deterministic (modules and files by name).
pub fn discover(config: &ControllersConfig) -> Vec<ControllerFile> {
    let modules = match std::fs::read_dir(&config.root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(root = %config.root.display(), "no controller root: {e}");
            return Vec::new();
        }
    };

    let mut modules: Vec<(String, PathBuf)> = modules
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
        .collect();
    modules.sort();

    let mut files = Vec::new();
    for (module, module_dir) in modules {
        let dir = module_dir.join(&config.dir);
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(module = %module, "skipping unreadable controller entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|e| e.to_str()) != Some(config.extension.as_str())
            {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&dir) else { continue };
            let route = relative.with_extension("")
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.push(ControllerFile {
                controller: ControllerRef::new(module.clone(), route),
                path: entry.into_path(),
            });
        }
    }
    files
}
