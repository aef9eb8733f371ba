//! Static file fallback.
//!
//! Requests under the static mount (`/public/` by default) are served
//! straight from disk, before any route resolution. Directories are searched
//! in order and the first one holding the file wins.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::config::StaticConfig;
use crate::response::Response;

#[derive(Clone, Debug)]
pub struct StaticFiles {
    /// `/<mount>/`, with exactly one slash on each side. `None` for an empty
    /// mount, which would otherwise shadow every route.
    mount: Option<String>,
    directories: Vec<PathBuf>,
}

impl StaticFiles {
    pub fn new(mount: &str, directories: Vec<PathBuf>) -> Self {
        let trimmed = mount.trim_matches(|c| c == '/' || c == '\\');
        let mount = (!trimmed.is_empty()).then(|| format!("/{trimmed}/"));
        Self { mount, directories }
    }

    /// `None` when serving static files is disabled or has no mount.
    pub fn from_config(config: &StaticConfig) -> Option<Self> {
        if !config.enable {
            return None;
        }
        let files = Self::new(&config.path, config.directories.clone());
        if files.mount.is_none() {
            warn!(path = %config.path, "static files need a non-root mount path, disabled");
            return None;
        }
        Some(files)
    }

    /// Whether `raw_path` belongs to the static mount: it starts with the
    /// mount and names something beyond it.
    pub fn claims(&self, raw_path: &str) -> bool {
        self.mount.as_deref()
            .is_some_and(|mount| raw_path.len() > mount.len() && raw_path.starts_with(mount))
    }

    /// Reads the file `raw_path` names. `None` on a miss in every directory
    /// or a path that tries to leave them.
    pub async fn serve(&self, raw_path: &str) -> Option<Response> {
        let relative = raw_path.strip_prefix(self.mount.as_deref()?)?;
        let relative = urlencoding::decode(relative).ok()?;
        let Some(relative) = contained(&relative) else {
            warn!(path = raw_path, "static path escapes its root, refused");
            return None;
        };

        for dir in &self.directories {
            let candidate = dir.join(&relative);
            match tokio::fs::metadata(&candidate).await {
                Ok(meta) if meta.is_file() => {}
                _ => continue,
            }
            match tokio::fs::read(&candidate).await {
                Ok(contents) => {
                    let mime = mime_guess::from_path(&candidate).first_or_octet_stream();
                    debug!(file = %candidate.display(), "static hit");
                    return Some(Response::builder().raw(mime.essence_str(), contents));
                }
                Err(e) => warn!(file = %candidate.display(), "static file unreadable: {e}"),
            }
        }
        None
    }
}

/// `path` as a relative path made only of normal components.
fn contained(path: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}
