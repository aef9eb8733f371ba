//! Fixture controller trees on disk.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use bytes::Bytes;
use pathwise::Settings;
use tempfile::TempDir;

/// A throwaway application root:
///
/// ```text
/// <tmp>/app/<module>/controllers/…   controller sources
/// <tmp>/public/…                      static files
/// <tmp>/.dist/routes.json             manifest
/// ```
pub struct Tree {
    dir: TempDir,
}

impl Tree {
    pub fn new() -> Self {
        Self { dir: tempfile::tempdir().unwrap() }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `main/controllers/<route>.rs` declaring `verbs`.
    pub fn controller(&self, route: &str, verbs: &[&str]) -> &Self {
        self.module_controller("main", route, verbs)
    }

    pub fn module_controller(&self, module: &str, route: &str, verbs: &[&str]) -> &Self {
        let source: String = verbs.iter()
            .map(|verb| format!("pub async fn {verb}(req: Request) -> Result<Value, Fault> {{\n    todo!()\n}}\n\n"))
            .collect();
        self.write(&format!("app/{module}/controllers/{route}.rs"), &source)
    }

    pub fn write(&self, relative: &str, contents: &str) -> &Self {
        let path = self.root().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
        self
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root().join(".dist/routes.json")
    }

    /// Settings pointing every path at this tree.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.controllers.root = self.root().join("app");
        settings.manifest.path = self.manifest_path();
        settings.server_static.directories = vec![self.root().join("public")];
        settings
    }
}

pub fn request(method: &str, uri: &str) -> http::Request<Bytes> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}
