//! Application settings.
//!
//! ```text
//! pathwise.toml
//!     → Settings::load (read + toml deserialize)
//!     → PATHWISE_ENV override of `mode`
//!     → Settings (immutable, shared via Arc by the dispatcher)
//! ```
//!
//! Every section has defaults, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that overrides [`Settings::mode`].
pub const MODE_ENV: &str = "PATHWISE_ENV";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown mode `{0}` (expected `development` or `production`)")]
    Mode(String),
}

/// Routing mode: live filesystem scan or precompiled manifest.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl std::str::FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::Mode(other.to_owned())),
        }
    }
}

/// Root configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub mode: Mode,
    pub server: ServerConfig,
    pub route: RouteConfig,
    pub server_static: StaticConfig,
    pub controllers: ControllersConfig,
    pub manifest: ManifestConfig,
    pub app: AppConfig,
    pub rate_limiter: RateLimiterConfig,
    pub locale: LocaleConfig,
}

impl Settings {
    /// Load settings from a TOML file and apply the environment override.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&content)?.with_env_overrides()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Applies `PATHWISE_ENV` when it is set.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(mode) = std::env::var(MODE_ENV) {
            self.mode = mode.parse()?;
        }
        Ok(self)
    }

    pub fn is_production(&self) -> bool {
        self.mode == Mode::Production
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address, e.g. `0.0.0.0:3000`.
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: "0.0.0.0:3000".to_owned() }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Mount prefix every controller route lives under, e.g. `/api`.
    pub prefix: String,
}

impl RouteConfig {
    /// The prefix as `/segment[/segment…]`, or `/` when unset.
    pub fn normalized_prefix(&self) -> String {
        crate::pattern::normalize_path(&self.prefix)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticConfig {
    pub enable: bool,
    /// URL prefix that selects static serving, e.g. `/public`.
    pub path: String,
    /// Directories searched in order.
    pub directories: Vec<PathBuf>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            enable: true,
            path: "/public".to_owned(),
            directories: vec![PathBuf::from("storage/public")],
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllersConfig {
    /// Directory holding one sub-directory per feature module.
    pub root: PathBuf,
    /// Name of the controller directory inside each module.
    pub dir: String,
    /// Extension of controller source files.
    pub extension: String,
}

impl Default for ControllersConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("app"),
            dir: "controllers".to_owned(),
            extension: "rs".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ManifestConfig {
    pub path: PathBuf,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self { path: PathBuf::from(".dist/routes.json") }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub server_error: ServerErrorConfig,
    pub not_found: NotFoundConfig,
    pub maintenance_mode: MaintenanceConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerErrorConfig {
    pub enable: bool,
    /// Include `details` and `stack` in 500 payloads outside production.
    pub debug: bool,
    pub code: String,
    pub message: String,
}

impl Default for ServerErrorConfig {
    fn default() -> Self {
        Self {
            enable: true,
            debug: false,
            code: "server_error".to_owned(),
            message: "An unexpected error occurred".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct NotFoundConfig {
    pub enable: bool,
    pub code: String,
    pub message: String,
}

impl Default for NotFoundConfig {
    fn default() -> Self {
        Self {
            enable: true,
            code: "not_found".to_owned(),
            message: "Not found".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub enable: bool,
    pub message: String,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self { enable: false, message: "Service Unavailable".to_owned() }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    pub enable: bool,
    pub max_requests: usize,
    pub window_ms: u64,
    pub code: String,
    pub message: String,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            enable: true,
            max_requests: 100,
            window_ms: 60_000,
            code: "too-many-requests".to_owned(),
            message: "Too many requests. Please try again later.".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LocaleConfig {
    pub default: String,
    pub detect: bool,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self { default: "en".to_owned(), detect: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.mode, Mode::Development);
        assert_eq!(settings.manifest.path, PathBuf::from(".dist/routes.json"));
        assert_eq!(settings.rate_limiter.max_requests, 100);
        assert_eq!(settings.route.normalized_prefix(), "/");
    }

    #[test]
    fn sections_override_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            mode = "production"

            [route]
            prefix = "/api/"

            [rate_limiter]
            max_requests = 5
            "#,
        )
        .unwrap();
        assert!(settings.is_production());
        assert_eq!(settings.route.normalized_prefix(), "/api");
        assert_eq!(settings.rate_limiter.max_requests, 5);
        assert_eq!(settings.rate_limiter.window_ms, 60_000);
    }

    #[test]
    fn mode_parses_aliases() {
        assert_eq!("PROD".parse::<Mode>().unwrap(), Mode::Production);
        assert!("staging".parse::<Mode>().is_err());
    }
}
