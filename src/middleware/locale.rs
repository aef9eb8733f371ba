use super::Middleware;
use crate::config::LocaleConfig;
use crate::error::Fault;
use crate::request::Request;

/// Sets the request locale from `Accept-Language` for JSON clients, or the
/// configured default otherwise.
pub struct LocaleDetector {
    default: String,
    detect: bool,
}

impl LocaleDetector {
    pub fn new(config: &LocaleConfig) -> Self {
        Self { default: config.default.clone(), detect: config.detect }
    }
}

impl Middleware for LocaleDetector {
    fn name(&self) -> &'static str {
        "locale"
    }

    fn before(&self, req: &mut Request) -> Result<(), Fault> {
        let detected = match req.header("accept-language") {
            Some(lang) if self.detect && req.wants_json() && !lang.is_empty() => Some(lang.to_owned()),
            _ => None,
        };
        let locale = detected.unwrap_or_else(|| self.default.clone());
        req.set_locale(locale);
        Ok(())
    }
}
