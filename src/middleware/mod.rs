//! Pre-request middleware.
//!
//! Middleware runs after a route resolved and before the controller's own
//! hooks and handler. Each one inspects or annotates the [`Request`] and
//! either lets it continue (`Ok(())`) or ends it (`Err(Fault)`); an
//! [`Fault::Early`] response is sent as is.
//!
//! Built-ins run first, in this order:
//!
//! 1. [`MaintenanceMode`]: `503` while maintenance is on.
//! 2. [`RateLimiter`]: `429` once a client exceeds its window.
//! 3. [`LocaleDetector`]: picks the request locale.
//!
//! Middleware added with [`App::middleware`](crate::App::middleware) follows.

mod locale;
mod maintenance;
mod rate_limit;

use std::sync::Arc;

pub use locale::LocaleDetector;
pub use maintenance::MaintenanceMode;
pub use rate_limit::RateLimiter;

use crate::config::Settings;
use crate::error::Fault;
use crate::request::Request;

pub trait Middleware: Send + Sync + 'static {
    /// Name recorded in logs when this middleware ends a request.
    fn name(&self) -> &'static str;

    fn before(&self, req: &mut Request) -> Result<(), Fault>;
}

/// Any `Fn(&mut Request) -> Result<(), Fault>` works as middleware.
impl<F> Middleware for F
where
    F: Fn(&mut Request) -> Result<(), Fault> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "custom"
    }

    fn before(&self, req: &mut Request) -> Result<(), Fault> {
        self(req)
    }
}

/// The built-in chain as configured by `settings`. Disabled middleware is
/// left out.
pub fn builtin(settings: &Settings) -> Vec<Arc<dyn Middleware>> {
    let mut chain: Vec<Arc<dyn Middleware>> = Vec::new();
    if settings.app.maintenance_mode.enable {
        chain.push(Arc::new(MaintenanceMode::new(&settings.app.maintenance_mode.message)));
    }
    if settings.rate_limiter.enable {
        chain.push(Arc::new(RateLimiter::from_config(&settings.rate_limiter)));
    }
    chain.push(Arc::new(LocaleDetector::new(&settings.locale)));
    chain
}
