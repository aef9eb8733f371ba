use serde_json::json;

use super::Middleware;
use crate::error::Fault;
use crate::request::Request;

/// Answers every routed request with `503` while enabled.
pub struct MaintenanceMode {
    message: String,
}

impl MaintenanceMode {
    pub fn new(message: &str) -> Self {
        Self { message: message.to_owned() }
    }
}

impl Middleware for MaintenanceMode {
    fn name(&self) -> &'static str {
        "maintenance"
    }

    fn before(&self, _req: &mut Request) -> Result<(), Fault> {
        Err(Fault::service_unavailable(&json!({
            "status": false,
            "code": "maintenance",
            "message": self.message,
        })))
    }
}
