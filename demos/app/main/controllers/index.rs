use pathwise::{Fault, Request};
use serde_json::{json, Value};

pub async fn get(req: Request) -> Result<Value, Fault> {
    Ok(json!({ "status": true, "message": "welcome", "locale": req.locale() }))
}
