use pathwise::{Fault, Request};
use serde_json::{json, Value};

pub async fn get(_req: Request) -> Result<Value, Fault> {
    Ok(json!({ "status": true, "users": [{ "id": 1, "name": "alice" }] }))
}
