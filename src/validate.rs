use crate::{api::ChatRequest, error::ChatError};
use anyhow::{anyhow, Result};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;


pub struct Validator {
compiled: JSONSchema,
}


impl Validator {
pub fn new(schema: &Value) -> Result<Self> {
let compiled = JSONSchema::options()
.with_draft(Draft::Draft202012)
.compile(schema)
.map_err(|e| anyhow!("invalid request schema: {e}"))?;
Ok(Self { compiled })
}


/// Validator for the `/chat` body, compiled from the embedded schema.
pub fn chat_request() -> Result<Self> {
let schema: Value = serde_json::from_str(include_str!("../schema/chat_request.schema.json"))?;
Self::new(&schema)
}


/// Parse stage: raw body to typed request. Every failure is `NoMessage`.
pub fn parse_request(&self, body: &[u8]) -> Result<ChatRequest, ChatError> {
let v: Value = serde_json::from_slice(body).map_err(|e| {
tracing::debug!(error = %e, "request body is not JSON");
ChatError::NoMessage
})?;

if let Err(errors) = self.compiled.validate(&v) {
for e in errors {
tracing::debug!(path = %e.instance_path, error = %e, "request schema violation");
}
return Err(ChatError::NoMessage);
}

serde_json::from_value(v).map_err(|e| {
tracing::debug!(error = %e, "request does not fit ChatRequest");
ChatError::NoMessage
})
}
}


/// Validate stage: the trimmed message, rejected when nothing is left.
pub fn trimmed_message(req: &ChatRequest) -> Result<&str, ChatError> {
let m = req.message.trim();
if m.is_empty() { return Err(ChatError::EmptyMessage); }
Ok(m)
}
