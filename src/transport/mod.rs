//! Transport adapters.
//!
//! One adapter per wire protocol, each exposing the same capability: invoke
//! a single endpoint with an optional payload and resolve to the parsed
//! response. Adapter failures are [`DispatchError`]s; they never escape the
//! dispatch engine, which folds them into the aggregate `had_failure` flag.

pub mod http;
pub mod mq;

pub use http::HttpTransport;
pub use mq::MqTransport;

use serde_json::Value;

/// A failed invocation of one endpoint.
///
/// Carries the serialized request payload and the endpoint it was sent to,
/// so a failure is diagnosable from the log line alone.
#[derive(Debug)]
pub struct DispatchError {
    pub endpoint: String,
    pub data: String,
    pub message: String,
}

impl DispatchError {
    pub fn new(
        endpoint: impl Into<String>,
        data: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        DispatchError {
            endpoint: endpoint.into(),
            data: data.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dispatch to {} failed: {}", self.endpoint, self.message)
    }
}

impl std::error::Error for DispatchError {}

/// Serialize a payload for the wire: strings pass through unchanged,
/// anything else is JSON-encoded, absence becomes the empty string.
pub(crate) fn payload_text(payload: Option<&Value>) -> String {
    match payload {
        None => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(value) => value.to_string(),
    }
}
