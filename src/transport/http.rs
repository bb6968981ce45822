//! HTTP transport adapter.
//!
//! `http-get` and `http-post` endpoints share one [`reqwest::Client`]. A 200
//! response resolves to its JSON body, or to the raw text when the body does
//! not parse; any other status, and any network-level error, resolves to a
//! [`DispatchError`].

use crate::transport::{DispatchError, payload_text};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::time::Duration;

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
        }
    }

    /// The core imposes no timeouts of its own; a connect timeout is opt-in
    /// through configuration.
    pub fn with_connect_timeout(timeout: Duration) -> Self {
        let client = reqwest::ClientBuilder::default()
            .connect_timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        HttpTransport { client }
    }

    /// Invoke one HTTP endpoint.
    ///
    /// A payload supplied to a GET endpoint is discarded with a warning:
    /// GET requests carry no body.
    pub async fn invoke(
        &self,
        endpoint: &str,
        payload: Option<&Value>,
        get: bool,
    ) -> Result<Value, DispatchError> {
        if get && payload.is_some() {
            log::warn!(
                "discarding payload in HTTP GET to {} (should it be POST?)",
                endpoint
            );
        }

        let data = if get {
            String::new()
        } else {
            payload_text(payload)
        };

        let request = if get {
            log::debug!("GET {}", endpoint);
            self.client.get(endpoint)
        } else {
            log::debug!("POST {}, body: {}", endpoint, data);
            self.client
                .post(endpoint)
                .header(CONTENT_TYPE, "application/json")
                .body(data.clone())
        };

        let response = request
            .send()
            .await
            .map_err(|e| DispatchError::new(endpoint, data.clone(), e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(DispatchError::new(
                endpoint,
                data,
                format!("status code !== 200: {}", response.status().as_u16()),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| DispatchError::new(endpoint, data, e.to_string()))?;

        // A 200 body that is not valid JSON is still a success: resolve to
        // the raw text.
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Ok(value),
            Err(_) => Ok(Value::String(text)),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}
