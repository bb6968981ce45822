//! Fanout dispatch engine.
//!
//! One dispatch invokes every endpoint of a single service instance
//! concurrently, waits for all of them to settle (no short-circuit in either
//! direction), and shallow-merges the successful responses in endpoint
//! declaration order. Failures never escape: they are logged and folded into
//! [`Aggregated::had_failure`], which is what drives failover one layer up.

use crate::service::{EndpointKind, ServiceInstance};
use crate::transport::{DispatchError, HttpTransport, MqTransport, payload_text};
use futures::future::join_all;
use serde_json::{Map, Value};

/// The merged outcome of one fanout round.
///
/// `response` always contains whatever succeeded, even when `had_failure`
/// is set; the caller decides whether a partial round counts.
#[derive(Debug, Default)]
pub struct Aggregated {
    pub response: Map<String, Value>,
    pub had_failure: bool,
}

impl Aggregated {
    pub fn into_value(self) -> Value {
        Value::Object(self.response)
    }
}

pub struct Dispatcher {
    http: HttpTransport,
    mq: Option<MqTransport>,
}

impl Dispatcher {
    pub fn new(http: HttpTransport, mq: Option<MqTransport>) -> Self {
        Dispatcher { http, mq }
    }

    pub fn with_http(mut self, http: HttpTransport) -> Self {
        self.http = http;
        self
    }

    pub fn with_mq(mut self, mq: MqTransport) -> Self {
        self.mq = Some(mq);
        self
    }

    /// Fan the payload out to every endpoint of `service` and aggregate.
    ///
    /// Endpoints of an unrecognized kind are logged and skipped; they count
    /// as neither success nor failure, so a registration carrying a
    /// not-yet-supported transport does not poison the ones we do support.
    pub async fn dispatch(&self, service: &ServiceInstance, payload: Option<&Value>) -> Aggregated {
        let invocations = service.endpoints.iter().map(|endpoint| async move {
            match &endpoint.kind {
                EndpointKind::HttpGet => Some(self.http.invoke(&endpoint.url, payload, true).await),
                EndpointKind::HttpPost => {
                    Some(self.http.invoke(&endpoint.url, payload, false).await)
                }
                EndpointKind::MessageQueue => match &self.mq {
                    Some(mq) => Some(mq.invoke(&endpoint.url, payload).await),
                    None => Some(Err(DispatchError::new(
                        &endpoint.url,
                        payload_text(payload),
                        "no broker channel attached for message-queue endpoint",
                    ))),
                },
                EndpointKind::Other(kind) => {
                    log::error!("unknown endpoint kind: {}", kind);
                    None
                }
            }
        });

        // Settle-all: every invocation runs to completion before anything
        // is aggregated.
        let results = join_all(invocations).await;

        let mut aggregated = Aggregated::default();
        for result in results {
            match result {
                Some(Ok(value)) => merge_response(&mut aggregated.response, value),
                Some(Err(e)) => {
                    log::error!("{}", e);
                    aggregated.had_failure = true;
                }
                None => {}
            }
        }
        aggregated
    }
}

/// Shallow merge with last-writer-wins on top-level key collisions, keyed by
/// endpoint declaration order. Successful non-object responses (raw text,
/// arrays, numbers) carry no top-level keys and contribute nothing.
fn merge_response(merged: &mut Map<String, Value>, response: Value) {
    match response {
        Value::Object(object) => merged.extend(object),
        other => {
            log::debug!("ignoring non-object response in aggregation: {}", other);
        }
    }
}
