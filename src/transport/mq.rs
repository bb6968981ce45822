//! Message-queue transport adapter.
//!
//! Single-shot request/reply over AMQP 0.9.1. Each invocation declares a
//! fresh exclusive reply queue, publishes the payload to the default
//! exchange under the endpoint's routing key with `reply_to` pointing at
//! that queue, and treats the first delivery on the queue as the answer.
//!
//! There is no correlation-ID matching; this is safe only because the reply
//! queue is created per call and exclusive to it. Do not reuse reply queues
//! across concurrent calls.
//!
//! The adapter does not own the broker connection. The surrounding process
//! establishes one long-lived [`lapin::Connection`] and injects a channel;
//! reconnection and backoff live there, not here.

use crate::transport::{DispatchError, payload_text};
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions,
    BasicQosOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel};
use serde_json::Value;

/// Delivery mode 1 marks the request non-persistent
const NON_PERSISTENT: u8 = 1;

pub struct MqTransport {
    channel: Channel,
}

impl MqTransport {
    /// Wrap an injected channel on the process-wide broker connection
    pub fn new(channel: Channel) -> Self {
        MqTransport { channel }
    }

    /// Invoke one message-queue endpoint; `endpoint` is the routing key the
    /// serving side consumes on.
    pub async fn invoke(
        &self,
        endpoint: &str,
        payload: Option<&Value>,
    ) -> Result<Value, DispatchError> {
        let data = match payload {
            None => "{}".to_string(),
            Some(value) => payload_text(Some(value)),
        };

        // Fresh, server-named, exclusive reply queue; auto-deleted once its
        // only consumer is cancelled.
        let queue = self
            .channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| DispatchError::new(endpoint, data.clone(), e.to_string()))?;

        self.channel
            .queue_bind(
                queue.name().as_str(),
                "amq.topic",
                "#",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| DispatchError::new(endpoint, data.clone(), e.to_string()))?;

        // One unacknowledged message in flight at a time.
        self.channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| DispatchError::new(endpoint, data.clone(), e.to_string()))?;

        let mut consumer = self
            .channel
            .basic_consume(
                queue.name().as_str(),
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| DispatchError::new(endpoint, data.clone(), e.to_string()))?;

        log::debug!("publishing to routing key {}: {}", endpoint, data);

        let confirm = self
            .channel
            .basic_publish(
                "",
                endpoint,
                BasicPublishOptions {
                    mandatory: true,
                    immediate: true,
                },
                data.as_bytes(),
                BasicProperties::default()
                    .with_reply_to(queue.name().clone())
                    .with_delivery_mode(NON_PERSISTENT),
            )
            .await
            .map_err(|e| {
                DispatchError::new(
                    endpoint,
                    data.clone(),
                    format!("could not publish message to the default exchange: {}", e),
                )
            })?;
        confirm.await.map_err(|e| {
            DispatchError::new(
                endpoint,
                data.clone(),
                format!("could not publish message to the default exchange: {}", e),
            )
        })?;

        // The first delivery on the exclusive queue is the answer.
        let reply = match consumer.next().await {
            Some(Ok(delivery)) => delivery,
            Some(Err(e)) => return Err(DispatchError::new(endpoint, data, e.to_string())),
            None => {
                return Err(DispatchError::new(
                    endpoint,
                    data,
                    "reply stream closed without a response",
                ));
            }
        };

        reply
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| DispatchError::new(endpoint, data.clone(), e.to_string()))?;

        let tag = consumer.tag();
        if let Err(e) = self
            .channel
            .basic_cancel(tag.as_str(), BasicCancelOptions::default())
            .await
        {
            log::debug!("failed to cancel reply consumer {}: {}", tag, e);
        }

        serde_json::from_slice::<Value>(&reply.data).map_err(|e| {
            DispatchError::new(endpoint, data, format!("invalid data format: {}", e))
        })
    }
}
