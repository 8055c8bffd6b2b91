//! Outbound publisher
//!
//! Handlers run synchronously and never perform broker I/O themselves. They
//! queue publish requests on the [`Publisher`]; a pump task drains the queue
//! into the broker in order.

use ms_core::{topic, ApiError, ApiResult, OneOrMany, OutboundMessage, PublishOptions};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::Broker;

/// Encode a payload for the wire
///
/// Strings are sent as-is; every other value is JSON-serialized, so numbers and
/// booleans become their plain text form (`5`, `true`).
pub fn encode_payload<P: Serialize + ?Sized>(payload: &P) -> Result<String, serde_json::Error> {
    match serde_json::to_value(payload)? {
        serde_json::Value::String(s) => Ok(s),
        other => serde_json::to_string(&other),
    }
}

/// Queue-backed publish façade
#[derive(Clone)]
pub struct Publisher {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl Publisher {
    /// Create a publisher and the receiving end of its queue
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Create a publisher whose queue is drained into `broker`
    pub fn spawn(broker: Arc<dyn Broker>) -> (Self, JoinHandle<()>) {
        let (publisher, rx) = Self::channel();
        let pump = spawn_pump(rx, broker);
        (publisher, pump)
    }

    /// Publish a payload to one or more topics
    pub fn publish<P: Serialize + ?Sized>(
        &self,
        topics: impl Into<OneOrMany<String>>,
        payload: &P,
        options: PublishOptions,
    ) -> ApiResult<()> {
        let topics = topics.into();
        if topics.is_empty() {
            return Err(ApiError::TopicMissing);
        }
        let payload = encode_payload(payload).map_err(|e| ApiError::Serialize(e.to_string()))?;

        for topic in topics {
            self.publish_raw(topic, payload.clone(), options)?;
        }
        Ok(())
    }

    /// Publish an already encoded payload to a single topic
    pub fn publish_raw(
        &self,
        topic: impl Into<String>,
        payload: String,
        options: PublishOptions,
    ) -> ApiResult<()> {
        let topic = topic.into();
        validate_publish_topic(&topic)?;
        trace!(topic = %topic, payload = %payload, "Queueing publish");
        self.tx
            .send(OutboundMessage {
                topic,
                payload,
                options,
            })
            .map_err(|_| ApiError::PublisherClosed)
    }
}

fn validate_publish_topic(topic_name: &str) -> ApiResult<()> {
    if topic_name.is_empty() {
        return Err(ApiError::TopicMissing);
    }
    if topic::is_wildcard(topic_name) {
        return Err(ApiError::InvalidTopic {
            topic: topic_name.to_string(),
            reason: "wildcards are not allowed when publishing",
        });
    }
    Ok(())
}

/// Drain a publish queue into a broker
pub fn spawn_pump(
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
    broker: Arc<dyn Broker>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let topic = message.topic.clone();
            if let Err(e) = broker.publish(message).await {
                error!(topic = %topic, error = %e, "Publish failed");
            }
        }
        debug!("Publisher queue closed");
    })
}
