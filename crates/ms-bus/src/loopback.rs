//! In-process broker

use async_trait::async_trait;
use dashmap::DashMap;
use ms_core::{topic, InboundMessage, OutboundMessage};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::{Broker, BrokerError, BrokerResult};

/// A broker that lives inside the process
///
/// Every publish is delivered to all receivers as a live message. Retained
/// publishes are stored (an empty retained payload clears the topic) and
/// replayed with `retain = true` to receivers created later. All publishes are
/// recorded in a history for inspection.
pub struct LoopbackBroker {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<InboundMessage>>>,
    retained: DashMap<String, Vec<u8>>,
    history: Mutex<Vec<OutboundMessage>>,
}

impl LoopbackBroker {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            retained: DashMap::new(),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Deliver a message as if another client had published it
    pub fn inject(&self, message: InboundMessage) {
        trace!(topic = %message.topic, retain = message.retain, "Injecting message");
        if message.retain {
            self.store_retained(&message.topic, &message.payload);
        }
        self.deliver(message);
    }

    /// All messages published through this broker, oldest first
    pub fn published(&self) -> Vec<OutboundMessage> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Payloads published on one topic, oldest first
    pub fn published_on(&self, topic: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload)
            .collect()
    }

    /// The retained payload of a topic, if any
    pub fn retained(&self, topic: &str) -> Option<Vec<u8>> {
        self.retained.get(topic).map(|p| p.clone())
    }

    fn store_retained(&self, topic: &str, payload: &[u8]) {
        if payload.is_empty() {
            self.retained.remove(topic);
        } else {
            self.retained.insert(topic.to_string(), payload.to_vec());
        }
    }

    fn deliver(&self, message: InboundMessage) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| tx.send(message.clone()).is_ok());
    }
}

impl Default for LoopbackBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for LoopbackBroker {
    async fn publish(&self, message: OutboundMessage) -> BrokerResult<()> {
        if message.topic.is_empty() || topic::is_wildcard(&message.topic) {
            return Err(BrokerError::InvalidTopic(message.topic));
        }

        debug!(topic = %message.topic, retain = message.options.retain, "Publishing");

        if message.options.retain {
            self.store_retained(&message.topic, message.payload.as_bytes());
        }

        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());

        self.deliver(InboundMessage::new(
            message.topic,
            message.payload.into_bytes(),
            false,
        ));
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<InboundMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        for entry in self.retained.iter() {
            let _ = tx.send(InboundMessage::new(
                entry.key().clone(),
                entry.value().clone(),
                true,
            ));
        }
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }
}
