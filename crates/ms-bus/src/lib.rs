//! Broker interface and outbound publishing for mqtt-scripts
//!
//! The broker network client is an external collaborator. This crate defines
//! the interface the engine needs from it ([`Broker`]), an in-process
//! implementation ([`LoopbackBroker`]) used for tests and offline runs, and the
//! [`Publisher`] façade handlers use to publish without awaiting the network.

mod loopback;
mod publisher;

pub use loopback::LoopbackBroker;
pub use publisher::{encode_payload, spawn_pump, Publisher};

use async_trait::async_trait;
use ms_core::{InboundMessage, OutboundMessage};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Result type for broker operations
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors reported by a broker client
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    #[error("broker is not connected")]
    NotConnected,

    #[error("invalid publish topic '{0}'")]
    InvalidTopic(String),

    #[error("publish failed: {0}")]
    PublishFailed(String),
}

/// The broker collaborator as seen by the engine
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish a message
    async fn publish(&self, message: OutboundMessage) -> BrokerResult<()>;

    /// Receive every message on every topic
    ///
    /// Messages the broker holds as retained are delivered first, flagged
    /// `retain = true`.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<InboundMessage>;
}

/// Thread-safe handle to a broker
pub type SharedBroker = Arc<dyn Broker>;
