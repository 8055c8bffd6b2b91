//! Core types for mqtt-scripts
//!
//! This crate provides the fundamental types shared by every part of the
//! engine: decoded payloads, the topic wildcard matcher, inbound/outbound
//! message shapes, handler signatures and the per-unit isolation boundary
//! ([`UnitDomain`]) that every user callback runs inside.

mod domain;
mod error;
mod event;
mod handler;
mod list;
mod message;
mod payload;
pub mod topic;

pub use domain::{clean_trace, UnitDomain};
pub use error::{validate_delay, ApiError, ApiResult};
pub use event::TopicEvent;
pub use handler::{HandlerResult, TimerHandler, TopicHandler};
pub use list::OneOrMany;
pub use message::{InboundMessage, OutboundMessage, PublishOptions, QoS};
pub use payload::Payload;

/// Maximum absolute shift accepted for solar schedules, in seconds (±24h)
pub const MAX_SUN_SHIFT_SECS: f64 = 86_400.0;
