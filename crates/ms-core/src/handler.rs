//! Handler signatures shared by the dispatcher and the schedulers

use crate::event::TopicEvent;
use std::sync::Arc;

/// Result type returned by user handlers
///
/// Handlers may fail with any error; the owning unit's domain reports it.
pub type HandlerResult = anyhow::Result<()>;

/// Handler invoked for a matching topic message
pub type TopicHandler = Arc<dyn Fn(TopicEvent) -> HandlerResult + Send + Sync>;

/// Handler invoked by time and solar schedules
pub type TimerHandler = Arc<dyn Fn() -> HandlerResult + Send + Sync>;
