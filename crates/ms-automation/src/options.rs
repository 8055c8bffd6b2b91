use ms_core::{Payload, TopicEvent};
use std::time::Duration;

use crate::condition::Condition;

/// Options of a topic subscription
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Fixed delay in seconds before the handler runs; negative values count as zero
    pub shift: f64,
    /// Upper bound in seconds of an additional random delay
    pub random: f64,
    /// Only invoke the handler when the value differs from the cached one
    pub change: bool,
    /// Also invoke the handler for retained messages and replay cached values
    pub retain: bool,
    /// Filter evaluated before the change check
    pub condition: Option<Condition>,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shift(mut self, seconds: f64) -> Self {
        self.shift = seconds;
        self
    }

    pub fn random(mut self, seconds: f64) -> Self {
        self.random = seconds;
        self
    }

    pub fn change(mut self) -> Self {
        self.change = true;
        self
    }

    pub fn retain(mut self) -> Self {
        self.retain = true;
        self
    }

    /// Filter on an expression over `topic`, `state` and `oldState`
    pub fn condition(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Filter on a predicate over the incoming event
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TopicEvent) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Condition::predicate(
            move |topic: &str, state: &Payload, old: Option<&Payload>| {
                predicate(&TopicEvent::new(topic, state.clone(), old.cloned()))
            },
        ));
        self
    }

    /// Delay before the handler runs for one message
    ///
    /// `draw` is a uniform sample in `[0, 1)`. The result is truncated to
    /// whole milliseconds.
    pub fn delay(&self, draw: f64) -> Duration {
        let ms = (self.shift * 1000.0).max(0.0) + self.random.max(0.0) * 1000.0 * draw;
        Duration::from_millis(ms.floor() as u64)
    }
}
