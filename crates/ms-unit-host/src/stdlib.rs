//! Helper library available to every unit
//!
//! Small compositions of `subscribe`, `publish` and timers that cover the
//! most common automations: forwarding a topic, combining several topics into
//! one and switching a target off again after a while.

use ms_automation::SubscribeOptions;
use ms_core::{ApiError, ApiResult, OneOrMany, Payload, PublishOptions};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::api::UnitApi;

/// What [`UnitApi::link`] publishes on the target
#[derive(Clone, Default)]
pub enum LinkValue {
    /// The source value unchanged
    #[default]
    Source,
    /// A fixed value
    Fixed(Value),
    /// The source value transformed
    Map(Arc<dyn Fn(&Payload) -> Value + Send + Sync>),
}

impl LinkValue {
    pub fn map<F>(f: F) -> Self
    where
        F: Fn(&Payload) -> Value + Send + Sync + 'static,
    {
        LinkValue::Map(Arc::new(f))
    }
}

impl fmt::Debug for LinkValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkValue::Source => f.write_str("Source"),
            LinkValue::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            LinkValue::Map(_) => f.write_str("Map(..)"),
        }
    }
}

impl From<Value> for LinkValue {
    fn from(value: Value) -> Self {
        LinkValue::Fixed(value)
    }
}

/// Options of [`UnitApi::timer`]
#[derive(Debug, Clone, PartialEq)]
pub struct TimerOptions {
    /// How long the target stays on after the last trigger
    pub time: Duration,
    pub on_value: Value,
    pub off_value: Value,
}

impl TimerOptions {
    /// Switch between `true` and `false`
    pub fn new(time: Duration) -> Self {
        Self {
            time,
            on_value: Value::Bool(true),
            off_value: Value::Bool(false),
        }
    }

    pub fn with_values(mut self, on_value: impl Into<Value>, off_value: impl Into<Value>) -> Self {
        self.on_value = on_value.into();
        self.off_value = off_value.into();
        self
    }
}

impl UnitApi {
    /// Republish every message on `source` to `target`
    ///
    /// `options` applies to the subscription; its `retain` flag also applies
    /// to the publish.
    pub fn link(
        &self,
        source: impl Into<OneOrMany<String>>,
        target: impl Into<OneOrMany<String>>,
        value: LinkValue,
        options: SubscribeOptions,
    ) -> ApiResult<()> {
        let target = target.into();
        if target.is_empty() {
            return Err(ApiError::TopicMissing);
        }
        let publish = PublishOptions {
            retain: options.retain,
            ..PublishOptions::default()
        };

        let api = self.clone();
        self.subscribe(source, options, move |event| {
            match &value {
                LinkValue::Source => api.publish(target.clone(), &event.value, publish)?,
                LinkValue::Fixed(fixed) => api.publish(target.clone(), fixed, publish)?,
                LinkValue::Map(f) => api.publish(target.clone(), &f(&event.value), publish)?,
            }
            Ok(())
        })
    }

    /// Publish whether any source is truthy
    pub fn combine_any(
        &self,
        sources: impl Into<OneOrMany<String>>,
        target: &str,
    ) -> ApiResult<()> {
        self.combine_any_by(sources, target, |value| value.is_some_and(Payload::is_truthy))
    }

    /// Publish whether `predicate` holds for any source
    pub fn combine_any_by<F>(
        &self,
        sources: impl Into<OneOrMany<String>>,
        target: &str,
        predicate: F,
    ) -> ApiResult<()>
    where
        F: Fn(Option<&Payload>) -> bool + Send + Sync + 'static,
    {
        self.combine_array(sources, target, move |values| {
            Value::Bool(values.iter().any(|value| predicate(value.as_ref())))
        })
    }

    /// Publish whether every source is truthy
    pub fn combine_all(
        &self,
        sources: impl Into<OneOrMany<String>>,
        target: &str,
    ) -> ApiResult<()> {
        self.combine_all_by(sources, target, |value| value.is_some_and(Payload::is_truthy))
    }

    /// Publish whether `predicate` holds for every source
    pub fn combine_all_by<F>(
        &self,
        sources: impl Into<OneOrMany<String>>,
        target: &str,
        predicate: F,
    ) -> ApiResult<()>
    where
        F: Fn(Option<&Payload>) -> bool + Send + Sync + 'static,
    {
        self.combine_array(sources, target, move |values| {
            Value::Bool(values.iter().all(|value| predicate(value.as_ref())))
        })
    }

    /// Publish the largest numeric source value, at least 0
    pub fn combine_max(
        &self,
        sources: impl Into<OneOrMany<String>>,
        target: &str,
    ) -> ApiResult<()> {
        self.combine_array(sources, target, |values| {
            let mut max = 0.0;
            let mut result = Value::from(0);
            for value in values.iter().flatten() {
                if let Some(n) = value.as_f64() {
                    if n > max {
                        max = n;
                        result = value.to_json();
                    }
                }
            }
            result
        })
    }

    /// Publish `reduce` over the current source values now and whenever a
    /// source changes
    ///
    /// Values are passed in source order, `None` for a topic not seen yet.
    pub fn combine_array<F>(
        &self,
        sources: impl Into<OneOrMany<String>>,
        target: &str,
        reduce: F,
    ) -> ApiResult<()>
    where
        F: Fn(&[Option<Payload>]) -> Value + Send + Sync + 'static,
    {
        let sources = sources.into();
        if sources.is_empty() || target.is_empty() {
            return Err(ApiError::TopicMissing);
        }
        let topics = sources.as_slice().to_vec();
        let target = target.to_string();
        let api = self.clone();
        let update = Arc::new(move || -> ApiResult<()> {
            let values: Vec<Option<Payload>> =
                topics.iter().map(|topic| api.get_payload(topic)).collect();
            api.publish(target.as_str(), &reduce(&values), PublishOptions::default())
        });

        update()?;
        self.subscribe(sources, SubscribeOptions::new().retain(), move |_| {
            update()?;
            Ok(())
        })
    }

    /// Switch `target` on while any `source` keeps being truthy
    ///
    /// A truthy message on a source publishes `on_value` (unless the target is
    /// already truthy) and restarts a countdown of `time`; when it runs out a
    /// truthy target is set to `off_value`. The countdown also starts once at
    /// registration.
    pub fn timer(
        &self,
        source: impl Into<OneOrMany<String>>,
        target: &str,
        options: TimerOptions,
    ) -> ApiResult<()> {
        if target.is_empty() {
            return Err(ApiError::TopicMissing);
        }
        let api = self.clone();
        let target_topic = target.to_string();
        let handler_options = options.clone();
        self.subscribe(source, SubscribeOptions::new(), move |event| {
            if !event.value.is_truthy() {
                return Ok(());
            }
            if !api.is_truthy(&target_topic) {
                api.publish(
                    target_topic.as_str(),
                    &handler_options.on_value,
                    PublishOptions::default(),
                )?;
            }
            api.arm_off_timer(&target_topic, &handler_options);
            Ok(())
        })?;

        self.arm_off_timer(target, &options);
        Ok(())
    }

    fn is_truthy(&self, topic: &str) -> bool {
        self.get_payload(topic).is_some_and(|value| value.is_truthy())
    }

    fn arm_off_timer(&self, target: &str, options: &TimerOptions) {
        let api = self.clone();
        let topic = target.to_string();
        let off_value = options.off_value.clone();
        let handle = self.set_timeout(options.time, move || {
            if api.is_truthy(&topic) {
                api.publish(topic.as_str(), &off_value, PublishOptions::default())?;
            }
            Ok(())
        });

        let previous = self
            .helper_timers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(target.to_string(), handle);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }
}
