//! Inbound message dispatch
//!
//! Every inbound message is decoded, cached in the state store and offered to
//! each subscription in registration order. A subscription's handler runs if
//! the topic matches its pattern, the retain flag is acceptable, the condition
//! holds and, with `change`, the value differs from the cached one. Each
//! handler runs as its own task after the subscription's delay.

use ms_core::{
    topic, validate_delay, ApiError, ApiResult, InboundMessage, OneOrMany, Payload, TopicEvent,
    TopicHandler, UnitDomain,
};
use ms_state_store::TopicStateStore;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::condition::ConditionEngine;
use crate::options::SubscribeOptions;
use crate::subscription::{Subscription, SubscriptionRegistry};

/// Routes inbound messages to unit subscriptions
pub struct Dispatcher {
    states: Arc<TopicStateStore>,
    registry: SubscriptionRegistry,
    conditions: ConditionEngine,
}

impl Dispatcher {
    pub fn new(states: Arc<TopicStateStore>) -> Self {
        Self {
            states,
            registry: SubscriptionRegistry::new(),
            conditions: ConditionEngine::new(),
        }
    }

    /// The value cache fed by [`dispatch`](Self::dispatch)
    pub fn states(&self) -> &Arc<TopicStateStore> {
        &self.states
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    /// Register `handler` on one or more topic patterns
    ///
    /// Arguments are validated before anything is registered. With `retain`,
    /// values already cached for a pattern are replayed to the handler right
    /// away, without an old value.
    pub fn subscribe(
        &self,
        domain: &UnitDomain,
        patterns: impl Into<OneOrMany<String>>,
        options: SubscribeOptions,
        handler: TopicHandler,
    ) -> ApiResult<()> {
        let patterns = patterns.into();
        if patterns.is_empty() || patterns.as_slice().iter().any(String::is_empty) {
            return Err(ApiError::TopicMissing);
        }
        if !options.shift.is_finite() {
            return Err(ApiError::InvalidDelay {
                option: "shift",
                value: options.shift,
            });
        }
        validate_delay("random", options.random)?;
        if let Some(condition) = &options.condition {
            self.conditions.validate(condition)?;
        }

        for pattern in patterns {
            debug!(unit = %domain.name(), pattern = %pattern, "Subscribing");
            let subscription = self.registry.add(Subscription {
                pattern,
                options: options.clone(),
                handler: handler.clone(),
                domain: domain.clone(),
            });
            if subscription.options.retain {
                self.replay(&subscription);
            }
        }
        Ok(())
    }

    fn replay(&self, subscription: &Subscription) {
        let cached = if topic::is_wildcard(&subscription.pattern) {
            self.states.matching(&subscription.pattern)
        } else {
            self.states
                .get(&subscription.pattern)
                .map(|value| vec![(subscription.pattern.clone(), value)])
                .unwrap_or_default()
        };

        for (topic, value) in cached {
            trace!(unit = %subscription.domain.name(), topic = %topic, "Replaying cached value");
            let event = TopicEvent::new(topic, value, None);
            subscription
                .domain
                .run("subscribe", || (subscription.handler)(event));
        }
    }

    /// Cache an inbound message and start every matching handler
    ///
    /// Returns the number of handlers started.
    pub fn dispatch(&self, message: InboundMessage) -> usize {
        let value = Payload::decode(&message.payload);
        let old = self.states.set(message.topic.clone(), value.clone());

        let mut started = 0;
        for subscription in self.registry.snapshot() {
            if !topic::matches(&message.topic, &subscription.pattern) {
                continue;
            }
            if message.retain && !subscription.options.retain {
                continue;
            }
            if !self.condition_holds(&subscription, &message.topic, &value, old.as_ref()) {
                continue;
            }
            if subscription.options.change && old.as_ref() == Some(&value) {
                continue;
            }

            let delay = subscription.options.delay(rand::random::<f64>());
            let handler = subscription.handler.clone();
            let event = TopicEvent::new(message.topic.clone(), value.clone(), old.clone());
            trace!(
                unit = %subscription.domain.name(),
                pattern = %subscription.pattern,
                topic = %message.topic,
                delay_ms = delay.as_millis() as u64,
                "Starting handler"
            );
            subscription.domain.spawn("subscribe", async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                handler(event)
            });
            started += 1;
        }
        started
    }

    fn condition_holds(
        &self,
        subscription: &Subscription,
        topic: &str,
        value: &Payload,
        old: Option<&Payload>,
    ) -> bool {
        let Some(condition) = &subscription.options.condition else {
            return true;
        };
        subscription
            .domain
            .eval("condition", || {
                self.conditions
                    .evaluate(condition, topic, value, old)
                    .map_err(anyhow::Error::from)
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ms_core::HandlerResult;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio_test::assert_ok;

    fn handler(f: impl Fn(TopicEvent) -> HandlerResult + Send + Sync + 'static) -> TopicHandler {
        Arc::new(f)
    }

    fn recorder() -> (Arc<Mutex<Vec<TopicEvent>>>, TopicHandler) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let h = handler(move |event| {
            sink.lock().unwrap().push(event);
            Ok(())
        });
        (seen, h)
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(TopicStateStore::new()))
    }

    #[test]
    fn test_subscribe_validation() {
        let dispatcher = dispatcher();
        let domain = UnitDomain::new("validation");
        let (_, h) = recorder();

        assert_eq!(
            dispatcher.subscribe(&domain, Vec::<String>::new(), SubscribeOptions::new(), h.clone()),
            Err(ApiError::TopicMissing)
        );
        assert_eq!(
            dispatcher.subscribe(&domain, "", SubscribeOptions::new(), h.clone()),
            Err(ApiError::TopicMissing)
        );
        assert_eq!(
            dispatcher.subscribe(&domain, "a", SubscribeOptions::new().condition("a\nb"), h.clone()),
            Err(ApiError::MultiLineCondition)
        );
        assert!(matches!(
            dispatcher.subscribe(&domain, "a", SubscribeOptions::new().random(-1.0), h.clone()),
            Err(ApiError::InvalidDelay { option: "random", .. })
        ));
        assert!(matches!(
            dispatcher.subscribe(&domain, "a", SubscribeOptions::new().shift(f64::NAN), h),
            Err(ApiError::InvalidDelay { option: "shift", .. })
        ));
        assert_eq!(dispatcher.subscription_count(), 0);
    }

    #[test]
    fn test_topic_list_fans_out() {
        let dispatcher = dispatcher();
        let domain = UnitDomain::new("fanout");
        let (_, h) = recorder();
        assert_ok!(dispatcher.subscribe(&domain, ["a", "b/+"], SubscribeOptions::new(), h));
        assert_eq!(dispatcher.subscription_count(), 2);
    }

    #[test]
    fn test_replay_literal_and_wildcard() {
        let dispatcher = dispatcher();
        let domain = UnitDomain::new("replay");
        dispatcher
            .states()
            .set("x/1", Payload::Json(json!(1)));
        dispatcher
            .states()
            .set("x/2", Payload::Json(json!(2)));

        let (seen, h) = recorder();
        dispatcher
            .subscribe(&domain, "x/1", SubscribeOptions::new().retain(), h)
            .unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![TopicEvent::new("x/1", Payload::Json(json!(1)), None)]
        );

        let (seen, h) = recorder();
        dispatcher
            .subscribe(&domain, "x/+", SubscribeOptions::new().retain(), h)
            .unwrap();
        let topics: Vec<String> = seen.lock().unwrap().iter().map(|e| e.topic.clone()).collect();
        assert_eq!(topics, vec!["x/1", "x/2"]);
    }

    #[test]
    fn test_no_replay_without_retain() {
        let dispatcher = dispatcher();
        let domain = UnitDomain::new("noreplay");
        dispatcher.states().set("x", Payload::Json(json!(1)));

        let (seen, h) = recorder();
        dispatcher
            .subscribe(&domain, "x", SubscribeOptions::new(), h)
            .unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_caches_without_subscribers() {
        let dispatcher = dispatcher();
        let started = dispatcher.dispatch(InboundMessage::new("a/b", "21.5", false));
        assert_eq!(started, 0);
        assert_eq!(
            dispatcher.states().get("a/b"),
            Some(Payload::Json(json!(21.5)))
        );
    }

    #[tokio::test]
    async fn test_retained_messages_filtered() {
        let dispatcher = dispatcher();
        let plain = UnitDomain::new("plain");
        let retaining = UnitDomain::new("retaining");
        let (_, h1) = recorder();
        let (_, h2) = recorder();
        dispatcher
            .subscribe(&plain, "t", SubscribeOptions::new(), h1)
            .unwrap();
        dispatcher
            .subscribe(&retaining, "t", SubscribeOptions::new().retain(), h2)
            .unwrap();

        assert_eq!(dispatcher.dispatch(InboundMessage::new("t", "1", true)), 1);
        assert_eq!(dispatcher.dispatch(InboundMessage::new("t", "2", false)), 2);
    }

    #[tokio::test]
    async fn test_condition_error_is_contained() {
        let dispatcher = dispatcher();
        let domain = UnitDomain::new("faulty");
        let (_, h) = recorder();
        dispatcher
            .subscribe(
                &domain,
                "t",
                SubscribeOptions::new().condition("no_such_function(state)"),
                h,
            )
            .unwrap();

        assert_eq!(dispatcher.dispatch(InboundMessage::new("t", "1", false)), 0);
        assert_eq!(domain.error_count(), 1);
    }
}
