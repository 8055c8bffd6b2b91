//! The API bound to one automation unit
//!
//! Every registration made through a [`UnitApi`] carries the unit's
//! [`UnitDomain`], so its handlers, conditions and timers run inside the
//! unit's isolation boundary.

use dashmap::DashMap;
use ms_automation::{Dispatcher, SubscribeOptions};
use ms_bus::Publisher;
use ms_core::{
    ApiResult, HandlerResult, OneOrMany, Payload, PublishOptions, TopicEvent, UnitDomain,
};
use ms_scheduler::{IntoPatterns, JobHandle, ScheduleOptions, TimeScheduler};
use ms_solar::{SolarScheduler, SunOptions};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::ModuleResult;
use crate::logger::UnitLogger;
use crate::modules::{Module, ModuleCache};

/// Values shared by every unit of a host
pub type Globals = DashMap<String, Value>;

/// Engine services shared by every unit
pub struct HostContext {
    pub dispatcher: Arc<Dispatcher>,
    pub time: Arc<TimeScheduler>,
    pub solar: Arc<SolarScheduler>,
    pub publisher: Publisher,
    pub modules: Arc<ModuleCache>,
    pub globals: Arc<Globals>,
}

/// The API a unit uses to register handlers and publish
#[derive(Clone)]
pub struct UnitApi {
    context: Arc<HostContext>,
    domain: UnitDomain,
    log: UnitLogger,
    location: Option<PathBuf>,
    pub(crate) helper_timers: Arc<Mutex<HashMap<String, JobHandle>>>,
}

impl UnitApi {
    pub fn new(context: Arc<HostContext>, domain: UnitDomain, location: Option<PathBuf>) -> Self {
        let log = UnitLogger::new(domain.name());
        Self {
            context,
            domain,
            log,
            location,
            helper_timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn name(&self) -> &str {
        self.domain.name()
    }

    pub fn domain(&self) -> &UnitDomain {
        &self.domain
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn log(&self) -> &UnitLogger {
        &self.log
    }

    /// The store shared by all units of this host
    pub fn global(&self) -> &Globals {
        &self.context.globals
    }

    /// Run `handler` for messages on one or more topic patterns
    pub fn subscribe<F>(
        &self,
        topics: impl Into<OneOrMany<String>>,
        options: SubscribeOptions,
        handler: F,
    ) -> ApiResult<()>
    where
        F: Fn(TopicEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.context
            .dispatcher
            .subscribe(&self.domain, topics, options, Arc::new(handler))
    }

    /// Run `handler` on cron expressions, dates or recurrence rules
    pub fn schedule<F>(
        &self,
        patterns: impl IntoPatterns,
        options: ScheduleOptions,
        handler: F,
    ) -> ApiResult<Vec<JobHandle>>
    where
        F: Fn() -> HandlerResult + Send + Sync + 'static,
    {
        self.context
            .time
            .schedule(&self.domain, patterns, options, Arc::new(handler))
    }

    /// Run `handler` on named solar events
    pub fn sun_schedule<F>(
        &self,
        events: impl Into<OneOrMany<String>>,
        options: SunOptions,
        handler: F,
    ) -> ApiResult<()>
    where
        F: Fn() -> HandlerResult + Send + Sync + 'static,
    {
        self.context
            .solar
            .sun_schedule(&self.domain, events, options, Arc::new(handler))
    }

    /// Publish a payload; strings are sent as-is, other values as JSON
    pub fn publish<P: Serialize + ?Sized>(
        &self,
        topics: impl Into<OneOrMany<String>>,
        payload: &P,
        options: PublishOptions,
    ) -> ApiResult<()> {
        self.context.publisher.publish(topics, payload, options)
    }

    /// The last value seen on a topic
    pub fn get_payload(&self, topic: &str) -> Option<Payload> {
        self.context.dispatcher.states().get(topic)
    }

    /// A nested property of the last value seen on a topic
    pub fn get_prop<S: AsRef<str>>(&self, topic: &str, path: &[S]) -> Option<Value> {
        self.context.dispatcher.states().get_path(topic, path)
    }

    /// Milliseconds since the Unix epoch
    pub fn now(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Run `callback` once after `delay`
    pub fn set_timeout<F>(&self, delay: Duration, callback: F) -> JobHandle
    where
        F: FnOnce() -> HandlerResult + Send + 'static,
    {
        let task = self.domain.spawn("setTimeout", async move {
            tokio::time::sleep(delay).await;
            callback()
        });
        JobHandle::new(task.abort_handle())
    }

    /// Run `callback` every `period`, first after one period
    pub fn set_interval<F>(&self, period: Duration, callback: F) -> JobHandle
    where
        F: Fn() -> HandlerResult + Send + 'static,
    {
        let domain = self.domain.clone();
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticks = tokio::time::interval_at(start, period.max(Duration::from_millis(1)));
            loop {
                ticks.tick().await;
                domain.run("setInterval", &callback);
            }
        });
        JobHandle::new(task.abort_handle())
    }

    /// Cancel a timeout, interval or schedule before it fires
    pub fn clear_timer(&self, timer: &JobHandle) {
        timer.cancel();
    }

    /// Run a future inside the unit's boundary
    pub fn spawn<Fut>(&self, future: Fut) -> JobHandle
    where
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let task = self.domain.spawn("spawn", future);
        JobHandle::new(task.abort_handle())
    }

    /// Load a module relative to this unit, or a named host module
    pub fn require(&self, id: &str) -> ModuleResult<Arc<Module>> {
        self.context
            .modules
            .require(id, self.location.as_deref())
            .map_err(|e| {
                self.log.error(format_args!("require '{}' failed: {}", id, e));
                e
            })
    }
}
