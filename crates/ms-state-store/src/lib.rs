//! Topic state storage for mqtt-scripts
//!
//! This crate provides the [`TopicStateStore`], the process-wide cache of the
//! last decoded payload seen on every topic. Entries are created on the first
//! message for a topic, overwritten on every later message and never removed.

use dashmap::DashMap;
use ms_core::{topic, Payload};
use serde_json::Value;
use tracing::trace;

/// Last-value cache keyed by concrete topic
#[derive(Default)]
pub struct TopicStateStore {
    states: DashMap<String, Payload>,
}

impl TopicStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the value for a topic, returning the previous one
    ///
    /// The write is unconditional; an unchanged value is still written.
    pub fn set(&self, topic: impl Into<String>, value: Payload) -> Option<Payload> {
        let topic = topic.into();
        trace!(topic = %topic, "Updating topic state");
        self.states.insert(topic, value)
    }

    /// Current value of a topic
    pub fn get(&self, topic: &str) -> Option<Payload> {
        self.states.get(topic).map(|v| v.clone())
    }

    /// Nested property of a topic's value
    ///
    /// Returns `None` when the topic is unknown or any step of the path is
    /// missing.
    pub fn get_path<S: AsRef<str>>(&self, topic: &str, path: &[S]) -> Option<Value> {
        self.states.get(topic).and_then(|v| v.get_path(path))
    }

    /// Whether a value has been seen for a topic
    pub fn contains(&self, topic: &str) -> bool {
        self.states.contains_key(topic)
    }

    /// All cached topics matching a subscription pattern, sorted by topic
    pub fn matching(&self, pattern: &str) -> Vec<(String, Payload)> {
        let mut entries: Vec<(String, Payload)> = self
            .states
            .iter()
            .filter(|entry| topic::matches(entry.key(), pattern))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// All known topics
    pub fn topics(&self) -> Vec<String> {
        self.states.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
