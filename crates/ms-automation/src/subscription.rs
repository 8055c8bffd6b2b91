use ms_core::{TopicHandler, UnitDomain};
use std::sync::{Arc, RwLock};

use crate::options::SubscribeOptions;

/// A handler registered on a topic pattern by a unit
pub struct Subscription {
    pub pattern: String,
    pub options: SubscribeOptions,
    pub handler: TopicHandler,
    pub domain: UnitDomain,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("pattern", &self.pattern)
            .field("unit", &self.domain.name())
            .field("options", &self.options)
            .finish()
    }
}

/// Every subscription of every unit, in registration order
///
/// Registrations are never removed while the engine runs.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, subscription: Subscription) -> Arc<Subscription> {
        let subscription = Arc::new(subscription);
        self.subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(subscription.clone());
        subscription
    }

    /// The current registrations
    ///
    /// Dispatch iterates a snapshot so handlers may subscribe while a message
    /// is being delivered.
    pub fn snapshot(&self) -> Vec<Arc<Subscription>> {
        self.subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
