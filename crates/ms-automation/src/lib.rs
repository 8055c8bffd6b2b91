//! Topic subscriptions for mqtt-scripts
//!
//! This crate provides:
//! - [`SubscribeOptions`]: shift/random delays, change detection, retain handling
//! - [`Condition`] and [`ConditionEngine`]: predicate and expression filters
//! - [`Dispatcher`]: caches every inbound value and fans it out to matching
//!   subscriptions, each handler running inside its unit's domain

mod condition;
mod dispatcher;
mod options;
mod subscription;

pub use condition::{Condition, ConditionEngine, Predicate};
pub use dispatcher::Dispatcher;
pub use options::SubscribeOptions;
pub use subscription::{Subscription, SubscriptionRegistry};
