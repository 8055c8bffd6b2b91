//! mqtt-scripts engine
//!
//! The [`Engine`] wires the broker, state store, dispatcher, schedulers and
//! unit host together and drives the inbound message loop.

mod engine;

pub use engine::Engine;
