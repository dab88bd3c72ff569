//! Purpose: Define the seam between this crate and the external pub/sub SDK.
//! Exports: `SubscribeBackend`, `TriggerBackend`, `EventHandler`, `BindingId`.
//! Role: Everything transport-shaped lives behind these traits.
//! Invariants: Backends receive fully derived channel/event names.
//! Invariants: Handlers see raw JSON payloads; typed decode happens above.

use serde_json::Value;

use super::error::Error;

/// Raw payload handler installed on a channel binding.
pub type EventHandler = Box<dyn FnMut(&Value) + Send + 'static>;

/// Identifies one handler binding so it can be removed on its own.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct BindingId(pub(crate) u64);

/// Client-side operations of the external service SDK.
pub trait SubscribeBackend {
    /// Shared handle for a live channel; cloned across subscribers.
    type Channel: Clone;

    fn subscribe(&self, channel: &str) -> Result<Self::Channel, Error>;

    fn bind(
        &self,
        channel: &Self::Channel,
        event: &str,
        handler: EventHandler,
    ) -> Result<BindingId, Error>;

    fn unbind(&self, channel: &Self::Channel, event: &str, binding: BindingId)
    -> Result<(), Error>;

    fn unsubscribe(&self, channel: &str) -> Result<(), Error>;
}

/// Server-side operation of the external service SDK.
pub trait TriggerBackend {
    fn trigger(&self, channel: &str, event: &str, payload: &Value) -> Result<(), Error>;
}
