//! Purpose: In-process pub/sub adapter implementing both backend seams.
//! Exports: `Hub`, `HubChannel`.
//! Role: Loopback stand-in for the external service in tests and demos.
//! Invariants: Dispatch is synchronous on the triggering thread.
//! Invariants: Handlers run outside the registry lock, so a handler may trigger.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::backend::{BindingId, EventHandler, SubscribeBackend, TriggerBackend};
use super::error::{Error, ErrorKind};

#[derive(Clone, Default)]
pub struct Hub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    state: Mutex<HubState>,
    subscribes: AtomicUsize,
    delivered: AtomicUsize,
    dropped: AtomicUsize,
}

#[derive(Default)]
struct HubState {
    channels: HashMap<String, ChannelState>,
    next_binding: u64,
}

#[derive(Default)]
struct ChannelState {
    bindings: HashMap<String, Vec<Binding>>,
}

struct Binding {
    id: BindingId,
    handler: Arc<Mutex<EventHandler>>,
}

/// Shared handle to a live hub channel.
#[derive(Clone)]
pub struct HubChannel {
    name: Arc<str>,
}

impl HubChannel {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `subscribe` calls seen so far.
    pub fn subscribe_count(&self) -> usize {
        self.inner.subscribes.load(Ordering::Relaxed)
    }

    /// Number of handler invocations performed by `trigger`.
    pub fn delivered_count(&self) -> usize {
        self.inner.delivered.load(Ordering::Relaxed)
    }

    /// Number of triggers that found no handler.
    pub fn dropped_count(&self) -> usize {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.lock_state().channels.contains_key(channel)
    }

    pub fn channel_count(&self) -> usize {
        self.lock_state().channels.len()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl SubscribeBackend for Hub {
    type Channel = HubChannel;

    fn subscribe(&self, channel: &str) -> Result<Self::Channel, Error> {
        self.inner.subscribes.fetch_add(1, Ordering::Relaxed);
        let mut state = self.lock_state();
        state.channels.entry(channel.to_string()).or_default();
        Ok(HubChannel {
            name: Arc::from(channel),
        })
    }

    fn bind(
        &self,
        channel: &Self::Channel,
        event: &str,
        handler: EventHandler,
    ) -> Result<BindingId, Error> {
        let mut state = self.lock_state();
        let id = BindingId(state.next_binding);
        state.next_binding += 1;
        let Some(entry) = state.channels.get_mut(channel.name()) else {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message("channel is not subscribed")
                .with_channel(channel.name()));
        };
        entry.bindings.entry(event.to_string()).or_default().push(Binding {
            id,
            handler: Arc::new(Mutex::new(handler)),
        });
        Ok(id)
    }

    fn unbind(
        &self,
        channel: &Self::Channel,
        event: &str,
        binding: BindingId,
    ) -> Result<(), Error> {
        let mut state = self.lock_state();
        if let Some(entry) = state.channels.get_mut(channel.name()) {
            if let Some(bindings) = entry.bindings.get_mut(event) {
                bindings.retain(|bound| bound.id != binding);
                if bindings.is_empty() {
                    entry.bindings.remove(event);
                }
            }
        }
        Ok(())
    }

    fn unsubscribe(&self, channel: &str) -> Result<(), Error> {
        let mut state = self.lock_state();
        state.channels.remove(channel);
        Ok(())
    }
}

impl TriggerBackend for Hub {
    fn trigger(&self, channel: &str, event: &str, payload: &Value) -> Result<(), Error> {
        let handlers: Vec<Arc<Mutex<EventHandler>>> = {
            let state = self.lock_state();
            state
                .channels
                .get(channel)
                .and_then(|entry| entry.bindings.get(event))
                .map(|bindings| bindings.iter().map(|bound| bound.handler.clone()).collect())
                .unwrap_or_default()
        };

        if handlers.is_empty() {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(channel, event, "trigger found no handler");
            return Ok(());
        }

        for handler in &handlers {
            let mut handler = handler.lock().unwrap_or_else(|poison| poison.into_inner());
            (*handler)(payload);
        }
        self.inner.delivered.fetch_add(handlers.len(), Ordering::Relaxed);
        Ok(())
    }
}
