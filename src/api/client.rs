//! Purpose: Typed subscribe surface over a client-side pub/sub backend.
//! Exports: `Client`, `Subscription`.
//! Role: Derives concrete names, decodes payloads, shares channel handles.
//! Invariants: Live subscriptions to one channel share one backend handle.
//! Invariants: The backend sees one subscribe per channel and one unsubscribe
//! when the last subscription goes away.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::backend::{BindingId, EventHandler, SubscribeBackend};
use crate::core::error::Error;
use crate::core::key::scoped_name;

use super::schema::MessageSpec;

type ApiResult<T> = Result<T, Error>;

/// Typed subscribe client. Cheap to clone; clones share the channel cache.
pub struct Client<B: SubscribeBackend> {
    inner: Arc<ClientInner<B>>,
}

struct ClientInner<B: SubscribeBackend> {
    backend: B,
    channels: Mutex<HashMap<String, ChannelEntry<B::Channel>>>,
}

struct ChannelEntry<C> {
    handle: C,
    subscribers: usize,
}

impl<B: SubscribeBackend> Clone for Client<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B: SubscribeBackend> Client<B> {
    pub fn new(backend: B) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                backend,
                channels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Subscribes `callback` to a declared message.
    ///
    /// Payloads that fail typed decode are logged and skipped; the
    /// subscription stays live for later messages.
    pub fn subscribe<CI, MI, P, F>(
        &self,
        message: &MessageSpec<CI, MI, P>,
        channel_input: &CI,
        message_input: &MI,
        mut callback: F,
    ) -> ApiResult<Subscription<B>>
    where
        CI: Serialize,
        MI: Serialize,
        P: DeserializeOwned,
        F: FnMut(P) + Send + 'static,
    {
        let channel = scoped_name(message.channel(), channel_input)
            .map_err(|err| err.with_channel(message.channel()))?;
        let event = scoped_name(message.name(), message_input)
            .map_err(|err| err.with_channel(channel.clone()).with_event(message.name()))?;

        let handle = self.inner.checkout(&channel)?;

        let decode_channel = channel.clone();
        let decode_event = event.clone();
        let handler: EventHandler = Box::new(move |payload| match P::deserialize(payload) {
            Ok(decoded) => callback(decoded),
            Err(err) => {
                tracing::warn!(
                    channel = %decode_channel,
                    event = %decode_event,
                    error = %err,
                    "dropping payload that failed schema decode"
                );
            }
        });

        let binding = match self.inner.backend.bind(&handle, &event, handler) {
            Ok(binding) => binding,
            Err(err) => {
                self.inner.release(&channel);
                return Err(err);
            }
        };

        Ok(Subscription {
            inner: self.inner.clone(),
            channel,
            event,
            handle,
            binding,
            active: true,
        })
    }
}

impl<B: SubscribeBackend> ClientInner<B> {
    fn lock_channels(&self) -> MutexGuard<'_, HashMap<String, ChannelEntry<B::Channel>>> {
        self.channels
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Returns the shared handle for `channel`, subscribing on first use.
    fn checkout(&self, channel: &str) -> ApiResult<B::Channel> {
        let mut channels = self.lock_channels();
        if let Some(entry) = channels.get_mut(channel) {
            entry.subscribers += 1;
            tracing::debug!(channel, subscribers = entry.subscribers, "sharing channel handle");
            return Ok(entry.handle.clone());
        }

        tracing::debug!(channel, "subscribing channel");
        let handle = self.backend.subscribe(channel)?;
        channels.insert(
            channel.to_string(),
            ChannelEntry {
                handle: handle.clone(),
                subscribers: 1,
            },
        );
        Ok(handle)
    }

    /// Drops one reference to `channel`, unsubscribing on the last.
    fn release(&self, channel: &str) {
        let mut channels = self.lock_channels();
        let Some(entry) = channels.get_mut(channel) else {
            return;
        };
        if entry.subscribers > 1 {
            entry.subscribers -= 1;
            tracing::debug!(channel, subscribers = entry.subscribers, "releasing channel handle");
            return;
        }
        channels.remove(channel);
        tracing::debug!(channel, "unsubscribing channel");
        if let Err(err) = self.backend.unsubscribe(channel) {
            tracing::debug!(channel, error = %err, "backend unsubscribe failed");
        }
    }
}

/// Live binding of one callback. Tears down on drop.
pub struct Subscription<B: SubscribeBackend> {
    inner: Arc<ClientInner<B>>,
    channel: String,
    event: String,
    handle: B::Channel,
    binding: BindingId,
    active: bool,
}

impl<B: SubscribeBackend> Subscription<B> {
    /// Derived channel name this subscription is bound to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Derived event name this subscription is bound to.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Tears down immediately instead of waiting for drop.
    pub fn unsubscribe(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Err(err) = self
            .inner
            .backend
            .unbind(&self.handle, &self.event, self.binding)
        {
            tracing::debug!(channel = %self.channel, event = %self.event, error = %err, "backend unbind failed");
        }
        self.inner.release(&self.channel);
    }
}

impl<B: SubscribeBackend> Drop for Subscription<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::Client;
    use crate::api::schema::{ChannelSpec, MessageSpec};
    use crate::core::backend::TriggerBackend;
    use crate::core::hub::Hub;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Serialize, Deserialize)]
    struct RoomInput {
        room: String,
    }

    #[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
    struct ChatMessage {
        from: String,
        body: String,
    }

    const CHAT: ChannelSpec<RoomInput> = ChannelSpec::new("chat");
    const MESSAGE_SENT: MessageSpec<RoomInput, (), ChatMessage> = CHAT.message("message-sent");

    fn room(name: &str) -> RoomInput {
        RoomInput {
            room: name.to_string(),
        }
    }

    fn sink() -> (Arc<Mutex<Vec<ChatMessage>>>, impl FnMut(ChatMessage) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tap = seen.clone();
        (seen, move |message: ChatMessage| {
            tap.lock().expect("lock").push(message);
        })
    }

    #[test]
    fn subscribers_share_one_backend_subscribe() {
        let hub = Hub::new();
        let client = Client::new(hub.clone());
        let (first_seen, first) = sink();
        let (second_seen, second) = sink();

        let first_sub = client
            .subscribe(&MESSAGE_SENT, &room("lobby"), &(), first)
            .expect("subscribe");
        let _second_sub = client
            .subscribe(&MESSAGE_SENT, &room("lobby"), &(), second)
            .expect("subscribe");

        assert_eq!(hub.subscribe_count(), 1);
        assert_eq!(hub.channel_count(), 1);
        assert_eq!(first_sub.channel(), "chat-{\"room\":\"lobby\"}");
        assert_eq!(first_sub.event(), "message-sent");

        let payload = json!({"from": "ada", "body": "hi"});
        hub.trigger(first_sub.channel(), "message-sent", &payload)
            .expect("trigger");
        assert_eq!(first_seen.lock().expect("lock").len(), 1);
        assert_eq!(second_seen.lock().expect("lock").len(), 1);
    }

    #[test]
    fn last_drop_unsubscribes_the_channel() {
        let hub = Hub::new();
        let client = Client::new(hub.clone());
        let (seen, first) = sink();
        let (_other_seen, second) = sink();

        let first_sub = client
            .subscribe(&MESSAGE_SENT, &room("ops"), &(), first)
            .expect("subscribe");
        let second_sub = client
            .subscribe(&MESSAGE_SENT, &room("ops"), &(), second)
            .expect("subscribe");
        let channel = first_sub.channel().to_string();

        drop(second_sub);
        assert!(hub.has_channel(&channel));
        hub.trigger(&channel, "message-sent", &json!({"from": "ada", "body": "still here"}))
            .expect("trigger");
        assert_eq!(seen.lock().expect("lock").len(), 1);

        drop(first_sub);
        assert!(!hub.has_channel(&channel));
    }

    #[test]
    fn distinct_channel_inputs_use_distinct_channels() {
        let hub = Hub::new();
        let client = Client::new(hub.clone());
        let (_lobby_seen, lobby) = sink();
        let (_ops_seen, ops) = sink();

        let lobby_sub = client
            .subscribe(&MESSAGE_SENT, &room("lobby"), &(), lobby)
            .expect("subscribe");
        let ops_sub = client
            .subscribe(&MESSAGE_SENT, &room("ops"), &(), ops)
            .expect("subscribe");

        assert_ne!(lobby_sub.channel(), ops_sub.channel());
        assert_eq!(hub.subscribe_count(), 2);
        assert_eq!(hub.channel_count(), 2);
    }

    #[test]
    fn decode_failure_skips_callback_and_keeps_subscription() {
        let hub = Hub::new();
        let client = Client::new(hub.clone());
        let (seen, tap) = sink();

        let sub = client
            .subscribe(&MESSAGE_SENT, &room("lobby"), &(), tap)
            .expect("subscribe");

        hub.trigger(sub.channel(), "message-sent", &json!({"unexpected": true}))
            .expect("trigger");
        assert!(seen.lock().expect("lock").is_empty());

        hub.trigger(
            sub.channel(),
            "message-sent",
            &json!({"from": "ada", "body": "recovered"}),
        )
        .expect("trigger");
        let seen = seen.lock().expect("lock");
        assert_eq!(
            seen.as_slice(),
            &[ChatMessage {
                from: "ada".to_string(),
                body: "recovered".to_string(),
            }]
        );
    }

    #[test]
    fn explicit_unsubscribe_releases_once() {
        let hub = Hub::new();
        let client = Client::new(hub.clone());
        let (_seen, tap) = sink();

        let sub = client
            .subscribe(&MESSAGE_SENT, &room("lobby"), &(), tap)
            .expect("subscribe");
        let channel = sub.channel().to_string();

        sub.unsubscribe();
        assert!(!hub.has_channel(&channel));
        assert_eq!(hub.channel_count(), 0);
    }
}
