//! Purpose: Declare typed channel/message schemas as const descriptors.
//! Exports: `ChannelSpec`, `MessageSpec`.
//! Role: Single source of truth tying names to input and payload types.
//! Invariants: Descriptors are zero-sized beyond their static names.
//! Invariants: A message carries its channel's name and input type.

use std::fmt;
use std::marker::PhantomData;

/// A named channel, optionally parameterized by a typed input.
///
/// `CI = ()` declares an unparameterized channel: subscribers and
/// triggers address it by its bare name. Any other `CI` scopes the
/// concrete channel name by the serialized input, so one declaration
/// covers a family of channel instances.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use subwire::api::{ChannelSpec, MessageSpec};
///
/// #[derive(Serialize, Deserialize)]
/// struct RoomInput {
///     room: String,
/// }
///
/// #[derive(Serialize, Deserialize)]
/// struct ChatMessage {
///     from: String,
///     body: String,
/// }
///
/// const CHAT: ChannelSpec<RoomInput> = ChannelSpec::new("chat");
/// const MESSAGE_SENT: MessageSpec<RoomInput, (), ChatMessage> = CHAT.message("message-sent");
/// ```
pub struct ChannelSpec<CI = ()> {
    name: &'static str,
    _input: PhantomData<fn(CI)>,
}

impl<CI> ChannelSpec<CI> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _input: PhantomData,
        }
    }

    /// Declares a message on this channel with message input `MI` and
    /// payload `P`. `MI = ()` declares an unparameterized message.
    pub const fn message<MI, P>(&self, name: &'static str) -> MessageSpec<CI, MI, P> {
        MessageSpec {
            channel: self.name,
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<CI> Clone for ChannelSpec<CI> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<CI> Copy for ChannelSpec<CI> {}

impl<CI> fmt::Debug for ChannelSpec<CI> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSpec").field("name", &self.name).finish()
    }
}

/// A named message on a channel, tying together the channel input,
/// message input, and payload types used by subscribe and trigger.
pub struct MessageSpec<CI, MI, P> {
    channel: &'static str,
    name: &'static str,
    _marker: PhantomData<fn(CI, MI) -> P>,
}

impl<CI, MI, P> MessageSpec<CI, MI, P> {
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn channel(&self) -> &'static str {
        self.channel
    }
}

impl<CI, MI, P> Clone for MessageSpec<CI, MI, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<CI, MI, P> Copy for MessageSpec<CI, MI, P> {}

impl<CI, MI, P> fmt::Debug for MessageSpec<CI, MI, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageSpec")
            .field("channel", &self.channel)
            .field("name", &self.name)
            .finish()
    }
}
