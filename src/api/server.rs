//! Purpose: Typed trigger surface over a server-side pub/sub backend.
//! Exports: `Server`.
//! Role: Validates payloads, derives concrete names, forwards to the backend.
//! Invariants: Payloads go through schema encode before any backend call.
//! Invariants: Backend errors pass through unchanged.

use serde::Serialize;

use crate::core::backend::TriggerBackend;
use crate::core::error::{Error, ErrorKind};
use crate::core::key::scoped_name;

use super::schema::MessageSpec;

type ApiResult<T> = Result<T, Error>;

/// Typed trigger API for one backend (the external service's server
/// SDK, a `RemoteTrigger`, or the in-process hub).
pub struct Server<B: TriggerBackend> {
    backend: B,
}

impl<B: TriggerBackend> Server<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Triggers one declared message with a typed payload.
    pub fn trigger<CI, MI, P>(
        &self,
        message: &MessageSpec<CI, MI, P>,
        channel_input: &CI,
        message_input: &MI,
        payload: &P,
    ) -> ApiResult<()>
    where
        CI: Serialize,
        MI: Serialize,
        P: Serialize,
    {
        let channel = scoped_name(message.channel(), channel_input)
            .map_err(|err| err.with_channel(message.channel()))?;
        let event = scoped_name(message.name(), message_input)
            .map_err(|err| err.with_channel(channel.clone()).with_event(message.name()))?;

        let value = serde_json::to_value(payload).map_err(|err| {
            Error::new(ErrorKind::Schema)
                .with_message("payload failed schema encode")
                .with_channel(channel.clone())
                .with_event(event.clone())
                .with_source(err)
        })?;

        self.backend.trigger(&channel, &event, &value)
    }
}
