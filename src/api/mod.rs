//! Purpose: Define the stable public Rust API boundary for subwire.
//! Exports: Schema descriptors, typed client/server, backend seams, hub.
//! Role: Public, additive-only surface; hides internal naming/cache modules.
//! Invariants: This module is the only public path to core primitives.
//! Invariants: Internal modules remain private and are not directly exposed.

mod client;
mod remote;
mod schema;
mod server;

pub use crate::core::backend::{BindingId, EventHandler, SubscribeBackend, TriggerBackend};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::hub::{Hub, HubChannel};
pub use client::{Client, Subscription};
pub use remote::RemoteTrigger;
pub use schema::{ChannelSpec, MessageSpec};
pub use server::Server;
