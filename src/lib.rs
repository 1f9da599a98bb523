//! # message-slot
//!
//! Multiplexed, connectionless mailboxes. A small number of addressable
//! slots each host any number of channels keyed by a non-zero integer; each
//! channel holds at most one message, overwritten on every write and
//! returned verbatim on every read.
//!
//! The core is the [`registry`] (slots, channels, teardown) and the
//! [`session`] protocol (select, read, write on a handle). The [`server`],
//! [`client`] and [`cli`] modules host a registry in one process and let the
//! `message_sender` / `message_reader` utilities reach it from others.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod session;

pub use config::SlotConfig;
pub use error::{SlotError, SlotResult};
pub use registry::{ChannelId, ChannelRegistry, SlotId, TeardownReport};
pub use session::{Binding, SlotHandle};

/// Largest message a channel accepts in the reference sizing, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 128;

/// Number of admissible slot identifiers in the reference sizing.
pub const MAX_SLOTS: usize = 256;

/// Reserved channel identifier; never a valid channel.
pub const INVALID_CHANNEL_ID: ChannelId = 0;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
