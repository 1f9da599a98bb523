//! Slot sessions — the per-handle select/read/write protocol.
//!
//! A [`SlotHandle`] starts [`Binding::Unbound`]. Only `select` is legal in
//! that state; it moves the handle to `Bound(channel_id)`, after which reads
//! and writes act on that channel of the handle's slot. `select` may be
//! issued again at any time to rebind. Dropping the handle discards the
//! binding and nothing else.
//!
//! # Example
//!
//! ```
//! use message_slot::registry::ChannelRegistry;
//!
//! let registry = ChannelRegistry::new();
//! let mut handle = registry.open(1).unwrap();
//! handle.select(5).unwrap();
//! handle.write(b"hello").unwrap();
//! assert_eq!(&handle.read(128).unwrap()[..], b"hello");
//! ```

use std::io::{Read, Write};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{SlotError, SlotResult};
use crate::registry::{ChannelId, ChannelRegistry, Message, SlotId, SlotRef};

/// Up-front buffer reservation for [`SlotHandle::write_from`]; larger
/// messages grow the buffer as they are read.
const STREAM_RESERVE: usize = 4096;

/// Which channel, if any, a handle operates on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "channel_id", rename_all = "snake_case")]
pub enum Binding {
    #[default]
    Unbound,
    Bound(ChannelId),
}

/// A caller's session on one slot.
#[derive(Debug, Clone)]
pub struct SlotHandle {
    slot: SlotRef,
    binding: Binding,
}

impl SlotHandle {
    /// Acquire `slot_id` in `registry` and return an unbound handle.
    pub fn open(registry: &ChannelRegistry, slot_id: SlotId) -> SlotResult<Self> {
        let slot = registry.acquire_slot(slot_id)?;
        Ok(Self::from_slot(slot))
    }

    /// Wrap an already acquired slot.
    pub fn from_slot(slot: SlotRef) -> Self {
        Self {
            slot,
            binding: Binding::Unbound,
        }
    }

    pub fn slot(&self) -> &SlotRef {
        &self.slot
    }

    pub fn slot_id(&self) -> SlotId {
        self.slot.id()
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.binding, Binding::Bound(_))
    }

    /// Bind this handle to `channel_id`, creating the channel on first use.
    ///
    /// The binding is left unchanged when this fails.
    pub fn select(&mut self, channel_id: ChannelId) -> SlotResult<()> {
        self.slot.find_or_create_channel(channel_id)?;
        self.binding = Binding::Bound(channel_id);
        log::trace!("slot {}: handle bound to channel {}", self.slot.id(), channel_id);
        Ok(())
    }

    /// Replace the bound channel's message with `data`.
    ///
    /// The new buffer is built before the channel is locked; on any error
    /// the previous message stays in place. Returns the number of bytes
    /// accepted.
    pub fn write(&self, data: &[u8]) -> SlotResult<usize> {
        let channel_id = self.bound_channel()?;
        let message = Message::copy_from(data, self.slot.max_message_size()).map_err(|e| {
            log::debug!(
                "slot {}: rejected write of {} bytes to channel {}: {}",
                self.slot.id(),
                data.len(),
                channel_id,
                e
            );
            e
        })?;

        let len = message.len();
        self.slot.with_channel(channel_id, |channel| {
            channel.replace(message);
            Ok(len)
        })
    }

    /// Write a message pulled from a caller-supplied stream.
    ///
    /// At most `max_message_size + 1` bytes are read, so an oversized stream
    /// reports a `len` one past the maximum rather than its full length. A
    /// stream error is `IoFailure` and leaves the stored message intact.
    pub fn write_from(&self, reader: impl Read) -> SlotResult<usize> {
        self.bound_channel()?;
        let limit = self.slot.max_message_size().saturating_add(1);

        let mut buf = Vec::new();
        buf.try_reserve(limit.min(STREAM_RESERVE))?;
        reader
            .take(limit as u64)
            .read_to_end(&mut buf)
            .map_err(|e| SlotError::IoFailure(e.to_string()))?;

        self.write(&buf)
    }

    /// Return the bound channel's message if it fits in `capacity`.
    ///
    /// Never blocks: an unwritten channel is `NotReady`. A short capacity is
    /// `BufferTooSmall` and leaves the message in place. Reading does not
    /// consume the message.
    pub fn read(&self, capacity: usize) -> SlotResult<Bytes> {
        let channel_id = self.bound_channel()?;
        if capacity == 0 {
            return Err(SlotError::InvalidArgument(
                "read capacity must be at least one byte".to_string(),
            ));
        }
        self.slot
            .with_channel(channel_id, |channel| channel.load(capacity))
    }

    /// Copy the message into `buf`, using its length as the capacity.
    pub fn read_into(&self, buf: &mut [u8]) -> SlotResult<usize> {
        let message = self.read(buf.len())?;
        buf[..message.len()].copy_from_slice(&message);
        Ok(message.len())
    }

    /// Read the message and hand it to a caller-supplied sink.
    ///
    /// A sink error is `IoFailure`; the stored message is unaffected.
    pub fn read_to(&self, capacity: usize, mut writer: impl Write) -> SlotResult<usize> {
        let message = self.read(capacity)?;
        writer
            .write_all(&message)
            .and_then(|_| writer.flush())
            .map_err(|e| SlotError::IoFailure(e.to_string()))?;
        Ok(message.len())
    }

    fn bound_channel(&self) -> SlotResult<ChannelId> {
        match self.binding {
            Binding::Bound(channel_id) => Ok(channel_id),
            Binding::Unbound => Err(SlotError::NotBound),
        }
    }
}
