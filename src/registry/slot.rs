//! Slot — an addressable container of channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::channel::{Channel, ChannelId, ChannelRef};
use crate::error::{SlotError, SlotResult};
use crate::INVALID_CHANNEL_ID;

/// Slot identifier, admissible in `0..max_slots`.
pub type SlotId = u32;

/// Shared reference to a slot owned by the registry.
pub type SlotRef = Arc<Slot>;

/// A slot and its append-only channel list.
///
/// Channels are kept in insertion order and are only released all at once,
/// when the registry retires the slot.
#[derive(Debug)]
pub struct Slot {
    id: SlotId,
    max_message_size: usize,
    channels: RwLock<Vec<ChannelRef>>,
    retired: AtomicBool,
}

impl Slot {
    pub(crate) fn new(id: SlotId, max_message_size: usize) -> Self {
        Self {
            id,
            max_message_size,
            channels: RwLock::new(Vec::new()),
            retired: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Largest message accepted by channels of this slot.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Whether the slot was released by a registry teardown.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Channel identifiers in insertion order.
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.read().iter().map(|c| c.id()).collect()
    }

    /// Channels in insertion order.
    pub fn channels(&self) -> Vec<ChannelRef> {
        self.channels.read().clone()
    }

    /// Look up a channel without creating it.
    pub fn find_channel(&self, channel_id: ChannelId) -> Option<ChannelRef> {
        find(&self.channels.read(), channel_id).cloned()
    }

    /// Return the channel with `channel_id`, appending a new empty one if
    /// this is its first use.
    pub(crate) fn find_or_create_channel(&self, channel_id: ChannelId) -> SlotResult<ChannelRef> {
        if channel_id == INVALID_CHANNEL_ID {
            return Err(SlotError::InvalidArgument(format!(
                "channel id {} is reserved",
                INVALID_CHANNEL_ID
            )));
        }

        {
            let channels = self.channels.read();
            self.ensure_live()?;
            if let Some(channel) = find(&channels, channel_id) {
                return Ok(Arc::clone(channel));
            }
        }

        let mut channels = self.channels.write();
        self.ensure_live()?;
        // Another caller may have appended it between the two locks.
        if let Some(channel) = find(&channels, channel_id) {
            return Ok(Arc::clone(channel));
        }

        channels.try_reserve(1)?;
        let channel = Arc::new(Channel::new(channel_id));
        channels.push(Arc::clone(&channel));

        log::debug!(
            "slot {}: created channel {} ({} channels)",
            self.id,
            channel_id,
            channels.len()
        );
        Ok(channel)
    }

    /// Run `f` against an existing channel while holding the channel list
    /// shared, so teardown cannot interleave with the operation.
    pub(crate) fn with_channel<T>(
        &self,
        channel_id: ChannelId,
        f: impl FnOnce(&Channel) -> SlotResult<T>,
    ) -> SlotResult<T> {
        let channels = self.channels.read();
        self.ensure_live()?;
        let channel: &Channel = find(&channels, channel_id).ok_or_else(|| {
            SlotError::InvalidArgument(format!(
                "channel {} does not exist in slot {}",
                channel_id, self.id
            ))
        })?;
        f(channel)
    }

    /// Mark the slot retired and release every channel and message.
    ///
    /// Returns `(channels, bytes)` released. Retiring twice releases nothing
    /// the second time.
    pub(crate) fn retire(&self) -> (usize, usize) {
        let mut channels = self.channels.write();
        self.retired.store(true, Ordering::Release);

        let mut bytes = 0;
        for channel in channels.iter() {
            bytes += channel.clear();
        }
        let count = channels.len();
        channels.clear();
        channels.shrink_to_fit();
        (count, bytes)
    }

    fn ensure_live(&self) -> SlotResult<()> {
        if self.is_retired() {
            return Err(SlotError::InvalidArgument(format!(
                "slot {} has been torn down",
                self.id
            )));
        }
        Ok(())
    }
}

fn find(channels: &[ChannelRef], channel_id: ChannelId) -> Option<&ChannelRef> {
    channels.iter().find(|c| c.id() == channel_id)
}
