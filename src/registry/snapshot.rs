//! Serializable views of registry state for diagnostics.

use serde::{Deserialize, Serialize};

use super::channel::{Channel, ChannelId};
use super::slot::{Slot, SlotId};

/// Point-in-time view of every live slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub max_message_size: usize,
    pub max_slots: usize,
    pub slots: Vec<SlotSnapshot>,
}

impl RegistrySnapshot {
    /// Total number of channels across all slots.
    pub fn channel_count(&self) -> usize {
        self.slots.iter().map(|s| s.channels.len()).sum()
    }
}

/// One slot and its channels in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub slot_id: SlotId,
    pub channels: Vec<ChannelSnapshot>,
}

impl SlotSnapshot {
    pub(crate) fn capture(slot: &Slot) -> Self {
        let channels = slot
            .channels()
            .iter()
            .map(|c| ChannelSnapshot::capture(c))
            .collect();
        Self {
            slot_id: slot.id(),
            channels,
        }
    }
}

/// Metadata for one channel. Message bytes are never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub channel_id: ChannelId,
    /// Stored message length; 0 when never written.
    pub message_len: usize,
    /// Milliseconds since the Unix epoch of the last write.
    pub written_at: Option<i64>,
}

impl ChannelSnapshot {
    pub(crate) fn capture(channel: &Channel) -> Self {
        Self {
            channel_id: channel.id(),
            message_len: channel.message_len(),
            written_at: channel.written_at(),
        }
    }
}
