//! Channel — a single-message mailbox inside a slot.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{SlotError, SlotResult};

/// Caller-chosen channel key. Zero is reserved.
pub type ChannelId = u64;

/// Shared reference to a channel owned by a slot.
pub type ChannelRef = Arc<Channel>;

/// A stored message: 1..=max bytes, no terminator.
///
/// The payload is immutable once built, so handing out clones of the
/// `Bytes` never exposes a partially written buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: Bytes,
    written_at: i64,
}

impl Message {
    /// Copy `data` into a freshly allocated buffer.
    ///
    /// Rejects an empty message with `InvalidArgument` and anything longer
    /// than `max` with `MessageTooLarge`. Allocation is fallible and surfaces
    /// as `OutOfMemory`.
    pub fn copy_from(data: &[u8], max: usize) -> SlotResult<Self> {
        if data.is_empty() {
            return Err(SlotError::InvalidArgument(
                "message must contain at least one byte".to_string(),
            ));
        }
        if data.len() > max {
            return Err(SlotError::MessageTooLarge {
                len: data.len(),
                max,
            });
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(data.len())?;
        buf.extend_from_slice(data);

        Ok(Self {
            payload: Bytes::from(buf),
            written_at: chrono::Utc::now().timestamp_millis(),
        })
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Always false; an empty message is never stored.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Cheap reference-counted copy of the payload.
    pub fn payload(&self) -> Bytes {
        self.payload.clone()
    }

    /// Milliseconds since the Unix epoch when the message was written.
    pub fn written_at(&self) -> i64 {
        self.written_at
    }
}

/// A mailbox holding at most one message.
#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    message: RwLock<Option<Message>>,
}

impl Channel {
    pub(crate) fn new(id: ChannelId) -> Self {
        Self {
            id,
            message: RwLock::new(None),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Whether the channel has ever been written.
    pub fn has_message(&self) -> bool {
        self.message.read().is_some()
    }

    /// Length of the stored message, or 0 when never written.
    pub fn message_len(&self) -> usize {
        self.message.read().as_ref().map_or(0, Message::len)
    }

    /// Timestamp of the last successful write.
    pub fn written_at(&self) -> Option<i64> {
        self.message.read().as_ref().map(Message::written_at)
    }

    /// Install `message`, returning the one it replaced.
    pub(crate) fn replace(&self, message: Message) -> Option<Message> {
        self.message.write().replace(message)
    }

    /// Return the stored payload if it fits in `capacity`.
    pub(crate) fn load(&self, capacity: usize) -> SlotResult<Bytes> {
        let guard = self.message.read();
        let message = guard.as_ref().ok_or(SlotError::NotReady)?;
        if capacity < message.len() {
            return Err(SlotError::BufferTooSmall {
                needed: message.len(),
                capacity,
            });
        }
        Ok(message.payload())
    }

    /// Drop the stored message. Returns the number of bytes released.
    pub(crate) fn clear(&self) -> usize {
        self.message.write().take().map_or(0, |m| m.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_copy() {
        let msg = Message::copy_from(b"hello", 128).unwrap();
        assert_eq!(msg.as_bytes(), b"hello");
        assert_eq!(msg.len(), 5);
        assert!(msg.written_at() > 0);
    }

    #[test]
    fn test_message_rejects_empty() {
        let err = Message::copy_from(b"", 128).unwrap_err();
        assert!(matches!(err, SlotError::InvalidArgument(_)));
    }

    #[test]
    fn test_message_size_bounds() {
        assert!(Message::copy_from(&[b'a'; 128], 128).is_ok());
        let err = Message::copy_from(&[b'a'; 129], 128).unwrap_err();
        assert_eq!(err, SlotError::MessageTooLarge { len: 129, max: 128 });
    }

    #[test]
    fn test_message_keeps_interior_nul() {
        let msg = Message::copy_from(b"a\0b", 128).unwrap();
        assert_eq!(msg.len(), 3);
        assert_eq!(msg.as_bytes(), b"a\0b");
    }

    #[test]
    fn test_channel_starts_empty() {
        let channel = Channel::new(9);
        assert_eq!(channel.id(), 9);
        assert!(!channel.has_message());
        assert_eq!(channel.message_len(), 0);
        assert_eq!(channel.load(128), Err(SlotError::NotReady));
    }

    #[test]
    fn test_channel_replace_and_load() {
        let channel = Channel::new(1);
        assert!(channel
            .replace(Message::copy_from(b"first", 128).unwrap())
            .is_none());
        let old = channel.replace(Message::copy_from(b"second", 128).unwrap());
        assert_eq!(old.unwrap().as_bytes(), b"first");
        assert_eq!(channel.load(128).unwrap(), Bytes::from_static(b"second"));
    }

    #[test]
    fn test_channel_load_too_small() {
        let channel = Channel::new(1);
        channel.replace(Message::copy_from(b"hello", 128).unwrap());
        assert_eq!(
            channel.load(4),
            Err(SlotError::BufferTooSmall {
                needed: 5,
                capacity: 4
            })
        );
        assert_eq!(channel.load(5).unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_channel_clear() {
        let channel = Channel::new(1);
        channel.replace(Message::copy_from(b"abc", 128).unwrap());
        assert_eq!(channel.clear(), 3);
        assert_eq!(channel.clear(), 0);
        assert!(!channel.has_message());
    }
}
