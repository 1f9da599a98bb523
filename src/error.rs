//! Error types for slot and channel operations.
//!
//! Every operation reports failure synchronously through [`SlotError`].
//! Each variant carries the errno the character-device driver would have
//! returned, and a stable snake_case `kind` used on the host wire.

use thiserror::Error;

/// `EIO`
pub const EIO: i32 = 5;
/// `ENOMEM`
pub const ENOMEM: i32 = 12;
/// `EINVAL`
pub const EINVAL: i32 = 22;
/// `ENOSPC`
pub const ENOSPC: i32 = 28;
/// `EWOULDBLOCK` (alias of `EAGAIN` on Linux)
pub const EWOULDBLOCK: i32 = 11;
/// `EMSGSIZE`
pub const EMSGSIZE: i32 = 90;

/// Errors raised by the channel registry and slot sessions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlotError {
    /// Malformed, zero or out-of-range identifier, or a bad length.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Read or write issued before a channel was selected.
    #[error("No channel has been selected on this handle")]
    NotBound,

    /// The bound channel has never been written.
    #[error("No message is available on this channel")]
    NotReady,

    /// The caller's capacity is smaller than the stored message.
    #[error("Buffer too small: message is {needed} bytes, capacity is {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// The message exceeds the configured maximum size.
    #[error("Message too large: {len} bytes exceeds the maximum of {max}")]
    MessageTooLarge { len: usize, max: usize },

    /// Allocation for a slot, channel or message buffer failed.
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// Bytes could not be transferred across the caller boundary.
    #[error("I/O failure: {0}")]
    IoFailure(String),
}

impl SlotError {
    /// Errno the driver reports for this condition.
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) | Self::NotBound => EINVAL,
            Self::NotReady => EWOULDBLOCK,
            Self::BufferTooSmall { .. } => ENOSPC,
            Self::MessageTooLarge { .. } => EMSGSIZE,
            Self::OutOfMemory(_) => ENOMEM,
            Self::IoFailure(_) => EIO,
        }
    }

    /// Stable identifier for this error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotBound => "not_bound",
            Self::NotReady => "not_ready",
            Self::BufferTooSmall { .. } => "buffer_too_small",
            Self::MessageTooLarge { .. } => "message_too_large",
            Self::OutOfMemory(_) => "out_of_memory",
            Self::IoFailure(_) => "io_failure",
        }
    }

    /// Rebuild an error from its wire `kind` and accompanying fields.
    ///
    /// Returns `None` for an unknown kind.
    pub fn from_kind(kind: &str, detail: &str, needed: usize, limit: usize) -> Option<Self> {
        let err = match kind {
            "invalid_argument" => Self::InvalidArgument(detail.to_string()),
            "not_bound" => Self::NotBound,
            "not_ready" => Self::NotReady,
            "buffer_too_small" => Self::BufferTooSmall {
                needed,
                capacity: limit,
            },
            "message_too_large" => Self::MessageTooLarge {
                len: needed,
                max: limit,
            },
            "out_of_memory" => Self::OutOfMemory(detail.to_string()),
            "io_failure" => Self::IoFailure(detail.to_string()),
            _ => return None,
        };
        Some(err)
    }

    /// The `(needed, limit)` pair carried by size-related variants.
    pub fn sizes(&self) -> (usize, usize) {
        match self {
            Self::BufferTooSmall { needed, capacity } => (*needed, *capacity),
            Self::MessageTooLarge { len, max } => (*len, *max),
            _ => (0, 0),
        }
    }

    /// Free-form detail carried by message-bearing variants.
    pub fn detail(&self) -> &str {
        match self {
            Self::InvalidArgument(d) | Self::OutOfMemory(d) | Self::IoFailure(d) => d,
            _ => "",
        }
    }
}

impl From<std::collections::TryReserveError> for SlotError {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::OutOfMemory(err.to_string())
    }
}

/// Result alias for slot operations.
pub type SlotResult<T> = Result<T, SlotError>;
