//! Channel registry — the process-wide table of slots and their channels.
//!
//! Slots are created lazily on first acquisition and live until
//! [`ChannelRegistry::teardown_all`]. Each slot owns an append-only,
//! insertion-ordered list of channels; each channel owns at most one
//! message.
//!
//! # Locking
//!
//! Three levels of `parking_lot::RwLock`:
//!
//! - the slot table, written only to create a slot or tear everything down
//! - each slot's channel list, written only to append a channel or retire
//!   the slot; held shared for the whole of every read/write
//! - each channel's message, written only to swap in a new message
//!
//! Creation is double-checked under the write lock, so concurrent first use
//! of an identifier produces exactly one record.

pub mod channel;
pub mod slot;
pub mod snapshot;

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub use channel::{Channel, ChannelId, ChannelRef, Message};
pub use slot::{Slot, SlotId, SlotRef};
pub use snapshot::{ChannelSnapshot, RegistrySnapshot, SlotSnapshot};

use crate::config::SlotConfig;
use crate::error::{SlotError, SlotResult};
use crate::session::SlotHandle;

/// Counts of what a teardown released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownReport {
    pub slots: usize,
    pub channels: usize,
    pub bytes: usize,
}

/// Table of slots indexed by slot identifier.
#[derive(Debug)]
pub struct ChannelRegistry {
    config: SlotConfig,
    slots: RwLock<Vec<Option<SlotRef>>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    /// Create an empty registry with the reference sizing.
    pub fn new() -> Self {
        Self::with_config(SlotConfig::default())
    }

    /// Create an empty registry with custom limits.
    pub fn with_config(config: SlotConfig) -> Self {
        Self {
            config,
            slots: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &SlotConfig {
        &self.config
    }

    /// Return the slot for `slot_id`, creating an empty one on first use.
    ///
    /// Fails with `InvalidArgument` when `slot_id` is outside
    /// `0..max_slots`, or `OutOfMemory` when the table cannot grow.
    pub fn acquire_slot(&self, slot_id: SlotId) -> SlotResult<SlotRef> {
        let index = self.index_of(slot_id)?;

        if let Some(slot) = self.slots.read().get(index).and_then(Option::as_ref) {
            log::trace!("reusing slot {}", slot_id);
            return Ok(Arc::clone(slot));
        }

        let mut slots = self.slots.write();
        if let Some(slot) = slots.get(index).and_then(Option::as_ref) {
            return Ok(Arc::clone(slot));
        }

        if slots.len() <= index {
            let additional = index + 1 - slots.len();
            slots.try_reserve(additional)?;
            slots.resize(index + 1, None);
        }
        let slot = Arc::new(Slot::new(slot_id, self.config.max_message_size));
        slots[index] = Some(Arc::clone(&slot));

        log::debug!("created slot {}", slot_id);
        Ok(slot)
    }

    /// Look up a slot without creating it.
    pub fn slot(&self, slot_id: SlotId) -> Option<SlotRef> {
        let index = usize::try_from(slot_id).ok()?;
        self.slots.read().get(index).and_then(|s| s.clone())
    }

    /// Resolve `channel_id` in `slot`, appending a new empty channel if it
    /// has not been seen. Zero is rejected with `InvalidArgument`.
    pub fn find_or_create_channel(&self, slot: &Slot, channel_id: ChannelId) -> SlotResult<ChannelRef> {
        slot.find_or_create_channel(channel_id)
    }

    /// Acquire `slot_id` and return an unbound handle on it.
    pub fn open(&self, slot_id: SlotId) -> SlotResult<SlotHandle> {
        SlotHandle::open(self, slot_id)
    }

    /// Identifiers of every live slot, ascending.
    pub fn slot_ids(&self) -> Vec<SlotId> {
        self.live_slots().iter().map(|s| s.id()).collect()
    }

    /// Number of live slots.
    pub fn slot_count(&self) -> usize {
        self.slots.read().iter().flatten().count()
    }

    /// Capture channel metadata for every live slot.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            max_message_size: self.config.max_message_size,
            max_slots: self.config.max_slots,
            slots: self
                .live_slots()
                .iter()
                .map(|s| SlotSnapshot::capture(s))
                .collect(),
        }
    }

    /// Release every message, channel and slot.
    ///
    /// Holds the slot table exclusively and retires each slot under its own
    /// exclusive lock, so it waits for in-flight operations and none can
    /// start mid-teardown. Handles still referring to a retired slot fail
    /// with `InvalidArgument`. The registry stays usable: a later
    /// acquisition starts from an empty slot.
    pub fn teardown_all(&self) -> TeardownReport {
        let mut slots = self.slots.write();
        let mut report = TeardownReport::default();

        for slot in slots.drain(..).flatten() {
            let (channels, bytes) = slot.retire();
            report.slots += 1;
            report.channels += channels;
            report.bytes += bytes;
        }
        slots.shrink_to_fit();

        log::info!(
            "registry teardown released {} slots, {} channels, {} bytes",
            report.slots,
            report.channels,
            report.bytes
        );
        report
    }

    fn live_slots(&self) -> Vec<SlotRef> {
        self.slots.read().iter().flatten().cloned().collect()
    }

    fn index_of(&self, slot_id: SlotId) -> SlotResult<usize> {
        match usize::try_from(slot_id) {
            Ok(index) if index < self.config.max_slots => Ok(index),
            _ => {
                log::debug!("rejected slot id {}", slot_id);
                Err(SlotError::InvalidArgument(format!(
                    "slot id {} is outside 0..{}",
                    slot_id, self.config.max_slots
                )))
            }
        }
    }
}

static GLOBAL_REGISTRY: Lazy<Arc<ChannelRegistry>> = Lazy::new(|| {
    let config = SlotConfig::from_env().unwrap_or_else(|e| {
        log::warn!("ignoring slot configuration from environment: {}", e);
        SlotConfig::default()
    });
    Arc::new(ChannelRegistry::with_config(config))
});

/// The process-wide registry, sized from the environment on first use.
///
/// `slot_host` serves this registry; independent instances from
/// [`ChannelRegistry::with_config`] do not share state with it.
pub fn global() -> Arc<ChannelRegistry> {
    Arc::clone(&GLOBAL_REGISTRY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_acquire_is_idempotent() {
        let registry = ChannelRegistry::new();
        let a = registry.acquire_slot(1).unwrap();
        let b = registry.acquire_slot(1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.slot_count(), 1);
    }

    #[test]
    fn test_acquire_bounds() {
        let registry = ChannelRegistry::new();
        assert!(registry.acquire_slot(0).is_ok());
        assert!(registry.acquire_slot(255).is_ok());
        let err = registry.acquire_slot(256).unwrap_err();
        assert!(matches!(err, SlotError::InvalidArgument(_)));
        assert_eq!(registry.slot_ids(), vec![0, 255]);
    }

    #[test]
    fn test_table_grows_for_sparse_ids() {
        let registry = ChannelRegistry::new();
        let high = registry.acquire_slot(40).unwrap();
        let low = registry.acquire_slot(7).unwrap();
        let higher = registry.acquire_slot(90).unwrap();
        assert_eq!(registry.slot_ids(), vec![7, 40, 90]);
        assert!(Arc::ptr_eq(&high, &registry.acquire_slot(40).unwrap()));
        assert!(Arc::ptr_eq(&low, &registry.slot(7).unwrap()));
        assert_eq!(higher.id(), 90);
    }

    #[test]
    fn test_acquire_respects_config() {
        let registry = ChannelRegistry::with_config(SlotConfig {
            max_message_size: 8,
            max_slots: 2,
        });
        assert!(registry.acquire_slot(1).is_ok());
        assert!(registry.acquire_slot(2).is_err());
        assert_eq!(registry.acquire_slot(1).unwrap().max_message_size(), 8);
    }

    #[test]
    fn test_slot_lookup_does_not_create() {
        let registry = ChannelRegistry::new();
        assert!(registry.slot(3).is_none());
        registry.acquire_slot(3).unwrap();
        assert!(registry.slot(3).is_some());
        assert!(registry.slot(4).is_none());
    }

    #[test]
    fn test_find_or_create_channel() {
        let registry = ChannelRegistry::new();
        let slot = registry.acquire_slot(1).unwrap();
        let c5 = registry.find_or_create_channel(&slot, 5).unwrap();
        let c5_again = registry.find_or_create_channel(&slot, 5).unwrap();
        assert!(Arc::ptr_eq(&c5, &c5_again));
        assert!(matches!(
            registry.find_or_create_channel(&slot, 0),
            Err(SlotError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_teardown_then_reacquire_starts_empty() {
        let registry = ChannelRegistry::new();
        let mut handle = registry.open(1).unwrap();
        handle.select(5).unwrap();
        handle.write(b"hello").unwrap();
        handle.select(7).unwrap();
        registry.acquire_slot(9).unwrap();

        let report = registry.teardown_all();
        assert_eq!(
            report,
            TeardownReport {
                slots: 2,
                channels: 2,
                bytes: 5
            }
        );
        assert_eq!(registry.slot_count(), 0);

        let fresh = registry.acquire_slot(1).unwrap();
        assert_eq!(fresh.channel_count(), 0);
        assert!(!Arc::ptr_eq(&fresh, handle.slot()));
    }

    #[test]
    fn test_teardown_of_untouched_registry() {
        let registry = ChannelRegistry::new();
        assert_eq!(registry.teardown_all(), TeardownReport::default());
        assert_eq!(registry.teardown_all(), TeardownReport::default());
    }

    #[test]
    fn test_stale_handle_after_teardown() {
        let registry = ChannelRegistry::new();
        let mut handle = registry.open(2).unwrap();
        handle.select(1).unwrap();
        handle.write(b"x").unwrap();
        registry.teardown_all();

        assert!(matches!(handle.read(128), Err(SlotError::InvalidArgument(_))));
        assert!(matches!(handle.write(b"y"), Err(SlotError::InvalidArgument(_))));
        assert!(matches!(handle.select(3), Err(SlotError::InvalidArgument(_))));
    }

    #[test]
    fn test_snapshot() {
        let registry = ChannelRegistry::new();
        let mut handle = registry.open(4).unwrap();
        handle.select(8).unwrap();
        handle.write(b"abc").unwrap();
        handle.select(2).unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.max_message_size, 128);
        assert_eq!(snapshot.slots.len(), 1);
        assert_eq!(snapshot.channel_count(), 2);
        let slot = &snapshot.slots[0];
        assert_eq!(slot.slot_id, 4);
        assert_eq!(slot.channels[0].channel_id, 8);
        assert_eq!(slot.channels[0].message_len, 3);
        assert!(slot.channels[0].written_at.is_some());
        assert_eq!(slot.channels[1].channel_id, 2);
        assert_eq!(slot.channels[1].message_len, 0);
        assert_eq!(slot.channels[1].written_at, None);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["slots"][0]["channels"][0]["channel_id"], 8);
    }

    #[test]
    fn test_concurrent_first_use_creates_one_record() {
        let registry = Arc::new(ChannelRegistry::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let slot = registry.acquire_slot(7).unwrap();
                    for id in 1..=50 {
                        registry.find_or_create_channel(&slot, id).unwrap();
                    }
                    slot
                })
            })
            .collect();

        let slots: Vec<SlotRef> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        for slot in &slots[1..] {
            assert!(Arc::ptr_eq(&slots[0], slot));
        }

        let mut ids = slots[0].channel_ids();
        assert_eq!(ids.len(), 50);
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_global_registry_is_shared() {
        let a = global().acquire_slot(200).unwrap();
        let b = global().acquire_slot(200).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
