//! Token to posting cache shared by concurrent queries.
//!
//! Readers take the shared lock and never reorder entries; a lookup only
//! sets the entry's referenced bit. Writers take the exclusive lock. Once
//! the cache is full it doubles its capacity up to the configured maximum,
//! after which it evicts in insertion order, giving referenced entries a
//! second chance.

use crate::index::postings::Posting;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct Slot {
    posting: Posting,
    referenced: AtomicBool,
}

type SlotMap = LruCache<Box<[u8]>, Slot, ahash::RandomState>;

pub struct IndexResultCache {
    slots: RwLock<SlotMap>,
    max_entries: NonZeroUsize,
}

impl IndexResultCache {
    pub fn new(initial_capacity: usize, max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        let initial = NonZeroUsize::new(initial_capacity.clamp(1, max_entries.get()))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: RwLock::new(LruCache::with_hasher(initial, ahash::RandomState::new())),
            max_entries,
        }
    }

    // A panicking writer leaves the map consistent, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, SlotMap> {
        self.slots.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SlotMap> {
        self.slots.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, token: &[u8]) -> Option<Posting> {
        let slots = self.read();
        slots.peek(token).map(|slot| {
            slot.referenced.store(true, Ordering::Relaxed);
            slot.posting
        })
    }

    /// Insert or update the posting for `token`
    pub fn put(&self, token: &[u8], size: u32, pointer: u64) -> Posting {
        let posting = Posting { size, pointer };
        let mut slots = self.write();

        if let Some(slot) = slots.peek_mut(token) {
            slot.posting = posting;
            slot.referenced.store(true, Ordering::Relaxed);
            return posting;
        }

        if slots.len() == slots.cap().get() {
            if slots.cap() < self.max_entries {
                let grown = NonZeroUsize::new(slots.cap().get().saturating_mul(2))
                    .unwrap_or(self.max_entries)
                    .min(self.max_entries);
                log::debug!("Growing index result cache to {} entries", grown);
                slots.resize(grown);
            } else {
                Self::evict_one(&mut slots);
            }
        }

        slots.push(
            token.into(),
            Slot {
                posting,
                referenced: AtomicBool::new(false),
            },
        );
        posting
    }

    /// Pop the oldest unreferenced entry, clearing reference bits on the way
    fn evict_one(slots: &mut SlotMap) {
        while let Some((key, slot)) = slots.pop_lru() {
            if !slot.referenced.swap(false, Ordering::Relaxed) {
                return;
            }
            slots.push(key, slot);
        }
    }

    pub fn invalidate(&self, token: &[u8]) {
        self.write().pop(token);
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.read().cap().get()
    }
}
