use super::{Error, LeafSet};
use std::collections::BTreeMap;
use tracing::debug;

/// Buffers changes to a [LeafSet] until they are flushed into it.
///
/// A cache captures the leaf count of its backend when created and tracks its own count from then
/// on. Reads consult the cache's modified bytes before the backend. [LeafSet::flush] applies the
/// modified bytes and leaf count to the backend (via [LeafSet::apply_updates]) without flushing
/// the backend itself. Dropping the cache (or calling [LeafSetCache::into_inner]) discards
/// anything not yet flushed.
///
/// The backend is owned by the cache. To layer a cache over a set that must outlive it, pass a
/// mutable reference (every `&mut impl LeafSet` is a [LeafSet]).
pub struct LeafSetCache<B: LeafSet> {
    backend: B,
    overlay: BTreeMap<u64, u8>,
    next_leaf: u64,
}

impl<B: LeafSet> LeafSetCache<B> {
    /// Layer a new cache over `backend`.
    pub fn new(backend: B) -> Self {
        let next_leaf = backend.next_leaf();
        Self {
            backend,
            overlay: BTreeMap::new(),
            next_leaf,
        }
    }

    /// Returns the backend (as it is, without any unflushed changes).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the number of modified bytes that have not yet been flushed.
    pub fn pending(&self) -> usize {
        self.overlay.len()
    }

    /// Discard any unflushed changes and return the backend.
    pub fn into_inner(self) -> B {
        if !self.overlay.is_empty() {
            debug!(discarded = self.overlay.len(), "discarding leaf set cache");
        }
        self.backend
    }
}

impl<B: LeafSet> LeafSet for LeafSetCache<B> {
    fn get_byte(&self, index: u64) -> u8 {
        match self.overlay.get(&index) {
            Some(value) => *value,
            None => self.backend.get_byte(index),
        }
    }

    fn set_byte(&mut self, index: u64, value: u8) {
        self.overlay.insert(index, value);
    }

    fn next_leaf(&self) -> u64 {
        self.next_leaf
    }

    fn set_next_leaf(&mut self, next_leaf: u64) {
        self.next_leaf = next_leaf;
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.backend.apply_updates(self.next_leaf, &self.overlay)?;
        debug!(
            next_leaf = self.next_leaf,
            bytes = self.overlay.len(),
            "flushed leaf set cache"
        );
        self.overlay.clear();
        Ok(())
    }
}
