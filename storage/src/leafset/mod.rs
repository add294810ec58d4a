//! Track which leaves of an output MMR are unspent.
//!
//! A leaf set is a bitmap over [LeafIndex]es where bit `b` of byte `i` records whether leaf
//! `8*i + b` is live (created and not yet spent). Its [LeafSet::root] is committed to by every
//! block header, so any node can check that its view of the unspent set matches the chain.
//!
//! # Layers
//!
//! Every layer implements [LeafSet]:
//!
//! * [DurableLeafSet] persists the bitmap in a [mweb_runtime::Blob] (one byte per eight leaves)
//!   and the number of leaves in a [crate::metadata::Metadata] store. Mutations accumulate in
//!   memory until [LeafSet::flush] writes the modified bytes to storage.
//! * [LeafSetCache] buffers mutations over any other [LeafSet] (including another cache).
//!   [LeafSet::flush] on a cache only pushes its changes into the layer below. Dropping a cache
//!   discards its changes.
//!
//! A block is applied against a fresh cache: if the resulting root does not match the header the
//! cache is dropped, otherwise it is flushed into the durable set, which is in turn flushed once the
//! new tip should survive a restart.
//!
//! # Rewind
//!
//! [LeafSet::rewind] restores the bitmap to the moment it held exactly `n` leaves: bits at or beyond
//! `n` are cleared and the caller lists the spent leaves (below `n`) that must be restored. All
//! arguments are validated before anything is modified.
//!
//! # Example
//!
//! ```rust
//! use mweb_runtime::storage::memory;
//! use mweb_storage::{
//!     leafset::{Config, DurableLeafSet, LeafSet, LeafSetCache},
//!     mmr::LeafIndex,
//! };
//!
//! let storage = memory::Storage::default();
//! let config = Config { partition: "leafset".to_string() };
//! let mut leafset = DurableLeafSet::init(storage.clone(), config.clone()).unwrap();
//!
//! // Speculatively add three leaves and spend one
//! let mut cache = LeafSetCache::new(&mut leafset);
//! for i in 0..3 {
//!     cache.add(LeafIndex::new(i).unwrap());
//! }
//! cache.remove(LeafIndex::new(1).unwrap()).unwrap();
//! assert_eq!(cache.get_byte(0), 0b101);
//!
//! // Accept the changes and persist them
//! cache.flush().unwrap();
//! leafset.flush().unwrap();
//!
//! // Recover after a restart
//! let leafset = DurableLeafSet::init(storage, config).unwrap();
//! assert!(leafset.contains(LeafIndex::new(0).unwrap()));
//! assert!(!leafset.contains(LeafIndex::new(1).unwrap()));
//! assert!(leafset.contains(LeafIndex::new(2).unwrap()));
//! ```

use crate::{
    metadata,
    mmr::{self, LeafIndex, MAX_LEAF_INDEX},
};
use mweb_cryptography::{
    sha256::{Digest, Sha256},
    Hasher as _,
};
use mweb_utils::bytes_for_bits;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

mod cache;
mod durable;

pub use cache::LeafSetCache;
pub use durable::DurableLeafSet;

/// Errors that can occur when interacting with a [LeafSet].
#[derive(Debug, Error)]
pub enum Error {
    #[error("runtime error: {0}")]
    Runtime(#[from] mweb_runtime::Error),
    #[error("metadata error: {0}")]
    Metadata(#[from] metadata::Error),
    #[error("corrupt next leaf record: {0}")]
    CorruptNextLeaf(String),
    #[error("corrupt flush journal: {0}")]
    CorruptJournal(String),
    #[error("mmr error: {0}")]
    Mmr(#[from] mmr::Error),
    #[error("leaf count {0} exceeds the maximum number of leaves")]
    NextLeafOutOfRange(u64),
    #[error("leaf {leaf} has not been added (next leaf is {next_leaf})")]
    LeafBeyondTip { leaf: u64, next_leaf: u64 },
    #[error("cannot rewind to {target} leaves (only {next_leaf} exist)")]
    RewindBeyondTip { target: u64, next_leaf: u64 },
    #[error("cannot restore leaf {leaf} when rewinding to {target} leaves")]
    RewindLeafNotBelowTarget { leaf: u64, target: u64 },
}

impl Error {
    /// Returns true if the error was caused by addressing a leaf (or leaf count) that is out of
    /// range. Such errors are raised before any state is modified.
    pub fn is_index(&self) -> bool {
        matches!(
            self,
            Error::Mmr(_)
                | Error::NextLeafOutOfRange(_)
                | Error::LeafBeyondTip { .. }
                | Error::RewindBeyondTip { .. }
                | Error::RewindLeafNotBelowTarget { .. }
        )
    }

    /// Returns true if the error was caused by the underlying storage.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::Runtime(_)
                | Error::Metadata(_)
                | Error::CorruptNextLeaf(_)
                | Error::CorruptJournal(_)
        )
    }
}

/// Configuration for [DurableLeafSet].
#[derive(Clone)]
pub struct Config {
    /// The [mweb_runtime::Storage] partition holding the bitmap.
    ///
    /// The number of leaves is stored in `{partition}-metadata`.
    pub partition: String,
}

/// A byte-addressable bitmap recording which leaves are live.
///
/// Implementors provide byte access and the leaf counter; every leaf-level operation is derived
/// from those.
pub trait LeafSet {
    /// Returns the current value of the bitmap byte at `index` (pending changes included).
    ///
    /// Bytes that were never written read as zero.
    fn get_byte(&self, index: u64) -> u8;

    /// Record a new value for the bitmap byte at `index`.
    fn set_byte(&mut self, index: u64, value: u8);

    /// Returns the number of leaves the MMR holds (the index the next leaf will receive).
    fn next_leaf(&self) -> u64;

    /// Record a new leaf count.
    fn set_next_leaf(&mut self, next_leaf: u64);

    /// Make all pending changes visible to the layer below this one.
    ///
    /// On failure, pending changes are retained so the call may be retried.
    fn flush(&mut self) -> Result<(), Error>;

    /// Apply a precomputed set of final byte values and leaf count.
    fn apply_updates(&mut self, next_leaf: u64, modified: &BTreeMap<u64, u8>) -> Result<(), Error> {
        if next_leaf > MAX_LEAF_INDEX + 1 {
            return Err(Error::NextLeafOutOfRange(next_leaf));
        }
        for (&index, &value) in modified {
            self.set_byte(index, value);
        }
        self.set_next_leaf(next_leaf);
        Ok(())
    }

    /// Returns true if `leaf` is live.
    fn contains(&self, leaf: LeafIndex) -> bool {
        self.get_byte(leaf.byte_index()) & leaf.mask() != 0
    }

    /// Mark `leaf` as live, extending the leaf count to include it if necessary.
    fn add(&mut self, leaf: LeafIndex) {
        let index = leaf.byte_index();
        let byte = self.get_byte(index);
        self.set_byte(index, byte | leaf.mask());
        if *leaf >= self.next_leaf() {
            self.set_next_leaf(*leaf + 1);
        }
    }

    /// Mark `leaf` as spent.
    fn remove(&mut self, leaf: LeafIndex) -> Result<(), Error> {
        let next_leaf = self.next_leaf();
        if *leaf >= next_leaf {
            return Err(Error::LeafBeyondTip {
                leaf: *leaf,
                next_leaf,
            });
        }
        let index = leaf.byte_index();
        let byte = self.get_byte(index);
        self.set_byte(index, byte & !leaf.mask());
        Ok(())
    }

    /// Returns the bitmap bytes covering the current leaf count.
    fn visible_bytes(&self) -> Vec<u8> {
        (0..bytes_for_bits(self.next_leaf()))
            .map(|index| self.get_byte(index))
            .collect()
    }

    /// Returns the SHA-256 digest of [LeafSet::visible_bytes].
    fn root(&self) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(&self.visible_bytes());
        hasher.finalize()
    }

    /// Restore the bitmap to when it held `target` leaves, then mark every leaf in `readd` as live.
    ///
    /// Fails without modifying anything if `target` exceeds [LeafSet::next_leaf] or any leaf in
    /// `readd` is not below `target`.
    fn rewind(&mut self, target: u64, readd: &[LeafIndex]) -> Result<(), Error> {
        let next_leaf = self.next_leaf();
        if target > next_leaf {
            return Err(Error::RewindBeyondTip { target, next_leaf });
        }
        if let Some(leaf) = readd.iter().find(|leaf| ***leaf >= target) {
            return Err(Error::RewindLeafNotBelowTarget {
                leaf: **leaf,
                target,
            });
        }

        // Clear the bits of the partial byte at or beyond the target
        let mut start = target / 8;
        let bits = (target % 8) as u8;
        if bits != 0 {
            let byte = self.get_byte(start);
            let masked = byte & ((1u8 << bits) - 1);
            if masked != byte {
                self.set_byte(start, masked);
            }
            start += 1;
        }

        // Clear every following byte
        let end = bytes_for_bits(next_leaf);
        for index in start..end {
            if self.get_byte(index) != 0 {
                self.set_byte(index, 0);
            }
        }
        self.set_next_leaf(target);

        // Restore spent leaves
        for leaf in readd {
            let index = leaf.byte_index();
            let byte = self.get_byte(index);
            self.set_byte(index, byte | leaf.mask());
        }
        debug!(from = next_leaf, to = target, restored = readd.len(), "rewound leaf set");
        Ok(())
    }
}

impl<T: LeafSet + ?Sized> LeafSet for &mut T {
    fn get_byte(&self, index: u64) -> u8 {
        (**self).get_byte(index)
    }

    fn set_byte(&mut self, index: u64, value: u8) {
        (**self).set_byte(index, value)
    }

    fn next_leaf(&self) -> u64 {
        (**self).next_leaf()
    }

    fn set_next_leaf(&mut self, next_leaf: u64) {
        (**self).set_next_leaf(next_leaf)
    }

    fn flush(&mut self) -> Result<(), Error> {
        (**self).flush()
    }

    fn apply_updates(&mut self, next_leaf: u64, modified: &BTreeMap<u64, u8>) -> Result<(), Error> {
        (**self).apply_updates(next_leaf, modified)
    }

    fn visible_bytes(&self) -> Vec<u8> {
        (**self).visible_bytes()
    }
}
