use super::{Config, Error, LeafSet};
use crate::{
    metadata::{self, Metadata},
    mmr::MAX_LEAF_INDEX,
};
use bytes::{Buf, BufMut};
use mweb_codec::{
    util::at_least, Decode, DecodeExt, Encode, EncodeSize, Error as CodecError, FixedSize, Read,
    ReadExt, Write,
};
use mweb_runtime::{Blob, Storage};
use mweb_utils::bytes_for_bits;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Name of the blob holding the bitmap.
const BLOB_NAME: &[u8] = b"leafset";

/// Metadata key under which the leaf count is stored.
const NEXT_LEAF_KEY: u64 = 0;

/// Metadata key under which the bytes of a committed (but possibly unapplied) flush are stored.
const JOURNAL_KEY: u64 = 1;

/// Bytes a flush writes to the bitmap blob, in increasing index order.
#[derive(Debug, Default, PartialEq, Eq)]
struct Journal(Vec<(u64, u8)>);

impl Write for Journal {
    fn write(&self, buf: &mut impl BufMut) {
        (self.0.len() as u64).write(buf);
        for (index, value) in &self.0 {
            index.write(buf);
            value.write(buf);
        }
    }
}

impl EncodeSize for Journal {
    fn encode_size(&self) -> usize {
        u64::SIZE + self.0.len() * (u64::SIZE + u8::SIZE)
    }
}

impl Read for Journal {
    /// The length of the bitmap the journal applies to.
    type Cfg = u64;

    fn read_cfg(buf: &mut impl Buf, len: &u64) -> Result<Self, CodecError> {
        let count = u64::read(buf)?;
        let count = usize::try_from(count)
            .map_err(|_| CodecError::Invalid("Journal", "too many writes"))?;
        at_least(
            buf,
            count
                .checked_mul(u64::SIZE + u8::SIZE)
                .ok_or(CodecError::Invalid("Journal", "too many writes"))?,
        )?;
        let mut writes = Vec::with_capacity(count);
        for _ in 0..count {
            let index = u64::read(buf)?;
            let value = u8::read(buf)?;
            if index >= *len {
                return Err(CodecError::Invalid("Journal", "write beyond bitmap"));
            }
            if matches!(writes.last(), Some(&(last, _)) if last >= index) {
                return Err(CodecError::Invalid("Journal", "writes out of order"));
            }
            writes.push((index, value));
        }
        Ok(Self(writes))
    }
}

impl Journal {
    /// Size `blob` to `len` bytes (dropping or zero-filling the tail), write each run of
    /// contiguous bytes and sync.
    ///
    /// Applying the same journal more than once leaves the blob unchanged.
    fn apply<B: Blob>(&self, blob: &B, len: u64) -> Result<usize, Error> {
        blob.resize(len)?;
        let mut written = 0;
        let mut run: Vec<u8> = Vec::new();
        let mut run_start = 0;
        for &(index, value) in &self.0 {
            if !run.is_empty() && index != run_start + run.len() as u64 {
                blob.write_at(&run, run_start)?;
                written += run.len();
                run.clear();
            }
            if run.is_empty() {
                run_start = index;
            }
            run.push(value);
        }
        if !run.is_empty() {
            blob.write_at(&run, run_start)?;
            written += run.len();
        }
        blob.sync()?;
        Ok(written)
    }
}

/// A [LeafSet] persisted to a [Storage].
///
/// The bitmap is kept in memory alongside an overlay of modified bytes. [LeafSet::flush] first
/// commits the leaf count and the modified bytes to metadata in a single atomic sync, then writes
/// them to the blob. A flush interrupted after its commit is finished by the next [Self::init].
pub struct DurableLeafSet<S: Storage> {
    storage: S,
    partition: String,
    blob: S::Blob,
    metadata: Metadata<S>,

    /// Bytes as of the last successful flush.
    bytes: Vec<u8>,

    /// Whether the blob holds exactly `bytes` (false after a flush fails mid-write).
    applied: bool,

    /// Pending byte values.
    overlay: BTreeMap<u64, u8>,

    next_leaf: u64,
}

impl<S: Storage> DurableLeafSet<S> {
    /// Open (or create) the leaf set stored in `cfg.partition`.
    ///
    /// If the recorded leaf count is missing it is inferred from the blob length. A committed
    /// flush left in metadata is replayed onto the blob. Bytes the blob holds beyond the leaf
    /// count are truncated, and bytes the blob is missing read as zero.
    pub fn init(storage: S, cfg: Config) -> Result<Self, Error> {
        let (blob, mut len) = storage.open(&cfg.partition, BLOB_NAME)?;
        let mut metadata = Metadata::init(
            storage.clone(),
            metadata::Config {
                partition: format!("{}-metadata", cfg.partition),
            },
        )?;

        // Recover the leaf count
        let next_leaf = match metadata.get(&NEXT_LEAF_KEY) {
            Some(value) => u64::decode(value.as_slice())
                .map_err(|err| Error::CorruptNextLeaf(err.to_string()))?,
            None => {
                if len > 0 {
                    warn!(
                        partition = cfg.partition,
                        len, "missing leaf count: inferring from bitmap length"
                    );
                }
                len.checked_mul(8)
                    .ok_or(Error::NextLeafOutOfRange(u64::MAX))?
            }
        };
        if next_leaf > MAX_LEAF_INDEX + 1 {
            return Err(Error::NextLeafOutOfRange(next_leaf));
        }
        let visible = bytes_for_bits(next_leaf);

        // Finish any flush that was committed but not fully written
        if let Some(value) = metadata.get(&JOURNAL_KEY) {
            let journal = Journal::decode_cfg(value.as_slice(), &visible)
                .map_err(|err| Error::CorruptJournal(err.to_string()))?;
            let written = journal.apply(&blob, visible)?;
            len = visible;
            metadata.remove(&JOURNAL_KEY);
            metadata.sync()?;
            warn!(
                partition = cfg.partition,
                next_leaf, written, "replayed interrupted flush"
            );
        }

        // Drop bytes beyond the leaf count so growing the set never exposes them
        if len > visible {
            warn!(
                partition = cfg.partition,
                len, visible, "truncating bytes beyond leaf count"
            );
            blob.resize(visible)?;
            blob.sync()?;
            len = visible;
        }

        // Load the persisted bytes
        let mut bytes = vec![0u8; len as usize];
        blob.read_at(&mut bytes, 0)?;

        // Stale bits in the last byte are cleared through the overlay so the next flush
        // rewrites them on disk
        let mut overlay = BTreeMap::new();
        let bits = (next_leaf % 8) as u8;
        if bits != 0 && len == visible {
            if let Some(&last) = bytes.last() {
                let masked = last & ((1u8 << bits) - 1);
                if masked != last {
                    overlay.insert(visible - 1, masked);
                }
            }
        }
        debug!(
            partition = cfg.partition,
            next_leaf,
            bytes = bytes.len(),
            "loaded leaf set"
        );

        Ok(Self {
            storage,
            partition: cfg.partition,
            blob,
            metadata,
            bytes,
            applied: true,
            overlay,
            next_leaf,
        })
    }

    /// Returns the number of modified bytes that have not yet been flushed.
    pub fn pending(&self) -> usize {
        self.overlay.len()
    }

    /// Remove all persisted state of this leaf set.
    pub fn destroy(self) -> Result<(), Error> {
        self.metadata.destroy()?;
        self.storage.remove(&self.partition, Some(BLOB_NAME))?;
        debug!(partition = self.partition, "destroyed leaf set");
        Ok(())
    }

    /// Atomically record the leaf count and the modified bytes below `visible` in metadata.
    ///
    /// Once this returns, a restart recovers the flushed state even if the blob is never written.
    fn commit(&mut self, visible: u64) -> Result<Journal, Error> {
        let journal = Journal(
            self.overlay
                .range(..visible)
                .map(|(&index, &value)| (index, value))
                .collect(),
        );
        self.metadata
            .put(NEXT_LEAF_KEY, self.next_leaf.encode().to_vec());
        self.metadata.put(JOURNAL_KEY, journal.encode().to_vec());
        self.metadata.sync()?;
        Ok(journal)
    }
}

impl<S: Storage> LeafSet for DurableLeafSet<S> {
    fn get_byte(&self, index: u64) -> u8 {
        if let Some(value) = self.overlay.get(&index) {
            return *value;
        }
        usize::try_from(index)
            .ok()
            .and_then(|index| self.bytes.get(index))
            .copied()
            .unwrap_or(0)
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
        let visible = bytes_for_bits(self.next_leaf);

        // Drop pending writes that match what is already persisted (only safe while the blob
        // holds exactly `bytes`)
        if self.applied {
            let bytes = &self.bytes;
            self.overlay.retain(|&index, &mut value| {
                let persisted = usize::try_from(index)
                    .ok()
                    .and_then(|index| bytes.get(index))
                    .copied()
                    .unwrap_or(0);
                value != persisted
            });
        }

        // Commit, then write the bitmap
        let journal = self.commit(visible)?;
        self.applied = false;
        let written = journal.apply(&self.blob, visible)?;
        self.applied = true;

        // Fold the overlay into memory
        self.bytes.resize(visible as usize, 0);
        for (index, value) in std::mem::take(&mut self.overlay) {
            if index < visible {
                self.bytes[index as usize] = value;
            }
        }

        // The blob now matches the commit, so the journal is no longer needed. If clearing it
        // fails, the next init replays it (a no-op).
        self.metadata.remove(&JOURNAL_KEY);
        if let Err(err) = self.metadata.sync() {
            warn!(
                partition = self.partition,
                ?err,
                "failed to clear flush journal"
            );
        }
        debug!(
            partition = self.partition,
            next_leaf = self.next_leaf,
            bytes = visible,
            written,
            "flushed leaf set"
        );
        Ok(())
    }
}
