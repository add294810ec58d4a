use super::{Config, Error};
use bytes::BufMut;
use mweb_codec::{FixedSize, ReadExt, Write};
use mweb_runtime::{Blob, Storage};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const BLOB_NAMES: [&[u8]; 2] = [b"left", b"right"];

/// Bytes of overhead in every non-empty blob (version and checksum).
const OVERHEAD: usize = u64::SIZE + u32::SIZE;

/// A blob and the bytes it is known to hold.
struct Wrapper<B: Blob> {
    blob: B,
    version: u64,
    data: Vec<u8>,

    /// Whether `data` may not match the blob (after a failed commit).
    stale: bool,
}

/// Implementation of [Metadata] storage.
pub struct Metadata<S: Storage> {
    storage: S,
    partition: String,

    map: BTreeMap<u64, Vec<u8>>,
    cursor: usize,
    blobs: [Wrapper<S::Blob>; 2],
}

impl<S: Storage> Metadata<S> {
    /// Initialize a new [Metadata] instance.
    pub fn init(storage: S, cfg: Config) -> Result<Self, Error> {
        // Open dedicated blobs
        let (left_blob, left_len) = storage.open(&cfg.partition, BLOB_NAMES[0])?;
        let (right_blob, right_len) = storage.open(&cfg.partition, BLOB_NAMES[1])?;

        // Find latest blob (the one with the highest valid version)
        let (left_map, left) = Self::load(0, left_blob, left_len)?;
        let (right_map, right) = Self::load(1, right_blob, right_len)?;
        let (cursor, map) = match (left_map, right_map) {
            (Some(left_map), Some(right_map)) => {
                if right.version > left.version {
                    (1, right_map)
                } else {
                    (0, left_map)
                }
            }
            (Some(left_map), None) => (0, left_map),
            (None, Some(right_map)) => (1, right_map),
            (None, None) => (0, BTreeMap::new()),
        };
        debug!(
            partition = cfg.partition,
            cursor,
            keys = map.len(),
            "loaded metadata"
        );

        Ok(Self {
            storage,
            partition: cfg.partition,
            map,
            cursor,
            blobs: [left, right],
        })
    }

    /// Read and verify a blob, returning its key-value pairs if it holds a valid commit.
    #[allow(clippy::type_complexity)]
    fn load(
        index: usize,
        blob: S::Blob,
        len: u64,
    ) -> Result<(Option<BTreeMap<u64, Vec<u8>>>, Wrapper<S::Blob>), Error> {
        let len: usize = len.try_into().map_err(|_| Error::BlobTooLarge(len))?;
        if len == 0 {
            // Empty blob
            return Ok((None, Wrapper::new(blob, 0, Vec::new())));
        }

        // Read blob
        let mut buf = vec![0u8; len];
        blob.read_at(&mut buf, 0)?;

        // Verify integrity
        if len < OVERHEAD {
            warn!(blob = index, len, "blob too short: ignoring");
            return Ok((None, Wrapper::new(blob, 0, buf)));
        }
        let checksum_index = len - u32::SIZE;
        let mut stored = &buf[checksum_index..];
        let Ok(stored_checksum) = u32::read(&mut stored) else {
            return Ok((None, Wrapper::new(blob, 0, buf)));
        };
        let computed_checksum = crc32fast::hash(&buf[..checksum_index]);
        if stored_checksum != computed_checksum {
            warn!(
                blob = index,
                stored = stored_checksum,
                computed = computed_checksum,
                "checksum mismatch: ignoring"
            );
            return Ok((None, Wrapper::new(blob, 0, buf)));
        }

        // Get version
        let mut cursor = &buf[..checksum_index];
        let Ok(version) = u64::read(&mut cursor) else {
            return Ok((None, Wrapper::new(blob, 0, buf)));
        };

        // Extract data
        let mut map = BTreeMap::new();
        while !cursor.is_empty() {
            let Some((key, value)) = Self::read_entry(&mut cursor) else {
                warn!(blob = index, "malformed entry: ignoring");
                return Ok((None, Wrapper::new(blob, 0, buf)));
            };
            map.insert(key, value);
        }

        Ok((Some(map), Wrapper::new(blob, version, buf)))
    }

    fn read_entry(cursor: &mut &[u8]) -> Option<(u64, Vec<u8>)> {
        let key = u64::read(cursor).ok()?;
        let len = u32::read(cursor).ok()? as usize;
        if cursor.len() < len {
            return None;
        }
        let (value, rest) = cursor.split_at(len);
        *cursor = rest;
        Some((key, value.to_vec()))
    }

    /// Get a value from [Metadata] (if it exists).
    pub fn get(&self, key: &u64) -> Option<&Vec<u8>> {
        self.map.get(key)
    }

    /// Clear all values from [Metadata]. The new state will not be persisted until [Self::sync] is
    /// called.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Put a value into [Metadata].
    ///
    /// If the key already exists, the value will be overwritten. The
    /// value stored will not be persisted until [Self::sync] is called.
    pub fn put(&mut self, key: u64, value: Vec<u8>) {
        self.map.insert(key, value);
    }

    /// Remove a value from [Metadata] (if it exists).
    pub fn remove(&mut self, key: &u64) -> Option<Vec<u8>> {
        self.map.remove(key)
    }

    /// Iterate over all keys in [Metadata].
    pub fn keys(&self) -> impl Iterator<Item = &u64> {
        self.map.keys()
    }

    /// Atomically commit the current state of [Metadata].
    ///
    /// If this fails, the previously committed state is what will be recovered on restart and
    /// calling [Self::sync] again is safe.
    pub fn sync(&mut self) -> Result<(), Error> {
        // Serialize the next commit
        let past_version = self.blobs[self.cursor].version;
        let next_version = past_version + 1;
        let mut buf = Vec::with_capacity(self.encoded_len());
        next_version.write(&mut buf);
        for (key, value) in &self.map {
            let len: u32 = value.len().try_into().map_err(|_| Error::ValueTooBig(*key))?;
            key.write(&mut buf);
            len.write(&mut buf);
            buf.put_slice(value);
        }
        let checksum = crc32fast::hash(&buf);
        checksum.write(&mut buf);

        // Write to the older blob
        let next_cursor = 1 - self.cursor;
        let target = &mut self.blobs[next_cursor];
        if let Err(err) = target.commit(&buf) {
            target.stale = true;
            return Err(err);
        }
        target.version = next_version;
        target.data = buf;
        target.stale = false;

        // Switch blobs
        self.cursor = next_cursor;
        debug!(
            partition = self.partition,
            version = next_version,
            keys = self.map.len(),
            "synced metadata"
        );
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        self.map
            .values()
            .map(|value| u64::SIZE + u32::SIZE + value.len())
            .sum::<usize>()
            + OVERHEAD
    }

    /// Remove the underlying blobs for this [Metadata].
    pub fn destroy(self) -> Result<(), Error> {
        for name in BLOB_NAMES {
            self.storage.remove(&self.partition, Some(name))?;
        }
        debug!(partition = self.partition, "destroyed metadata");
        Ok(())
    }
}

impl<B: Blob> Wrapper<B> {
    fn new(blob: B, version: u64, data: Vec<u8>) -> Self {
        Self {
            blob,
            version,
            data,
            stale: false,
        }
    }

    /// Overwrite the blob with `buf`, writing only the ranges that differ from what it holds.
    fn commit(&self, buf: &[u8]) -> Result<(), Error> {
        if self.stale {
            self.blob.write_at(buf, 0)?;
        } else {
            let mut offset = 0;
            while offset < buf.len() {
                // Skip bytes the blob already holds
                if self.data.get(offset) == Some(&buf[offset]) {
                    offset += 1;
                    continue;
                }

                // Write the differing run
                let start = offset;
                while offset < buf.len() && self.data.get(offset) != Some(&buf[offset]) {
                    offset += 1;
                }
                self.blob.write_at(&buf[start..offset], start as u64)?;
            }
        }
        if self.stale || self.data.len() != buf.len() {
            self.blob.resize(buf.len() as u64)?;
        }
        self.blob.sync()?;
        Ok(())
    }
}
