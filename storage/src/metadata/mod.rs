//! A key-value store optimized for atomically committing a small collection of metadata.
//!
//! [Metadata] is a key-value store optimized for tracking a small collection of metadata
//! that allows multiple updates to be committed in a single batch. It is used alongside larger
//! structures (like the leaf set bitmap) to persist the counters needed to interpret them across
//! restarts.
//!
//! # Format
//!
//! Data stored in [Metadata] is serialized as a sequence of key-value pairs in either a
//! "left" or "right" blob:
//!
//! ```text
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! | 0 | 1 |    ...    | 8 | 9 |...|15 |16 |...|19 |20 |  ...  |50 |...|90 |91 |92 |93 |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! |    Version (u64)  |  Key1 (u64)   | Len(V1) (u32) |    Value1     |...|  CRC32(u32)   |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//!
//! Len(V1) = Length of Value1
//! ... = Other key-value pairs (Key2|VLen2|Value2, Key3|VLen3|Value3, ...)
//! ```
//!
//! _To ensure the integrity of the data, a CRC32 checksum is appended to the end of the blob.
//! This ensures that partial writes are detected before any data is relied on._
//!
//! # Atomic Updates
//!
//! To provide support for atomic updates, [Metadata] maintains two blobs: a "left" and a "right"
//! blob. When a new update is committed, it is written to the "older" of the two blobs (indicated
//! by the version persisted). Writes to [mweb_runtime::Blob] are not atomic and may only
//! complete partially, so we only overwrite the "newer" blob once the "older" blob has been synced
//! (otherwise, we would not be guaranteed to recover the latest complete state from disk on
//! restart as half of a blob could be old data and half new data).
//!
//! # Efficient Writes
//!
//! When an update is committed, only bytes that differ from what the target blob already holds are
//! written.
//!
//! # Example
//!
//! ```rust
//! use mweb_runtime::storage::memory;
//! use mweb_storage::metadata::{Config, Metadata};
//!
//! // Create a store
//! let storage = memory::Storage::default();
//! let mut metadata = Metadata::init(storage.clone(), Config {
//!     partition: "partition".to_string(),
//! }).unwrap();
//!
//! // Store metadata
//! metadata.put(1, b"hello".to_vec());
//! metadata.put(2, b"world".to_vec());
//!
//! // Sync the metadata store (batch write changes)
//! metadata.sync().unwrap();
//!
//! // Retrieve some metadata
//! let value = metadata.get(&1);
//! assert_eq!(value, Some(&b"hello".to_vec()));
//! ```

mod storage;
pub use storage::Metadata;
use thiserror::Error;

/// Errors that can occur when interacting with [Metadata].
#[derive(Debug, Error)]
pub enum Error {
    #[error("runtime error: {0}")]
    Runtime(#[from] mweb_runtime::Error),
    #[error("blob too large: {0}")]
    BlobTooLarge(u64),
    #[error("value too big: {0}")]
    ValueTooBig(u64),
}

/// Configuration for [Metadata] storage.
#[derive(Clone)]
pub struct Config {
    /// The [mweb_runtime::Storage] partition to use for storing metadata.
    pub partition: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mweb_macros::test_traced;
    use mweb_runtime::{
        storage::{faulty, memory},
        Blob, Storage,
    };

    fn config() -> Config {
        Config {
            partition: "test".to_string(),
        }
    }

    #[test_traced]
    fn test_put_get_clear() {
        let storage = memory::Storage::default();
        let mut metadata = Metadata::init(storage.clone(), config()).unwrap();

        // Get a key that doesn't exist
        let key = 42;
        assert!(metadata.get(&key).is_none());

        // Put a key
        let hello = b"hello".to_vec();
        metadata.put(key, hello.clone());
        assert_eq!(metadata.get(&key).unwrap(), &hello);
        metadata.sync().unwrap();

        // Reopen the metadata store
        let mut metadata = Metadata::init(storage.clone(), config()).unwrap();
        assert_eq!(metadata.get(&key).unwrap(), &hello);
        assert_eq!(metadata.keys().collect::<Vec<_>>(), vec![&key]);

        // Test clearing the metadata store
        metadata.clear();
        assert!(metadata.get(&key).is_none());
        assert_eq!(metadata.keys().count(), 0);

        metadata.destroy().unwrap();
    }

    #[test_traced]
    fn test_multi_sync() {
        let storage = memory::Storage::default();
        let mut metadata = Metadata::init(storage.clone(), config()).unwrap();

        // Put a key
        let key = 42;
        let hello = b"hello".to_vec();
        metadata.put(key, hello);
        metadata.sync().unwrap();

        // Put an overlapping key and a new key
        let world = b"world".to_vec();
        metadata.put(key, world.clone());
        let key2 = 43;
        let foo = b"foo".to_vec();
        metadata.put(key2, foo.clone());
        metadata.sync().unwrap();

        // Reopen the metadata store
        let mut metadata = Metadata::init(storage.clone(), config()).unwrap();
        assert_eq!(metadata.get(&key).unwrap(), &world);
        assert_eq!(metadata.get(&key2).unwrap(), &foo);

        // Remove the key
        assert_eq!(metadata.remove(&key), Some(world));
        metadata.sync().unwrap();

        // Reopen the metadata store
        let metadata = Metadata::init(storage.clone(), config()).unwrap();
        assert!(metadata.get(&key).is_none());
        assert_eq!(metadata.get(&key2).unwrap(), &foo);

        metadata.destroy().unwrap();
    }

    /// Sync `hello` under key 42 (to the right blob), then `world` (to the left blob).
    fn write_two_versions(storage: &memory::Storage) {
        let mut metadata = Metadata::init(storage.clone(), config()).unwrap();
        metadata.put(42, b"hello".to_vec());
        metadata.sync().unwrap();
        metadata.put(42, b"world".to_vec());
        metadata.put(43, b"foo".to_vec());
        metadata.sync().unwrap();
    }

    #[test_traced]
    fn test_recover_corrupted_one() {
        let storage = memory::Storage::default();
        write_two_versions(&storage);

        // Corrupt the newer blob
        let (blob, _) = storage.open("test", b"left").unwrap();
        blob.write_at(b"corrupted", 0).unwrap();
        blob.sync().unwrap();

        // Reopen the metadata store (falls back to non-corrupt)
        let metadata = Metadata::init(storage.clone(), config()).unwrap();
        assert_eq!(metadata.get(&42).unwrap(), b"hello");
        assert!(metadata.get(&43).is_none());

        metadata.destroy().unwrap();
    }

    #[test_traced]
    fn test_recover_corrupted_both() {
        let storage = memory::Storage::default();
        write_two_versions(&storage);

        // Corrupt both blobs
        for name in [b"left".as_slice(), b"right".as_slice()] {
            let (blob, _) = storage.open("test", name).unwrap();
            blob.write_at(b"corrupted", 0).unwrap();
            blob.sync().unwrap();
        }

        // Reopen the metadata store (nothing survives)
        let mut metadata = Metadata::init(storage.clone(), config()).unwrap();
        assert!(metadata.get(&42).is_none());
        assert_eq!(metadata.keys().count(), 0);

        // The store remains usable
        metadata.put(7, b"fresh".to_vec());
        metadata.sync().unwrap();
        let metadata = Metadata::init(storage.clone(), config()).unwrap();
        assert_eq!(metadata.get(&7).unwrap(), b"fresh");

        metadata.destroy().unwrap();
    }

    #[test_traced]
    fn test_recover_corrupted_truncate() {
        let storage = memory::Storage::default();
        write_two_versions(&storage);

        // Drop the tail of the newer blob
        let (blob, len) = storage.open("test", b"left").unwrap();
        blob.resize(len - 8).unwrap();
        blob.sync().unwrap();

        let metadata = Metadata::init(storage.clone(), config()).unwrap();
        assert_eq!(metadata.get(&42).unwrap(), b"hello");

        metadata.destroy().unwrap();
    }

    #[test_traced]
    fn test_recover_corrupted_short() {
        let storage = memory::Storage::default();
        write_two_versions(&storage);

        // Leave fewer bytes than a version and checksum
        let (blob, _) = storage.open("test", b"left").unwrap();
        blob.resize(5).unwrap();
        blob.sync().unwrap();

        let metadata = Metadata::init(storage.clone(), config()).unwrap();
        assert_eq!(metadata.get(&42).unwrap(), b"hello");

        metadata.destroy().unwrap();
    }

    #[test_traced]
    fn test_unclean_shutdown() {
        let storage = memory::Storage::default();
        {
            let mut metadata = Metadata::init(storage.clone(), config()).unwrap();
            metadata.put(42, b"hello".to_vec());

            // Drop metadata before sync
        }

        let metadata = Metadata::init(storage.clone(), config()).unwrap();
        assert!(metadata.get(&42).is_none());

        metadata.destroy().unwrap();
    }

    #[test_traced]
    fn test_failed_sync_keeps_previous_version() {
        let storage = faulty::Storage::new(memory::Storage::default());
        let faults = storage.faults();
        let mut metadata = Metadata::init(storage.clone(), config()).unwrap();
        metadata.put(42, b"hello".to_vec());
        metadata.sync().unwrap();

        // Fail the next commit
        metadata.put(42, b"world".to_vec());
        faults.fail_syncs(true);
        assert!(matches!(metadata.sync(), Err(Error::Runtime(_))));
        faults.fail_syncs(false);

        // The pending value is retained in memory
        assert_eq!(metadata.get(&42).unwrap(), b"world");

        // A crash now recovers the last committed value
        let recovered = Metadata::init(storage.clone(), config()).unwrap();
        assert_eq!(recovered.get(&42).unwrap(), b"hello");

        // Retrying succeeds
        metadata.sync().unwrap();
        let recovered = Metadata::init(storage.clone(), config()).unwrap();
        assert_eq!(recovered.get(&42).unwrap(), b"world");
    }

    #[test_traced]
    fn test_diffs() {
        let storage = memory::Storage::default();
        let mut metadata = Metadata::init(storage.clone(), config()).unwrap();

        // Put initial keys
        for i in 0..100u64 {
            metadata.put(i, vec![i as u8; 100]);
        }

        // 100 keys * (8 bytes for key + 4 bytes for len + 100 bytes for value) + 8 bytes for
        // version + 4 bytes for checksum
        metadata.sync().unwrap();
        let (_, len) = storage.open("test", b"right").unwrap();
        assert_eq!(len, 11_212);

        // Shrink one value and sync to the other blob
        metadata.put(51, vec![0xff; 10]);
        metadata.sync().unwrap();
        let (_, len) = storage.open("test", b"left").unwrap();
        assert_eq!(len, 11_122);

        // Sync again so the first blob is rewritten (and shrunk) in place
        metadata.sync().unwrap();
        let (_, len) = storage.open("test", b"right").unwrap();
        assert_eq!(len, 11_122);

        let metadata = Metadata::init(storage.clone(), config()).unwrap();
        assert_eq!(metadata.get(&51).unwrap(), &vec![0xff; 10]);
        assert_eq!(metadata.get(&99).unwrap(), &vec![99; 100]);
    }
}
