//! Blocking storage primitives for persisting extension block state.
//!
//! State owned by a chain tip is mutated by a single writer and persisted with blocking I/O, so
//! this crate exposes synchronous [Storage] and [Blob] traits. Implementations are provided for
//! the local filesystem ([storage::fs]), for memory ([storage::memory]), and for injecting faults
//! into any other implementation ([storage::faulty]).
//!
//! # Status
//!
//! `mweb-runtime` is **ALPHA** software and is not yet recommended for production use. Developers
//! should expect breaking changes and occasional instability.

use std::io::Error as IoError;
use thiserror::Error;

pub mod storage;

/// Errors that can occur when interacting with the runtime.
#[derive(Error, Debug)]
pub enum Error {
    #[error("read failed")]
    ReadFailed,
    #[error("write failed")]
    WriteFailed,
    #[error("partition name invalid, must only contain alphanumeric, dash ('-'), or underscore ('_') characters: {0}")]
    PartitionNameInvalid(String),
    #[error("partition creation failed: {0}")]
    PartitionCreationFailed(String),
    #[error("partition missing: {0}")]
    PartitionMissing(String),
    #[error("partition corrupt: {0}")]
    PartitionCorrupt(String),
    #[error("blob open failed: {0}/{1} error: {2}")]
    BlobOpenFailed(String, String, IoError),
    #[error("blob missing: {0}/{1}")]
    BlobMissing(String, String),
    #[error("blob resize failed: {0}/{1} error: {2}")]
    BlobResizeFailed(String, String, IoError),
    #[error("blob sync failed: {0}/{1} error: {2}")]
    BlobSyncFailed(String, String, IoError),
    #[error("blob insufficient length")]
    BlobInsufficientLength,
    #[error("offset overflow")]
    OffsetOverflow,
}

/// A namespace of partitions, each holding named blobs.
pub trait Storage: Clone + Send + Sync + 'static {
    type Blob: Blob;

    /// Open the blob `name` in `partition` (creating both if missing), returning the blob and its
    /// durable length.
    fn open(&self, partition: &str, name: &[u8]) -> Result<(Self::Blob, u64), Error>;

    /// Remove a blob from a given partition.
    ///
    /// If no `name` is provided, the entire partition is removed.
    fn remove(&self, partition: &str, name: Option<&[u8]>) -> Result<(), Error>;

    /// Return all blobs in a given partition.
    fn scan(&self, partition: &str) -> Result<Vec<Vec<u8>>, Error>;
}

/// A byte array addressed by offset.
///
/// Clones share one handle. Changes that have not been passed through [Blob::sync] may be lost
/// when the process stops.
pub trait Blob: Clone + Send + Sync + 'static {
    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Returns [Error::BlobInsufficientLength] if the blob ends before `buf` is filled.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), Error>;

    /// Write `buf` to the blob at the given offset, extending the blob if required.
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<(), Error>;

    /// Resize the blob to the given length.
    ///
    /// If the length is greater than the current length, the blob is extended with zeros.
    /// If the length is less than the current length, the blob is truncated.
    fn resize(&self, len: u64) -> Result<(), Error>;

    /// Ensure all pending data is durably persisted.
    fn sync(&self) -> Result<(), Error>;
}
