//! A [crate::Storage] wrapper that injects failures into blob writes and syncs.
//!
//! Used to verify that callers leave their in-memory state untouched when persistence fails.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Switches shared by a [Storage] and every [Blob] it opens.
#[derive(Clone, Default)]
pub struct Faults {
    writes: Arc<AtomicBool>,
    syncs: Arc<AtomicBool>,
}

impl Faults {
    /// Make every subsequent `write_at` and `resize` fail (or succeed again).
    pub fn fail_writes(&self, enabled: bool) {
        self.writes.store(enabled, Ordering::SeqCst);
    }

    /// Make every subsequent `sync` fail (or succeed again).
    pub fn fail_syncs(&self, enabled: bool) {
        self.syncs.store(enabled, Ordering::SeqCst);
    }

    fn writes_failing(&self) -> bool {
        self.writes.load(Ordering::SeqCst)
    }

    fn syncs_failing(&self) -> bool {
        self.syncs.load(Ordering::SeqCst)
    }
}

/// Storage that forwards to `S` unless a fault is enabled.
#[derive(Clone)]
pub struct Storage<S: crate::Storage> {
    inner: S,
    faults: Faults,
}

impl<S: crate::Storage> Storage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Faults::default(),
        }
    }

    /// Returns the switches controlling injected failures.
    pub fn faults(&self) -> Faults {
        self.faults.clone()
    }
}

impl<S: crate::Storage> crate::Storage for Storage<S> {
    type Blob = Blob<S::Blob>;

    fn open(&self, partition: &str, name: &[u8]) -> Result<(Self::Blob, u64), crate::Error> {
        let (inner, len) = self.inner.open(partition, name)?;
        Ok((
            Blob {
                inner,
                partition: partition.into(),
                name: mweb_utils::hex(name),
                faults: self.faults.clone(),
            },
            len,
        ))
    }

    fn remove(&self, partition: &str, name: Option<&[u8]>) -> Result<(), crate::Error> {
        self.inner.remove(partition, name)
    }

    fn scan(&self, partition: &str) -> Result<Vec<Vec<u8>>, crate::Error> {
        self.inner.scan(partition)
    }
}

#[derive(Clone)]
pub struct Blob<B: crate::Blob> {
    inner: B,
    partition: String,
    name: String,
    faults: Faults,
}

impl<B: crate::Blob> crate::Blob for Blob<B> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), crate::Error> {
        self.inner.read_at(buf, offset)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<(), crate::Error> {
        if self.faults.writes_failing() {
            return Err(crate::Error::WriteFailed);
        }
        self.inner.write_at(buf, offset)
    }

    fn resize(&self, len: u64) -> Result<(), crate::Error> {
        if self.faults.writes_failing() {
            return Err(crate::Error::BlobResizeFailed(
                self.partition.clone(),
                self.name.clone(),
                io::Error::other("injected fault"),
            ));
        }
        self.inner.resize(len)
    }

    fn sync(&self) -> Result<(), crate::Error> {
        if self.faults.syncs_failing() {
            return Err(crate::Error::BlobSyncFailed(
                self.partition.clone(),
                self.name.clone(),
                io::Error::other("injected fault"),
            ));
        }
        self.inner.sync()
    }
}
