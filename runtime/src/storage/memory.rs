use crate::Error;
use mweb_utils::hex;
use std::{
    collections::BTreeMap,
    ops::Range,
    sync::{Arc, Mutex, RwLock},
};

/// Synced blob contents, by partition and then by blob name.
type Disk = Arc<Mutex<BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>>>>;

/// In-memory storage implementation.
///
/// Each [Blob] handle buffers its writes until [crate::Blob::sync] copies them to the shared
/// "disk". [crate::Storage::open] only ever sees synced contents, so dropping a handle without
/// syncing behaves like a crash.
#[derive(Clone, Default)]
pub struct Storage {
    disk: Disk,
}

impl crate::Storage for Storage {
    type Blob = Blob;

    fn open(&self, partition: &str, name: &[u8]) -> Result<(Blob, u64), Error> {
        super::validate_partition_name(partition)?;

        let mut disk = self.disk.lock().unwrap();
        let synced = disk
            .entry(partition.into())
            .or_default()
            .entry(name.into())
            .or_default();
        let len = synced.len() as u64;
        let blob = Blob {
            disk: self.disk.clone(),
            partition: partition.into(),
            name: name.into(),
            pending: Arc::new(RwLock::new(synced.clone())),
        };
        Ok((blob, len))
    }

    fn remove(&self, partition: &str, name: Option<&[u8]>) -> Result<(), Error> {
        super::validate_partition_name(partition)?;

        let mut disk = self.disk.lock().unwrap();
        let Some(name) = name else {
            return disk
                .remove(partition)
                .map(|_| ())
                .ok_or_else(|| Error::PartitionMissing(partition.into()));
        };
        disk.get_mut(partition)
            .ok_or_else(|| Error::PartitionMissing(partition.into()))?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::BlobMissing(partition.into(), hex(name)))
    }

    fn scan(&self, partition: &str) -> Result<Vec<Vec<u8>>, Error> {
        super::validate_partition_name(partition)?;

        let disk = self.disk.lock().unwrap();
        let blobs = disk
            .get(partition)
            .ok_or_else(|| Error::PartitionMissing(partition.into()))?;

        // BTreeMap keys are already sorted
        Ok(blobs.keys().cloned().collect())
    }
}

#[derive(Clone)]
pub struct Blob {
    disk: Disk,
    partition: String,
    name: Vec<u8>,
    pending: Arc<RwLock<Vec<u8>>>,
}

/// Returns the byte range covering `len` bytes at `offset`.
fn span(offset: u64, len: usize) -> Result<Range<usize>, Error> {
    let start = usize::try_from(offset).map_err(|_| Error::OffsetOverflow)?;
    let end = start.checked_add(len).ok_or(Error::OffsetOverflow)?;
    Ok(start..end)
}

impl crate::Blob for Blob {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), Error> {
        let range = span(offset, buf.len())?;
        let pending = self.pending.read().unwrap();
        let bytes = pending
            .get(range)
            .ok_or(Error::BlobInsufficientLength)?;
        buf.copy_from_slice(bytes);
        Ok(())
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<(), Error> {
        let range = span(offset, buf.len())?;
        let mut pending = self.pending.write().unwrap();
        if range.end > pending.len() {
            pending.resize(range.end, 0);
        }
        pending[range].copy_from_slice(buf);
        Ok(())
    }

    fn resize(&self, len: u64) -> Result<(), Error> {
        let len = usize::try_from(len).map_err(|_| Error::OffsetOverflow)?;
        self.pending.write().unwrap().resize(len, 0);
        Ok(())
    }

    fn sync(&self) -> Result<(), Error> {
        let snapshot = self.pending.read().unwrap().clone();
        let mut disk = self.disk.lock().unwrap();
        let synced = disk
            .get_mut(&self.partition)
            .ok_or_else(|| Error::PartitionMissing(self.partition.clone()))?
            .get_mut(&self.name)
            .ok_or_else(|| Error::BlobMissing(self.partition.clone(), hex(&self.name)))?;
        *synced = snapshot;
        Ok(())
    }
}
