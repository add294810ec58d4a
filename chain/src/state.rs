use crate::{Error, Header};
use bytes::{Buf, BufMut};
use mweb_codec::{EncodeSize, Error as CodecError, FixedSize, Read, ReadExt, Write};
use mweb_storage::{
    leafset::{LeafSet, LeafSetCache},
    mmr::LeafIndex,
};
use tracing::{debug, warn};

/// The information needed to disconnect a block from the leaf set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockUndo {
    /// Number of leaves before the block was connected.
    pub previous_leaves: u64,

    /// Leaves that existed before the block and were spent by it.
    ///
    /// Outputs created and spent within the block are not listed (rewinding removes them).
    pub spent: Vec<LeafIndex>,
}

impl Write for BlockUndo {
    fn write(&self, buf: &mut impl BufMut) {
        self.previous_leaves.write(buf);
        let len = u32::try_from(self.spent.len()).expect("BlockUndo spent count exceeds u32");
        len.write(buf);
        for leaf in &self.spent {
            leaf.write(buf);
        }
    }
}

impl EncodeSize for BlockUndo {
    fn encode_size(&self) -> usize {
        u64::SIZE + u32::SIZE + self.spent.len() * LeafIndex::SIZE
    }
}

impl Read for BlockUndo {
    /// The maximum number of spent leaves to accept.
    type Cfg = usize;

    fn read_cfg(buf: &mut impl Buf, max_spent: &usize) -> Result<Self, CodecError> {
        let previous_leaves = u64::read(buf)?;
        let len = u32::read(buf)? as usize;
        if len > *max_spent {
            return Err(CodecError::Invalid("BlockUndo", "too many spent leaves"));
        }
        let mut spent = Vec::with_capacity(len);
        for _ in 0..len {
            let leaf = LeafIndex::read(buf)?;
            if *leaf >= previous_leaves {
                return Err(CodecError::Invalid("BlockUndo", "spent leaf not below previous leaves"));
            }
            spent.push(leaf);
        }
        Ok(Self {
            previous_leaves,
            spent,
        })
    }
}

/// Limits [connect_block] enforces on untrusted block data.
#[derive(Clone, Debug)]
pub struct Config {
    /// The maximum number of outputs a block may create.
    pub max_outputs: u64,

    /// The maximum number of leaves a block may spend (a [BlockUndo] never lists more).
    pub max_spent: u32,
}

/// Apply a block's created and spent outputs to `leafset`.
///
/// Every leaf between the current leaf count and `header.output_mmr_size` is added, then every
/// leaf in `spent` is removed. The changes only reach `leafset` if the resulting root matches
/// `header.leafset_root`. Blocks creating or spending more than `cfg` allows are rejected before
/// any leaf is added. On any error `leafset` is left untouched.
///
/// Changes are flushed into `leafset` but not beyond it: persisting them is left to the caller
/// (usually by flushing `leafset` once a batch of blocks has been connected).
pub fn connect_block<L: LeafSet>(
    leafset: &mut L,
    cfg: &Config,
    header: &Header,
    spent: &[LeafIndex],
) -> Result<BlockUndo, Error> {
    let previous_leaves = leafset.next_leaf();
    if header.output_mmr_size < previous_leaves {
        return Err(Error::OutputCountDecreased {
            header: header.output_mmr_size,
            leaf_set: previous_leaves,
        });
    }
    let created = header.output_mmr_size - previous_leaves;
    if created > cfg.max_outputs {
        return Err(Error::TooManyOutputs {
            created,
            max: cfg.max_outputs,
        });
    }
    if spent.len() > cfg.max_spent as usize {
        return Err(Error::TooManySpent {
            spent: spent.len(),
            max: cfg.max_spent,
        });
    }
    let mut cache = LeafSetCache::new(&mut *leafset);

    // Add created outputs
    for index in previous_leaves..header.output_mmr_size {
        cache.add(LeafIndex::new(index)?);
    }

    // Remove spent outputs (each must be unspent, which also rules out double spends)
    for leaf in spent {
        if !cache.contains(*leaf) {
            return Err(Error::SpentLeafMissing(*leaf));
        }
        cache.remove(*leaf)?;
    }

    let actual = cache.root();
    if actual != header.leafset_root {
        warn!(
            height = header.height,
            expected = %header.leafset_root,
            %actual,
            "leaf set root mismatch"
        );
        return Err(Error::LeafSetRootMismatch {
            expected: header.leafset_root,
            actual,
        });
    }
    cache.flush()?;

    let spent: Vec<LeafIndex> = spent
        .iter()
        .copied()
        .filter(|leaf| **leaf < previous_leaves)
        .collect();
    debug!(
        height = header.height,
        created,
        spent = spent.len(),
        "connected block"
    );
    Ok(BlockUndo {
        previous_leaves,
        spent,
    })
}

/// Undo a block previously applied with [connect_block].
///
/// `previous_header` is the header of the block that becomes the new tip. The rewound leaf set
/// must match its root and output count, otherwise `leafset` is left untouched.
pub fn disconnect_block<L: LeafSet>(
    leafset: &mut L,
    undo: &BlockUndo,
    previous_header: &Header,
) -> Result<(), Error> {
    if undo.previous_leaves != previous_header.output_mmr_size {
        return Err(Error::UndoMismatch {
            undo: undo.previous_leaves,
            header: previous_header.output_mmr_size,
        });
    }

    let mut cache = LeafSetCache::new(&mut *leafset);
    cache.rewind(undo.previous_leaves, &undo.spent)?;
    let actual = cache.root();
    if actual != previous_header.leafset_root {
        warn!(
            height = previous_header.height,
            expected = %previous_header.leafset_root,
            %actual,
            "leaf set root mismatch after rewind"
        );
        return Err(Error::LeafSetRootMismatch {
            expected: previous_header.leafset_root,
            actual,
        });
    }
    cache.flush()?;
    debug!(
        height = previous_header.height,
        restored = undo.spent.len(),
        "disconnected block"
    );
    Ok(())
}
