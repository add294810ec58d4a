//! Apply extension blocks to the leaf set and verify conservation of value.
//!
//! An extension block commits (through its [Header]) to the root of the leaf set after the block
//! is applied. [connect_block] replays a block's created and spent outputs against a
//! [mweb_storage::leafset::LeafSetCache] and only lets the change reach the underlying leaf set if
//! the resulting root matches. [disconnect_block] undoes a connected block during a reorg using the
//! [BlockUndo] produced when it was connected.
//!
//! Value is conserved when output commitments (plus the fee) equal input commitments plus kernel
//! excesses plus the block offset, which [verify_balance] checks with a
//! [mweb_cryptography::CommitmentAlgebra].
//!
//! # Status
//!
//! `mweb-chain` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

use mweb_cryptography::{sha256::Digest, Commitment};
use mweb_storage::{leafset, mmr};
use thiserror::Error;

mod balance;
pub use balance::{split_offset, verify_balance};
mod header;
pub use header::{Header, SealedHeader};
mod state;
pub use state::{connect_block, disconnect_block, BlockUndo, Config};
mod utxo;
pub use utxo::Utxo;

/// Errors that can occur when applying or validating a block.
#[derive(Debug, Error)]
pub enum Error {
    #[error("leaf set error: {0}")]
    LeafSet(#[from] leafset::Error),
    #[error("crypto error: {0}")]
    Crypto(#[from] mweb_cryptography::Error),
    #[error("mmr error: {0}")]
    Mmr(#[from] mmr::Error),
    #[error("leaf set root mismatch: expected {expected}, computed {actual}")]
    LeafSetRootMismatch { expected: Digest, actual: Digest },
    #[error("spent leaf is not unspent: {0}")]
    SpentLeafMissing(mmr::LeafIndex),
    #[error("header has fewer outputs ({header}) than the leaf set ({leaf_set})")]
    OutputCountDecreased { header: u64, leaf_set: u64 },
    #[error("block creates {created} outputs (at most {max} allowed)")]
    TooManyOutputs { created: u64, max: u64 },
    #[error("block spends {spent} outputs (at most {max} allowed)")]
    TooManySpent { spent: usize, max: u32 },
    #[error("undo data covers {undo} leaves but the previous header has {header}")]
    UndoMismatch { undo: u64, header: u64 },
    #[error("block does not balance: residual {0}")]
    Unbalanced(Commitment),
}

impl Error {
    /// Returns true if the error was caused by the underlying storage (rather than by the block
    /// being invalid).
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::LeafSet(err) if err.is_storage())
    }
}
