//! Addressing for the leaves of a Merkle Mountain Range (MMR).
//!
//! # Terminology
//!
//! An MMR is a list of perfect binary trees (aka "mountains") of strictly decreasing height. Each
//! output appended to the MMR is stored in a leaf node. The nodes of the MMR are ordered by a
//! post-order traversal of the trees, starting from the tallest tree to shortest, and the
//! "position" of a node is its 0-based index in this ordering. An output's [LeafIndex] is its
//! 0-based index in the order of insertion. Leaf indices are contiguous while leaf positions are
//! not.
//!
//! After adding 11 leaves, an MMR has 19 nodes identified by these positions:
//!
//! ```text
//!    Height
//!      3              14
//!                   /    \
//!                  /      \
//!                 /        \
//!                /          \
//!      2        6            13
//!             /   \        /    \
//!      1     2     5      9     12     17
//!           / \   / \    / \   /  \   /  \
//!      0   0   1 3   4  7   8 10  11 15  16 18
//!
//! Leaf     0   1 2   3  4   5  6   7  8   9 10
//! ```
//!
//! The leaf set tracks liveness of leaves in a bitmap where bit `b` of byte `i` belongs to leaf
//! `8*i + b`, so a [LeafIndex] also names a byte and a bit within that bitmap.

mod leaf;
mod position;

pub use leaf::{LeafIndex, MAX_LEAF_INDEX};
pub use position::{mmr_size, Position, MAX_POSITION};
use thiserror::Error;

/// Errors that can occur when converting between leaf indices and node positions.
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Error {
    #[error("leaf index {0} exceeds MAX_LEAF_INDEX")]
    LeafOutOfRange(u64),
    #[error("{0} is not a leaf")]
    NonLeaf(Position),
    #[error("{0} exceeds MAX_POSITION")]
    PositionOutOfRange(Position),
}
