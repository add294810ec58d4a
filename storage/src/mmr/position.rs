use std::{fmt, ops::Deref};

/// Maximum valid [Position].
///
/// This is the last node of an MMR holding [super::MAX_LEAF_INDEX] + 1 leaves.
pub const MAX_POSITION: Position = Position::new(0x7FFF_FFFF_FFFF_FFFE); // (1 << 63) - 2

/// An index into an MMR's nodes.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug)]
pub struct Position(u64);

impl Position {
    /// Return a new [Position] from a raw `u64`.
    #[inline]
    pub const fn new(pos: u64) -> Self {
        Self(pos)
    }

    /// Return the underlying `u64` value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Returns the number of nodes in an MMR holding `leaves` leaves.
///
/// # Panics
///
/// Panics if `leaves` exceeds [super::MAX_LEAF_INDEX] + 1.
#[inline]
pub const fn mmr_size(leaves: u64) -> u64 {
    2 * leaves - leaves.count_ones() as u64
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({})", self.0)
    }
}

impl Deref for Position {
    type Target = u64;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Position> for u64 {
    #[inline]
    fn from(position: Position) -> Self {
        position.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmr::{LeafIndex, MAX_LEAF_INDEX};

    #[test]
    fn test_mmr_size() {
        // Sizes pictured in the module docs
        assert_eq!(mmr_size(0), 0);
        assert_eq!(mmr_size(1), 1);
        assert_eq!(mmr_size(2), 3);
        assert_eq!(mmr_size(3), 4);
        assert_eq!(mmr_size(4), 7);
        assert_eq!(mmr_size(11), 19);

        // The largest MMR ends at MAX_POSITION
        assert_eq!(mmr_size(MAX_LEAF_INDEX + 1) - 1, *MAX_POSITION);
    }

    #[test]
    fn test_last_leaf_is_last_node_of_perfect_tree() {
        for leaves in [1u64, 2, 4, 8, 1024] {
            let last = LeafIndex::new(leaves - 1).unwrap();
            // Only the ancestors of the last leaf follow it
            assert!(*last.position() < mmr_size(leaves));
            assert_eq!(
                mmr_size(leaves) - 1 - *last.position(),
                leaves.trailing_zeros() as u64
            );
        }
    }
}
