use super::{position::Position, Error, MAX_POSITION};
use bytes::{Buf, BufMut};
use mweb_codec::{Error as CodecError, FixedSize, Read, ReadExt, Write};
use std::{fmt, ops::Deref};

/// Maximum valid [LeafIndex].
///
/// The MMR size for `N` leaves is `2*N - popcount(N)`. Requiring that size to fit in 63 bits
/// (the worst case being `N` a power of two, where the size is `2*N - 1`) bounds `N` at `2^62`,
/// so the largest 0-based leaf index is `2^62 - 1`.
pub const MAX_LEAF_INDEX: u64 = 0x3FFF_FFFF_FFFF_FFFF; // 2^62 - 1

/// The 0-based insertion index of a leaf in the MMR.
///
/// This is in contrast to a [Position], which is an index into an MMR's _nodes_.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug)]
pub struct LeafIndex(u64);

impl LeafIndex {
    /// Create a new [LeafIndex], validating it does not exceed [MAX_LEAF_INDEX].
    ///
    /// # Examples
    ///
    /// ```
    /// use mweb_storage::mmr::{LeafIndex, MAX_LEAF_INDEX};
    ///
    /// let leaf = LeafIndex::new(10).unwrap();
    /// assert_eq!(leaf.byte_index(), 1);
    /// assert_eq!(leaf.bit_offset(), 2);
    /// assert_eq!(*leaf.position(), 18);
    ///
    /// assert!(LeafIndex::new(MAX_LEAF_INDEX).is_ok());
    /// assert!(LeafIndex::new(MAX_LEAF_INDEX + 1).is_err());
    /// ```
    #[inline]
    pub const fn new(index: u64) -> Result<Self, Error> {
        if index > MAX_LEAF_INDEX {
            return Err(Error::LeafOutOfRange(index));
        }
        Ok(Self(index))
    }

    /// Return the underlying `u64` value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The bitmap byte holding this leaf's bit.
    #[inline]
    pub const fn byte_index(self) -> u64 {
        self.0 / 8
    }

    /// The bit within [LeafIndex::byte_index] holding this leaf (0 is the least significant).
    #[inline]
    pub const fn bit_offset(self) -> u8 {
        (self.0 % 8) as u8
    }

    /// The mask selecting this leaf's bit within its byte.
    #[inline]
    pub const fn mask(self) -> u8 {
        1 << self.bit_offset()
    }

    /// The leaf following this one, if it is still a valid leaf.
    #[inline]
    pub const fn next(self) -> Result<Self, Error> {
        Self::new(self.0 + 1)
    }

    /// The position of this leaf among the MMR's nodes.
    #[inline]
    pub const fn position(self) -> Position {
        // 2*n cannot overflow since n <= MAX_LEAF_INDEX
        Position::new(2 * self.0 - self.0.count_ones() as u64)
    }
}

impl fmt::Display for LeafIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LeafIndex({})", self.0)
    }
}

impl Deref for LeafIndex {
    type Target = u64;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<LeafIndex> for u64 {
    #[inline]
    fn from(leaf: LeafIndex) -> Self {
        leaf.0
    }
}

impl TryFrom<u64> for LeafIndex {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<Position> for LeafIndex {
    type Error = Error;

    /// Derive the [LeafIndex] of the leaf at node [Position].
    ///
    /// Returns an error if the position is not a leaf. This computation is O(log2(n)) in the
    /// given position.
    fn try_from(pos: Position) -> Result<Self, Self::Error> {
        // Reject positions beyond the valid MMR range so `pos + 1` cannot overflow
        if pos > MAX_POSITION {
            return Err(Error::PositionOutOfRange(pos));
        }
        if *pos == 0 {
            return Ok(Self(0));
        }

        // Find the height of the perfect binary tree containing this position
        let start = u64::MAX >> (*pos + 1).leading_zeros();
        let height = start.trailing_ones();
        if height == 0 {
            return Err(Error::NonLeaf(pos));
        }
        let mut two_h = 1 << (height - 1);
        let mut cur_node = start - 1;
        let mut leaf_floor = 0u64;

        while two_h > 1 {
            if cur_node == *pos {
                return Err(Error::NonLeaf(pos));
            }
            let left_pos = cur_node - two_h;
            two_h >>= 1;
            if *pos > left_pos {
                // Every leaf of the left subtree precedes this one
                leaf_floor += two_h;
                cur_node -= 1;
            } else {
                cur_node = left_pos;
            }
        }

        Ok(Self(leaf_floor))
    }
}

impl Write for LeafIndex {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.write(buf);
    }
}

impl Read for LeafIndex {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let index = u64::read(buf)?;
        Self::new(index).map_err(|_| CodecError::Invalid("LeafIndex", "exceeds MAX_LEAF_INDEX"))
    }
}

impl FixedSize for LeafIndex {
    const SIZE: usize = u64::SIZE;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mweb_codec::{DecodeExt, Encode};
    use test_case::test_case;

    #[test_case(0, 0, 0; "first leaf")]
    #[test_case(7, 0, 7; "last bit of first byte")]
    #[test_case(8, 1, 0; "first bit of second byte")]
    #[test_case(10, 1, 2; "second byte")]
    #[test_case(MAX_LEAF_INDEX, MAX_LEAF_INDEX / 8, 7; "max leaf")]
    fn test_bitmap_address(index: u64, byte: u64, bit: u8) {
        let leaf = LeafIndex::new(index).unwrap();
        assert_eq!(leaf.byte_index(), byte);
        assert_eq!(leaf.bit_offset(), bit);
        assert_eq!(leaf.mask(), 1 << bit);
    }

    #[test]
    fn test_position_round_trip() {
        // Leaf positions of the 11-leaf MMR pictured in the module docs
        const POSITIONS: [u64; 11] = [0, 1, 3, 4, 7, 8, 10, 11, 15, 16, 18];
        for (index, expected) in POSITIONS.iter().enumerate() {
            let leaf = LeafIndex::new(index as u64).unwrap();
            assert_eq!(leaf.position(), Position::new(*expected));
            assert_eq!(LeafIndex::try_from(leaf.position()).unwrap(), leaf);
        }

        // Every leaf within the first few thousand maps back to itself
        for index in 0..5_000 {
            let leaf = LeafIndex::new(index).unwrap();
            assert_eq!(LeafIndex::try_from(leaf.position()).unwrap(), leaf);
        }
    }

    #[test]
    fn test_non_leaf_positions() {
        for pos in [2, 5, 6, 9, 12, 13, 14, 17, 20, 21] {
            let pos = Position::new(pos);
            assert_eq!(LeafIndex::try_from(pos), Err(Error::NonLeaf(pos)));
        }
        let beyond = Position::new(*MAX_POSITION + 1);
        assert_eq!(
            LeafIndex::try_from(beyond),
            Err(Error::PositionOutOfRange(beyond))
        );
    }

    #[test]
    fn test_max_leaf() {
        let max = LeafIndex::new(MAX_LEAF_INDEX).unwrap();
        assert_eq!(max.next(), Err(Error::LeafOutOfRange(MAX_LEAF_INDEX + 1)));
        assert!(max.position() <= MAX_POSITION);
        assert_eq!(
            LeafIndex::new(u64::MAX),
            Err(Error::LeafOutOfRange(u64::MAX))
        );
    }

    #[test]
    fn test_codec() {
        let leaf = LeafIndex::new(42).unwrap();
        let encoded = leaf.encode();
        assert_eq!(encoded.len(), LeafIndex::SIZE);
        assert_eq!(LeafIndex::decode(encoded).unwrap(), leaf);

        let invalid = u64::MAX.encode();
        assert!(matches!(
            LeafIndex::decode(invalid),
            Err(CodecError::Invalid("LeafIndex", _))
        ));
    }
}
