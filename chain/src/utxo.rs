use bytes::{Buf, BufMut};
use mweb_codec::{Error as CodecError, FixedSize, Read, ReadExt, Write};
use mweb_cryptography::Commitment;
use mweb_storage::mmr::LeafIndex;

/// An unspent output, located by the leaf it occupies in the output MMR.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Utxo {
    /// Height of the block that created the output.
    pub block_height: u64,
    pub leaf_index: LeafIndex,
    pub commitment: Commitment,
}

impl Write for Utxo {
    fn write(&self, buf: &mut impl BufMut) {
        self.block_height.write(buf);
        self.leaf_index.write(buf);
        self.commitment.write(buf);
    }
}

impl Read for Utxo {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        Ok(Self {
            block_height: u64::read(buf)?,
            leaf_index: LeafIndex::read(buf)?,
            commitment: Commitment::read(buf)?,
        })
    }
}

impl FixedSize for Utxo {
    const SIZE: usize = u64::SIZE + LeafIndex::SIZE + Commitment::SIZE;
}
