use bytes::{Buf, BufMut};
use mweb_codec::{Encode, Error as CodecError, FixedSize, Read, ReadExt, Write};
use mweb_cryptography::{hash, sha256::Digest, BlindingFactor};
use std::{fmt, ops::Deref};

/// The header of an extension block.
///
/// Fields are encoded in declaration order with integers in big-endian.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub height: u64,
    pub output_root: Digest,
    pub range_proof_root: Digest,
    pub kernel_root: Digest,

    /// Root of the leaf set after this block is applied.
    pub leafset_root: Digest,

    /// Blinding factor split off from the kernel excesses of the block.
    pub offset: BlindingFactor,

    /// Number of outputs (leaves) in the output MMR after this block is applied.
    pub output_mmr_size: u64,

    /// Number of kernels (leaves) in the kernel MMR after this block is applied.
    pub kernel_mmr_size: u64,
}

impl Header {
    /// Hash the header once, producing a [SealedHeader].
    pub fn seal(self) -> SealedHeader {
        let digest = hash(&self.encode());
        SealedHeader {
            header: self,
            digest,
        }
    }
}

impl Write for Header {
    fn write(&self, buf: &mut impl BufMut) {
        self.height.write(buf);
        self.output_root.write(buf);
        self.range_proof_root.write(buf);
        self.kernel_root.write(buf);
        self.leafset_root.write(buf);
        self.offset.write(buf);
        self.output_mmr_size.write(buf);
        self.kernel_mmr_size.write(buf);
    }
}

impl Read for Header {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        Ok(Self {
            height: u64::read(buf)?,
            output_root: Digest::read(buf)?,
            range_proof_root: Digest::read(buf)?,
            kernel_root: Digest::read(buf)?,
            leafset_root: Digest::read(buf)?,
            offset: BlindingFactor::read(buf)?,
            output_mmr_size: u64::read(buf)?,
            kernel_mmr_size: u64::read(buf)?,
        })
    }
}

impl FixedSize for Header {
    const SIZE: usize = u64::SIZE
        + Digest::SIZE * 4
        + BlindingFactor::SIZE
        + u64::SIZE
        + u64::SIZE;
}

/// A [Header] paired with its digest.
///
/// The digest is computed once by [Header::seal] and the header cannot be modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedHeader {
    header: Header,
    digest: Digest,
}

impl SealedHeader {
    /// Returns the SHA-256 digest of the encoded header.
    pub fn digest(&self) -> Digest {
        self.digest
    }

    /// Returns the header, discarding its digest.
    pub fn into_inner(self) -> Header {
        self.header
    }
}

impl Deref for SealedHeader {
    type Target = Header;
    fn deref(&self) -> &Header {
        &self.header
    }
}

impl fmt::Display for SealedHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.digest)
    }
}

impl Write for SealedHeader {
    fn write(&self, buf: &mut impl BufMut) {
        self.header.write(buf);
    }
}

impl Read for SealedHeader {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        Header::read(buf).map(Header::seal)
    }
}

impl FixedSize for SealedHeader {
    const SIZE: usize = Header::SIZE;
}
