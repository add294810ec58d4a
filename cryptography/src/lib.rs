//! Hash leaf-set state and aggregate Pedersen commitments and blinding factors.
//!
//! # Status
//!
//! `mweb-cryptography` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

use bytes::Buf;
use mweb_codec::{FixedSize, Read, Write};
use std::{
    fmt::{Debug, Display},
    hash::Hash,
};
use thiserror::Error;

pub mod pedersen;
pub use pedersen::{
    add_blinding_factors, add_commitments, commit_transparent, BlindingFactor, Blinds,
    Commitment, CommitmentAlgebra,
};
pub mod secp256r1;
pub use secp256r1::Secp256r1;
pub mod sha256;
pub use sha256::{hash, Sha256};

/// Errors that can occur when operating on digests, commitments, or blinding factors.
///
/// Any failure raised by a [CommitmentAlgebra] is consensus-relevant and should be treated as a
/// rejection of the data being validated (never as an infrastructure fault).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid digest length")]
    InvalidDigestLength,
    #[error("invalid blinding factor length")]
    InvalidBlindingFactorLength,
    #[error("invalid commitment length")]
    InvalidCommitmentLength,
    #[error("blinding factor is not a canonical scalar")]
    InvalidBlindingFactor,
    #[error("commitment is not a valid curve point")]
    InvalidCommitment,
    #[error("failed to derive generator")]
    GeneratorDerivation,
}

/// A fixed-size digest committing to leaf-set state or a header.
pub trait Digest:
    Copy
    + Eq
    + Ord
    + Hash
    + Debug
    + Display
    + AsRef<[u8]>
    + Write
    + Read<Cfg = ()>
    + FixedSize
    + Send
    + Sync
    + 'static
{
}

/// Incremental hashing over any number of byte slices.
pub trait Hasher: Clone + Send + Sync + 'static {
    /// Digest generated by the hasher.
    type Digest: Digest;

    /// Create a new hasher.
    fn new() -> Self;

    /// Append `message` to the data hashed so far.
    fn update(&mut self, message: &[u8]);

    /// Hash all recorded data, leaving the hasher ready for reuse.
    fn finalize(&mut self) -> Self::Digest;

    /// Returns the digest of the empty message.
    fn empty() -> Self::Digest {
        Self::new().finalize()
    }
}

/// Read a fixed-size byte array from `buf`, attributing failures to `context`.
pub(crate) fn read_array<const N: usize>(
    buf: &mut impl Buf,
    context: &'static str,
) -> Result<[u8; N], mweb_codec::Error> {
    <[u8; N]>::read_cfg(buf, &()).map_err(|err| mweb_codec::Error::Wrapped(context, err.into()))
}
