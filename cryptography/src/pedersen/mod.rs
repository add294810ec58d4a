//! Pedersen commitments, blinding factors, and the sums used to check conservation of value.
//!
//! A [Commitment] hides `value` as `value*G + blind*H`. Because commitments are additively
//! homomorphic, a transaction balances when the sum of its output commitments, minus the sum of
//! its input commitments, minus the sum of its kernel excesses is the identity.
//!
//! The group arithmetic itself is provided by a [CommitmentAlgebra]. This module only defines the
//! value types and the sanitizing sums layered on top of it:
//!
//! * [add_commitments] and [add_blinding_factors] drop identity entries before summing and return
//!   the identity without touching the algebra when nothing remains.
//! * [Blinds] accumulates signed blinding factor contributions and totals them once.
//!
//! # Example
//!
//! ```rust
//! use mweb_cryptography::{add_commitments, BlindingFactor, Blinds, CommitmentAlgebra, Secp256r1};
//!
//! let algebra = Secp256r1::new().unwrap();
//! let input_blind = BlindingFactor::from([1u8; 32]);
//! let output_blind = BlindingFactor::from([2u8; 32]);
//!
//! // Spend 10 into 10
//! let input = algebra.commit(10, &input_blind).unwrap();
//! let output = algebra.commit(10, &output_blind).unwrap();
//!
//! // The kernel excess commits to zero with the leftover blind
//! let excess_blind = Blinds::new().add(input_blind).sub(output_blind).total(&algebra).unwrap();
//! let excess = algebra.commit(0, &excess_blind).unwrap();
//!
//! let sum = add_commitments(&algebra, &[output, excess], &[input]).unwrap();
//! assert!(sum.is_zero());
//! ```

use crate::{read_array, Error};
use bytes::{Buf, BufMut};
use mweb_codec::{Error as CodecError, FixedSize, Read, Write};
use mweb_utils::hex;
use rand::{CryptoRng, RngCore};
use std::{
    fmt::{Debug, Display},
    ops::Deref,
};
use tracing::trace;

mod blinds;
pub use blinds::Blinds;

const BLINDING_FACTOR_LENGTH: usize = 32;
const COMMITMENT_LENGTH: usize = 33; // Y-Parity || X

/// A 256-bit scalar used to blind a committed value.
///
/// The all-zero encoding is the additive identity.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct BlindingFactor([u8; BLINDING_FACTOR_LENGTH]);

impl BlindingFactor {
    /// The additive identity.
    pub const fn zero() -> Self {
        Self([0u8; BLINDING_FACTOR_LENGTH])
    }

    /// Returns true if this is the additive identity.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; BLINDING_FACTOR_LENGTH]
    }

    /// Generate a random blinding factor.
    ///
    /// The most significant bit is cleared so the result is a canonical scalar for any 256-bit
    /// prime-order group whose order exceeds `2^255`.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut array = [0u8; BLINDING_FACTOR_LENGTH];
        rng.fill_bytes(&mut array);
        array[0] &= 0x7f;
        Self(array)
    }
}

impl Write for BlindingFactor {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.write(buf);
    }
}

impl Read for BlindingFactor {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        read_array(buf, "BlindingFactor").map(Self)
    }
}

impl FixedSize for BlindingFactor {
    const SIZE: usize = BLINDING_FACTOR_LENGTH;
}

impl From<[u8; BLINDING_FACTOR_LENGTH]> for BlindingFactor {
    fn from(value: [u8; BLINDING_FACTOR_LENGTH]) -> Self {
        Self(value)
    }
}

impl TryFrom<&[u8]> for BlindingFactor {
    type Error = Error;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; BLINDING_FACTOR_LENGTH] = value
            .try_into()
            .map_err(|_| Error::InvalidBlindingFactorLength)?;
        Ok(Self(array))
    }
}

impl AsRef<[u8]> for BlindingFactor {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for BlindingFactor {
    type Target = [u8; BLINDING_FACTOR_LENGTH];
    fn deref(&self) -> &[u8; BLINDING_FACTOR_LENGTH] {
        &self.0
    }
}

impl Debug for BlindingFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}

/// A Pedersen commitment in compressed form (SEC 1, Version 2.0, Section 2.3.3).
///
/// The identity (point at infinity) has no compressed encoding and is represented by 33 zero
/// bytes.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Commitment([u8; COMMITMENT_LENGTH]);

impl Commitment {
    /// The identity commitment.
    pub const fn zero() -> Self {
        Self([0u8; COMMITMENT_LENGTH])
    }

    /// Returns true if this is the identity commitment.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; COMMITMENT_LENGTH]
    }
}

impl Default for Commitment {
    fn default() -> Self {
        Self::zero()
    }
}

impl Write for Commitment {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.write(buf);
    }
}

impl Read for Commitment {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        read_array(buf, "Commitment").map(Self)
    }
}

impl FixedSize for Commitment {
    const SIZE: usize = COMMITMENT_LENGTH;
}

impl From<[u8; COMMITMENT_LENGTH]> for Commitment {
    fn from(value: [u8; COMMITMENT_LENGTH]) -> Self {
        Self(value)
    }
}

impl TryFrom<&[u8]> for Commitment {
    type Error = Error;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; COMMITMENT_LENGTH] = value
            .try_into()
            .map_err(|_| Error::InvalidCommitmentLength)?;
        Ok(Self(array))
    }
}

impl AsRef<[u8]> for Commitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Commitment {
    type Target = [u8; COMMITMENT_LENGTH];
    fn deref(&self) -> &[u8; COMMITMENT_LENGTH] {
        &self.0
    }
}

impl Debug for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}

impl Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}

/// Group arithmetic over Pedersen commitments and their blinding factors.
///
/// Implementations are constructed once (deriving any generators they need) and then shared
/// read-only between any number of validation attempts.
pub trait CommitmentAlgebra: Clone + Send + Sync + 'static {
    /// Commit to `value` with `blind`, returning `value*G + blind*H`.
    fn commit(&self, value: u64, blind: &BlindingFactor) -> Result<Commitment, Error>;

    /// Returns `sum(positive) - sum(negative)`.
    fn commit_sum(
        &self,
        positive: &[Commitment],
        negative: &[Commitment],
    ) -> Result<Commitment, Error>;

    /// Returns `sum(positive) - sum(negative)` over the scalar field.
    fn blind_sum(
        &self,
        positive: &[BlindingFactor],
        negative: &[BlindingFactor],
    ) -> Result<BlindingFactor, Error>;
}

/// Sum commitments, skipping identity entries.
///
/// Returns [Commitment::zero] without consulting `algebra` if every entry is the identity
/// (including when both lists are empty).
pub fn add_commitments<A: CommitmentAlgebra>(
    algebra: &A,
    positive: &[Commitment],
    negative: &[Commitment],
) -> Result<Commitment, Error> {
    let positive: Vec<Commitment> = positive.iter().filter(|c| !c.is_zero()).copied().collect();
    let negative: Vec<Commitment> = negative.iter().filter(|c| !c.is_zero()).copied().collect();
    if positive.is_empty() && negative.is_empty() {
        return Ok(Commitment::zero());
    }
    trace!(
        positive = positive.len(),
        negative = negative.len(),
        "summing commitments"
    );
    algebra.commit_sum(&positive, &negative)
}

/// Sum blinding factors, skipping zero entries.
///
/// Returns [BlindingFactor::zero] without consulting `algebra` if every entry is zero
/// (including when both lists are empty).
pub fn add_blinding_factors<A: CommitmentAlgebra>(
    algebra: &A,
    positive: &[BlindingFactor],
    negative: &[BlindingFactor],
) -> Result<BlindingFactor, Error> {
    let positive: Vec<BlindingFactor> =
        positive.iter().filter(|b| !b.is_zero()).copied().collect();
    let negative: Vec<BlindingFactor> =
        negative.iter().filter(|b| !b.is_zero()).copied().collect();
    if positive.is_empty() && negative.is_empty() {
        return Ok(BlindingFactor::zero());
    }
    trace!(
        positive = positive.len(),
        negative = negative.len(),
        "summing blinding factors"
    );
    algebra.blind_sum(&positive, &negative)
}

/// Commit to `value` with no blinding (i.e. `value*G`), as used for fees and peg amounts.
pub fn commit_transparent<A: CommitmentAlgebra>(
    algebra: &A,
    value: u64,
) -> Result<Commitment, Error> {
    algebra.commit(value, &BlindingFactor::zero())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::Secp256r1;
    use mweb_codec::{DecodeExt, Encode};
    use rand::{rngs::StdRng, SeedableRng};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    /// An algebra that counts how often it is consulted and fails every call.
    #[derive(Clone, Default)]
    pub(crate) struct Unreachable {
        pub(crate) calls: Arc<AtomicUsize>,
    }

    impl CommitmentAlgebra for Unreachable {
        fn commit(&self, _: u64, _: &BlindingFactor) -> Result<Commitment, Error> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Err(Error::InvalidBlindingFactor)
        }

        fn commit_sum(&self, _: &[Commitment], _: &[Commitment]) -> Result<Commitment, Error> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Err(Error::InvalidCommitment)
        }

        fn blind_sum(
            &self,
            _: &[BlindingFactor],
            _: &[BlindingFactor],
        ) -> Result<BlindingFactor, Error> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Err(Error::InvalidBlindingFactor)
        }
    }

    #[test]
    fn test_identity_sums_skip_algebra() {
        let algebra = Unreachable::default();
        assert_eq!(
            add_commitments(&algebra, &[], &[]).unwrap(),
            Commitment::zero()
        );
        assert_eq!(
            add_commitments(&algebra, &[Commitment::zero()], &[Commitment::zero()]).unwrap(),
            Commitment::zero()
        );
        assert_eq!(
            add_blinding_factors(&algebra, &[], &[]).unwrap(),
            BlindingFactor::zero()
        );
        assert_eq!(
            add_blinding_factors(&algebra, &[BlindingFactor::zero()], &[]).unwrap(),
            BlindingFactor::zero()
        );
        assert_eq!(algebra.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_algebra_errors_propagate() {
        let algebra = Unreachable::default();
        let blind = BlindingFactor::from([1u8; 32]);
        assert_eq!(
            add_blinding_factors(&algebra, &[blind], &[]),
            Err(Error::InvalidBlindingFactor)
        );
        let commitment = Commitment::from([2u8; 33]);
        assert_eq!(
            add_commitments(&algebra, &[], &[commitment]),
            Err(Error::InvalidCommitment)
        );
        assert_eq!(algebra.calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_add_commitments_ignores_identity() {
        let algebra = Secp256r1::new().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let c = algebra.commit(7, &BlindingFactor::random(&mut rng)).unwrap();
        assert_eq!(
            add_commitments(&algebra, &[c, Commitment::zero()], &[]).unwrap(),
            add_commitments(&algebra, &[c], &[]).unwrap()
        );
        assert_eq!(add_commitments(&algebra, &[c], &[]).unwrap(), c);
    }

    #[test]
    fn test_balanced_transaction() {
        let algebra = Secp256r1::new().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let input_blind = BlindingFactor::random(&mut rng);
        let output_blind = BlindingFactor::random(&mut rng);

        let input = algebra.commit(1_000, &input_blind).unwrap();
        let output = algebra.commit(1_000, &output_blind).unwrap();
        let excess_blind = add_blinding_factors(&algebra, &[input_blind], &[output_blind]).unwrap();
        let excess = algebra.commit(0, &excess_blind).unwrap();

        // Balanced
        let sum = add_commitments(&algebra, &[output, excess], &[input]).unwrap();
        assert!(sum.is_zero());

        // Perturb the output amount
        let perturbed = algebra.commit(1_001, &output_blind).unwrap();
        let sum = add_commitments(&algebra, &[perturbed, excess], &[input]).unwrap();
        assert!(!sum.is_zero());

        // The imbalance is exactly one unit of G
        assert_eq!(sum, commit_transparent(&algebra, 1).unwrap());
    }

    #[test]
    fn test_commit_transparent_zero_is_identity() {
        let algebra = Secp256r1::new().unwrap();
        assert!(commit_transparent(&algebra, 0).unwrap().is_zero());
        assert!(!commit_transparent(&algebra, 1).unwrap().is_zero());
    }

    #[test]
    fn test_try_from_lengths() {
        assert_eq!(
            BlindingFactor::try_from(&[0u8; 33][..]),
            Err(Error::InvalidBlindingFactorLength)
        );
        assert_eq!(
            Commitment::try_from(&[0u8; 32][..]),
            Err(Error::InvalidCommitmentLength)
        );
        assert!(Commitment::try_from(&[0u8; 33][..]).unwrap().is_zero());
    }

    #[test]
    fn test_codec() {
        let mut rng = StdRng::seed_from_u64(2);
        let blind = BlindingFactor::random(&mut rng);
        let encoded = blind.encode();
        assert_eq!(encoded.len(), BlindingFactor::SIZE);
        assert_eq!(BlindingFactor::decode(encoded).unwrap(), blind);

        let algebra = Secp256r1::new().unwrap();
        let commitment = algebra.commit(5, &blind).unwrap();
        let encoded = commitment.encode();
        assert_eq!(encoded.len(), Commitment::SIZE);
        assert_eq!(Commitment::decode(encoded).unwrap(), commitment);

        assert!(Commitment::decode(&[0u8; 32][..]).is_err());
    }
}
