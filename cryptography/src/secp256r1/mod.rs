//! Pedersen commitments over secp256r1 (NIST P-256).
//!
//! Commitments are `value*G + blind*H` where `G` is the standard base point and `H` is derived with
//! hash-to-curve ([RFC 9380](https://datatracker.ietf.org/doc/html/rfc9380), `P256_XMD:SHA-256_SSWU_RO_`)
//! so that nobody knows its discrete logarithm with respect to `G`. Points are exchanged in
//! compressed form (SEC 1, Version 2.0, Section 2.3.3) and the identity is encoded as
//! [Commitment::zero].
//!
//! # Example
//! ```rust
//! use mweb_cryptography::{BlindingFactor, CommitmentAlgebra, Secp256r1};
//!
//! // Derive the generators once
//! let algebra = Secp256r1::new().unwrap();
//!
//! // Commitments are additively homomorphic
//! let a = algebra.commit(3, &BlindingFactor::from([1u8; 32])).unwrap();
//! let b = algebra.commit(4, &BlindingFactor::from([2u8; 32])).unwrap();
//! let blind = algebra
//!     .blind_sum(&[BlindingFactor::from([1u8; 32]), BlindingFactor::from([2u8; 32])], &[])
//!     .unwrap();
//! assert_eq!(algebra.commit_sum(&[a, b], &[]).unwrap(), algebra.commit(7, &blind).unwrap());
//! ```

use crate::{BlindingFactor, Commitment, CommitmentAlgebra, Error};
use p256::{
    elliptic_curve::{
        hash2curve::{ExpandMsgXmd, GroupDigest},
        sec1::{FromEncodedPoint, ToEncodedPoint},
        PrimeField,
    },
    AffinePoint, EncodedPoint, FieldBytes, NistP256, ProjectivePoint, Scalar,
};
use sha2::Sha256;
use tracing::debug;

/// Domain separation tag used to derive the value-blinding generator `H`.
const GENERATOR_H_DST: &[u8] = b"MWEB-PEDERSEN-V1_P256_XMD:SHA-256_SSWU_RO_";

/// Message hashed to the curve to derive `H`.
const GENERATOR_H_MSG: &[u8] = b"blinding generator";

/// Pedersen [CommitmentAlgebra] over secp256r1.
#[derive(Clone, Debug)]
pub struct Secp256r1 {
    h: ProjectivePoint,
}

impl Secp256r1 {
    /// Derive the generators.
    pub fn new() -> Result<Self, Error> {
        let h = NistP256::hash_from_bytes::<ExpandMsgXmd<Sha256>>(
            &[GENERATOR_H_MSG],
            &[GENERATOR_H_DST],
        )
        .map_err(|_| Error::GeneratorDerivation)?;
        let algebra = Self { h };
        debug!(h = %algebra.generator_h()?, "derived blinding generator");
        Ok(algebra)
    }

    /// Returns the encoding of the blinding generator `H`.
    pub fn generator_h(&self) -> Result<Commitment, Error> {
        encode_point(&self.h)
    }
}

/// Parse a blinding factor as a canonical scalar.
fn decode_scalar(blind: &BlindingFactor) -> Result<Scalar, Error> {
    let repr = *FieldBytes::from_slice(blind.as_ref());
    Option::<Scalar>::from(Scalar::from_repr(repr)).ok_or(Error::InvalidBlindingFactor)
}

fn encode_scalar(scalar: &Scalar) -> BlindingFactor {
    let mut array = [0u8; 32];
    array.copy_from_slice(&scalar.to_repr());
    BlindingFactor::from(array)
}

fn decode_point(commitment: &Commitment) -> Result<ProjectivePoint, Error> {
    if commitment.is_zero() {
        return Ok(ProjectivePoint::IDENTITY);
    }
    // Only compressed points are accepted so every point has exactly one encoding
    if !matches!(commitment[0], 0x02 | 0x03) {
        return Err(Error::InvalidCommitment);
    }
    let encoded =
        EncodedPoint::from_bytes(commitment.as_ref()).map_err(|_| Error::InvalidCommitment)?;
    let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or(Error::InvalidCommitment)?;
    Ok(ProjectivePoint::from(affine))
}

fn encode_point(point: &ProjectivePoint) -> Result<Commitment, Error> {
    if *point == ProjectivePoint::IDENTITY {
        return Ok(Commitment::zero());
    }
    let encoded = point.to_affine().to_encoded_point(true);
    Commitment::try_from(encoded.as_bytes())
}

impl CommitmentAlgebra for Secp256r1 {
    fn commit(&self, value: u64, blind: &BlindingFactor) -> Result<Commitment, Error> {
        let blind = decode_scalar(blind)?;
        let point = ProjectivePoint::GENERATOR * Scalar::from(value) + self.h * blind;
        encode_point(&point)
    }

    fn commit_sum(
        &self,
        positive: &[Commitment],
        negative: &[Commitment],
    ) -> Result<Commitment, Error> {
        let mut sum = ProjectivePoint::IDENTITY;
        for commitment in positive {
            sum += decode_point(commitment)?;
        }
        for commitment in negative {
            sum -= decode_point(commitment)?;
        }
        encode_point(&sum)
    }

    fn blind_sum(
        &self,
        positive: &[BlindingFactor],
        negative: &[BlindingFactor],
    ) -> Result<BlindingFactor, Error> {
        let mut sum = Scalar::ZERO;
        for blind in positive {
            sum += decode_scalar(blind)?;
        }
        for blind in negative {
            sum -= decode_scalar(blind)?;
        }
        Ok(encode_scalar(&sum))
    }
}
