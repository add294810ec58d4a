//! SHA-256 digests for leaf-set roots and header hashes.
//!
//! # Example
//! ```rust
//! use mweb_cryptography::{hash, Hasher, Sha256};
//!
//! // A leaf set holding leaves 0 and 2 of 3
//! let bitmap = [0b0000_0101u8];
//!
//! let mut hasher = Sha256::new();
//! hasher.update(&bitmap);
//! assert_eq!(hasher.finalize(), hash(&bitmap));
//! ```

use crate::{read_array, Error, Hasher};
use bytes::{Buf, BufMut};
use mweb_codec::{Error as CodecError, FixedSize, Read, Write};
use mweb_utils::hex;
use sha2::{Digest as _, Sha256 as Inner};
use std::{
    fmt::{Debug, Display},
    ops::Deref,
};

const DIGEST_LENGTH: usize = 32;

/// Hash `message` in one call.
pub fn hash(message: &[u8]) -> Digest {
    Digest(Inner::digest(message).into())
}

/// Incremental SHA-256.
#[derive(Clone, Debug, Default)]
pub struct Sha256 {
    inner: Inner,
}

impl Hasher for Sha256 {
    type Digest = Digest;

    fn new() -> Self {
        Self::default()
    }

    fn update(&mut self, message: &[u8]) {
        self.inner.update(message);
    }

    fn finalize(&mut self) -> Digest {
        Digest(self.inner.finalize_reset().into())
    }
}

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Digest([u8; DIGEST_LENGTH]);

impl crate::Digest for Digest {}

impl Write for Digest {
    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.0);
    }
}

impl Read for Digest {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        read_array(buf, "Digest").map(Self)
    }
}

impl FixedSize for Digest {
    const SIZE: usize = DIGEST_LENGTH;
}

impl From<[u8; DIGEST_LENGTH]> for Digest {
    fn from(value: [u8; DIGEST_LENGTH]) -> Self {
        Self(value)
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Error> {
        value
            .try_into()
            .map(Self)
            .map_err(|_| Error::InvalidDigestLength)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Digest {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex(&self.0))
    }
}
