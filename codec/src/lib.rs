//! Serialize fixed-width consensus structures.
//!
//! # Overview
//!
//! A binary serialization library designed to efficiently and safely:
//! - Serialize structured data into a binary format
//! - Deserialize untrusted binary input into structured data
//!
//! Every value handled by the extension block core (headers, digests, commitments, blinding
//! factors, leaf indices) has a constant encoded size, so this crate only deals in fixed-width
//! encodings. All integers are written big-endian.
//!
//! # Example
//!
//! ```
//! use bytes::{Buf, BufMut};
//! use mweb_codec::{DecodeExt, Encode, Error, FixedSize, Read, ReadExt, Write};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Point {
//!     x: u32,
//!     y: u32,
//! }
//!
//! impl Write for Point {
//!     fn write(&self, buf: &mut impl BufMut) {
//!         self.x.write(buf);
//!         self.y.write(buf);
//!     }
//! }
//!
//! impl Read for Point {
//!     type Cfg = ();
//!     fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, Error> {
//!         let x = u32::read(buf)?;
//!         let y = u32::read(buf)?;
//!         Ok(Self { x, y })
//!     }
//! }
//!
//! impl FixedSize for Point {
//!     const SIZE: usize = u32::SIZE + u32::SIZE;
//! }
//!
//! let point = Point { x: 1, y: 2 };
//! let encoded = point.encode();
//! assert_eq!(encoded.len(), Point::SIZE);
//! assert_eq!(Point::decode(encoded).unwrap(), point);
//! ```

pub mod codec;
pub mod error;
pub mod types;
pub mod util;

// Re-export main types and traits
pub use codec::{Decode, DecodeExt, Encode, EncodeSize, FixedSize, Read, ReadExt, Write};
pub use error::Error;
