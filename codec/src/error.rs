//! Errors raised while decoding untrusted bytes.

use thiserror::Error;

/// Reasons a value could not be decoded.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unexpected end of buffer")]
    EndOfBuffer,
    #[error("extra data found: {0} bytes")]
    ExtraData(usize),
    #[error("invalid {0}: {1}")]
    Invalid(&'static str, &'static str), // context, message
    #[error("invalid {0}: {1}")]
    Wrapped(&'static str, Box<dyn std::error::Error + Send + Sync>), // context, error
}
