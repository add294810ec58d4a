//! Persist the leaf set of an extension block chain and the metadata needed to recover it.
//!
//! # Status
//!
//! `mweb-storage` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

pub mod leafset;
pub mod metadata;
pub mod mmr;
