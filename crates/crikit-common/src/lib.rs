//! Common utilities for crikit.
//!
//! This crate provides foundational types and utilities used across all
//! crikit crates:
//!
//! - [`BinaryReader`] - bounds-checked binary reading from byte slices,
//!   with explicit big- and little-endian accessors
//! - [`find_pattern`] - forward byte-pattern scanning
//! - [`fsutil`] - extraction output helpers (alignment, name cleaning,
//!   collision dedup)
//! - [`checksum`] - MD5 (used for ACB companion-AWB verification)

mod error;
mod reader;
mod search;

pub mod checksum;
pub mod fsutil;

pub use error::{Error, Result};
pub use reader::BinaryReader;
pub use search::find_pattern;

/// Re-export memchr for byte searching in downstream crates.
pub use memchr;
