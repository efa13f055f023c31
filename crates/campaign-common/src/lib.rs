//! Campaign Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, the content pipeline, and logging for the campaign archive tools.
//!
//! # Overview
//!
//! - **Content Pipeline**: zlib compression, SHA-1 checksums, and secretbox
//!   encryption of embedded file payloads
//! - **Types**: dataset format tags, TAR entry types, timestamps
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use campaign_common::compression::{compress_bytes, decompress};
//!
//! let packed = compress_bytes(b"attribute table").unwrap();
//! assert_eq!(packed.len_orig, 15);
//! assert_eq!(decompress(&packed.data).unwrap(), b"attribute table");
//! ```

pub mod checksum;
pub mod compression;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::{FileFormat, TarEntryType};
