//! ZIP container emission.
//!
//! This module writes the binary container that carries a package:
//!
//! - [`structures`]: Data structures representing ZIP format elements (local
//!   headers, data descriptors, central directory, EOCD, Zip64 records)
//! - [`writer`]: [`ArchiveWriter`], which stages entries and emits them in
//!   insertion order followed by the central directory
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Every entry is written with a data descriptor, so the CRC and compressed
//! size follow the data instead of being patched into the local header.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for entries and archives > 4GB
//! - STORED (no compression) method
//! - DEFLATE compression method
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support

mod structures;
mod writer;

pub use structures::*;
pub use writer::{ArchiveEntry, ArchiveWriter, PendingEntry};
