//! # pkgwriter
//!
//! Streaming writer for zip-based application packages that carry a
//! block-level hash map.
//!
//! A package is an ordinary zip container holding the payload files plus
//! three generated footprint files:
//!
//! - `AppxManifest.xml`: the package manifest, supplied by the caller at finalize
//! - `AppxBlockMap.xml`: a SHA-256 digest for every 64 KiB block of every file,
//!   computed over the uncompressed bytes, so a consumer can verify data
//!   incrementally while streaming
//! - `[Content_Types].xml`: the content type of every part
//!
//! ## Features
//!
//! - Strict open/closed lifecycle; failed files leave no partial entries
//! - Reserved footprint names are rejected as payload, case-insensitively
//! - Per-extension default content types with per-file overrides
//! - STORED and DEFLATE entries, ZIP64 for large entries and archives
//! - Packing a whole directory in last-modified order
//!
//! ## Example
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::Cursor;
//! use pkgwriter::{CompressionOption, PackageWriter};
//!
//! fn main() -> pkgwriter::PackResult<()> {
//!     let mut writer = PackageWriter::open(File::create("app.msix")?);
//!
//!     let mut payload = Cursor::new(b"hello world".to_vec());
//!     writer.add_payload_file("readme.txt", "text/plain", CompressionOption::Normal, &mut payload)?;
//!
//!     let mut manifest = File::open("AppxManifest.xml")?;
//!     writer.finalize(&mut manifest)?;
//!     Ok(())
//! }
//! ```

pub mod block_map;
pub mod compression;
pub mod config;
pub mod content_types;
pub mod error;
pub mod footprint;
pub mod hash;
pub mod io;
pub mod writer;
pub mod xml;
pub mod zip;

pub use block_map::{BlockMapBuilder, BlockMapFile, BlockRecord};
pub use compression::{BlockEncoder, CompressionOption, CompressionProvider, DeflateCompressor};
pub use config::{DEFAULT_BLOCK_SIZE, WriterConfig};
pub use content_types::{ContentTypeEntry, ContentTypeInfo, ContentTypeTable, ContentTypeTracker};
pub use error::{ErrorKind, PackError, PackResult};
pub use footprint::{FootprintFile, is_footprint_file};
pub use hash::{HashProvider, Sha256Hasher};
pub use io::{LocalDirectory, PackageDirectory, PayloadSource};
pub use writer::{PackageWriter, PayloadFile, WriterState};
pub use xml::{XmlState, XmlWriter};
pub use zip::{ArchiveEntry, ArchiveWriter};
