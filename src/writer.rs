//! Package assembly.
//!
//! [`PackageWriter`] takes payload files one at a time, attributes a content
//! type to each, splits it into fixed-size blocks, hashes every block before
//! any compression, and emits the container entry. [`PackageWriter::finalize`]
//! adds the footprint files and closes the container.
//!
//! ## Lifecycle
//!
//! A writer starts `Open`. A successful finalize moves it to `Closed`. A
//! failure that may have left bytes in the sink (a failed entry commit or any
//! finalize failure) moves it to `Failed`. Only `Open` accepts mutations.
//!
//! ## Per-file processing
//!
//! 1. Register the content type.
//! 2. Measure the source by seeking to its end.
//! 3. Open a block map entry; patch in the local header size once the header
//!    has been built.
//! 4. Read block by block, hash the raw bytes, record the block, then
//!    compress it if the entry is compressed.
//! 5. Commit the entry to the container.
//!
//! Steps 1 to 4 only touch in-memory state and are rolled back if any of
//! them fails, so a rejected file leaves no trace.

use std::collections::HashSet;
use std::io::{ErrorKind as IoErrorKind, Write};

use tracing::{debug, error, info, warn};

use crate::block_map::BlockMapBuilder;
use crate::compression::{CompressionOption, CompressionProvider, DeflateCompressor};
use crate::config::WriterConfig;
use crate::content_types::{
    BLOCK_MAP_CONTENT_TYPE, ContentTypeTracker, MANIFEST_CONTENT_TYPE, Registration,
};
use crate::error::{PackError, PackResult};
use crate::footprint::{FootprintFile, is_footprint_file};
use crate::hash::{HashProvider, Sha256Hasher};
use crate::io::{PackageDirectory, PayloadSource, stream_len};
use crate::zip::{ArchiveEntry, ArchiveWriter, DosTimestamp, PendingEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Open,
    Closed,
    /// A sink write failed or finalize did not complete. Terminal.
    Failed,
}

/// One item of a batch add.
pub struct PayloadFile<'a> {
    pub name: &'a str,
    pub content_type: &'a str,
    pub compression: CompressionOption,
    pub source: &'a mut dyn PayloadSource,
}

/// How an entry's content type is recorded.
enum Attribution<'a> {
    /// By extension, falling back to an override on conflict.
    Extension(&'a str),
    /// Always a per-file override.
    Override(&'a str),
}

pub struct PackageWriter<W: Write> {
    state: WriterState,
    config: WriterConfig,
    hasher: Box<dyn HashProvider>,
    compressor: Box<dyn CompressionProvider>,
    content_types: ContentTypeTracker,
    block_map: BlockMapBuilder,
    archive: ArchiveWriter<W>,
    /// Case-folded payload names, for duplicate detection.
    payload_names: HashSet<String>,
}

impl<W: Write> PackageWriter<W> {
    /// Open a writer with the default configuration, SHA-256 block hashes and
    /// deflate compression.
    pub fn open(sink: W) -> Self {
        Self::build(
            sink,
            WriterConfig::default(),
            Box::new(Sha256Hasher),
            Box::new(DeflateCompressor),
        )
    }

    pub fn with_config(
        sink: W,
        config: WriterConfig,
        hasher: Box<dyn HashProvider>,
        compressor: Box<dyn CompressionProvider>,
    ) -> PackResult<Self> {
        config.validate()?;
        Ok(Self::build(sink, config, hasher, compressor))
    }

    fn build(
        sink: W,
        config: WriterConfig,
        hasher: Box<dyn HashProvider>,
        compressor: Box<dyn CompressionProvider>,
    ) -> Self {
        let timestamp = DosTimestamp::from_datetime(&config.modified);
        let block_map = BlockMapBuilder::new(hasher.method_uri());
        Self {
            state: WriterState::Open,
            config,
            hasher,
            compressor,
            content_types: ContentTypeTracker::new(),
            block_map,
            archive: ArchiveWriter::new(sink, timestamp),
            payload_names: HashSet::new(),
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn block_map(&self) -> &BlockMapBuilder {
        &self.block_map
    }

    pub fn content_types(&self) -> &ContentTypeTracker {
        &self.content_types
    }

    /// Container entries written so far, in container order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        self.archive.entries()
    }

    /// Add one payload file. The source is drained before this returns.
    pub fn add_payload_file(
        &mut self,
        name: &str,
        content_type: &str,
        compression: CompressionOption,
        source: &mut dyn PayloadSource,
    ) -> PackResult<()> {
        self.ensure_open()?;
        if is_footprint_file(name) {
            return Err(PackError::InvalidParameter(format!(
                "Trying to add footprint file to package: {name}"
            )));
        }
        if content_type.trim().is_empty() || content_type.contains(char::is_control) {
            return Err(PackError::InvalidParameter(format!(
                "Missing or invalid content type for {name}"
            )));
        }
        let name = normalize_name(name)?;
        let folded = name.to_lowercase();
        if self.payload_names.contains(&folded) {
            return Err(PackError::InvalidParameter(format!(
                "Duplicate file in package: {name}"
            )));
        }

        self.add_block_mapped(&name, Attribution::Extension(content_type), compression, source)?;
        self.payload_names.insert(folded);
        Ok(())
    }

    /// Add files in order. `memory_budget` bounds the file data buffered at
    /// once; files are staged one at a time, so a single file larger than the
    /// budget cannot be honoured and is reported as not implemented.
    pub fn add_payload_files<'a>(
        &mut self,
        files: impl IntoIterator<Item = PayloadFile<'a>>,
        memory_budget: u64,
    ) -> PackResult<()> {
        self.ensure_open()?;
        if memory_budget == 0 {
            return Err(PackError::InvalidParameter(
                "Memory budget must be greater than zero".to_string(),
            ));
        }
        let mut files: Vec<PayloadFile<'a>> = files.into_iter().collect();
        debug!(memory_budget, files = files.len(), "adding payload batch");

        // Measure the whole batch first so an oversized file rejects it
        // before anything is written.
        for file in files.iter_mut() {
            let size = stream_len(&mut *file.source)?;
            if size > memory_budget {
                return Err(PackError::NotImplemented(format!(
                    "{} is {} bytes, streaming files larger than the {} byte memory budget",
                    file.name, size, memory_budget
                )));
            }
        }

        for file in files {
            self.add_payload_file(file.name, file.content_type, file.compression, file.source)?;
        }
        Ok(())
    }

    /// Add every file of `directory`, oldest first. Footprint files found on
    /// disk are skipped; they are regenerated at finalize. Content types and
    /// compression come from the configured extension table.
    pub fn pack(&mut self, directory: &dyn PackageDirectory) -> PackResult<()> {
        self.ensure_open()?;
        let table = self.config.content_types.clone();

        for name in directory.files_by_last_modified()? {
            if is_footprint_file(&name) {
                warn!(file = %name, "skipping footprint file found in package directory");
                continue;
            }
            let info = table.lookup_name(&name);
            let mut source = directory.open_file(&name)?;
            self.add_payload_file(&name, &info.content_type, info.compression, source.as_mut())?;
        }
        Ok(())
    }

    /// Write the manifest, block map and content types, then close the
    /// container. The writer is `Closed` on success and `Failed` otherwise.
    pub fn finalize(&mut self, manifest: &mut dyn PayloadSource) -> PackResult<()> {
        self.ensure_open()?;

        match self.write_footprint(manifest) {
            Ok(()) => {
                self.state = WriterState::Closed;
                info!(
                    entries = self.archive.entries().len(),
                    bytes = self.archive.offset(),
                    "package finalized"
                );
                Ok(())
            }
            Err(e) => {
                self.state = WriterState::Failed;
                error!(error = %e, "package finalize failed");
                Err(e)
            }
        }
    }

    /// Return the sink of a finalized package.
    pub fn into_inner(self) -> PackResult<W> {
        if self.state != WriterState::Closed {
            return Err(PackError::InvalidState(format!(
                "Package is not finalized ({:?})",
                self.state
            )));
        }
        Ok(self.archive.into_inner())
    }

    fn write_footprint(&mut self, manifest: &mut dyn PayloadSource) -> PackResult<()> {
        for footprint in FootprintFile::CANONICAL_ORDER {
            let name = footprint.name();
            match footprint {
                FootprintFile::Manifest => {
                    self.add_block_mapped(
                        name,
                        Attribution::Override(MANIFEST_CONTENT_TYPE),
                        CompressionOption::Normal,
                        manifest,
                    )?;
                }
                FootprintFile::BlockMap => {
                    self.content_types.add_override(name, BLOCK_MAP_CONTENT_TYPE);
                    let xml = self.block_map.to_xml()?;
                    self.write_document(name, &xml)?;
                }
                FootprintFile::ContentTypes => {
                    let xml = self.content_types.to_xml()?;
                    self.write_document(name, &xml)?;
                }
            }
            debug!(file = name, "footprint entry written");
        }
        self.archive.finish()
    }

    /// Run the per-file algorithm and commit the entry.
    fn add_block_mapped(
        &mut self,
        name: &str,
        attribution: Attribution<'_>,
        compression: CompressionOption,
        source: &mut dyn PayloadSource,
    ) -> PackResult<()> {
        let registration = match attribution {
            Attribution::Extension(content_type) => self.content_types.add(name, content_type),
            Attribution::Override(content_type) => {
                self.content_types.add_override(name, content_type)
            }
        };

        let files_before = self.block_map.files().len();
        let pending = match self.stage_blocks(name, compression, source) {
            Ok(pending) => pending,
            Err(e) => {
                self.rollback(registration, files_before);
                return Err(e);
            }
        };

        let size = pending.uncompressed_size();
        let blocks = self
            .block_map
            .files()
            .last()
            .map(|f| f.blocks.len())
            .unwrap_or_default();
        self.commit(pending)?;
        debug!(file = name, size, blocks, ?compression, "entry added");
        Ok(())
    }

    /// Steps 2 to 4: measure, open the block map entry, hash and encode.
    fn stage_blocks(
        &mut self,
        name: &str,
        compression: CompressionOption,
        source: &mut dyn PayloadSource,
    ) -> PackResult<PendingEntry> {
        let size = stream_len(source)?;

        self.block_map.add_file(name, size, 0);
        let mut pending = self.archive.begin_entry(name, compression, size)?;
        self.block_map.set_lfh_size(pending.lfh_size())?;

        let mut encoder = if compression.is_compressed() {
            Some(self.compressor.encoder(compression)?)
        } else {
            None
        };

        if size == 0 {
            if let Some(encoder) = encoder.as_mut() {
                let encoded = encoder.encode_block(&[], true)?;
                pending.append_block(&[], &encoded);
            }
            return Ok(pending);
        }

        let block_size = self.config.block_size as u64;
        let mut remaining = size;
        let mut block = Vec::with_capacity(size.min(block_size) as usize);

        while remaining > 0 {
            let len = remaining.min(block_size);
            remaining -= len;

            block.resize(len as usize, 0);
            read_block(source, &mut block, name)?;

            let digest = self
                .hasher
                .hash_block(&block)
                .map_err(|e| PackError::SignatureInvalid(format!("{name}: {e}")))?;
            self.block_map.add_block(digest, len as u32)?;

            match encoder.as_mut() {
                Some(encoder) => {
                    let encoded = encoder.encode_block(&block, remaining == 0)?;
                    pending.append_block(&block, &encoded);
                }
                None => pending.append_block(&block, &block),
            }
        }

        Ok(pending)
    }

    /// Footprint documents are not block mapped and are always deflated.
    fn write_document(&mut self, name: &str, xml: &[u8]) -> PackResult<()> {
        let compression = CompressionOption::Normal;
        let mut pending = self.archive.begin_entry(name, compression, xml.len() as u64)?;
        let mut encoder = self.compressor.encoder(compression)?;
        let encoded = encoder.encode_block(xml, true)?;
        pending.append_block(xml, &encoded);
        self.commit(pending)
    }

    fn commit(&mut self, pending: PendingEntry) -> PackResult<()> {
        if let Err(e) = self.archive.commit_entry(pending) {
            // The sink may hold part of the entry now.
            self.state = WriterState::Failed;
            error!(error = %e, "container write failed");
            return Err(e);
        }
        Ok(())
    }

    fn rollback(&mut self, registration: Registration, block_map_files: usize) {
        self.content_types.undo(registration);
        if self.block_map.files().len() > block_map_files {
            self.block_map.discard_current_file();
        }
    }

    fn ensure_open(&self) -> PackResult<()> {
        if self.state != WriterState::Open {
            return Err(PackError::InvalidState(format!(
                "Invalid package writer state: {:?}",
                self.state
            )));
        }
        Ok(())
    }
}

/// Read exactly one block, reporting a short source as [`PackError::FileRead`].
fn read_block(source: &mut dyn PayloadSource, block: &mut [u8], name: &str) -> PackResult<()> {
    source.read_exact(block).map_err(|e| match e.kind() {
        IoErrorKind::UnexpectedEof => PackError::FileRead(format!(
            "Read stream file failed: {name} ended before its declared length"
        )),
        _ => PackError::Io(e),
    })
}

/// Archive name: `/` separators, no leading separator, no empty or `..`
/// segments, no trailing separator. Control characters cannot appear in the
/// XML documents and are rejected.
fn normalize_name(name: &str) -> PackResult<String> {
    let normalized = name.replace('\\', "/");
    let normalized = normalized.trim_start_matches('/');

    let invalid = normalized.is_empty()
        || normalized.contains(char::is_control)
        || normalized.ends_with('/')
        || normalized
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(PackError::InvalidParameter(format!(
            "Invalid payload file name: {name:?}"
        )));
    }
    Ok(normalized.to_string())
}
