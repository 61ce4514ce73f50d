//! Container emission.
//!
//! Entries are staged one at a time in a [`PendingEntry`]: the local header
//! is built first (so its size is known up front), entry data is appended
//! block by block, and only [`ArchiveWriter::commit_entry`] touches the sink.
//! A file that fails halfway therefore never reaches the container.

use flate2::Crc;
use std::io::Write;

use crate::compression::CompressionOption;
use crate::error::{PackError, PackResult};

use super::structures::*;

/// Entries at or above this size use Zip64 sizes. Leaves headroom below
/// 4 GiB for deflate growth on incompressible data.
const ZIP64_ENTRY_THRESHOLD: u64 = 0xF000_0000;

/// Central directory record of a committed entry.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub version_needed: u16,
    pub flags: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub lfh_offset: u64,
    /// Sizes were written in Zip64 form in the local records.
    pub zip64: bool,
}

/// An entry being assembled in memory.
pub struct PendingEntry {
    file_name: String,
    compression_method: CompressionMethod,
    version_needed: u16,
    flags: u16,
    zip64: bool,
    header: Vec<u8>,
    data: Vec<u8>,
    crc: Crc,
    uncompressed_size: u64,
}

impl PendingEntry {
    /// Size of the local file header including name and extra field.
    pub fn lfh_size(&self) -> u64 {
        self.header.len() as u64
    }

    /// Append one block. `raw` is the uncompressed block used for the CRC;
    /// `encoded` is what goes into the container.
    pub fn append_block(&mut self, raw: &[u8], encoded: &[u8]) {
        self.crc.update(raw);
        self.uncompressed_size += raw.len() as u64;
        self.data.extend_from_slice(encoded);
    }

    pub fn compressed_size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }
}

pub struct ArchiveWriter<W: Write> {
    sink: W,
    offset: u64,
    timestamp: DosTimestamp,
    entries: Vec<ArchiveEntry>,
    finished: bool,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(sink: W, timestamp: DosTimestamp) -> Self {
        Self {
            sink,
            offset: 0,
            timestamp,
            entries: Vec::new(),
            finished: false,
        }
    }

    /// Build the local header for a new entry and stage it.
    pub fn begin_entry(
        &self,
        file_name: &str,
        option: CompressionOption,
        uncompressed_size: u64,
    ) -> PackResult<PendingEntry> {
        if self.finished {
            return Err(PackError::InvalidState(
                "Archive central directory already written".to_string(),
            ));
        }

        let compression_method = CompressionMethod::for_option(option);
        let flags = FLAG_DATA_DESCRIPTOR | FLAG_UTF8 | CompressionMethod::level_flags(option);
        let header = LocalFileHeader {
            flags,
            compression_method,
            timestamp: self.timestamp,
            file_name,
            zip64: uncompressed_size >= ZIP64_ENTRY_THRESHOLD,
        };

        let mut bytes = Vec::with_capacity(header.encoded_len());
        header.write_to(&mut bytes)?;

        Ok(PendingEntry {
            file_name: file_name.to_string(),
            compression_method,
            version_needed: header.version_needed(),
            flags,
            zip64: header.zip64,
            header: bytes,
            data: Vec::with_capacity(uncompressed_size.min(1 << 20) as usize),
            crc: Crc::new(),
            uncompressed_size: 0,
        })
    }

    /// Write a staged entry (header, data, data descriptor) to the sink.
    pub fn commit_entry(&mut self, entry: PendingEntry) -> PackResult<&ArchiveEntry> {
        if self.finished {
            return Err(PackError::InvalidState(
                "Archive central directory already written".to_string(),
            ));
        }

        let descriptor = DataDescriptor {
            crc32: entry.crc.sum(),
            compressed_size: entry.compressed_size(),
            uncompressed_size: entry.uncompressed_size(),
            zip64: entry.zip64,
        };
        let mut trailer = Vec::with_capacity(24);
        descriptor.write_to(&mut trailer)?;

        self.sink.write_all(&entry.header)?;
        self.sink.write_all(&entry.data)?;
        self.sink.write_all(&trailer)?;

        let lfh_offset = self.offset;
        self.offset += (entry.header.len() + entry.data.len() + trailer.len()) as u64;
        self.entries.push(ArchiveEntry {
            file_name: entry.file_name,
            compression_method: entry.compression_method,
            version_needed: entry.version_needed,
            flags: entry.flags,
            crc32: descriptor.crc32,
            compressed_size: descriptor.compressed_size,
            uncompressed_size: descriptor.uncompressed_size,
            lfh_offset,
            zip64: entry.zip64,
        });

        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Write the central directory and end records.
    pub fn finish(&mut self) -> PackResult<()> {
        if self.finished {
            return Err(PackError::InvalidState(
                "Archive central directory already written".to_string(),
            ));
        }
        self.finished = true;

        let cd_offset = self.offset;
        let mut directory = Vec::new();
        for entry in &self.entries {
            CentralDirectoryHeader {
                version_needed: entry.version_needed,
                flags: entry.flags,
                compression_method: entry.compression_method,
                timestamp: self.timestamp,
                crc32: entry.crc32,
                compressed_size: entry.compressed_size,
                uncompressed_size: entry.uncompressed_size,
                lfh_offset: entry.lfh_offset,
                file_name: &entry.file_name,
                zip64: entry.zip64,
            }
            .write_to(&mut directory)?;
        }
        let cd_size = directory.len() as u64;
        let total_entries = self.entries.len() as u64;

        let eocd = EndOfCentralDirectory::new(total_entries, cd_size, cd_offset);
        if eocd.is_zip64() {
            let eocd64_offset = cd_offset + cd_size;
            Zip64EOCD::new(total_entries, cd_size, cd_offset).write_to(&mut directory)?;
            Zip64EOCDLocator {
                disk_with_eocd64: 0,
                eocd64_offset,
                total_disks: 1,
            }
            .write_to(&mut directory)?;
        }
        eocd.write_to(&mut directory)?;

        self.sink.write_all(&directory)?;
        self.sink.flush()?;
        self.offset += directory.len() as u64;
        Ok(())
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Bytes written to the sink so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
