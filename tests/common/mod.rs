//! Minimal container reader for verifying written packages.
//!
//! Reads the EOCD from the end of the buffer, walks the central directory,
//! then locates each entry's data through its local file header.

#![allow(dead_code)]

use anyhow::{Result, bail};
use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::DeflateDecoder;
use std::io::{Cursor, Read};

use pkgwriter::zip::{CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader};

#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: u16,
    pub flags: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
}

pub struct Package {
    pub bytes: Vec<u8>,
    pub entries: Vec<ZipFileEntry>,
}

impl Package {
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < EndOfCentralDirectory::SIZE {
            bail!("Not a valid ZIP file");
        }
        let eocd = &bytes[bytes.len() - EndOfCentralDirectory::SIZE..];
        if &eocd[0..4] != EndOfCentralDirectory::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }
        let mut cursor = Cursor::new(&eocd[10..]);
        let total_entries = cursor.read_u16::<LittleEndian>()?;
        let cd_size = cursor.read_u32::<LittleEndian>()?;
        let cd_offset = cursor.read_u32::<LittleEndian>()?;
        if total_entries == u16::MAX || cd_size == u32::MAX || cd_offset == u32::MAX {
            bail!("ZIP64 archives are not expected in tests");
        }

        let start = cd_offset as usize;
        let end = start + cd_size as usize;
        let mut cursor = Cursor::new(&bytes[start..end]);
        let mut entries = Vec::with_capacity(total_entries as usize);
        for _ in 0..total_entries {
            entries.push(parse_cdfh(&mut cursor)?);
        }

        Ok(Self { bytes, entries })
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.file_name.as_str()).collect()
    }

    pub fn entry(&self, name: &str) -> Result<&ZipFileEntry> {
        match self.entries.iter().find(|e| e.file_name == name) {
            Some(entry) => Ok(entry),
            None => bail!("No entry named {name}"),
        }
    }

    /// Size of the local file header including name and extra field.
    pub fn lfh_size(&self, entry: &ZipFileEntry) -> Result<u64> {
        let offset = entry.lfh_offset as usize;
        let header = &self.bytes[offset..offset + LocalFileHeader::SIZE];
        if header[0..4] != LocalFileHeader::SIGNATURE.to_le_bytes() {
            bail!("Invalid Local File Header");
        }
        let mut cursor = Cursor::new(&header[26..]);
        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;
        Ok(LocalFileHeader::SIZE as u64 + file_name_length + extra_field_length)
    }

    /// Uncompressed contents of an entry.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self.entry(name)?;
        let start = (entry.lfh_offset + self.lfh_size(entry)?) as usize;
        let data = &self.bytes[start..start + entry.compressed_size as usize];

        let contents = match entry.compression_method {
            0 => data.to_vec(),
            8 => {
                let mut out = Vec::new();
                DeflateDecoder::new(data).read_to_end(&mut out)?;
                out
            }
            other => bail!("Unsupported compression method: {other}"),
        };

        let mut crc = flate2::Crc::new();
        crc.update(&contents);
        if crc.sum() != entry.crc32 {
            bail!("CRC mismatch for {name}");
        }
        Ok(contents)
    }

    pub fn read_string(&self, name: &str) -> Result<String> {
        Ok(String::from_utf8(self.read(name)?)?)
    }
}

fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
    let signature = cursor.read_u32::<LittleEndian>()?;
    if signature != CentralDirectoryHeader::SIGNATURE {
        bail!("Invalid Central Directory File Header");
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    let file_name = String::from_utf8(file_name_bytes)?;

    let skip = extra_field_length as u64 + file_comment_length as u64;
    cursor.set_position(cursor.position() + skip);

    Ok(ZipFileEntry {
        file_name,
        compression_method,
        flags,
        crc32,
        compressed_size,
        uncompressed_size,
        lfh_offset,
        last_mod_time,
        last_mod_date,
    })
}

/// Parse a DOS date to (year, month, day)
pub fn dos_date(date: u16) -> (u16, u8, u8) {
    let day = (date & 0x1F) as u8;
    let month = ((date >> 5) & 0x0F) as u8;
    let year = ((date >> 9) & 0x7F) + 1980;
    (year, month, day)
}

/// Parse a DOS time to (hour, minute, second)
pub fn dos_time(time: u16) -> (u8, u8, u8) {
    let second = ((time & 0x1F) * 2) as u8;
    let minute = ((time >> 5) & 0x3F) as u8;
    let hour = ((time >> 11) & 0x1F) as u8;
    (hour, minute, second)
}

/// Values of `attr` on every `<element ...>` tag, in document order.
pub fn attribute_values(xml: &str, element: &str, attr: &str) -> Vec<String> {
    let open = format!("<{element} ");
    let key = format!(" {attr}=\"");
    xml.match_indices(&open)
        .filter_map(|(pos, _)| {
            let tag_end = xml[pos..].find('>')? + pos;
            let tag = &xml[pos..tag_end];
            let start = tag.find(&key)? + key.len();
            let len = tag[start..].find('"')?;
            Some(tag[start..start + len].to_string())
        })
        .collect()
}
