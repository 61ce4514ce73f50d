use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::io::Write;

use crate::compression::CompressionOption;
use crate::error::{PackError, PackResult};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
}

impl CompressionMethod {
    pub fn for_option(option: CompressionOption) -> Self {
        if option.is_compressed() {
            CompressionMethod::Deflate
        } else {
            CompressionMethod::Stored
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
        }
    }

    /// Deflate option bits (general purpose flag bits 1-2).
    pub fn level_flags(option: CompressionOption) -> u16 {
        match option {
            CompressionOption::None | CompressionOption::Normal => 0,
            CompressionOption::Maximum => 0b010,
            CompressionOption::Fast => 0b100,
        }
    }
}

/// General purpose flag bit 3: sizes and CRC follow the data.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
/// General purpose flag bit 11: name is UTF-8.
pub const FLAG_UTF8: u16 = 0x0800;

pub const VERSION_DEFAULT: u16 = 20;
pub const VERSION_ZIP64: u16 = 45;

pub const ZIP64_EXTRA_ID: u16 = 0x0001;
pub const U32_MARKER: u32 = 0xFFFF_FFFF;
pub const U16_MARKER: u16 = 0xFFFF;

/// MS-DOS packed date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosTimestamp {
    pub time: u16,
    pub date: u16,
}

impl DosTimestamp {
    /// Encode a timestamp. Dates outside 1980..=2107 clamp to the range ends.
    pub fn from_datetime(value: &NaiveDateTime) -> Self {
        if value.year() < 1980 {
            return Self {
                time: 0,
                date: (1 << 5) | 1,
            };
        }
        if value.year() > 2107 {
            return Self {
                time: (23 << 11) | (59 << 5) | 29,
                date: (127 << 9) | (12 << 5) | 31,
            };
        }
        let date = (((value.year() - 1980) as u16) << 9)
            | ((value.month() as u16) << 5)
            | value.day() as u16;
        let time = ((value.hour() as u16) << 11)
            | ((value.minute() as u16) << 5)
            | (value.second() as u16 / 2);
        Self { time, date }
    }
}

/// Local File Header (LFH) - 30 bytes plus name and extra field
pub struct LocalFileHeader<'a> {
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub timestamp: DosTimestamp,
    pub file_name: &'a str,
    /// Sizes are carried as 64-bit values in the extra field and data descriptor.
    pub zip64: bool,
}

impl LocalFileHeader<'_> {
    pub const SIGNATURE: u32 = 0x0403_4b50;
    pub const SIZE: usize = 30;

    /// Total encoded size, which is what the block map records as `LfhSize`.
    pub fn encoded_len(&self) -> usize {
        Self::SIZE + self.file_name.len() + if self.zip64 { 20 } else { 0 }
    }

    pub fn version_needed(&self) -> u16 {
        if self.zip64 {
            VERSION_ZIP64
        } else {
            VERSION_DEFAULT
        }
    }

    /// CRC and sizes are left out: they follow the data in a data descriptor.
    pub fn write_to<W: Write>(&self, out: &mut W) -> PackResult<usize> {
        let (size_field, extra_field) = if self.zip64 {
            let extra = Zip64ExtraField {
                uncompressed_size: Some(0),
                compressed_size: Some(0),
                lfh_offset: None,
            };
            (U32_MARKER, extra.to_bytes()?)
        } else {
            (0, Vec::new())
        };

        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.version_needed())?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.timestamp.time)?;
        out.write_u16::<LittleEndian>(self.timestamp.date)?;
        out.write_u32::<LittleEndian>(0)?; // crc-32
        out.write_u32::<LittleEndian>(size_field)?;
        out.write_u32::<LittleEndian>(size_field)?;
        out.write_u16::<LittleEndian>(checked_u16(self.file_name.len(), "file name")?)?;
        out.write_u16::<LittleEndian>(extra_field.len() as u16)?;
        out.write_all(self.file_name.as_bytes())?;
        out.write_all(&extra_field)?;
        Ok(Self::SIZE + self.file_name.len() + extra_field.len())
    }
}

/// Data descriptor written after entry data.
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// 8-byte sizes, used when the local header carries a Zip64 field.
    pub zip64: bool,
}

impl DataDescriptor {
    pub const SIGNATURE: u32 = 0x0807_4b50;

    pub fn write_to<W: Write>(&self, out: &mut W) -> PackResult<()> {
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        if self.zip64 {
            out.write_u64::<LittleEndian>(self.compressed_size)?;
            out.write_u64::<LittleEndian>(self.uncompressed_size)?;
        } else {
            out.write_u32::<LittleEndian>(checked_u32(self.compressed_size, "compressed size")?)?;
            out.write_u32::<LittleEndian>(checked_u32(
                self.uncompressed_size,
                "uncompressed size",
            )?)?;
        }
        Ok(())
    }
}

/// Zip64 extended information extra field. Only the values present are
/// written, in the order the format defines.
#[derive(Default)]
pub struct Zip64ExtraField {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub lfh_offset: Option<u64>,
}

impl Zip64ExtraField {
    pub fn is_empty(&self) -> bool {
        self.uncompressed_size.is_none()
            && self.compressed_size.is_none()
            && self.lfh_offset.is_none()
    }

    pub fn to_bytes(&self) -> PackResult<Vec<u8>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<u64> = [self.uncompressed_size, self.compressed_size, self.lfh_offset]
            .into_iter()
            .flatten()
            .collect();
        let mut out = Vec::with_capacity(4 + values.len() * 8);
        out.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
        out.write_u16::<LittleEndian>((values.len() * 8) as u16)?;
        for value in values {
            out.write_u64::<LittleEndian>(value)?;
        }
        Ok(out)
    }
}

/// Central Directory File Header (CDFH) - 46 bytes plus name and extra field
pub struct CentralDirectoryHeader<'a> {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub timestamp: DosTimestamp,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub lfh_offset: u64,
    pub file_name: &'a str,
    /// The local header and data descriptor use Zip64 sizes, so the sizes
    /// go into the Zip64 field regardless of their value.
    pub zip64: bool,
}

impl CentralDirectoryHeader<'_> {
    pub const SIGNATURE: u32 = 0x0201_4b50;
    pub const SIZE: usize = 46;

    pub fn write_to<W: Write>(&self, out: &mut W) -> PackResult<usize> {
        let mut zip64 = Zip64ExtraField::default();
        let (uncompressed_size, compressed_size) = if self.zip64 {
            zip64.uncompressed_size = Some(self.uncompressed_size);
            zip64.compressed_size = Some(self.compressed_size);
            (U32_MARKER, U32_MARKER)
        } else {
            (
                fit_u32(self.uncompressed_size, &mut zip64.uncompressed_size),
                fit_u32(self.compressed_size, &mut zip64.compressed_size),
            )
        };
        let lfh_offset = fit_u32(self.lfh_offset, &mut zip64.lfh_offset);
        let extra_field = zip64.to_bytes()?;
        let version = if zip64.is_empty() {
            self.version_needed
        } else {
            VERSION_ZIP64
        };

        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(version)?; // version made by (MS-DOS host)
        out.write_u16::<LittleEndian>(version)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.timestamp.time)?;
        out.write_u16::<LittleEndian>(self.timestamp.date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(compressed_size)?;
        out.write_u32::<LittleEndian>(uncompressed_size)?;
        out.write_u16::<LittleEndian>(checked_u16(self.file_name.len(), "file name")?)?;
        out.write_u16::<LittleEndian>(extra_field.len() as u16)?;
        out.write_u16::<LittleEndian>(0)?; // comment length
        out.write_u16::<LittleEndian>(0)?; // disk number start
        out.write_u16::<LittleEndian>(0)?; // internal attributes
        out.write_u32::<LittleEndian>(0)?; // external attributes
        out.write_u32::<LittleEndian>(lfh_offset)?;
        out.write_all(self.file_name.as_bytes())?;
        out.write_all(&extra_field)?;

        Ok(Self::SIZE + self.file_name.len() + extra_field.len())
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Record for a single-disk archive; overflowing fields become markers.
    pub fn new(total_entries: u64, cd_size: u64, cd_offset: u64) -> Self {
        let entries = u16::try_from(total_entries).unwrap_or(U16_MARKER);
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size: u32::try_from(cd_size).unwrap_or(U32_MARKER),
            cd_offset: u32::try_from(cd_offset).unwrap_or(U32_MARKER),
            comment_len: 0,
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> PackResult<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.disk_with_cd)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(self.comment_len)?;
        Ok(())
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == U16_MARKER
            || self.total_entries == U16_MARKER
            || self.cd_size == U32_MARKER
            || self.cd_offset == U32_MARKER
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn write_to<W: Write>(&self, out: &mut W) -> PackResult<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u32::<LittleEndian>(self.disk_with_eocd64)?;
        out.write_u64::<LittleEndian>(self.eocd64_offset)?;
        out.write_u32::<LittleEndian>(self.total_disks)?;
        Ok(())
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn new(total_entries: u64, cd_size: u64, cd_offset: u64) -> Self {
        Self {
            version_made_by: VERSION_ZIP64,
            version_needed: VERSION_ZIP64,
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: total_entries,
            total_entries,
            cd_size,
            cd_offset,
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> PackResult<()> {
        out.write_all(Self::SIGNATURE)?;
        // Size of the remaining record, excluding the leading 12 bytes.
        out.write_u64::<LittleEndian>((Self::MIN_SIZE - 12) as u64)?;
        out.write_u16::<LittleEndian>(self.version_made_by)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u32::<LittleEndian>(self.disk_number)?;
        out.write_u32::<LittleEndian>(self.disk_with_cd)?;
        out.write_u64::<LittleEndian>(self.disk_entries)?;
        out.write_u64::<LittleEndian>(self.total_entries)?;
        out.write_u64::<LittleEndian>(self.cd_size)?;
        out.write_u64::<LittleEndian>(self.cd_offset)?;
        Ok(())
    }
}

/// Returns the 32-bit field value, moving oversized values into the Zip64 slot.
fn fit_u32(value: u64, zip64_slot: &mut Option<u64>) -> u32 {
    match u32::try_from(value) {
        Ok(v) if v != U32_MARKER => v,
        _ => {
            *zip64_slot = Some(value);
            U32_MARKER
        }
    }
}

fn checked_u16(len: usize, what: &str) -> PackResult<u16> {
    u16::try_from(len)
        .map_err(|_| PackError::InvalidParameter(format!("{what} is too long for a zip header")))
}

fn checked_u32(value: u64, what: &str) -> PackResult<u32> {
    u32::try_from(value)
        .map_err(|_| PackError::InvalidParameter(format!("{what} does not fit in 32 bits")))
}
