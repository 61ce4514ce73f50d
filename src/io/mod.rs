mod local;

pub use local::LocalDirectory;

use std::io::{Read, Seek, SeekFrom};

use crate::error::PackResult;

/// A finite, seekable payload byte source.
pub trait PayloadSource: Read + Seek {}

impl<T: Read + Seek> PayloadSource for T {}

/// Trait for enumerating and opening the files of a package directory
pub trait PackageDirectory {
    /// Archive-relative names (`/` separated), least recently modified first.
    fn files_by_last_modified(&self) -> PackResult<Vec<String>>;

    /// Open a file previously returned by [`files_by_last_modified`](Self::files_by_last_modified).
    fn open_file(&self, name: &str) -> PackResult<Box<dyn PayloadSource>>;
}

/// Measure a source by seeking to its end, then rewind it.
pub fn stream_len(source: &mut dyn PayloadSource) -> PackResult<u64> {
    let len = source.seek(SeekFrom::End(0))?;
    source.seek(SeekFrom::Start(0))?;
    Ok(len)
}
