use chrono::{NaiveDateTime, Utc};
use std::sync::Arc;

use crate::content_types::ContentTypeTable;
use crate::error::{PackError, PackResult};

/// Size of every block except possibly the last one of a file.
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Package writer settings.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub block_size: usize,
    /// Modification time stamped on every container entry.
    pub modified: NaiveDateTime,
    /// Extension lookup used when packing a directory.
    pub content_types: Arc<ContentTypeTable>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            modified: Utc::now().naive_utc(),
            content_types: Arc::new(ContentTypeTable::default()),
        }
    }
}

impl WriterConfig {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_modified(mut self, modified: NaiveDateTime) -> Self {
        self.modified = modified;
        self
    }

    pub fn with_content_types(mut self, table: Arc<ContentTypeTable>) -> Self {
        self.content_types = table;
        self
    }

    pub fn validate(&self) -> PackResult<()> {
        if self.block_size == 0 || u32::try_from(self.block_size).is_err() {
            return Err(PackError::InvalidParameter(format!(
                "Block size must be between 1 and {} bytes, got {}",
                u32::MAX,
                self.block_size
            )));
        }
        Ok(())
    }
}
