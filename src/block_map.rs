//! Block map accumulation and the `AppxBlockMap.xml` document.
//!
//! Each block-mapped file contributes one `File` element holding one `Block`
//! element per block, in emission order. `File` elements follow payload
//! insertion order, which matches the container's entry order, so a reader
//! can correlate the two positionally when a name lookup is not possible.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{PackError, PackResult};
use crate::xml::XmlWriter;

pub const BLOCK_MAP_NAMESPACE: &str = "http://schemas.microsoft.com/appx/2010/blockmap";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub digest: Vec<u8>,
    /// Uncompressed size of the block.
    pub size: u32,
}

impl BlockRecord {
    pub fn encoded_digest(&self) -> String {
        STANDARD.encode(&self.digest)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMapFile {
    pub name: String,
    pub size: u64,
    pub lfh_size: u64,
    pub blocks: Vec<BlockRecord>,
}

impl BlockMapFile {
    /// Name as written to the block map: backslash separated.
    pub fn block_map_name(&self) -> String {
        self.name.replace('/', "\\")
    }
}

#[derive(Debug)]
pub struct BlockMapBuilder {
    hash_method: String,
    files: Vec<BlockMapFile>,
}

impl BlockMapBuilder {
    pub fn new(hash_method: &str) -> Self {
        Self {
            hash_method: hash_method.to_string(),
            files: Vec::new(),
        }
    }

    /// Start a new file. The local header size is patched in with
    /// [`set_lfh_size`](Self::set_lfh_size) once the header has been built.
    pub fn add_file(&mut self, name: &str, size: u64, lfh_size: u64) {
        self.files.push(BlockMapFile {
            name: name.to_string(),
            size,
            lfh_size,
            blocks: Vec::new(),
        });
    }

    pub fn set_lfh_size(&mut self, lfh_size: u64) -> PackResult<()> {
        self.current_file()?.lfh_size = lfh_size;
        Ok(())
    }

    pub fn add_block(&mut self, digest: Vec<u8>, size: u32) -> PackResult<()> {
        self.current_file()?
            .blocks
            .push(BlockRecord { digest, size });
        Ok(())
    }

    /// Drop the file currently being built after a failed add.
    pub fn discard_current_file(&mut self) {
        self.files.pop();
    }

    pub fn files(&self) -> &[BlockMapFile] {
        &self.files
    }

    pub fn to_xml(&self) -> PackResult<Vec<u8>> {
        let mut xml = XmlWriter::in_memory();
        xml.start_write("BlockMap")?;
        xml.add_attribute("xmlns", BLOCK_MAP_NAMESPACE)?;
        xml.add_attribute("HashMethod", &self.hash_method)?;

        for file in &self.files {
            xml.start_element("File")?;
            xml.add_attribute("Name", &file.block_map_name())?;
            xml.add_attribute("Size", &file.size.to_string())?;
            xml.add_attribute("LfhSize", &file.lfh_size.to_string())?;
            for block in &file.blocks {
                xml.start_element("Block")?;
                xml.add_attribute("Hash", &block.encoded_digest())?;
                xml.add_attribute("Size", &block.size.to_string())?;
                xml.close_element()?;
            }
            xml.close_element()?;
        }

        xml.close_element()?;
        xml.finish()
    }

    fn current_file(&mut self) -> PackResult<&mut BlockMapFile> {
        self.files
            .last_mut()
            .ok_or_else(|| PackError::InvalidState("No block map file is open".to_string()))
    }
}
