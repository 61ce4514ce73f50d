//! Per-block compression.
//!
//! The blocks of a compressed entry form one raw deflate stream. Every block
//! except the last is sync-flushed, so each block's compressed bytes end on a
//! byte boundary, and the last block finishes the stream. The concatenation
//! is what a zip reader expects for method 8.

use flate2::{Compress, Compression, FlushCompress, Status};

use crate::error::{PackError, PackResult};

/// Compression choice for a payload file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionOption {
    None,
    Normal,
    Fast,
    Maximum,
}

impl CompressionOption {
    pub fn is_compressed(&self) -> bool {
        *self != CompressionOption::None
    }
}

/// Produces an encoder for the blocks of one entry.
pub trait CompressionProvider {
    fn encoder(&self, option: CompressionOption) -> PackResult<Box<dyn BlockEncoder>>;
}

pub trait BlockEncoder {
    /// Compress the next block. `last` finishes the stream.
    fn encode_block(&mut self, block: &[u8], last: bool) -> PackResult<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DeflateCompressor;

impl CompressionProvider for DeflateCompressor {
    fn encoder(&self, option: CompressionOption) -> PackResult<Box<dyn BlockEncoder>> {
        let level = match option {
            CompressionOption::None => {
                return Err(PackError::InvalidParameter(
                    "Stored entries are not routed through the compressor".to_string(),
                ));
            }
            CompressionOption::Fast => Compression::fast(),
            CompressionOption::Normal => Compression::default(),
            CompressionOption::Maximum => Compression::best(),
        };
        Ok(Box::new(DeflateBlockEncoder {
            stream: Compress::new(level, false),
        }))
    }
}

struct DeflateBlockEncoder {
    stream: Compress,
}

impl BlockEncoder for DeflateBlockEncoder {
    fn encode_block(&mut self, block: &[u8], last: bool) -> PackResult<Vec<u8>> {
        let flush = if last {
            FlushCompress::Finish
        } else {
            FlushCompress::Sync
        };

        let mut output = Vec::with_capacity(block.len() / 2 + 64);
        let mut input = block;

        loop {
            if output.capacity() - output.len() < 64 {
                output.reserve(output.capacity().max(4096));
            }

            let consumed_before = self.stream.total_in();
            let status = self
                .stream
                .compress_vec(input, &mut output, flush)
                .map_err(|e| PackError::Io(std::io::Error::other(e)))?;
            let consumed = (self.stream.total_in() - consumed_before) as usize;
            input = &input[consumed..];

            match status {
                Status::StreamEnd => break,
                // A flush is complete once it no longer fills the output buffer.
                Status::Ok | Status::BufError
                    if !last && input.is_empty() && output.len() < output.capacity() =>
                {
                    break;
                }
                Status::Ok | Status::BufError => {}
            }
        }

        Ok(output)
    }
}
