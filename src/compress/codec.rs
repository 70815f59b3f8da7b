//! Chunk codecs
//!
//! The compression algorithm sits behind [`ChunkCompressor`]; segmented files
//! only deal with chunk offsets and never with the codec's internals.

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, StrataError};

/// Compresses and decompresses whole chunks
pub trait ChunkCompressor: Send + Sync + fmt::Debug {
    /// Name recorded in compression metadata
    fn name(&self) -> &'static str;

    /// Compress `input`, replacing the contents of `output`
    fn compress(&self, input: &[u8], output: &mut Vec<u8>) -> Result<()>;

    /// Decompress `input`, replacing the contents of `output`.
    /// Returns the number of bytes produced.
    fn uncompress(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize>;
}

/// LZ4 block compression with the uncompressed size prepended
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Compressor;

impl Lz4Compressor {
    pub const NAME: &'static str = "lz4";
}

impl ChunkCompressor for Lz4Compressor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compress(&self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        *output = lz4_flex::compress_prepend_size(input);
        Ok(())
    }

    fn uncompress(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        *output = lz4_flex::decompress_size_prepended(input)
            .map_err(|e| StrataError::Compression(format!("LZ4 decompression failed: {}", e)))?;
        Ok(output.len())
    }
}

/// Look up a compressor by the name stored in metadata
pub fn compressor_for(name: &str) -> Result<Arc<dyn ChunkCompressor>> {
    match name {
        Lz4Compressor::NAME => Ok(Arc::new(Lz4Compressor)),
        other => Err(StrataError::Compression(format!(
            "Unknown compressor: {}",
            other
        ))),
    }
}
