//! Compressed Writer
//!
//! Sequential writer that cuts its input into fixed-size chunks, compresses
//! each one, and records where it landed on disk.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, StrataError};

use super::codec::ChunkCompressor;
use super::metadata::{CompressionMetadata, CHECKSUM_SIZE};

/// Writes a chunked, compressed data file plus its companion metadata
pub struct CompressedWriter {
    /// Output file path
    path: PathBuf,
    /// Buffered writer for the compressed stream
    writer: BufWriter<File>,
    compressor: Arc<dyn ChunkCompressor>,
    chunk_length: usize,
    /// Uncompressed bytes of the chunk being filled
    buffer: Vec<u8>,
    /// Scratch space for the compressed form of `buffer`
    compressed: Vec<u8>,
    /// On-disk offset of every flushed chunk
    chunk_offsets: Vec<u64>,
    /// Logical bytes accepted so far
    uncompressed_length: u64,
    /// Physical bytes written so far
    compressed_length: u64,
}

impl CompressedWriter {
    /// Create (or truncate) `path` for writing
    pub fn new(
        path: &Path,
        chunk_length: usize,
        compressor: Arc<dyn ChunkCompressor>,
    ) -> Result<Self> {
        if chunk_length == 0 || chunk_length > u32::MAX as usize {
            return Err(StrataError::Config(format!(
                "Invalid chunk length: {}",
                chunk_length
            )));
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            compressor,
            chunk_length,
            buffer: Vec::with_capacity(chunk_length),
            compressed: Vec::new(),
            chunk_offsets: Vec::new(),
            uncompressed_length: 0,
            compressed_length: 0,
        })
    }

    /// Current logical (uncompressed) position
    pub fn position(&self) -> u64 {
        self.uncompressed_length
    }

    /// Compress and write the pending chunk
    fn flush_chunk(&mut self) -> Result<()> {
        self.compressor.compress(&self.buffer, &mut self.compressed)?;
        let crc = crc32fast::hash(&self.compressed);

        self.chunk_offsets.push(self.compressed_length);
        self.writer.write_all(&self.compressed)?;
        self.writer.write_all(&crc.to_le_bytes())?;

        self.compressed_length += self.compressed.len() as u64 + CHECKSUM_SIZE;
        self.buffer.clear();
        Ok(())
    }

    /// Flush the final partial chunk, sync, and write the companion metadata
    pub fn finish(mut self) -> Result<CompressionMetadata> {
        if !self.buffer.is_empty() {
            self.flush_chunk()?;
        }
        self.writer.flush()?;

        let file = self.writer.into_inner().map_err(|e| {
            StrataError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to flush compressed file: {}", e),
            ))
        })?;
        file.sync_all()?;

        let metadata = CompressionMetadata {
            compressor: self.compressor.name().to_string(),
            chunk_length: self.chunk_length as u32,
            data_length: self.uncompressed_length,
            compressed_length: self.compressed_length,
            chunk_offsets: self.chunk_offsets,
        };
        metadata.write(&CompressionMetadata::companion_path(&self.path))?;

        tracing::debug!(
            path = %self.path.display(),
            chunks = metadata.chunk_count(),
            data_length = metadata.data_length,
            compressed_length = metadata.compressed_length,
            "Compressed file written"
        );

        Ok(metadata)
    }
}

impl Write for CompressedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while !rest.is_empty() {
            let room = self.chunk_length - self.buffer.len();
            let take = room.min(rest.len());
            self.buffer.extend_from_slice(&rest[..take]);
            self.uncompressed_length += take as u64;
            rest = &rest[take..];

            if self.buffer.len() == self.chunk_length {
                self.flush_chunk()
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            }
        }
        Ok(buf.len())
    }

    /// Flushes completed chunks only; the partial chunk waits for `finish`
    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
