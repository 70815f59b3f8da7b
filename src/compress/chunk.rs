//! Chunk reading
//!
//! Physical chunk reads, checksum verification and the cursor over one
//! decompressed chunk.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, StrataError};
use crate::io::{check_seek, closed_cursor, FileDataInput, PoolGuard};

use super::codec::ChunkCompressor;
use super::metadata::{Chunk, CompressionMetadata};

/// Read the raw bytes (compressed data + checksum) of `chunk` into `buf`
pub(crate) fn read_raw_chunk(
    file: &mut File,
    path: &Path,
    chunk: &Chunk,
    buf: &mut Vec<u8>,
) -> Result<()> {
    buf.resize(chunk.disk_length() as usize, 0);
    file.seek(SeekFrom::Start(chunk.offset))
        .map_err(|e| StrataError::read(path, e))?;
    file.read_exact(buf)
        .map_err(|e| StrataError::read(path, e))?;
    Ok(())
}

/// Verify the trailing CRC32 of `raw` and decompress it into `out`
pub(crate) fn decompress_chunk(
    path: &Path,
    metadata: &CompressionMetadata,
    compressor: &dyn ChunkCompressor,
    chunk: &Chunk,
    raw: &[u8],
    verify: bool,
    out: &mut Vec<u8>,
) -> Result<()> {
    if raw.len() as u64 != chunk.disk_length() {
        return Err(StrataError::corruption(
            path,
            chunk.offset,
            format!(
                "chunk {} truncated: expected {} bytes, got {}",
                chunk.index,
                chunk.disk_length(),
                raw.len()
            ),
        ));
    }

    let (data, crc_bytes) = raw.split_at(chunk.length as usize);
    if verify {
        let stored = u32::from_le_bytes(crc_bytes.try_into().unwrap());
        if crc32fast::hash(data) != stored {
            return Err(StrataError::corruption(
                path,
                chunk.offset,
                format!("checksum mismatch in chunk {}", chunk.index),
            ));
        }
    }

    let produced = compressor.uncompress(data, out).map_err(|e| {
        StrataError::corruption(path, chunk.offset, format!("chunk {}: {}", chunk.index, e))
    })?;

    let expected = metadata.uncompressed_chunk_length(chunk.index);
    if produced as u64 != expected {
        return Err(StrataError::corruption(
            path,
            chunk.offset,
            format!(
                "chunk {} decompressed to {} bytes, expected {}",
                chunk.index, produced, expected
            ),
        ));
    }
    Ok(())
}

// =============================================================================
// Chunk Reader (pooled handle)
// =============================================================================

/// Open handle on a compressed file that decompresses one chunk at a time
///
/// Keeps the last decompressed chunk, so consecutive requests landing in the
/// same chunk skip both the read and the decompression.
pub struct ChunkReader {
    path: PathBuf,
    file: File,
    metadata: Arc<CompressionMetadata>,
    compressor: Arc<dyn ChunkCompressor>,
    verify: bool,
    /// Raw bytes of the last chunk read
    raw: Vec<u8>,
    /// Decompressed bytes of chunk `loaded`
    chunk: Vec<u8>,
    loaded: Option<usize>,
}

impl ChunkReader {
    pub fn open(
        path: &Path,
        metadata: Arc<CompressionMetadata>,
        compressor: Arc<dyn ChunkCompressor>,
        verify: bool,
    ) -> Result<Self> {
        let file = File::open(path).map_err(|e| StrataError::read(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            metadata,
            compressor,
            verify,
            raw: Vec::new(),
            chunk: Vec::new(),
            loaded: None,
        })
    }

    /// Make chunk `index` the current chunk
    pub fn load(&mut self, index: usize) -> Result<&[u8]> {
        if self.loaded == Some(index) {
            tracing::trace!(path = %self.path.display(), chunk = index, "Chunk cache hit");
            return Ok(&self.chunk);
        }

        self.loaded = None;
        let chunk = self.metadata.chunk(index)?;
        read_raw_chunk(&mut self.file, &self.path, &chunk, &mut self.raw)?;
        decompress_chunk(
            &self.path,
            &self.metadata,
            self.compressor.as_ref(),
            &chunk,
            &self.raw,
            self.verify,
            &mut self.chunk,
        )?;
        self.loaded = Some(index);
        Ok(&self.chunk)
    }

    /// Decompressed bytes of the current chunk
    pub fn chunk_bytes(&self) -> &[u8] {
        &self.chunk
    }

    pub fn loaded_chunk(&self) -> Option<usize> {
        self.loaded
    }
}

// =============================================================================
// Chunk cursor
// =============================================================================

/// Backing storage of a chunk cursor
pub(crate) enum ChunkBuffer<'a> {
    /// Decompressed into a buffer owned by the cursor
    Owned(Vec<u8>),
    /// Decompressed inside a pooled reader; returned to the pool on close
    Pooled(PoolGuard<'a, ChunkReader>),
}

/// Cursor over one decompressed chunk, in logical offsets
pub struct ChunkDataInput<'a> {
    path: &'a Path,
    buffer: ChunkBuffer<'a>,
    /// Logical offset of the chunk's first byte
    chunk_start: u64,
    /// Decompressed length of the chunk
    len: usize,
    /// Current position inside the chunk
    position: usize,
    closed: bool,
}

impl<'a> ChunkDataInput<'a> {
    pub(crate) fn new(
        path: &'a Path,
        buffer: ChunkBuffer<'a>,
        chunk_start: u64,
        position: usize,
    ) -> Self {
        let len = match &buffer {
            ChunkBuffer::Owned(bytes) => bytes.len(),
            ChunkBuffer::Pooled(reader) => reader.chunk_bytes().len(),
        };
        debug_assert!(position <= len);
        Self {
            path,
            buffer,
            chunk_start,
            len,
            position,
            closed: false,
        }
    }

    fn data(&self) -> &[u8] {
        match &self.buffer {
            ChunkBuffer::Owned(bytes) => bytes,
            ChunkBuffer::Pooled(reader) => reader.chunk_bytes(),
        }
    }
}

impl Read for ChunkDataInput<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_cursor(self.path));
        }
        let available = &self.data()[self.position..self.len];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n;
        Ok(n)
    }
}

impl FileDataInput for ChunkDataInput<'_> {
    fn path(&self) -> &Path {
        self.path
    }

    fn file_pointer(&self) -> u64 {
        self.chunk_start + self.position as u64
    }

    fn bytes_remaining(&self) -> u64 {
        (self.len - self.position) as u64
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        check_seek(position, self.chunk_start, self.chunk_start + self.len as u64)?;
        self.position = (position - self.chunk_start) as usize;
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match &mut self.buffer {
            ChunkBuffer::Owned(bytes) => *bytes = Vec::new(),
            ChunkBuffer::Pooled(reader) => reader.release(),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
