//! Compressed Segmented Files
//!
//! Logical positions are translated to on-disk chunks through
//! `CompressionMetadata`; each request decompresses exactly one chunk, so
//! iteration yields one segment per chunk.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::compress::{
    compressor_for, decompress_chunk, read_raw_chunk, Chunk, ChunkBuffer, ChunkCompressor,
    ChunkDataInput, ChunkReader, CompressionMetadata,
};
use crate::config::{AccessMode, Config};
use crate::error::{Result, StrataError};
use crate::io::{FileDataInput, HandlePool};

use super::builder::{resolve_file, SegmentedFileBuilder};
use super::mmapped::SegmentMap;
use super::spans::mapping_spans;
use super::{SegmentedFile, SegmentedFileKind};

/// How compressed bytes are fetched from disk
enum ChunkTransport {
    /// Open the file per request
    Buffered,
    /// Read chunks straight out of mappings of the compressed file
    Mapped(SegmentMap),
}

/// Load compression metadata for `path` and resolve its codec
fn load_metadata(path: &Path) -> Result<(Arc<CompressionMetadata>, Arc<dyn ChunkCompressor>)> {
    let metadata = CompressionMetadata::load_for(path)?;
    let compressor = compressor_for(&metadata.compressor)?;
    Ok((Arc::new(metadata), compressor))
}

/// Logical start of `chunk` and the offset of `position` inside it
fn chunk_position(metadata: &CompressionMetadata, chunk: &Chunk, position: u64) -> (u64, usize) {
    let start = metadata.chunk_start(chunk.index);
    (start, (position - start) as usize)
}

// =============================================================================
// Compressed Segmented File
// =============================================================================

/// Compressed file read through a Buffered or Mapped transport
pub struct CompressedSegmentedFile {
    path: PathBuf,
    metadata: Arc<CompressionMetadata>,
    compressor: Arc<dyn ChunkCompressor>,
    verify_checksums: bool,
    transport: ChunkTransport,
    cleaned: bool,
}

impl CompressedSegmentedFile {
    /// Open `path` with already-loaded metadata
    ///
    /// With `AccessMode::Mmap` the compressed bytes are mapped in spans cut at
    /// chunk starts, so no chunk straddles two mappings.
    pub fn open(
        path: PathBuf,
        metadata: Arc<CompressionMetadata>,
        compressor: Arc<dyn ChunkCompressor>,
        transport: AccessMode,
        config: &Config,
    ) -> Result<Self> {
        let transport = match transport {
            AccessMode::Mmap => {
                let spans = mapping_spans(
                    &metadata.chunk_offsets,
                    metadata.compressed_length,
                    config.max_segment_size,
                );
                ChunkTransport::Mapped(SegmentMap::map(&path, &spans)?)
            }
            AccessMode::Standard => ChunkTransport::Buffered,
        };

        Ok(Self {
            path,
            metadata,
            compressor,
            verify_checksums: config.verify_checksums,
            transport,
            cleaned: false,
        })
    }

    pub fn metadata(&self) -> &CompressionMetadata {
        &self.metadata
    }

    /// Access mode of the physical transport
    pub fn transport_mode(&self) -> AccessMode {
        match self.transport {
            ChunkTransport::Buffered => AccessMode::Standard,
            ChunkTransport::Mapped(_) => AccessMode::Mmap,
        }
    }

    fn decompress(&self, chunk: &Chunk, raw: &[u8], out: &mut Vec<u8>) -> Result<()> {
        decompress_chunk(
            &self.path,
            &self.metadata,
            self.compressor.as_ref(),
            chunk,
            raw,
            self.verify_checksums,
            out,
        )
    }

    /// Decompress `chunk` into `out` via the transport
    fn read_chunk(&self, chunk: &Chunk, out: &mut Vec<u8>) -> Result<()> {
        if let ChunkTransport::Mapped(map) = &self.transport {
            if let Some(segment) = map.locate(chunk.offset) {
                if let Some(region) = &segment.region {
                    let start = (chunk.offset - segment.span.start) as usize;
                    let end = start + chunk.disk_length() as usize;
                    if end <= region.len() {
                        return self.decompress(chunk, &region[start..end], out);
                    }
                }
            }
        }

        // Buffered transport, or a chunk too large to have been mapped
        let mut file = File::open(&self.path).map_err(|e| StrataError::read(&self.path, e))?;
        let mut raw = Vec::new();
        read_raw_chunk(&mut file, &self.path, chunk, &mut raw)?;
        self.decompress(chunk, &raw, out)
    }
}

impl SegmentedFile for CompressedSegmentedFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn length(&self) -> u64 {
        self.metadata.data_length
    }

    fn on_disk_length(&self) -> u64 {
        self.metadata.compressed_length
    }

    fn kind(&self) -> SegmentedFileKind {
        SegmentedFileKind::Compressed
    }

    fn get_segment(&self, position: u64) -> Result<Box<dyn FileDataInput + '_>> {
        if self.cleaned {
            return Err(StrataError::closed(&self.path));
        }
        let chunk = self.metadata.chunk_for(position)?;

        let mut data = Vec::new();
        self.read_chunk(&chunk, &mut data)?;

        let (start, offset) = chunk_position(&self.metadata, &chunk, position);
        Ok(Box::new(ChunkDataInput::new(
            &self.path,
            ChunkBuffer::Owned(data),
            start,
            offset,
        )))
    }

    fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        if let ChunkTransport::Mapped(map) = &mut self.transport {
            map.clear();
        }
        self.cleaned = true;
        tracing::debug!(path = %self.path.display(), "Compressed segmented file cleaned up");
    }
}

impl fmt::Debug for CompressedSegmentedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CompressedSegmentedFile(path='{}', length={}, on_disk_length={}, chunks={}, transport={})",
            self.path.display(),
            self.metadata.data_length,
            self.metadata.compressed_length,
            self.metadata.chunk_count(),
            self.transport_mode()
        )
    }
}

// =============================================================================
// Compressed Pooling Segmented File
// =============================================================================

/// Compressed file whose chunk readers come from a per-path pool
///
/// A pooled reader keeps its last decompressed chunk, and the returned cursor
/// reads straight out of it until closed.
pub struct CompressedPoolingSegmentedFile {
    path: PathBuf,
    metadata: Arc<CompressionMetadata>,
    pool: HandlePool<ChunkReader>,
}

impl CompressedPoolingSegmentedFile {
    pub fn new(
        path: PathBuf,
        metadata: Arc<CompressionMetadata>,
        compressor: Arc<dyn ChunkCompressor>,
        config: &Config,
    ) -> Self {
        let opener_path = path.clone();
        let opener_metadata = Arc::clone(&metadata);
        let verify = config.verify_checksums;
        let pool = HandlePool::new(&path, config.pool_capacity, move || {
            ChunkReader::open(
                &opener_path,
                Arc::clone(&opener_metadata),
                Arc::clone(&compressor),
                verify,
            )
        });
        Self {
            path,
            metadata,
            pool,
        }
    }

    pub fn metadata(&self) -> &CompressionMetadata {
        &self.metadata
    }

    /// The pool backing this file
    pub fn pool(&self) -> &HandlePool<ChunkReader> {
        &self.pool
    }
}

impl SegmentedFile for CompressedPoolingSegmentedFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn length(&self) -> u64 {
        self.metadata.data_length
    }

    fn on_disk_length(&self) -> u64 {
        self.metadata.compressed_length
    }

    fn kind(&self) -> SegmentedFileKind {
        SegmentedFileKind::PoolingCompressed
    }

    fn get_segment(&self, position: u64) -> Result<Box<dyn FileDataInput + '_>> {
        let chunk = self.metadata.chunk_for(position)?;

        let mut reader = self.pool.borrow()?;
        reader.load(chunk.index)?;

        let (start, offset) = chunk_position(&self.metadata, &chunk, position);
        Ok(Box::new(ChunkDataInput::new(
            &self.path,
            ChunkBuffer::Pooled(reader),
            start,
            offset,
        )))
    }

    fn cleanup(&mut self) {
        self.pool.close();
    }
}

impl fmt::Debug for CompressedPoolingSegmentedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CompressedPoolingSegmentedFile(path='{}', length={}, on_disk_length={}, pool={:?})",
            self.path.display(),
            self.metadata.data_length,
            self.metadata.compressed_length,
            self.pool
        )
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Builds a [`CompressedSegmentedFile`]
///
/// Chunk starts are the only safe boundaries in a compressed file, so offered
/// boundaries are ignored. The physical transport follows the access mode.
pub struct CompressedBuilder {
    mode: AccessMode,
    config: Config,
}

impl CompressedBuilder {
    pub fn new(config: &Config, mode: AccessMode) -> Self {
        Self {
            mode,
            config: config.clone(),
        }
    }
}

impl SegmentedFileBuilder for CompressedBuilder {
    fn access_mode(&self) -> AccessMode {
        self.mode
    }

    fn add_potential_boundary(&mut self, _boundary: u64) {}

    fn complete(self: Box<Self>, path: &Path) -> Result<Box<dyn SegmentedFile>> {
        self.config.validate()?;
        let (path, on_disk_length) = resolve_file(path)?;
        let (metadata, compressor) = load_metadata(&path)?;

        tracing::debug!(
            path = %path.display(),
            length = metadata.data_length,
            on_disk_length,
            chunks = metadata.chunk_count(),
            transport = %self.mode,
            "Compressed segmented file ready"
        );
        let file =
            CompressedSegmentedFile::open(path, metadata, compressor, self.mode, &self.config)?;
        Ok(Box::new(file))
    }
}

/// Builds a [`CompressedPoolingSegmentedFile`]
pub struct CompressedPoolingBuilder {
    mode: AccessMode,
    config: Config,
}

impl CompressedPoolingBuilder {
    pub fn new(config: &Config, mode: AccessMode) -> Self {
        Self {
            mode,
            config: config.clone(),
        }
    }
}

impl SegmentedFileBuilder for CompressedPoolingBuilder {
    fn access_mode(&self) -> AccessMode {
        self.mode
    }

    fn add_potential_boundary(&mut self, _boundary: u64) {}

    fn complete(self: Box<Self>, path: &Path) -> Result<Box<dyn SegmentedFile>> {
        self.config.validate()?;
        let (path, on_disk_length) = resolve_file(path)?;
        let (metadata, compressor) = load_metadata(&path)?;

        tracing::debug!(
            path = %path.display(),
            length = metadata.data_length,
            on_disk_length,
            chunks = metadata.chunk_count(),
            pool_capacity = self.config.pool_capacity,
            "Compressed pooling segmented file ready"
        );
        Ok(Box::new(CompressedPoolingSegmentedFile::new(
            path,
            metadata,
            compressor,
            &self.config,
        )))
    }
}
