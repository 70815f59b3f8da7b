//! Pooling Segmented File
//!
//! Buffered access with open readers recycled through a bounded pool instead
//! of being opened per request.

use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::config::{AccessMode, Config};
use crate::error::{Result, StrataError};
use crate::io::{closed_cursor, FileDataInput, HandlePool, PoolGuard, RandomAccessReader};

use super::builder::{resolve_file, SegmentedFileBuilder};
use super::{SegmentedFile, SegmentedFileKind};

/// Cursor over a pooled reader; closing it hands the reader back
pub struct PooledDataInput<'a> {
    path: &'a Path,
    reader: PoolGuard<'a, RandomAccessReader>,
    /// Position at close time, reported once the reader is gone
    closed_at: Option<u64>,
}

impl<'a> PooledDataInput<'a> {
    pub fn new(path: &'a Path, reader: PoolGuard<'a, RandomAccessReader>) -> Self {
        Self {
            path,
            reader,
            closed_at: None,
        }
    }
}

impl Read for PooledDataInput<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed_at.is_some() {
            return Err(closed_cursor(self.path));
        }
        self.reader.read(buf)
    }
}

impl FileDataInput for PooledDataInput<'_> {
    fn path(&self) -> &Path {
        self.path
    }

    fn file_pointer(&self) -> u64 {
        match self.closed_at {
            Some(position) => position,
            None => self.reader.file_pointer(),
        }
    }

    fn bytes_remaining(&self) -> u64 {
        match self.closed_at {
            Some(_) => 0,
            None => self.reader.bytes_remaining(),
        }
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        if self.closed_at.is_some() {
            return Err(StrataError::read(self.path, closed_cursor(self.path)));
        }
        self.reader.seek(position)
    }

    fn close(&mut self) {
        if self.closed_at.is_none() {
            self.closed_at = Some(self.reader.file_pointer());
            self.reader.release();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

// =============================================================================
// Pooling Segmented File
// =============================================================================

/// Buffered segmented file whose readers come from a per-path pool
///
/// At most `pool_capacity` readers are open at once; further requests block
/// until a cursor is closed.
pub struct PoolingSegmentedFile {
    path: PathBuf,
    length: u64,
    pool: HandlePool<RandomAccessReader>,
}

impl PoolingSegmentedFile {
    pub fn new(path: PathBuf, length: u64, pool_capacity: usize, buffer_size: usize) -> Self {
        let opener_path = path.clone();
        let pool = HandlePool::new(&path, pool_capacity, move || {
            RandomAccessReader::open(&opener_path, buffer_size)
        });
        Self { path, length, pool }
    }

    /// The pool backing this file
    pub fn pool(&self) -> &HandlePool<RandomAccessReader> {
        &self.pool
    }
}

impl SegmentedFile for PoolingSegmentedFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn on_disk_length(&self) -> u64 {
        self.length
    }

    fn kind(&self) -> SegmentedFileKind {
        SegmentedFileKind::PoolingBuffered
    }

    fn get_segment(&self, position: u64) -> Result<Box<dyn FileDataInput + '_>> {
        if position >= self.length {
            return Err(StrataError::PositionOutOfBounds {
                position,
                length: self.length,
            });
        }
        let mut reader = self.pool.borrow()?;
        reader.reposition(position, self.length)?;
        Ok(Box::new(PooledDataInput::new(&self.path, reader)))
    }

    fn cleanup(&mut self) {
        self.pool.close();
    }
}

impl fmt::Debug for PoolingSegmentedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PoolingSegmentedFile(path='{}', length={}, pool={:?})",
            self.path.display(),
            self.length,
            self.pool
        )
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds a [`PoolingSegmentedFile`]; boundaries are not needed
pub struct PoolingBuilder {
    mode: AccessMode,
    config: Config,
}

impl PoolingBuilder {
    pub fn new(config: &Config, mode: AccessMode) -> Self {
        Self {
            mode,
            config: config.clone(),
        }
    }
}

impl SegmentedFileBuilder for PoolingBuilder {
    fn access_mode(&self) -> AccessMode {
        self.mode
    }

    fn add_potential_boundary(&mut self, _boundary: u64) {}

    fn complete(self: Box<Self>, path: &Path) -> Result<Box<dyn SegmentedFile>> {
        self.config.validate()?;
        let (path, length) = resolve_file(path)?;
        tracing::debug!(
            path = %path.display(),
            length,
            pool_capacity = self.config.pool_capacity,
            "Pooling segmented file ready"
        );
        Ok(Box::new(PoolingSegmentedFile::new(
            path,
            length,
            self.config.pool_capacity,
            self.config.buffer_size,
        )))
    }
}
