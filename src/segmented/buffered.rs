//! Buffered Segmented File
//!
//! No real segmentation: every request opens a fresh buffered reader that
//! runs to the end of the file.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{AccessMode, Config};
use crate::error::{Result, StrataError};
use crate::io::{FileDataInput, RandomAccessReader};

use super::builder::{resolve_file, SegmentedFileBuilder};
use super::{SegmentedFile, SegmentedFileKind};

/// Opens a new reader for every `get_segment`; holds no resources itself
pub struct BufferedSegmentedFile {
    path: PathBuf,
    length: u64,
    buffer_size: usize,
    cleaned: bool,
}

impl BufferedSegmentedFile {
    pub fn new(path: PathBuf, length: u64, buffer_size: usize) -> Self {
        Self {
            path,
            length,
            buffer_size,
            cleaned: false,
        }
    }
}

impl SegmentedFile for BufferedSegmentedFile {
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
        SegmentedFileKind::Buffered
    }

    fn get_segment(&self, position: u64) -> Result<Box<dyn FileDataInput + '_>> {
        if self.cleaned {
            return Err(StrataError::closed(&self.path));
        }
        if position >= self.length {
            return Err(StrataError::PositionOutOfBounds {
                position,
                length: self.length,
            });
        }
        let reader =
            RandomAccessReader::open_bounded(&self.path, self.buffer_size, position, self.length)?;
        Ok(Box::new(reader))
    }

    fn cleanup(&mut self) {
        self.cleaned = true;
    }
}

impl fmt::Debug for BufferedSegmentedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BufferedSegmentedFile(path='{}', length={})",
            self.path.display(),
            self.length
        )
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds a [`BufferedSegmentedFile`]; boundaries are not needed
pub struct BufferedBuilder {
    mode: AccessMode,
    config: Config,
}

impl BufferedBuilder {
    pub fn new(config: &Config, mode: AccessMode) -> Self {
        Self {
            mode,
            config: config.clone(),
        }
    }
}

impl SegmentedFileBuilder for BufferedBuilder {
    fn access_mode(&self) -> AccessMode {
        self.mode
    }

    fn add_potential_boundary(&mut self, _boundary: u64) {}

    fn complete(self: Box<Self>, path: &Path) -> Result<Box<dyn SegmentedFile>> {
        self.config.validate()?;
        let (path, length) = resolve_file(path)?;
        tracing::debug!(path = %path.display(), length, "Buffered segmented file ready");
        Ok(Box::new(BufferedSegmentedFile::new(
            path,
            length,
            self.config.buffer_size,
        )))
    }
}
