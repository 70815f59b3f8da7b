//! Segmented File Builder
//!
//! Collects potential segment boundaries while a file is written, then binds
//! to the finished file.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::config::AccessMode;
use crate::error::{Result, StrataError};

use super::bounds;
use super::SegmentedFile;

/// One-shot builder for a [`SegmentedFile`]
///
/// `complete` consumes the builder, so it can run only once and no boundary
/// can be added afterwards.
pub trait SegmentedFileBuilder: Send {
    /// Access mode this builder was created for (persisted in the bounds marker)
    fn access_mode(&self) -> AccessMode;

    /// Record `boundary` as a safe place to start a segment: a block or row
    /// edge. Offsets may repeat and arrive in any order.
    fn add_potential_boundary(&mut self, boundary: u64);

    /// Apply the collected boundaries to the finished file at `path`
    fn complete(self: Box<Self>, path: &Path) -> Result<Box<dyn SegmentedFile>>;

    /// Persist the access mode the bounds were computed under
    fn serialize_bounds(&self, out: &mut dyn Write) -> Result<()> {
        bounds::write_access_mode(out, self.access_mode())
    }

    /// Fails with `AccessModeMismatch` if the bounds were computed under a
    /// different access mode than this builder's
    fn deserialize_bounds(&mut self, input: &mut dyn Read) -> Result<()> {
        bounds::check_access_mode(input, self.access_mode())
    }
}

/// Absolute path and physical size of a finished file
pub(crate) fn resolve_file(path: &Path) -> Result<(PathBuf, u64)> {
    let absolute = std::path::absolute(path).map_err(|e| StrataError::read(path, e))?;
    let length = fs::metadata(&absolute)
        .map_err(|e| StrataError::read(&absolute, e))?
        .len();
    Ok((absolute, length))
}
