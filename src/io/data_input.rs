//! Segment cursors
//!
//! A [`FileDataInput`] is a forward-readable, closable view over a byte range
//! of a logical file. Every `get_segment` call hands one out; the caller reads
//! from it and releases it with `close()` or by dropping it.

use std::io::{self, Read};
use std::path::Path;

use bytes::{Bytes, BytesMut};

use crate::error::{Result, StrataError};

/// A positioned cursor over `[file_pointer, file_pointer + bytes_remaining)`
///
/// Positions are absolute logical offsets in the file, not offsets relative to
/// the segment. `close()` is idempotent and only ever releases the resource
/// owned by this one cursor.
pub trait FileDataInput: Read + Send {
    /// Path of the underlying file
    fn path(&self) -> &Path;

    /// Current absolute logical position
    fn file_pointer(&self) -> u64;

    /// Bytes left before the end of this segment
    fn bytes_remaining(&self) -> u64;

    /// Move to an absolute position inside this segment's range
    fn seek(&mut self, position: u64) -> Result<()>;

    /// Release the cursor's resources; further reads fail
    fn close(&mut self);

    fn is_closed(&self) -> bool;

    fn is_eof(&self) -> bool {
        self.bytes_remaining() == 0
    }

    /// Read exactly `len` bytes into a fresh buffer
    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if len as u64 > self.bytes_remaining() {
            return Err(StrataError::read(
                self.path(),
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "requested {} bytes with {} remaining",
                        len,
                        self.bytes_remaining()
                    ),
                ),
            ));
        }
        let mut buf = BytesMut::zeroed(len);
        let res = self.read_exact(&mut buf);
        res.map_err(|e| StrataError::read(self.path(), e))?;
        Ok(buf.freeze())
    }

    /// Skip up to `n` bytes; returns how many were skipped
    fn skip_bytes(&mut self, n: u64) -> Result<u64> {
        let n = n.min(self.bytes_remaining());
        let target = self.file_pointer() + n;
        self.seek(target)?;
        Ok(n)
    }
}

/// Prefix an I/O error raised while reading `path` with the file name
pub(crate) fn tag_path(path: &Path, err: io::Error) -> io::Error {
    io::Error::new(err.kind(), format!("{}: {}", path.display(), err))
}

/// Error returned by `read` on a cursor that was already closed
pub(crate) fn closed_cursor(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::Other,
        format!("read from closed cursor over {}", path.display()),
    )
}

/// Check `position` against an absolute `[start, end]` range
pub(crate) fn check_seek(position: u64, start: u64, end: u64) -> Result<()> {
    if position < start || position > end {
        return Err(StrataError::PositionOutOfBounds {
            position,
            length: end,
        });
    }
    Ok(())
}

// =============================================================================
// Mapped cursor
// =============================================================================

/// Read-only view into one memory mapping
///
/// Borrows the mapping from the segmented file that owns it, so the view can
/// never outlive the mapping.
pub struct MappedDataInput<'a> {
    path: &'a Path,
    /// The whole mapped region
    region: &'a [u8],
    /// Absolute offset of `region[0]`
    offset: u64,
    /// Current position inside `region`
    position: usize,
    closed: bool,
}

impl<'a> MappedDataInput<'a> {
    pub fn new(path: &'a Path, region: &'a [u8], offset: u64, position: usize) -> Self {
        debug_assert!(position <= region.len());
        Self {
            path,
            region,
            offset,
            position,
            closed: false,
        }
    }

    /// Zero-copy access to the unread part of the region
    pub fn remaining_slice(&self) -> &'a [u8] {
        &self.region[self.position..]
    }
}

impl Read for MappedDataInput<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_cursor(self.path));
        }
        let available = &self.region[self.position..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n;
        Ok(n)
    }
}

impl FileDataInput for MappedDataInput<'_> {
    fn path(&self) -> &Path {
        self.path
    }

    fn file_pointer(&self) -> u64 {
        self.offset + self.position as u64
    }

    fn bytes_remaining(&self) -> u64 {
        (self.region.len() - self.position) as u64
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        check_seek(position, self.offset, self.offset + self.region.len() as u64)?;
        self.position = (position - self.offset) as usize;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
