//! Buffered Reader
//!
//! A buffered file cursor bounded to `[start, end)`.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::{Result, StrataError};

use super::data_input::{check_seek, closed_cursor, tag_path, FileDataInput};

/// Buffered cursor over a plain file
///
/// Reads never go past `end`, which lets the same type serve the whole file
/// (Buffered variant) or a single oversized span of a mapped file.
pub struct RandomAccessReader {
    path: PathBuf,
    /// None once closed (file handle released)
    reader: Option<BufReader<File>>,
    /// Lowest position `seek` accepts
    start: u64,
    /// Current absolute position
    position: u64,
    /// Exclusive read limit
    end: u64,
    /// Physical file size at open time
    file_length: u64,
}

impl RandomAccessReader {
    /// Open a reader over the whole file, positioned at 0
    pub fn open(path: &Path, buffer_size: usize) -> Result<Self> {
        let file = File::open(path).map_err(|e| StrataError::read(path, e))?;
        let file_length = file
            .metadata()
            .map_err(|e| StrataError::read(path, e))?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            reader: Some(BufReader::with_capacity(buffer_size, file)),
            start: 0,
            position: 0,
            end: file_length,
            file_length,
        })
    }

    /// Open a reader positioned at `position` that stops at `end`
    pub fn open_bounded(path: &Path, buffer_size: usize, position: u64, end: u64) -> Result<Self> {
        let mut reader = Self::open(path, buffer_size)?;
        reader.reposition(position, end)?;
        Ok(reader)
    }

    /// Re-target an open reader at a new `[position, end)` range
    ///
    /// Used when a pooled reader is handed to a new request.
    pub fn reposition(&mut self, position: u64, end: u64) -> Result<()> {
        if position > end || end > self.file_length {
            return Err(StrataError::PositionOutOfBounds {
                position: position.max(end),
                length: self.file_length,
            });
        }
        self.start = position;
        self.end = end;
        self.seek_to(position)
    }

    /// Physical size of the file
    pub fn file_length(&self) -> u64 {
        self.file_length
    }

    /// Exclusive upper bound of this cursor
    pub fn limit(&self) -> u64 {
        self.end
    }

    fn seek_to(&mut self, position: u64) -> Result<()> {
        let reader = match self.reader.as_mut() {
            Some(r) => r,
            None => return Err(StrataError::closed(&self.path)),
        };
        // Relative seeks keep the buffer when the target is already buffered
        let delta = position as i64 - self.position as i64;
        if delta != 0 {
            reader
                .seek_relative(delta)
                .map_err(|e| StrataError::read(&self.path, e))?;
        }
        self.position = position;
        Ok(())
    }
}

impl Read for RandomAccessReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let reader = match self.reader.as_mut() {
            Some(r) => r,
            None => return Err(closed_cursor(&self.path)),
        };
        let max = (self.end - self.position).min(buf.len() as u64) as usize;
        if max == 0 {
            return Ok(0);
        }
        let n = reader
            .read(&mut buf[..max])
            .map_err(|e| tag_path(&self.path, e))?;
        self.position += n as u64;
        Ok(n)
    }
}

impl FileDataInput for RandomAccessReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn file_pointer(&self) -> u64 {
        self.position
    }

    fn bytes_remaining(&self) -> u64 {
        self.end - self.position
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        check_seek(position, self.start, self.end)?;
        self.seek_to(position)
    }

    fn close(&mut self) {
        // Dropping the BufReader closes the descriptor
        self.reader = None;
    }

    fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}
