//! Segmented File Writer
//!
//! Drives a builder through a forward write pass: every record start is
//! offered as a potential boundary, and finishing the file completes the
//! builder.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::compress::{ChunkCompressor, CompressedWriter};
use crate::error::{Result, StrataError};

use super::builder::SegmentedFileBuilder;
use super::SegmentedFile;

/// Where record bytes go
enum Sink {
    Plain(BufWriter<File>),
    Compressed(CompressedWriter),
}

/// Writes records to a new data file and yields its [`SegmentedFile`]
pub struct SegmentedFileWriter {
    /// Output file path
    path: PathBuf,
    sink: Sink,
    builder: Box<dyn SegmentedFileBuilder>,
    /// Current logical write position
    position: u64,
    /// Number of records written
    record_count: u64,
}

impl SegmentedFileWriter {
    /// Create an uncompressed data file at `path`
    pub fn create(path: &Path, builder: Box<dyn SegmentedFileBuilder>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            sink: Sink::Plain(BufWriter::new(file)),
            builder,
            position: 0,
            record_count: 0,
        })
    }

    /// Create a compressed data file (plus companion metadata) at `path`
    pub fn create_compressed(
        path: &Path,
        builder: Box<dyn SegmentedFileBuilder>,
        chunk_length: usize,
        compressor: Arc<dyn ChunkCompressor>,
    ) -> Result<Self> {
        let writer = CompressedWriter::new(path, chunk_length, compressor)?;
        Ok(Self {
            path: path.to_path_buf(),
            sink: Sink::Compressed(writer),
            builder,
            position: 0,
            record_count: 0,
        })
    }

    /// Current logical position (offset of the next record)
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Append one self-contained record; returns the offset it starts at
    pub fn append_record(&mut self, record: &[u8]) -> Result<u64> {
        let start = self.position;
        self.builder.add_potential_boundary(start);

        match &mut self.sink {
            Sink::Plain(writer) => writer.write_all(record)?,
            Sink::Compressed(writer) => writer.write_all(record)?,
        }

        self.position += record.len() as u64;
        self.record_count += 1;
        Ok(start)
    }

    /// Persist the builder's access-mode marker (see `serialize_bounds`)
    pub fn serialize_bounds(&self, out: &mut dyn Write) -> Result<()> {
        self.builder.serialize_bounds(out)
    }

    /// Flush and sync the data file, then bind the builder to it
    pub fn finish(self) -> Result<Box<dyn SegmentedFile>> {
        match self.sink {
            Sink::Plain(mut writer) => {
                writer.flush()?;
                let file = writer.into_inner().map_err(|e| {
                    StrataError::Io(io::Error::new(
                        io::ErrorKind::Other,
                        format!("Failed to flush data file: {}", e),
                    ))
                })?;
                file.sync_all()?;
            }
            Sink::Compressed(writer) => {
                writer.finish()?;
            }
        }

        tracing::debug!(
            path = %self.path.display(),
            records = self.record_count,
            length = self.position,
            "Data file written"
        );
        self.builder.complete(&self.path)
    }
}
