//! Compression Metadata
//!
//! Maps logical (uncompressed) positions to on-disk chunks.
//!
//! ## Companion File Format (`<data path>.ci`)
//! ```text
//! ┌──────────────────────────────────────┬──────────────┐
//! │ bincode(CompressionMetadata)         │ CRC32 (4 LE) │
//! └──────────────────────────────────────┴──────────────┘
//! ```
//!
//! ## Chunk Layout in the Data File
//! ```text
//! [compressed chunk 0][crc 0][compressed chunk 1][crc 1] ...
//! ```
//! Every chunk but the last decompresses to exactly `chunk_length` bytes.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// Size of the CRC32 trailing every compressed chunk
pub const CHECKSUM_SIZE: u64 = 4;

/// Suffix appended to a data file's name to find its metadata
pub const COMPANION_SUFFIX: &str = ".ci";

/// Chunk offset table for one compressed data file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionMetadata {
    /// Name of the codec (see `compressor_for`)
    pub compressor: String,
    /// Uncompressed bytes per chunk
    pub chunk_length: u32,
    /// Logical (uncompressed) length of the file
    pub data_length: u64,
    /// Physical length of the data file
    pub compressed_length: u64,
    /// On-disk offset of each chunk
    pub chunk_offsets: Vec<u64>,
}

/// Location of one compressed chunk on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    /// Physical offset of the compressed bytes
    pub offset: u64,
    /// Compressed length, excluding the trailing checksum
    pub length: u64,
}

impl Chunk {
    /// Compressed bytes plus checksum
    pub fn disk_length(&self) -> u64 {
        self.length + CHECKSUM_SIZE
    }
}

impl CompressionMetadata {
    /// Path of the metadata file that belongs to `data_path`
    pub fn companion_path(data_path: &Path) -> PathBuf {
        let mut name = OsString::from(data_path.as_os_str());
        name.push(COMPANION_SUFFIX);
        PathBuf::from(name)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_offsets.len()
    }

    /// Index of the chunk holding logical `position`
    pub fn chunk_index(&self, position: u64) -> usize {
        (position / self.chunk_length as u64) as usize
    }

    /// Logical offset of the first byte of chunk `index`
    pub fn chunk_start(&self, index: usize) -> u64 {
        index as u64 * self.chunk_length as u64
    }

    /// Uncompressed size of chunk `index`
    pub fn uncompressed_chunk_length(&self, index: usize) -> u64 {
        let start = self.chunk_start(index);
        (self.data_length - start).min(self.chunk_length as u64)
    }

    /// Chunk that holds logical `position`
    pub fn chunk_for(&self, position: u64) -> Result<Chunk> {
        if position >= self.data_length {
            return Err(StrataError::PositionOutOfBounds {
                position,
                length: self.data_length,
            });
        }
        self.chunk(self.chunk_index(position))
    }

    /// On-disk location of chunk `index`
    pub fn chunk(&self, index: usize) -> Result<Chunk> {
        let offset = *self.chunk_offsets.get(index).ok_or_else(|| {
            StrataError::Serialization(format!(
                "chunk {} out of range ({} chunks)",
                index,
                self.chunk_count()
            ))
        })?;
        let end = self
            .chunk_offsets
            .get(index + 1)
            .copied()
            .unwrap_or(self.compressed_length);

        Ok(Chunk {
            index,
            offset,
            length: end - offset - CHECKSUM_SIZE,
        })
    }

    /// Check the offset table against the data file it describes
    pub fn validate(&self, data_path: &Path, on_disk_length: u64) -> Result<()> {
        if self.chunk_length == 0 {
            return Err(StrataError::corruption(data_path, 0, "chunk length is zero"));
        }
        if self.compressed_length != on_disk_length {
            return Err(StrataError::corruption(
                data_path,
                on_disk_length,
                format!(
                    "metadata expects {} bytes on disk, found {}",
                    self.compressed_length, on_disk_length
                ),
            ));
        }

        let expected_chunks = self.data_length.div_ceil(self.chunk_length as u64) as usize;
        if self.chunk_count() != expected_chunks {
            return Err(StrataError::corruption(
                data_path,
                0,
                format!(
                    "expected {} chunks for {} bytes, metadata has {}",
                    expected_chunks,
                    self.data_length,
                    self.chunk_count()
                ),
            ));
        }

        // Each chunk needs room for at least its checksum
        let mut min_next = 0u64;
        for (index, &offset) in self.chunk_offsets.iter().enumerate() {
            if index == 0 && offset != 0 {
                return Err(StrataError::corruption(
                    data_path,
                    offset,
                    "first chunk must start at 0",
                ));
            }
            if offset < min_next {
                return Err(StrataError::corruption(
                    data_path,
                    offset,
                    format!("chunk {} overlaps its predecessor", index),
                ));
            }
            min_next = offset + CHECKSUM_SIZE;
        }
        if min_next > self.compressed_length {
            return Err(StrataError::corruption(
                data_path,
                min_next,
                "last chunk runs past end of file",
            ));
        }
        if self.chunk_count() == 0 && self.compressed_length != 0 {
            return Err(StrataError::corruption(
                data_path,
                0,
                "data present on disk but no chunks recorded",
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Companion file I/O
    // =========================================================================

    /// Write metadata followed by its CRC32
    pub fn write(&self, path: &Path) -> Result<()> {
        let encoded =
            bincode::serialize(self).map_err(|e| StrataError::Serialization(e.to_string()))?;
        let crc = crc32fast::hash(&encoded);

        let mut file = File::create(path)?;
        file.write_all(&encoded)?;
        file.write_all(&crc.to_le_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Read and checksum-verify a metadata file
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| StrataError::read(path, e))?;
        if (bytes.len() as u64) < CHECKSUM_SIZE {
            return Err(StrataError::corruption(path, 0, "metadata file truncated"));
        }

        let (encoded, crc_bytes) = bytes.split_at(bytes.len() - CHECKSUM_SIZE as usize);
        let stored = u32::from_le_bytes(crc_bytes.try_into().unwrap());
        if crc32fast::hash(encoded) != stored {
            return Err(StrataError::corruption(path, 0, "metadata checksum mismatch"));
        }

        bincode::deserialize(encoded).map_err(|e| StrataError::Serialization(e.to_string()))
    }

    /// Load the metadata belonging to `data_path` and validate it
    pub fn load_for(data_path: &Path) -> Result<Self> {
        let on_disk_length = fs::metadata(data_path)
            .map_err(|e| StrataError::read(data_path, e))?
            .len();
        let metadata = Self::read(&Self::companion_path(data_path))?;
        metadata.validate(data_path, on_disk_length)?;
        Ok(metadata)
    }
}
