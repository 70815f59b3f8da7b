//! Configuration for Strata
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// Largest region a single memory mapping may cover (2 GiB - 1)
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = i32::MAX as u64;

/// Main configuration for reading segmented files
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Access Mode
    // -------------------------------------------------------------------------
    /// How data and index files are accessed (mmap vs. buffered reads)
    pub disk_access_mode: DiskAccessMode,

    // -------------------------------------------------------------------------
    // Mapping Configuration
    // -------------------------------------------------------------------------
    /// Upper bound (inclusive) on the byte size of one memory mapping
    pub max_segment_size: u64,

    // -------------------------------------------------------------------------
    // Buffered / Pooling Configuration
    // -------------------------------------------------------------------------
    /// Max open handles per path for pooling variants
    pub pool_capacity: usize,

    /// Read buffer size for buffered cursors (in bytes)
    pub buffer_size: usize,

    // -------------------------------------------------------------------------
    // Compression Configuration
    // -------------------------------------------------------------------------
    /// Uncompressed bytes per chunk when writing compressed files
    pub chunk_length: usize,

    /// Verify chunk CRC32 on every decompression
    pub verify_checksums: bool,
}

/// Configured disk access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskAccessMode {
    /// mmap everything on 64-bit targets, buffered otherwise
    Auto,

    /// mmap data and index files
    Mmap,

    /// mmap index files only; data files are read through buffers
    MmapIndexOnly,

    /// Buffered reads for everything
    Standard,
}

/// Resolved access mode for one kind of file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Mmap,
    Standard,
}

impl AccessMode {
    /// Name persisted in the bounds marker
    pub fn name(&self) -> &'static str {
        match self {
            AccessMode::Mmap => "mmap",
            AccessMode::Standard => "standard",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl DiskAccessMode {
    /// Resolve to (data mode, index mode)
    pub fn resolve(&self) -> (AccessMode, AccessMode) {
        match self {
            DiskAccessMode::Auto if cfg!(target_pointer_width = "64") => {
                (AccessMode::Mmap, AccessMode::Mmap)
            }
            DiskAccessMode::Auto => (AccessMode::Standard, AccessMode::Standard),
            DiskAccessMode::Mmap => (AccessMode::Mmap, AccessMode::Mmap),
            DiskAccessMode::MmapIndexOnly => (AccessMode::Standard, AccessMode::Mmap),
            DiskAccessMode::Standard => (AccessMode::Standard, AccessMode::Standard),
        }
    }
}

impl FromStr for DiskAccessMode {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(DiskAccessMode::Auto),
            "mmap" => Ok(DiskAccessMode::Mmap),
            "mmap_index_only" => Ok(DiskAccessMode::MmapIndexOnly),
            "standard" => Ok(DiskAccessMode::Standard),
            other => Err(StrataError::Config(format!(
                "Unknown disk access mode: {}",
                other
            ))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            disk_access_mode: DiskAccessMode::Auto,
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            pool_capacity: 32,
            buffer_size: 64 * 1024,  // 64 KB
            chunk_length: 64 * 1024, // 64 KB
            verify_checksums: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Access mode used for data files
    pub fn data_access_mode(&self) -> AccessMode {
        self.disk_access_mode.resolve().0
    }

    /// Access mode used for index files
    pub fn index_access_mode(&self) -> AccessMode {
        self.disk_access_mode.resolve().1
    }

    /// Reject values no reader can work with
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size == 0 {
            return Err(StrataError::Config("max_segment_size must be > 0".into()));
        }
        if self.max_segment_size > usize::MAX as u64 {
            return Err(StrataError::Config(format!(
                "max_segment_size {} exceeds the addressable size of this target",
                self.max_segment_size
            )));
        }
        if self.pool_capacity == 0 {
            return Err(StrataError::Config("pool_capacity must be > 0".into()));
        }
        if self.buffer_size == 0 {
            return Err(StrataError::Config("buffer_size must be > 0".into()));
        }
        if self.chunk_length == 0 || self.chunk_length > u32::MAX as usize {
            return Err(StrataError::Config(format!(
                "chunk_length must be in 1..={}",
                u32::MAX
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the disk access mode
    pub fn disk_access_mode(mut self, mode: DiskAccessMode) -> Self {
        self.config.disk_access_mode = mode;
        self
    }

    /// Set the maximum size of a single mapping (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Set the number of pooled handles per path
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.config.pool_capacity = capacity;
        self
    }

    /// Set the buffered reader buffer size (in bytes)
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Set the compression chunk length (in bytes)
    pub fn chunk_length(mut self, length: usize) -> Self {
        self.config.chunk_length = length;
        self
    }

    /// Enable or disable chunk checksum verification
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.config.verify_checksums = verify;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
