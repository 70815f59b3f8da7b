//! Segmented File Module
//!
//! A read-only file split into segments, each served by an independent
//! [`FileDataInput`]. Supports random access to the segment holding a given
//! position and lazy forward iteration over segments.
//!
//! ## Variants
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────────────┐
//! │ Buffered             │ fresh buffered reader per request            │
//! │ Mapped               │ one mmap per span (<= max_segment_size)      │
//! │ Compressed           │ one decompressed chunk per request           │
//! │ PoolingBuffered      │ Buffered, handles recycled through a pool    │
//! │ PoolingCompressed    │ Compressed, readers recycled through a pool  │
//! └──────────────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//! ```text
//!  builder(config, mode) ──add_potential_boundary()*──► complete(path)
//!                                                            │
//!                      many readers: get_segment() / iter() ◄┘
//!                                                            │
//!                                     owner, once: cleanup() ◄┘
//! ```
//!
//! Cursors borrow the file they came from, so `cleanup(&mut self)` cannot run
//! while any cursor is still alive.

mod bounds;
mod buffered;
mod builder;
mod compressed;
mod iterator;
mod mmapped;
mod pooling;
mod spans;
mod writer;

use std::fmt;
use std::path::Path;

use crate::config::{AccessMode, Config};
use crate::error::Result;
use crate::io::FileDataInput;

pub use bounds::{check_access_mode, read_access_mode, write_access_mode};
pub use buffered::{BufferedBuilder, BufferedSegmentedFile};
pub use builder::SegmentedFileBuilder;
pub use compressed::{
    CompressedBuilder, CompressedPoolingBuilder, CompressedPoolingSegmentedFile,
    CompressedSegmentedFile,
};
pub use iterator::SegmentIterator;
pub use mmapped::{MmappedBuilder, MmappedSegmentedFile};
pub use pooling::{PooledDataInput, PoolingBuilder, PoolingSegmentedFile};
pub use spans::{mapping_spans, SegmentSpan};
pub use writer::SegmentedFileWriter;

/// Which variant serves a segmented file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentedFileKind {
    Buffered,
    Mapped,
    Compressed,
    PoolingBuffered,
    PoolingCompressed,
}

impl fmt::Display for SegmentedFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SegmentedFileKind::Buffered => "BufferedSegmentedFile",
            SegmentedFileKind::Mapped => "MmappedSegmentedFile",
            SegmentedFileKind::Compressed => "CompressedSegmentedFile",
            SegmentedFileKind::PoolingBuffered => "PoolingSegmentedFile",
            SegmentedFileKind::PoolingCompressed => "CompressedPoolingSegmentedFile",
        };
        f.write_str(name)
    }
}

/// An immutable file readable one segment at a time
///
/// ## Concurrency:
/// - `get_segment` takes `&self` and may be called from any number of threads
/// - The only shared mutable state is the handle pool of pooling variants
/// - `cleanup` takes `&mut self`: no cursor can be outstanding when it runs
pub trait SegmentedFile: Send + Sync + fmt::Debug {
    /// Absolute path of the underlying file
    fn path(&self) -> &Path;

    /// Logical (uncompressed) length; all positions are in this space
    fn length(&self) -> u64;

    /// Physical length on disk; smaller than `length` when compressed
    fn on_disk_length(&self) -> u64;

    fn kind(&self) -> SegmentedFileKind;

    /// Cursor positioned at `position` that runs to the end of the segment
    /// containing it
    fn get_segment(&self, position: u64) -> Result<Box<dyn FileDataInput + '_>>;

    /// Release mappings and pooled handles. Safe to call more than once;
    /// every later `get_segment` fails with `Closed`.
    fn cleanup(&mut self);
}

impl<'s> dyn SegmentedFile + 's {
    /// Lazy iterator over segments, starting with the one containing `position`.
    /// Each yielded cursor must be closed (or dropped) by the caller.
    pub fn iter(&self, position: u64) -> SegmentIterator<'_> {
        SegmentIterator::new(self, position)
    }
}

// =============================================================================
// Builder factories
// =============================================================================

/// Builder for an uncompressed file under `mode`:
/// `Mmap` → Mapped, anything else → PoolingBuffered
pub fn builder(config: &Config, mode: AccessMode) -> Box<dyn SegmentedFileBuilder> {
    match mode {
        AccessMode::Mmap => Box::new(MmappedBuilder::new(config, mode)),
        AccessMode::Standard => Box::new(PoolingBuilder::new(config, mode)),
    }
}

/// Builder for a compressed file, whatever the access mode
pub fn compressed_builder(config: &Config, mode: AccessMode) -> Box<dyn SegmentedFileBuilder> {
    Box::new(CompressedPoolingBuilder::new(config, mode))
}

/// Non-pooled builder for one-shot bulk readers
///
/// Compressed files read their chunks through mappings when `mode` is `Mmap`.
pub fn batch_builder(
    config: &Config,
    mode: AccessMode,
    compressed: bool,
) -> Box<dyn SegmentedFileBuilder> {
    if compressed {
        Box::new(CompressedBuilder::new(config, mode))
    } else {
        Box::new(BufferedBuilder::new(config, mode))
    }
}
