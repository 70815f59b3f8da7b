//! # Strata
//!
//! Segmented read access to large, immutable on-disk table files:
//! - Files split into segments no larger than the mapping limit
//! - Memory-mapped, buffered, and compressed-on-disk access behind one trait
//! - Pooled file handles to bound descriptor usage
//! - Lazy forward iteration that covers a file exactly once
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Writer (SegmentedFileWriter)                │
//! │        append_record() ──► add_potential_boundary()         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ complete(path)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  dyn SegmentedFile                          │
//! │        get_segment(position) / iter(position)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!     ┌─────────────────┼──────────────────┬───────────────────┐
//!     ▼                 ▼                  ▼                   ▼
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ Buffered │   │   Mapped    │   │  Compressed  │   │    Pooling     │
//! │ (reader) │   │ (mmap/span) │   │ (per chunk)  │   │ (HandlePool)   │
//! └──────────┘   └─────────────┘   └──────────────┘   └────────────────┘
//!                       │
//!                       ▼
//!            Box<dyn FileDataInput> (caller closes)
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod io;
pub mod compress;
pub mod segmented;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{AccessMode, Config, DiskAccessMode};
pub use error::{Result, StrataError};
pub use io::FileDataInput;
pub use segmented::{SegmentedFile, SegmentedFileBuilder, SegmentedFileKind};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Strata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
