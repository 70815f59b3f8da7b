//! I/O Module
//!
//! Cursors handed out by segmented files, and the handle pool behind the
//! pooling variants.
//!
//! ## Cursor Kinds
//! ```text
//! ┌──────────────────────┬───────────────────────────────────────────┐
//! │ MappedDataInput      │ view into a mapping owned by the file     │
//! │ RandomAccessReader   │ buffered reader bounded to [start, end)   │
//! │ PooledDataInput      │ RandomAccessReader borrowed from a pool   │
//! │ ChunkDataInput       │ one decompressed chunk (see `compress`)   │
//! └──────────────────────┴───────────────────────────────────────────┘
//! ```

mod data_input;
mod pool;
mod reader;

pub use data_input::{FileDataInput, MappedDataInput};
pub use pool::{HandlePool, PoolGuard};
pub use reader::RandomAccessReader;

pub(crate) use data_input::{check_seek, closed_cursor};
