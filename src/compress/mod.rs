//! Compression Module
//!
//! Offset bookkeeping for compressed-on-disk data files.
//!
//! ## Offset Spaces
//! ```text
//! logical   ┌──────── chunk 0 ────────┬──────── chunk 1 ────────┬── chunk 2 ──┐
//!           0                  chunk_length            2*chunk_length   data_length
//!                 │                         │                        │
//! physical  ┌─ c0 ─┬crc┬─── c1 ───┬crc┬─ c2 ─┬crc┐
//!           0                                 compressed_length
//! ```
//! Callers only ever see logical offsets; `CompressionMetadata` translates
//! them to the physical chunk that must be read and decompressed.

mod chunk;
mod codec;
mod metadata;
mod writer;

pub use chunk::{ChunkDataInput, ChunkReader};
pub use codec::{compressor_for, ChunkCompressor, Lz4Compressor};
pub use metadata::{Chunk, CompressionMetadata, CHECKSUM_SIZE, COMPANION_SUFFIX};
pub use writer::CompressedWriter;

pub(crate) use chunk::{decompress_chunk, read_raw_chunk, ChunkBuffer};
