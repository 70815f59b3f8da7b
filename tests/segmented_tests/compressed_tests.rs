//! Tests for compressed segmented files
//!
//! These tests verify:
//! - Logical length vs. on-disk length
//! - One segment per chunk, positioned in logical offsets
//! - Mapped and buffered chunk transports
//! - Pooled chunk readers
//! - Checksum and metadata corruption detection

use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata::compress::{CompressionMetadata, Lz4Compressor};
use strata::segmented::{self, CompressedPoolingSegmentedFile, SegmentedFileWriter};
use strata::{AccessMode, Config, FileDataInput, SegmentedFile, SegmentedFileKind, StrataError};
use tempfile::TempDir;

const CHUNK: usize = 4096;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_file() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data-compressed.db");
    (temp_dir, path)
}

/// Compressible records: repeated text with a counter
fn records(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| format!("row-{:06}|the quick brown fox jumps over the lazy dog|", i).into_bytes())
        .collect()
}

fn config() -> Config {
    Config::builder().chunk_length(CHUNK).build()
}

/// Write `rows` through a compressed writer and return the file plus its content
fn write_compressed(
    path: &Path,
    builder: Box<dyn segmented::SegmentedFileBuilder>,
    rows: &[Vec<u8>],
) -> (Box<dyn SegmentedFile>, Vec<u8>) {
    let mut writer =
        SegmentedFileWriter::create_compressed(path, builder, CHUNK, Arc::new(Lz4Compressor))
            .unwrap();
    let mut content = Vec::new();
    for row in rows {
        let offset = writer.append_record(row).unwrap();
        assert_eq!(offset, content.len() as u64);
        content.extend_from_slice(row);
    }
    (writer.finish().unwrap(), content)
}

fn read_from(file: &dyn SegmentedFile, from: u64) -> Vec<u8> {
    let mut out = Vec::new();
    for segment in file.iter(from) {
        let mut segment = segment.unwrap();
        segment.read_to_end(&mut out).unwrap();
        segment.close();
    }
    out
}

/// Flip one byte of the data file in place
fn corrupt_byte(path: &Path, offset: u64) {
    let mut file = OpenOptions::new().read(true).write(true).open(path).unwrap();
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.read_exact(&mut byte).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&[byte[0] ^ 0xFF]).unwrap();
    file.sync_all().unwrap();
}

// =============================================================================
// Length Tests
// =============================================================================

#[test]
fn test_on_disk_length_smaller_than_logical() {
    let (_temp, path) = setup_temp_file();
    let builder = segmented::compressed_builder(&config(), AccessMode::Standard);
    let (file, content) = write_compressed(&path, builder, &records(1000));

    assert_eq!(file.kind(), SegmentedFileKind::PoolingCompressed);
    assert_eq!(file.length(), content.len() as u64);
    assert!(file.on_disk_length() < file.length());
    assert_eq!(file.on_disk_length(), fs::metadata(&path).unwrap().len());
}

#[test]
fn test_read_last_logical_byte() {
    let (_temp, path) = setup_temp_file();
    let builder = segmented::batch_builder(&config(), AccessMode::Standard, true);
    let (file, content) = write_compressed(&path, builder, &records(500));

    let last = file.length() - 1;
    let mut segment = file.get_segment(last).unwrap();
    assert_eq!(segment.file_pointer(), last);
    assert_eq!(segment.bytes_remaining(), 1);
    assert_eq!(segment.read_bytes(1).unwrap()[0], *content.last().unwrap());
    assert!(segment.is_eof());
}

#[test]
fn test_out_of_bounds_uses_logical_length() {
    let (_temp, path) = setup_temp_file();
    let builder = segmented::batch_builder(&config(), AccessMode::Standard, true);
    let (file, _content) = write_compressed(&path, builder, &records(200));

    // Past the compressed size but still inside the logical file
    let position = file.on_disk_length() + 1;
    assert!(position < file.length());
    assert!(file.get_segment(position).is_ok());

    assert!(matches!(
        file.get_segment(file.length()),
        Err(StrataError::PositionOutOfBounds { .. })
    ));
}

// =============================================================================
// Chunk Segment Tests
// =============================================================================

#[test]
fn test_one_segment_per_chunk() {
    let (_temp, path) = setup_temp_file();
    let builder = segmented::batch_builder(&config(), AccessMode::Standard, true);
    let (file, content) = write_compressed(&path, builder, &records(300));

    let length = content.len() as u64;
    let chunk = CHUNK as u64;
    let expected: Vec<(u64, u64)> = (0..length.div_ceil(chunk))
        .map(|i| (i * chunk, (length - i * chunk).min(chunk)))
        .collect();

    let extents: Vec<(u64, u64)> = file
        .iter(0)
        .map(|segment| {
            let segment = segment.unwrap();
            (segment.file_pointer(), segment.bytes_remaining())
        })
        .collect();
    assert_eq!(extents, expected);
}

#[test]
fn test_exact_chunk_multiple_on_every_transport() {
    let temp = TempDir::new().unwrap();
    let cfg = config();
    let rows: Vec<Vec<u8>> = (0..16u8).map(|i| vec![i; 1024]).collect();

    let builders = [
        segmented::batch_builder(&cfg, AccessMode::Mmap, true),
        segmented::batch_builder(&cfg, AccessMode::Standard, true),
        segmented::compressed_builder(&cfg, AccessMode::Standard),
    ];
    for (i, builder) in builders.into_iter().enumerate() {
        let path = temp.path().join(format!("exact-{}.db", i));
        let (file, content) = write_compressed(&path, builder, &rows);
        assert_eq!(file.length(), 4 * CHUNK as u64);

        let mut layout = Vec::new();
        let mut read = Vec::new();
        for segment in file.iter(0) {
            let mut segment = segment.unwrap();
            layout.push((segment.file_pointer(), segment.bytes_remaining()));
            segment.read_to_end(&mut read).unwrap();
        }

        let chunk = CHUNK as u64;
        assert_eq!(
            layout,
            vec![(0, chunk), (chunk, chunk), (2 * chunk, chunk), (3 * chunk, chunk)]
        );
        assert_eq!(read, content);
    }
}

#[test]
fn test_segment_starts_mid_chunk() {
    let (_temp, path) = setup_temp_file();
    let builder = segmented::batch_builder(&config(), AccessMode::Standard, true);
    let (file, content) = write_compressed(&path, builder, &records(300));

    let position = CHUNK as u64 + 1000;
    let mut segment = file.get_segment(position).unwrap();
    assert_eq!(segment.bytes_remaining(), CHUNK as u64 - 1000);

    let mut bytes = Vec::new();
    segment.read_to_end(&mut bytes).unwrap();
    assert_eq!(bytes, content[position as usize..2 * CHUNK]);

    segment.seek(CHUNK as u64).unwrap();
    assert_eq!(segment.read_bytes(8).unwrap()[..], content[CHUNK..CHUNK + 8]);
    assert!(segment.seek(2 * CHUNK as u64 + 1).is_err());
}

#[test]
fn test_all_compressed_variants_agree() {
    let rows = records(700);
    let temp = TempDir::new().unwrap();
    let cfg = config();

    let builders = vec![
        ("mapped", segmented::batch_builder(&cfg, AccessMode::Mmap, true)),
        ("buffered", segmented::batch_builder(&cfg, AccessMode::Standard, true)),
        ("pooled", segmented::compressed_builder(&cfg, AccessMode::Mmap)),
    ];

    for (name, builder) in builders {
        let path = temp.path().join(format!("{}.db", name));
        let (file, content) = write_compressed(&path, builder, &rows);
        for start in [0, 1, CHUNK as u64 - 1, CHUNK as u64, file.length() - 1] {
            assert_eq!(
                read_from(file.as_ref(), start),
                content[start as usize..],
                "{} from {}",
                name,
                start
            );
        }
    }
}

#[test]
fn test_mapped_transport_with_small_cap() {
    let (_temp, path) = setup_temp_file();
    // Cap smaller than some chunks: those fall back to file reads
    let cfg = Config::builder().chunk_length(CHUNK).max_segment_size(600).build();
    let builder = segmented::batch_builder(&cfg, AccessMode::Mmap, true);
    let (file, content) = write_compressed(&path, builder, &records(400));

    assert_eq!(file.kind(), SegmentedFileKind::Compressed);
    assert_eq!(read_from(file.as_ref(), 0), content);
}

#[test]
fn test_empty_compressed_file() {
    let (_temp, path) = setup_temp_file();
    let builder = segmented::batch_builder(&config(), AccessMode::Mmap, true);
    let (file, content) = write_compressed(&path, builder, &[]);

    assert!(content.is_empty());
    assert_eq!(file.length(), 0);
    assert_eq!(file.on_disk_length(), 0);
    assert!(file.iter(0).next().is_none());
}

// =============================================================================
// Pooled Chunk Reader Tests
// =============================================================================

#[test]
fn test_pooled_reader_caches_chunk() {
    let (_temp, path) = setup_temp_file();
    let builder = segmented::batch_builder(&config(), AccessMode::Standard, true);
    let (_file, content) = write_compressed(&path, builder, &records(300));

    let metadata = Arc::new(CompressionMetadata::load_for(&path).unwrap());
    let file = CompressedPoolingSegmentedFile::new(
        path.clone(),
        metadata,
        Arc::new(Lz4Compressor),
        &Config::builder().pool_capacity(2).build(),
    );

    for position in [10u64, 20, 4000, CHUNK as u64 + 5] {
        let mut segment = file.get_segment(position).unwrap();
        assert_eq!(segment.read_bytes(1).unwrap()[0], content[position as usize]);
        segment.close();
    }

    assert_eq!(file.pool().in_use(), 0);
    assert_eq!(file.pool().idle(), 1);
}

#[test]
fn test_compressed_cleanup() {
    let (_temp, path) = setup_temp_file();
    let cfg = config();
    let rows = records(100);

    let builder = segmented::batch_builder(&cfg, AccessMode::Mmap, true);
    let (mut mapped, _) = write_compressed(&path, builder, &rows);
    mapped.cleanup();
    mapped.cleanup();
    assert!(matches!(mapped.get_segment(0), Err(StrataError::Closed { .. })));

    let mut pooled = segmented::compressed_builder(&cfg, AccessMode::Standard)
        .complete(&path)
        .unwrap();
    pooled.cleanup();
    assert!(matches!(pooled.get_segment(0), Err(StrataError::Closed { .. })));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_chunk_checksum_mismatch_detected() {
    let (_temp, path) = setup_temp_file();
    let cfg = config();
    let (file, _) = write_compressed(
        &path,
        segmented::batch_builder(&cfg, AccessMode::Standard, true),
        &records(300),
    );
    drop(file);

    // Inside the compressed bytes of chunk 0
    corrupt_byte(&path, 10);

    for builder in [
        segmented::batch_builder(&cfg, AccessMode::Standard, true),
        segmented::batch_builder(&cfg, AccessMode::Mmap, true),
        segmented::compressed_builder(&cfg, AccessMode::Standard),
    ] {
        let file = builder.complete(&path).unwrap();
        let err = file.get_segment(0).err().unwrap();
        assert!(matches!(err, StrataError::Corruption { .. }), "{:?}", err);
        assert!(err.is_fatal());

        // Other chunks are unaffected
        assert!(file.get_segment(CHUNK as u64).is_ok());
    }
}

#[test]
fn test_iteration_stops_at_corrupt_chunk() {
    let (_temp, path) = setup_temp_file();
    let cfg = config();
    let (file, _) = write_compressed(
        &path,
        segmented::batch_builder(&cfg, AccessMode::Standard, true),
        &records(300),
    );
    drop(file);

    let metadata = CompressionMetadata::load_for(&path).unwrap();
    corrupt_byte(&path, metadata.chunk_offsets[2] + 3);

    let file = segmented::batch_builder(&cfg, AccessMode::Standard, true)
        .complete(&path)
        .unwrap();
    let results: Vec<bool> = file.iter(0).map(|segment| segment.is_ok()).collect();
    assert_eq!(results, vec![true, true, false]);
}

#[test]
fn test_truncated_data_file_rejected() {
    let (_temp, path) = setup_temp_file();
    let cfg = config();
    let (file, _) = write_compressed(
        &path,
        segmented::batch_builder(&cfg, AccessMode::Standard, true),
        &records(300),
    );
    let on_disk = file.on_disk_length();
    drop(file);

    let data = OpenOptions::new().write(true).open(&path).unwrap();
    data.set_len(on_disk - 10).unwrap();
    drop(data);

    let result = segmented::batch_builder(&cfg, AccessMode::Standard, true).complete(&path);
    assert!(matches!(result, Err(StrataError::Corruption { .. })));
}

#[test]
fn test_missing_metadata_rejected() {
    let (_temp, path) = setup_temp_file();
    fs::write(&path, b"not compressed at all").unwrap();

    let result = segmented::compressed_builder(&config(), AccessMode::Standard).complete(&path);
    assert!(matches!(result, Err(StrataError::Read { .. })));
}
