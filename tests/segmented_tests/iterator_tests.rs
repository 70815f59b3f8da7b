//! Tests for SegmentIterator
//!
//! These tests verify:
//! - Iteration from any start covers exactly [start, length) for every variant
//! - Segments are contiguous and non-overlapping
//! - Errors and zero-length segments end the iteration
//! - Concurrent iteration over one shared file

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata::compress::Lz4Compressor;
use strata::io::MappedDataInput;
use strata::segmented::{self, SegmentIterator, SegmentedFileWriter};
use strata::{
    AccessMode, Config, FileDataInput, Result, SegmentedFile, SegmentedFileKind, StrataError,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable-size records so boundaries land at irregular offsets
fn record(i: usize) -> Vec<u8> {
    let len = 50 + (i * 37) % 700;
    (0..len).map(|j| ((i * 31 + j) % 256) as u8).collect()
}

/// One file per variant, all holding the same records
fn all_variants(dir: &Path) -> Vec<(Box<dyn SegmentedFile>, Vec<u8>)> {
    let config = Config::builder()
        .max_segment_size(8 * 1024)
        .chunk_length(4096)
        .pool_capacity(4)
        .buffer_size(1024)
        .build();

    let plans: Vec<(&str, Box<dyn segmented::SegmentedFileBuilder>, bool)> = vec![
        ("mapped", segmented::builder(&config, AccessMode::Mmap), false),
        ("pooling", segmented::builder(&config, AccessMode::Standard), false),
        ("buffered", segmented::batch_builder(&config, AccessMode::Standard, false), false),
        ("compressed_mmap", segmented::batch_builder(&config, AccessMode::Mmap, true), true),
        ("compressed", segmented::batch_builder(&config, AccessMode::Standard, true), true),
        ("pooling_compressed", segmented::compressed_builder(&config, AccessMode::Standard), true),
    ];

    plans
        .into_iter()
        .map(|(name, builder, compressed)| {
            let path = dir.join(format!("{}.db", name));
            let mut writer = if compressed {
                SegmentedFileWriter::create_compressed(
                    &path,
                    builder,
                    config.chunk_length,
                    Arc::new(Lz4Compressor),
                )
                .unwrap()
            } else {
                SegmentedFileWriter::create(&path, builder).unwrap()
            };

            let mut content = Vec::new();
            for i in 0..200 {
                let row = record(i);
                writer.append_record(&row).unwrap();
                content.extend_from_slice(&row);
            }
            assert_eq!(writer.record_count(), 200);
            assert_eq!(writer.position(), content.len() as u64);
            (writer.finish().unwrap(), content)
        })
        .collect()
}

// =============================================================================
// Coverage Tests
// =============================================================================

#[test]
fn test_iteration_covers_suffix_for_every_variant() {
    let temp = TempDir::new().unwrap();

    for (file, content) in all_variants(temp.path()) {
        let length = file.length();
        assert_eq!(length, content.len() as u64);

        for start in [0, 1, 4095, 4096, 8 * 1024, length / 2, length - 1] {
            let mut out = Vec::new();
            let mut expected_next = start;
            for segment in file.iter(start) {
                let mut segment = segment.unwrap();
                assert_eq!(segment.file_pointer(), expected_next, "{:?}", file);
                assert!(segment.bytes_remaining() > 0);
                expected_next += segment.bytes_remaining();
                segment.read_to_end(&mut out).unwrap();
                segment.close();
            }
            assert_eq!(expected_next, length);
            assert_eq!(out, content[start as usize..], "{:?} from {}", file, start);
        }
    }
}

#[test]
fn test_iteration_from_end_is_empty() {
    let temp = TempDir::new().unwrap();

    for (file, _) in all_variants(temp.path()) {
        assert!(file.iter(file.length()).next().is_none());
        assert!(file.iter(file.length() + 100).next().is_none());
    }
}

#[test]
fn test_next_position_advances_by_segment() {
    let temp = TempDir::new().unwrap();
    let (file, _) = all_variants(temp.path()).remove(0);
    assert_eq!(file.kind(), SegmentedFileKind::Mapped);

    let mut iter = file.iter(10);
    assert_eq!(iter.next_position(), 10);

    let first = iter.next().unwrap().unwrap();
    assert_eq!(iter.next_position(), 10 + first.bytes_remaining());
    assert!(iter.next_position() <= 8 * 1024);
}

#[test]
fn test_concurrent_iteration() {
    let temp = TempDir::new().unwrap();
    let variants = all_variants(temp.path());

    crossbeam::scope(|s| {
        for (file, content) in &variants {
            for _ in 0..3 {
                let file: &dyn SegmentedFile = file.as_ref();
                s.spawn(move |_| {
                    let mut out = Vec::new();
                    for segment in file.iter(0) {
                        segment.unwrap().read_to_end(&mut out).unwrap();
                    }
                    assert_eq!(&out, content);
                });
            }
        }
    })
    .unwrap();
}

// =============================================================================
// Failure Tests
// =============================================================================

/// A file that hands out an empty segment at `stall_at`
struct StallingFile {
    path: PathBuf,
    data: Vec<u8>,
    stall_at: u64,
    fail_at: Option<u64>,
}

impl fmt::Debug for StallingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StallingFile(stall_at={})", self.stall_at)
    }
}

impl SegmentedFile for StallingFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn on_disk_length(&self) -> u64 {
        self.data.len() as u64
    }

    fn kind(&self) -> SegmentedFileKind {
        SegmentedFileKind::Buffered
    }

    fn get_segment(&self, position: u64) -> Result<Box<dyn FileDataInput + '_>> {
        if Some(position) == self.fail_at {
            return Err(StrataError::Corruption {
                path: self.path.clone(),
                offset: position,
                reason: "test failure".into(),
            });
        }
        // Segments of 10 bytes, except an empty one at `stall_at`
        let end = if position == self.stall_at {
            position
        } else {
            (position - position % 10 + 10).min(self.length())
        };
        let start = position as usize;
        Ok(Box::new(MappedDataInput::new(
            &self.path,
            &self.data[start..end as usize],
            position,
            0,
        )))
    }

    fn cleanup(&mut self) {}
}

fn stalling_file(stall_at: u64, fail_at: Option<u64>) -> StallingFile {
    StallingFile {
        path: PathBuf::from("/virtual/stalling.db"),
        data: (0..100u8).collect(),
        stall_at,
        fail_at,
    }
}

#[test]
fn test_empty_segment_ends_iteration_with_error() {
    let file = stalling_file(30, None);
    let file: &dyn SegmentedFile = &file;

    let results: Vec<Result<u64>> = file
        .iter(0)
        .map(|segment| segment.map(|s| s.file_pointer()))
        .collect();

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap(), &0);
    assert_eq!(results[2].as_ref().unwrap(), &20);
    assert!(matches!(
        results[3],
        Err(StrataError::StalledSegment { position: 30 })
    ));
}

#[test]
fn test_error_fuses_iterator() {
    let file = stalling_file(u64::MAX, Some(50));
    let mut iter = SegmentIterator::new(&file, 0);

    for expected in [0, 10, 20, 30, 40] {
        assert_eq!(iter.next().unwrap().unwrap().file_pointer(), expected);
    }
    assert!(matches!(iter.next(), Some(Err(StrataError::Corruption { .. }))));
    assert!(iter.next().is_none());
    assert!(iter.next().is_none());
}

#[test]
fn test_error_from_closed_file_surfaces() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("closed.db");
    fs::write(&path, vec![7u8; 1000]).unwrap();

    let mut file = segmented::builder(&Config::default(), AccessMode::Mmap)
        .complete(&path)
        .unwrap();
    file.cleanup();

    let results: Vec<_> = file.iter(0).collect();
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(StrataError::Closed { .. })));
}
