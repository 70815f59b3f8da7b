//! Mapped Segmented File
//!
//! The file is cut into spans no larger than `max_segment_size`; each span
//! gets its own read-only memory mapping. A position resolves to its mapping
//! by binary search, and the cursor stops at that mapping's end.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};

use crate::config::{AccessMode, Config};
use crate::error::{Result, StrataError};
use crate::io::{FileDataInput, MappedDataInput, RandomAccessReader};

use super::builder::{resolve_file, SegmentedFileBuilder};
use super::spans::{mapping_spans, SegmentSpan};
use super::{SegmentedFile, SegmentedFileKind};

// =============================================================================
// Mapping arena
// =============================================================================

/// One span and, if it fit under the cap, its mapping
pub(crate) struct MappedSegment {
    pub(crate) span: SegmentSpan,
    pub(crate) region: Option<Mmap>,
}

/// Sorted, disjoint mappings owned by one segmented file
///
/// Cursors only ever borrow from here, so the mappings outlive every view.
#[derive(Default)]
pub(crate) struct SegmentMap {
    segments: Vec<MappedSegment>,
}

impl SegmentMap {
    /// Map every `mapped` span of `path`
    ///
    /// # Safety
    ///
    /// Uses `unsafe { MmapOptions::map(...) }`, which is sound here because
    /// the file is finalized and never written again, and the mapping is
    /// read-only.
    pub(crate) fn map(path: &Path, spans: &[SegmentSpan]) -> Result<Self> {
        if spans.is_empty() {
            return Ok(Self::default());
        }

        let file = File::open(path).map_err(|e| StrataError::read(path, e))?;
        let mut segments = Vec::with_capacity(spans.len());

        for span in spans {
            let region = if span.mapped {
                let mmap = unsafe {
                    MmapOptions::new()
                        .offset(span.start)
                        .len(span.len() as usize)
                        .map(&file)
                }
                .map_err(|e| StrataError::read(path, e))?;
                Some(mmap)
            } else {
                tracing::warn!(
                    path = %path.display(),
                    start = span.start,
                    end = span.end,
                    "Span exceeds the mapping cap; serving it with buffered reads"
                );
                None
            };
            segments.push(MappedSegment {
                span: *span,
                region,
            });
        }

        Ok(Self { segments })
    }

    /// Segment whose span contains `position`
    pub(crate) fn locate(&self, position: u64) -> Option<&MappedSegment> {
        let idx = self
            .segments
            .partition_point(|s| s.span.start <= position);
        if idx == 0 {
            return None;
        }
        let segment = &self.segments[idx - 1];
        segment.span.contains(position).then_some(segment)
    }

    pub(crate) fn spans(&self) -> impl Iterator<Item = SegmentSpan> + '_ {
        self.segments.iter().map(|s| s.span)
    }

    pub(crate) fn len(&self) -> usize {
        self.segments.len()
    }

    pub(crate) fn mapped_count(&self) -> usize {
        self.segments.iter().filter(|s| s.region.is_some()).count()
    }

    /// Unmap everything
    pub(crate) fn clear(&mut self) {
        self.segments.clear();
    }
}

// =============================================================================
// Mapped Segmented File
// =============================================================================

/// Segmented file backed by memory mappings
pub struct MmappedSegmentedFile {
    path: PathBuf,
    length: u64,
    /// Buffer size for spans too large to map
    buffer_size: usize,
    map: SegmentMap,
    cleaned: bool,
}

impl MmappedSegmentedFile {
    /// Map `path` according to `spans`
    pub fn open(
        path: PathBuf,
        length: u64,
        spans: &[SegmentSpan],
        buffer_size: usize,
    ) -> Result<Self> {
        let map = SegmentMap::map(&path, spans)?;
        Ok(Self {
            path,
            length,
            buffer_size,
            map,
            cleaned: false,
        })
    }

    /// Spans this file is cut into, in offset order
    pub fn spans(&self) -> Vec<SegmentSpan> {
        self.map.spans().collect()
    }

    /// Number of spans that are actually memory mapped
    pub fn mapped_count(&self) -> usize {
        self.map.mapped_count()
    }
}

impl SegmentedFile for MmappedSegmentedFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn on_disk_length(&self) -> u64 {
        self.length
    }

    fn kind(&self) -> SegmentedFileKind {
        SegmentedFileKind::Mapped
    }

    fn get_segment(&self, position: u64) -> Result<Box<dyn FileDataInput + '_>> {
        if self.cleaned {
            return Err(StrataError::closed(&self.path));
        }
        let segment = self
            .map
            .locate(position)
            .ok_or_else(|| StrataError::PositionOutOfBounds {
                position,
                length: self.length,
            })?;

        let span = segment.span;
        match &segment.region {
            Some(region) => Ok(Box::new(MappedDataInput::new(
                &self.path,
                &region[..],
                span.start,
                (position - span.start) as usize,
            ))),
            None => {
                let reader = RandomAccessReader::open_bounded(
                    &self.path,
                    self.buffer_size,
                    position,
                    span.end,
                )?;
                Ok(Box::new(reader))
            }
        }
    }

    fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        let released = self.map.len();
        self.map.clear();
        self.cleaned = true;
        tracing::debug!(path = %self.path.display(), released, "Unmapped segmented file");
    }
}

impl fmt::Debug for MmappedSegmentedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MmappedSegmentedFile(path='{}', length={}, segments={})",
            self.path.display(),
            self.length,
            self.map.len()
        )
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Collects boundaries and cuts the file into mappable spans on `complete`
pub struct MmappedBuilder {
    mode: AccessMode,
    config: Config,
    boundaries: Vec<u64>,
}

impl MmappedBuilder {
    pub fn new(config: &Config, mode: AccessMode) -> Self {
        Self {
            mode,
            config: config.clone(),
            boundaries: Vec::new(),
        }
    }
}

impl SegmentedFileBuilder for MmappedBuilder {
    fn access_mode(&self) -> AccessMode {
        self.mode
    }

    fn add_potential_boundary(&mut self, boundary: u64) {
        self.boundaries.push(boundary);
    }

    fn complete(self: Box<Self>, path: &Path) -> Result<Box<dyn SegmentedFile>> {
        self.config.validate()?;
        let (path, length) = resolve_file(path)?;

        let spans = mapping_spans(&self.boundaries, length, self.config.max_segment_size);
        let file = MmappedSegmentedFile::open(path, length, &spans, self.config.buffer_size)?;

        tracing::debug!(
            path = %file.path.display(),
            length,
            segments = spans.len(),
            mapped = file.mapped_count(),
            "Mapped segmented file ready"
        );
        Ok(Box::new(file))
    }
}
