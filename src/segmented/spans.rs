//! Mapping-cut policy
//!
//! Turns candidate boundaries into the spans a mapped file is cut into.

/// A contiguous byte range `[start, end)` of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpan {
    pub start: u64,
    pub end: u64,
    /// False when no boundary allowed the span to fit under the cap;
    /// such spans are read through a buffered cursor instead
    pub mapped: bool,
}

impl SegmentSpan {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, position: u64) -> bool {
        position >= self.start && position < self.end
    }
}

/// Greedily group boundaries into spans of at most `cap` bytes
///
/// Boundaries outside `(0, length)` are ignored; duplicates and ordering do
/// not matter. The cap is inclusive. A gap between two consecutive boundaries
/// that is itself larger than `cap` becomes an unmapped span. The returned
/// spans are sorted, disjoint, and cover `[0, length)` exactly.
pub fn mapping_spans(boundaries: &[u64], length: u64, cap: u64) -> Vec<SegmentSpan> {
    let mut cuts: Vec<u64> = boundaries
        .iter()
        .copied()
        .filter(|&b| b > 0 && b < length)
        .collect();
    cuts.sort_unstable();
    cuts.dedup();
    if length > 0 {
        cuts.push(length);
    }

    let mut spans = Vec::new();
    let mut start = 0u64;
    // Furthest boundary accepted into the current run (== start: run is empty)
    let mut run_end = 0u64;

    for boundary in cuts {
        if boundary - start > cap && run_end > start {
            spans.push(SegmentSpan {
                start,
                end: run_end,
                mapped: true,
            });
            start = run_end;
        }
        if boundary - start > cap {
            spans.push(SegmentSpan {
                start,
                end: boundary,
                mapped: false,
            });
            start = boundary;
        }
        run_end = boundary;
    }

    if run_end > start {
        spans.push(SegmentSpan {
            start,
            end: run_end,
            mapped: true,
        });
    }
    spans
}
