//! Chunk planning (spec section 4.4).
//!
//! Splits `[0, total)` into `count` contiguous, non-overlapping segments and
//! reconciles the plan against any previously persisted per-segment progress.

/// A byte range `[start, start + len)`. `len == 0` represents a segment with
/// nothing to fetch (possible when `count > total`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: u64,
    pub len: u64,
}

impl Segment {
    /// Inclusive end byte offset. Only meaningful when `len > 0`.
    pub fn end(&self) -> u64 {
        self.start + self.len.saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `bytes=start-end` as required on the wire (section 6). Callers must
    /// not invoke this on an empty segment.
    pub fn range_header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end())
    }
}

/// Splits `[0, total)` into `count` contiguous segments. The remainder of an
/// uneven division is absorbed by the last segment. If `count > total`, the
/// first `total` segments are length 1 and the rest are empty.
pub fn plan_segments(total: u64, count: u32) -> Vec<Segment> {
    if count == 0 {
        return Vec::new();
    }
    let count = count as u64;
    let base = total / count;
    let remainder = total % count;

    let mut segments = Vec::with_capacity(count as usize);
    let mut start = 0u64;

    if base == 0 {
        // count > total: first `total` segments get one byte each, rest are empty.
        for i in 0..count {
            let len = if i < total { 1 } else { 0 };
            segments.push(Segment { start, len });
            start += len;
        }
        return segments;
    }

    for i in 0..count {
        let len = if i == count - 1 { base + remainder } else { base };
        segments.push(Segment { start, len });
        start += len;
    }
    segments
}

/// A segment paired with where its worker should resume from, given prior
/// progress. Segments already fully downloaded are excluded by
/// [`reconcile`] rather than represented here.
#[derive(Debug, Clone, Copy)]
pub struct PlannedSegment {
    pub index: usize,
    pub segment: Segment,
    pub resume_start: u64,
}

/// Reconciles a freshly computed plan with persisted per-segment byte
/// counters, skipping segments that are already complete (section 4.4).
///
/// `downloaded` must have one entry per segment; a segment `i` is complete
/// when `segment[i].start + downloaded[i] >= segment[i].start + segment[i].len`.
pub fn reconcile(segments: &[Segment], downloaded: &[u64]) -> Vec<PlannedSegment> {
    segments
        .iter()
        .enumerate()
        .filter_map(|(i, seg)| {
            if seg.is_empty() {
                return None;
            }
            let done = downloaded.get(i).copied().unwrap_or(0);
            if done >= seg.len {
                return None;
            }
            Some(PlannedSegment {
                index: i,
                segment: *seg,
                resume_start: seg.start + done,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_segments_even() {
        let segs = plan_segments(1000, 4);
        assert_eq!(
            segs,
            vec![
                Segment { start: 0, len: 250 },
                Segment { start: 250, len: 250 },
                Segment { start: 500, len: 250 },
                Segment { start: 750, len: 250 },
            ]
        );
        assert_eq!(segs[3].end(), 999);
    }

    #[test]
    fn plan_segments_remainder_goes_to_last() {
        let segs = plan_segments(1001, 4);
        assert_eq!(segs[0], Segment { start: 0, len: 250 });
        assert_eq!(segs[3], Segment { start: 750, len: 251 });
        assert_eq!(segs[3].end(), 1000);
    }

    #[test]
    fn plan_segments_one() {
        let segs = plan_segments(500, 1);
        assert_eq!(segs, vec![Segment { start: 0, len: 500 }]);
    }

    #[test]
    fn plan_segments_empty_total() {
        let segs = plan_segments(0, 4);
        assert!(segs.iter().all(|s| s.is_empty()));
    }

    #[test]
    fn plan_segments_more_segments_than_bytes() {
        let segs = plan_segments(2, 4);
        assert_eq!(segs[0], Segment { start: 0, len: 1 });
        assert_eq!(segs[1], Segment { start: 1, len: 1 });
        assert!(segs[2].is_empty());
        assert!(segs[3].is_empty());
    }

    #[test]
    fn segment_range_header() {
        let s = Segment { start: 0, len: 250 };
        assert_eq!(s.range_header_value(), "bytes=0-249");
    }

    #[test]
    fn reconcile_skips_completed_segments() {
        let segs = plan_segments(1000, 4);
        let downloaded = vec![250, 100, 0, 0];
        let planned = reconcile(&segs, &downloaded);
        assert_eq!(planned.len(), 3);
        assert_eq!(planned[0].index, 1);
        assert_eq!(planned[0].resume_start, 350);
        assert_eq!(planned[1].index, 2);
        assert_eq!(planned[1].resume_start, 500);
    }

    #[test]
    fn reconcile_skips_empty_segments_when_count_exceeds_total() {
        let segs = plan_segments(2, 4);
        let downloaded = vec![0, 0, 0, 0];
        let planned = reconcile(&segs, &downloaded);
        assert_eq!(planned.len(), 2);
    }
}
