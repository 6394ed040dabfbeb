use std::ops::Range;

/// A contiguous slice of the buffer that produces one haptic frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub range: Range<usize>,
}

/// Nominal samples per segment, rounded up so a fractional interval never
/// shortens segments.
pub fn samples_per_segment(sample_rate: u32, interval_secs: f64) -> usize {
    ((sample_rate as f64 * interval_secs).ceil() as usize).max(1)
}

/// Partitions `[0, total)` into `ceil(total / segment_len)` windows. The last
/// window keeps whatever remains, it is never dropped.
pub fn segments(total: usize, segment_len: usize) -> Vec<Segment> {
    let segment_len = segment_len.max(1);
    (0..total.div_ceil(segment_len))
        .map(|index| {
            let start = index * segment_len;
            Segment {
                index,
                range: start..(start + segment_len).min(total),
            }
        })
        .collect()
}
