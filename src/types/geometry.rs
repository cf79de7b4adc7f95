//! Frame geometry analysis.
//!
//! Recorded video spaces sometimes switch resolution partway through the
//! recording. This module finds where the width/height ratio changes,
//! working only on frame dimensions so it does not depend on how the
//! frames were decoded.

/// Dimensions of one sampled frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSample {
    pub index: u64,
    pub width: u32,
    pub height: u32,
}

impl FrameSample {
    pub fn ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

/// Contiguous range of frames `[start, end)` sharing one geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: u64,
    pub end: u64,
    pub width: u32,
    pub height: u32,
}

impl Segment {
    pub fn ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    pub fn frame_count(&self) -> u64 {
        self.end - self.start
    }
}

/// Whether `ratio` differs from `reference` by more than the relative `tolerance`
pub fn ratio_deviates(reference: f64, ratio: f64, tolerance: f64) -> bool {
    ((ratio - reference) / reference).abs() > tolerance
}

/// Keep every `stride`-th frame dimensions, the last frame, and every frame
/// whose dimensions differ from the previous one.
///
/// Keeping the frames where the dimensions change makes the segment
/// boundaries exact, whatever the stride.
/// Return the samples along with the total number of frames seen.
pub fn sample_at_stride<I>(frames: I, stride: u64) -> (Vec<FrameSample>, u64)
where
    I: IntoIterator<Item = (u32, u32)>,
{
    let stride = stride.max(1);
    let mut samples = Vec::new();
    let mut last: Option<FrameSample> = None;
    let mut total = 0;

    for (index, (width, height)) in (0u64..).zip(frames) {
        let sample = FrameSample {
            index,
            width,
            height,
        };
        let changed = last.is_some_and(|l| (l.width, l.height) != (width, height));
        if index % stride == 0 || changed {
            samples.push(sample);
        }
        last = Some(sample);
        total = index + 1;
    }

    if let Some(last) = last {
        if samples.last() != Some(&last) {
            samples.push(last);
        }
    }

    (samples, total)
}

/// Partition the `total_frames` frames of a video into geometry segments.
///
/// A new segment starts at the first sample whose ratio deviates from the
/// current segment ratio by more than `tolerance`. Samples must be sorted by
/// index; samples with a null dimension or outside the frame range are ignored.
///
/// The returned segments are contiguous, do not overlap and cover every
/// frame. The list is empty only when there is no frame or no usable sample.
pub fn detect_segments(samples: &[FrameSample], total_frames: u64, tolerance: f64) -> Vec<Segment> {
    let mut usable = samples
        .iter()
        .filter(|s| s.width > 0 && s.height > 0 && s.index < total_frames);

    let Some(first) = usable.next() else {
        return Vec::new();
    };

    let mut segments = Vec::new();
    let mut current = Segment {
        start: 0,
        end: total_frames,
        width: first.width,
        height: first.height,
    };

    for sample in usable {
        if sample.index <= current.start {
            continue;
        }

        if ratio_deviates(current.ratio(), sample.ratio(), tolerance) {
            current.end = sample.index;
            segments.push(current);
            current = Segment {
                start: sample.index,
                end: total_frames,
                width: sample.width,
                height: sample.height,
            };
        }
    }

    segments.push(current);
    segments
}
