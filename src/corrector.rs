use std::path::Path;

use tracing::{debug, info};

use crate::{
    config::CorrectorSettings,
    outside::{FrameSamples, VideoInspector},
    result::{Error, Result},
    types::{geometry::detect_segments, Segment},
};

/// What the corrector did to the video
#[derive(Debug, Clone, PartialEq)]
pub enum Correction {
    /// The geometry never changes, the streams were copied as-is
    PassThrough { total_frames: u64 },
    /// The frames after the first segment were brought back to its geometry
    Corrected {
        segments: Vec<Segment>,
        width: u32,
        height: u32,
    },
}

/// Fix videos whose geometry changes partway through the recording
pub struct AspectRatioCorrector<'a> {
    inspector: &'a dyn VideoInspector,
    settings: CorrectorSettings,
}

impl<'a> AspectRatioCorrector<'a> {
    pub fn new(inspector: &'a dyn VideoInspector, settings: CorrectorSettings) -> Self {
        Self {
            inspector,
            settings,
        }
    }

    /// Write to `output` a video whose ratio is the same from start to end.
    ///
    /// The frames are read once, sequentially. The target geometry is the one
    /// of the first segment.
    pub fn correct(&self, input: &Path, output: &Path) -> Result<Correction> {
        let FrameSamples {
            samples,
            total_frames,
        } = self.inspector.sample_frames(input, self.settings.stride)?;

        let segments = detect_segments(&samples, total_frames, self.settings.tolerance);
        let Some(&first) = segments.first() else {
            return Err(Error::CorruptedMedia(format!(
                "no readable frame in {}",
                input.display()
            )));
        };

        if segments.len() == 1 {
            debug!(
                "Constant geometry {}x{} over {total_frames} frames",
                first.width, first.height
            );
            self.inspector.remux(input, output)?;
            return Ok(Correction::PassThrough { total_frames });
        }

        for segment in &segments {
            info!(
                "Frames {}..{} ({} frames) are {}x{}",
                segment.start,
                segment.end,
                segment.frame_count(),
                segment.width,
                segment.height
            );
        }
        info!(
            "Geometry changes {} times, rendering every frame as {}x{}",
            segments.len() - 1,
            first.width,
            first.height
        );
        self.inspector
            .render_uniform(input, output, first.width, first.height)?;

        Ok(Correction::Corrected {
            segments,
            width: first.width,
            height: first.height,
        })
    }
}
