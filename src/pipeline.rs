use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::{
    config::CorrectorSettings,
    corrector::{AspectRatioCorrector, Correction},
    io::{move_file, work_dir},
    namer::output_paths,
    orchestrator::{Fetch, Orchestrator},
    outside::{MediaInfo, VideoInspector},
    result::{Error, Result},
    types::{Extension, MediaKind, Space},
};

/// What happened to a space
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Final files written in the output directory
    Delivered(Vec<PathBuf>),
    /// Already handled earlier in the run
    Skipped,
}

/// Counts of the processed spaces
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    pub fn record(&mut self, res: &Result<Outcome>) {
        match res {
            Ok(Outcome::Delivered(_)) => self.delivered += 1,
            Ok(Outcome::Skipped) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Whether at least one space has its files in the output directory.
    ///
    /// False when nothing was attempted at all.
    pub fn succeeded(&self) -> bool {
        self.delivered + self.skipped > 0
    }
}

/// Drive a space from download to its final files
pub struct Pipeline<'a> {
    orchestrator: Orchestrator<'a>,
    inspector: &'a dyn VideoInspector,
    corrector: AspectRatioCorrector<'a>,
    output_dir: PathBuf,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        orchestrator: Orchestrator<'a>,
        inspector: &'a dyn VideoInspector,
        corrector_settings: CorrectorSettings,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            orchestrator,
            inspector,
            corrector: AspectRatioCorrector::new(inspector, corrector_settings),
            output_dir,
        }
    }

    /// Download, correct and save the space.
    ///
    /// Nothing is written to the output directory unless every step succeeded.
    /// The temporary files are removed in every case.
    pub fn process(&mut self, space: &Space) -> Result<Outcome> {
        let work_dir = work_dir(&space.id)?;

        let raw = match self.orchestrator.fetch(space, work_dir.path())? {
            Fetch::AlreadyProcessed => {
                if let Some(record) = self.orchestrator.processed().get(&space.id) {
                    info!("Already downloaded with {} in this run", record.tool);
                }
                return Ok(Outcome::Skipped);
            }
            Fetch::Downloaded(record) => {
                info!("Downloaded with {}", record.tool);
                record.path
            }
        };

        let delivered = self
            .post_process(space, &raw, work_dir.path())
            .and_then(|artifacts| self.deliver(space, &artifacts));

        match delivered {
            Ok(paths) => Ok(Outcome::Delivered(paths)),
            Err(err) => {
                // Nothing was delivered, the space is not handled
                self.orchestrator.forget(&space.id);
                Err(err)
            }
        }
    }

    /// Create the final artifacts inside the work directory
    fn post_process(&self, space: &Space, raw: &Path, dir: &Path) -> Result<Vec<(Extension, PathBuf)>> {
        let raw_is_m4a = Extension::from_path(raw) == Some(Extension::M4a);

        let media = match self.inspector.media_info(raw) {
            Ok(media) => media,
            Err(Error::CorruptedMedia(msg)) if raw_is_m4a => {
                error!("{msg}. Keeping the downloaded audio file as-is");
                return Ok(vec![(Extension::M4a, raw.to_path_buf())]);
            }
            Err(err) => return Err(err),
        };

        if space.media_kind == Some(MediaKind::Video) && media.video.is_none() {
            warn!("Video space but only audio was downloaded");
        }

        let mut artifacts = Vec::with_capacity(2);

        // Audio artifact
        if raw_is_m4a && media.video.is_none() {
            artifacts.push((Extension::M4a, raw.to_path_buf()));
        } else if media.has_audio {
            let audio = dir.join("audio.m4a");
            match self.inspector.extract_audio(raw, &audio) {
                Ok(()) => artifacts.push((Extension::M4a, audio)),
                Err(err) => error!("{err}"),
            }
        }

        // Video artifact
        if let Some(video) = self.video_artifact(raw, &media, dir)? {
            artifacts.push((Extension::Mp4, video));
        }

        if artifacts.is_empty() {
            return Err(Error::UnsupportedSpaceType(format!(
                "nothing usable in {}",
                raw.display()
            )));
        }

        Ok(artifacts)
    }

    /// Produce the video with a uniform geometry, if the download has a video
    fn video_artifact(&self, raw: &Path, media: &MediaInfo, dir: &Path) -> Result<Option<PathBuf>> {
        let Some(stream) = &media.video else {
            return Ok(None);
        };
        let output = dir.join("video.mp4");

        let correction = if stream.codec.is_none() || stream.width == 0 || stream.height == 0 {
            Err(Error::UnsupportedSpaceType(format!(
                "unknown video stream in {}",
                raw.display()
            )))
        } else {
            self.corrector.correct(raw, &output)
        };

        match correction {
            Ok(Correction::PassThrough { total_frames }) => {
                info!("Video geometry is uniform over {total_frames} frames");
                Ok(Some(output))
            }
            Ok(Correction::Corrected { width, height, .. }) => {
                info!("Video corrected to {width}x{height}");
                Ok(Some(output))
            }
            Err(Error::CorruptedMedia(msg)) => {
                error!("Corrupted video, keeping only the audio: {msg}");
                Ok(None)
            }
            Err(Error::UnsupportedSpaceType(msg)) => {
                warn!("{msg}. Skipping the geometry correction");
                match self.inspector.remux(raw, &output) {
                    Ok(()) => Ok(Some(output)),
                    Err(err) => {
                        error!("Could not keep the uncorrected video: {err}");
                        Ok(None)
                    }
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Move the artifacts to their final paths.
    ///
    /// Either every artifact is moved, or the ones already moved are removed.
    fn deliver(&self, space: &Space, artifacts: &[(Extension, PathBuf)]) -> Result<Vec<PathBuf>> {
        let space_dir = self.output_dir.join(&space.id);
        std::fs::create_dir_all(&space_dir)?;

        let extensions: Vec<Extension> = artifacts.iter().map(|(ext, _)| *ext).collect();
        let paths = output_paths(&self.output_dir, space, &extensions)?;

        for (i, ((_, from), to)) in artifacts.iter().zip(&paths).enumerate() {
            if let Err(err) = move_file(from, to) {
                rollback(&paths[..i], &space_dir);
                return Err(err);
            }
        }

        for path in &paths {
            info!("Saved {}", path.display());
        }
        Ok(paths)
    }
}

/// Remove the partially delivered files, and the space directory if left empty
fn rollback(moved: &[PathBuf], space_dir: &Path) {
    for path in moved {
        if let Err(err) = std::fs::remove_file(path) {
            warn!("Could not remove {}: {err}", path.display());
        }
    }
    // Fails when other files are in the directory, which must be kept
    let _ = std::fs::remove_dir(space_dir);
}
