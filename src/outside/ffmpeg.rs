use std::{ffi::OsStr, path::Path};

use miette::{Context, IntoDiagnostic};
use serde::Deserialize;
use tracing::debug;

use super::command::{assert_success_command, run_command, Capture, FFXXX_DEFAULT_ARGS};
use crate::{
    result::{Error, Result},
    types::{geometry::sample_at_stride, FrameSample},
};

/// Main video stream of a media file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStream {
    pub codec: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// Streams found in a media file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub has_audio: bool,
    pub video: Option<VideoStream>,
}

/// Frame dimensions sampled from a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSamples {
    pub samples: Vec<FrameSample>,
    pub total_frames: u64,
}

/// Inspection and transformation of downloaded media files.
///
/// Unreadable inputs are reported as [`Error::CorruptedMedia`],
/// inputs the tools cannot decode as [`Error::UnsupportedSpaceType`].
pub trait VideoInspector {
    /// List the streams of the file
    fn media_info(&self, path: &Path) -> Result<MediaInfo>;

    /// Read the dimensions of every `stride`-th frame of the main video stream
    fn sample_frames(&self, path: &Path, stride: u64) -> Result<FrameSamples>;

    /// Write the audio stream of the input to an `.m4a` output
    fn extract_audio(&self, input: &Path, output: &Path) -> Result<()>;

    /// Change the container of the input without touching the streams
    fn remux(&self, input: &Path, output: &Path) -> Result<()>;

    /// Re-encode the input so that every frame is `width`x`height`.
    ///
    /// Frames with another ratio are center-cropped to the target ratio before scaling.
    fn render_uniform(&self, input: &Path, output: &Path, width: u32, height: u32) -> Result<()>;
}

/// Interface for the [ffmpeg and ffprobe](https://ffmpeg.org) programs
#[derive(Debug)]
pub struct Ffmpeg {
    ffmpeg: String,
    ffprobe: String,
}

impl Ffmpeg {
    /// Verify that the `ffmpeg` and `ffprobe` binaries are reachable
    pub fn new(ffmpeg: &str, ffprobe: &str) -> Result<Self> {
        assert_success_command(ffmpeg, |cmd| cmd.arg("-version"))?;
        assert_success_command(ffprobe, |cmd| cmd.arg("-version"))?;

        Ok(Self {
            ffmpeg: ffmpeg.to_owned(),
            ffprobe: ffprobe.to_owned(),
        })
    }
}

impl VideoInspector for Ffmpeg {
    fn media_info(&self, path: &Path) -> Result<MediaInfo> {
        let res = run_command(
            &self.ffprobe,
            |cmd| {
                cmd.args(["-v", "error", "-show_streams", "-of", "json"])
                    .arg(path)
            },
            Capture::STDOUT | Capture::STDERR,
        )?;

        if !res.status.success() {
            let stderr = String::from_utf8_lossy(&res.stderr);
            return Err(Error::CorruptedMedia(format!(
                "{} is unreadable: {}",
                path.display(),
                stderr.trim()
            )));
        }

        parse_media_info(&res.stdout)
    }

    fn sample_frames(&self, path: &Path, stride: u64) -> Result<FrameSamples> {
        let res = run_command(
            &self.ffprobe,
            |cmd| {
                cmd.args(["-v", "error", "-select_streams", "v:0"])
                    .args(["-show_entries", "frame=width,height"])
                    .args(["-of", "csv=p=0"])
                    .arg(path)
            },
            Capture::STDOUT | Capture::STDERR,
        )?;

        let stderr = String::from_utf8_lossy(&res.stderr);
        if !res.status.success() {
            return Err(classify_decode_error(path, &stderr));
        }

        let stdout = String::from_utf8_lossy(&res.stdout);
        let (samples, total_frames) = sample_at_stride(parse_frame_dims(&stdout), stride);
        if total_frames == 0 && is_unsupported(&stderr) {
            return Err(classify_decode_error(path, &stderr));
        }
        debug!(
            "{total_frames} frames, {} samples in {}",
            samples.len(),
            path.display()
        );

        Ok(FrameSamples {
            samples,
            total_frames,
        })
    }

    fn extract_audio(&self, input: &Path, output: &Path) -> Result<()> {
        let extract = |codec: &[&str]| {
            assert_success_command(&self.ffmpeg, |cmd| {
                cmd.args(FFXXX_DEFAULT_ARGS)
                    .arg("-y")
                    .args([OsStr::new("-i"), input.as_os_str()])
                    .args(["-map", "0:a:0", "-vn"])
                    .args(codec)
                    .arg(output)
            })
        };

        // Copy the stream when the codec fits in the container
        if extract(&["-c:a", "copy"]).is_ok() {
            return Ok(());
        }
        debug!("Could not copy the audio stream, encoding it");
        extract(&["-c:a", "aac", "-b:a", "128k"])
            .map_err(|err| err.wrap_err_with(|| "Could not extract the audio stream"))
    }

    fn remux(&self, input: &Path, output: &Path) -> Result<()> {
        assert_success_command(&self.ffmpeg, |cmd| {
            cmd.args(FFXXX_DEFAULT_ARGS)
                .arg("-y")
                .args([OsStr::new("-i"), input.as_os_str()])
                .args(["-map", "0:v:0", "-map", "0:a?"])
                .args(["-c", "copy"])
                .args(["-movflags", "+faststart"])
                .arg(output)
        })
        .map_err(|err| err.wrap_err_with(|| "Could not remux the video"))
    }

    fn render_uniform(&self, input: &Path, output: &Path, width: u32, height: u32) -> Result<()> {
        let filter = uniform_filter(width, height);
        debug!("Video filter: {filter}");

        assert_success_command(&self.ffmpeg, |cmd| {
            cmd.args(FFXXX_DEFAULT_ARGS)
                .arg("-y")
                .args([OsStr::new("-i"), input.as_os_str()])
                .args(["-map", "0:v:0", "-map", "0:a?"])
                .args(["-filter:v", &filter])
                .args(["-c:v", "libx264", "-preset", "veryfast", "-crf", "20"])
                .args(["-pix_fmt", "yuv420p"])
                .args(["-c:a", "aac", "-b:a", "128k"])
                .args(["-movflags", "+faststart"])
                .arg(output)
        })
        .map_err(|err| err.wrap_err_with(|| "Could not render the video with a uniform geometry"))
    }
}

/// Build the filter bringing every frame to `width`x`height`.
///
/// The crop size is evaluated again each time the input resolution changes,
/// so frames already at the target ratio are not cropped.
fn uniform_filter(width: u32, height: u32) -> String {
    let (w, h) = (even(width), even(height));
    format!(
        "crop=w='min(iw,trunc(ih*{w}/{h}/2)*2)':h='min(ih,trunc(iw*{h}/{w}/2)*2)',\
        scale={w}:{h},\
        setsar=1"
    )
}

/// Round down to an even number, as required by most encoders
fn even(n: u32) -> u32 {
    (n & !1).max(2)
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    disposition: Option<FfprobeDisposition>,
}

#[derive(Debug, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

/// Parse the JSON output of `ffprobe -show_streams`
fn parse_media_info(json: &[u8]) -> Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_slice(json)
        .into_diagnostic()
        .wrap_err("Could not parse ffprobe JSON output")?;

    let has_audio = output
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    // Cover art is stored as a single-frame video stream, it does not count
    let video = output
        .streams
        .into_iter()
        .filter(|s| s.codec_type.as_deref() == Some("video"))
        .find(|s| s.disposition.as_ref().map_or(true, |d| d.attached_pic == 0))
        .map(|s| VideoStream {
            codec: s.codec_name,
            width: s.width.unwrap_or(0),
            height: s.height.unwrap_or(0),
        });

    Ok(MediaInfo { has_audio, video })
}

/// Parse `width,height` lines, keeping unparsable ones as null dimensions
/// so that the frame indexes stay aligned
fn parse_frame_dims(csv: &str) -> impl Iterator<Item = (u32, u32)> + '_ {
    csv.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut fields = line.split(',');
            let mut next = || fields.next().and_then(|f| f.trim().parse::<u32>().ok());
            match (next(), next()) {
                (Some(width), Some(height)) => (width, height),
                _ => (0, 0),
            }
        })
}

fn is_unsupported(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    ["decoder", "codec"]
        .iter()
        .any(|w| stderr.contains(w))
        && ["not found", "unsupported", "not supported", "not implemented"]
            .iter()
            .any(|w| stderr.contains(w))
}

fn classify_decode_error(path: &Path, stderr: &str) -> Error {
    let msg = format!("{}: {}", path.display(), stderr.trim());
    if is_unsupported(stderr) {
        Error::UnsupportedSpaceType(msg)
    } else {
        Error::CorruptedMedia(msg)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn video_with_audio() {
        let json = indoc! {r#"
            {
                "streams": [
                    { "index": 0, "codec_name": "h264", "codec_type": "video",
                      "width": 1280, "height": 720, "disposition": { "attached_pic": 0 } },
                    { "index": 1, "codec_name": "aac", "codec_type": "audio" }
                ]
            }
        "#};

        let media = parse_media_info(json.as_bytes()).unwrap();
        assert!(media.has_audio);
        assert_eq!(
            media.video,
            Some(VideoStream {
                codec: Some("h264".to_owned()),
                width: 1280,
                height: 720
            })
        );
    }

    #[test]
    fn cover_art_is_not_a_video() {
        let json = indoc! {r#"
            {
                "streams": [
                    { "codec_name": "aac", "codec_type": "audio" },
                    { "codec_name": "mjpeg", "codec_type": "video", "width": 400, "height": 400,
                      "disposition": { "attached_pic": 1 } }
                ]
            }
        "#};

        let media = parse_media_info(json.as_bytes()).unwrap();
        assert!(media.has_audio);
        assert_eq!(media.video, None);
    }

    #[test]
    fn media_without_streams() {
        let media = parse_media_info(b"{}").unwrap();
        assert!(!media.has_audio);
        assert!(media.video.is_none());
        assert!(parse_media_info(b"not json").is_err());
    }

    #[test]
    fn frame_dims_keep_indexes() {
        let csv = indoc! {"
            1280,720
            1280,720,
            garbage

            720,1280
        "};
        let dims: Vec<_> = parse_frame_dims(csv).collect();
        assert_eq!(dims, vec![(1280, 720), (1280, 720), (0, 0), (720, 1280)]);
    }

    #[test]
    fn filter_targets_even_size() {
        assert_eq!(
            uniform_filter(1281, 720),
            "crop=w='min(iw,trunc(ih*1280/720/2)*2)':h='min(ih,trunc(iw*720/1280/2)*2)',\
            scale=1280:720,setsar=1"
        );
    }

    #[test]
    fn decode_errors() {
        let path = Path::new("in.mp4");
        assert!(matches!(
            classify_decode_error(path, "Decoder (codec av1) not found for input stream #0:0"),
            Error::UnsupportedSpaceType(_)
        ));
        assert!(matches!(
            classify_decode_error(path, "moov atom not found"),
            Error::CorruptedMedia(_)
        ));
    }
}
