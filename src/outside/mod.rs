mod command;
mod downloader;
mod ffmpeg;
mod twspace;
mod ytdl;

pub use downloader::SpaceDownloader;
pub use ffmpeg::{Ffmpeg, FrameSamples, MediaInfo, VideoInspector, VideoStream};
pub use twspace::TwspaceDl;
pub use ytdl::Ytdl;
