use std::fmt::Display;

use miette::miette;

#[derive(Debug)]
pub enum Error {
    /// Missing or rejected credentials (cookie file or API token)
    Authentication(String),

    /// The space could not be found or the link is malformed
    Resolution(String),

    /// Every downloader failed for the space
    Download(String),

    /// The downloaded media could not be read
    CorruptedMedia(String),

    /// The media uses a format the tools cannot handle
    UnsupportedSpaceType(String),

    Miette(miette::Report),
}

impl From<miette::Report> for Error {
    fn from(err: miette::Report) -> Self {
        Error::Miette(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Miette(miette::Report::msg(err))
    }
}

impl From<Error> for miette::Report {
    fn from(err: Error) -> Self {
        match err {
            Error::Miette(err) => err,
            err => miette!("{err}"),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Authentication(msg) => write!(f, "Authentication error: {msg}"),
            Error::Resolution(msg) => write!(f, "Resolution error: {msg}"),
            Error::Download(msg) => write!(f, "Download error: {msg}"),
            Error::CorruptedMedia(msg) => write!(f, "Corrupted media: {msg}"),
            Error::UnsupportedSpaceType(msg) => write!(f, "Unsupported space type: {msg}"),
            Error::Miette(report) => {
                let causes: Vec<String> = report.chain().map(ToString::to_string).collect();
                write!(f, "{}", causes.join(": "))
            }
        }
    }
}

impl Error {
    pub fn wrap_err_with<D, F>(self, f: F) -> Error
    where
        D: Display + Send + Sync + 'static,
        F: FnOnce() -> D,
    {
        match self {
            Error::Miette(report) => Error::Miette(report.wrap_err(f())),
            err => err,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn err_msg<D: Display + std::fmt::Debug + Send + Sync + 'static>(msg: D) -> Error {
    Error::Miette(miette::Report::msg(msg))
}

pub fn bail<T, D: Display + std::fmt::Debug + Send + Sync + 'static>(msg: D) -> Result<T> {
    Err(err_msg(msg))
}
