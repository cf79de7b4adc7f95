use std::path::{Path, PathBuf};

use crate::{cookies::CookieFile, result::Result, types::Space};

/// A way of fetching the media of a space.
///
/// Several downloaders are tried in sequence until one succeeds,
/// see [`crate::orchestrator::Orchestrator`].
pub trait SpaceDownloader {
    /// Short name of the tool, used in logs and download records
    fn name(&self) -> &str;

    /// Download the media of the space inside `dir`.
    ///
    /// Return the path of the downloaded file, which must be inside `dir`.
    /// Failures are reported as [`crate::result::Error::Download`].
    fn download(&self, space: &Space, cookies: &CookieFile, dir: &Path) -> Result<PathBuf>;
}

impl<T: SpaceDownloader + ?Sized> SpaceDownloader for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn download(&self, space: &Space, cookies: &CookieFile, dir: &Path) -> Result<PathBuf> {
        (**self).download(space, cookies, dir)
    }
}
