use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::debug;

use super::{
    command::{assert_success_command, run_watched, Watched},
    SpaceDownloader,
};
use crate::{
    cookies::CookieFile,
    io::find_file_with_stem,
    result::{Error, Result},
    types::Space,
};

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp) program.
///
/// Slower than the dedicated tool but also handles video spaces.
#[derive(Debug)]
pub struct Ytdl {
    program: String,
    timeout: Duration,
}

impl Ytdl {
    /// Verify that the program is reachable
    pub fn new(program: &str, timeout: Duration) -> Result<Self> {
        assert_success_command(program, |cmd| cmd.arg("--version"))?;

        Ok(Self {
            program: program.to_owned(),
            timeout,
        })
    }
}

/// Find the line explaining why yt-dlp failed
fn error_reason(stderr: &str) -> Option<&str> {
    stderr
        .lines()
        .filter(|line| line.starts_with("ERROR:"))
        .last()
}

/// Whether yt-dlp failed saying the stream is unavailable
fn is_unavailable(stderr: &str) -> bool {
    stderr
        .lines()
        .any(|line| line.starts_with("ERROR:") && line.to_lowercase().contains("unavailable"))
}

impl SpaceDownloader for Ytdl {
    fn name(&self) -> &str {
        &self.program
    }

    fn download(&self, space: &Space, cookies: &CookieFile, dir: &Path) -> Result<PathBuf> {
        let template = dir.join(format!("{}.%(ext)s", space.id));

        let res = run_watched(
            &self.program,
            |cmd| {
                cmd.arg("-q")
                    .arg("--no-progress")
                    .args([OsStr::new("--cookies"), cookies.path().as_os_str()])
                    .args([OsStr::new("-o"), template.as_os_str()])
                    .arg("--no-continue") // Or else fails when file already exists, even an empty one
                    .arg("--")
                    .arg(&space.url)
            },
            self.timeout,
            &[],
        )
        .map_err(|err| Error::Download(format!("could not run {}: {err}", self.program)))?;

        match res {
            Watched::Exited { status, .. } if status.success() => {
                let file = find_file_with_stem(dir, &space.id)?.ok_or_else(|| {
                    Error::Download(format!("{} finished without output file", self.program))
                })?;
                debug!("Downloaded {}", file.display());
                Ok(file)
            }
            Watched::Exited { stderr, .. } if is_unavailable(&stderr) => Err(Error::Download(
                format!("the space is unavailable: {}", error_reason(&stderr).unwrap_or_default()),
            )),
            Watched::Exited { status, stderr } => Err(Error::Download(format!(
                "{} failed ({status}): {}",
                self.program,
                error_reason(&stderr).unwrap_or_default()
            ))),
            Watched::Aborted { line } => Err(Error::Download(line)),
            Watched::TimedOut => Err(Error::Download(format!(
                "{} did not finish within {:?}",
                self.program, self.timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    const STDERR: &str = indoc! {"
        WARNING: [twitter:broadcast] Falling back to generic n function search
        ERROR: [twitter:spaces] 1OyKAZkYkLnGb: This Space is unavailable
    "};

    #[test]
    fn detects_unavailable_space() {
        assert!(is_unavailable(STDERR));
        assert!(!is_unavailable("ERROR: HTTP Error 403: Forbidden"));
        assert!(!is_unavailable("WARNING: format unavailable, trying another"));
    }

    #[test]
    fn reason_is_last_error_line() {
        assert_eq!(
            error_reason(STDERR),
            Some("ERROR: [twitter:spaces] 1OyKAZkYkLnGb: This Space is unavailable")
        );
        assert_eq!(error_reason("nothing"), None);
    }
}
