use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{debug, warn};

use super::{
    command::{run_command, run_watched, Capture, Watched},
    SpaceDownloader,
};
use crate::{
    cookies::CookieFile,
    io::find_file_with_stem,
    result::{bail, Error, Result},
    types::Space,
};

/// Printed when the recording playlist is broken, the download would never complete
const EXTINF_ERROR: &str = "Cannot get correct #EXTINF value of segment";

/// Interface for the [twspace-dl](https://github.com/HitomaruKonpaku/twspace-dl) program.
///
/// Only fetches the audio stream, but does it well with the account cookies.
#[derive(Debug)]
pub struct TwspaceDl {
    program: String,
    timeout: Duration,
}

impl TwspaceDl {
    /// Verify that the program is reachable
    pub fn new(program: &str, timeout: Duration) -> Result<Self> {
        // There is no version flag, but the help exits successfully
        let res = run_command(program, |cmd| cmd.arg("--help"), Capture::empty())?;
        if !res.status.success() {
            return bail(format!("{program} is not usable ({})", res.status));
        }

        Ok(Self {
            program: program.to_owned(),
            timeout,
        })
    }
}

impl SpaceDownloader for TwspaceDl {
    fn name(&self) -> &str {
        &self.program
    }

    fn download(&self, space: &Space, cookies: &CookieFile, dir: &Path) -> Result<PathBuf> {
        // The tool adds the extension itself
        let template = dir.join(&space.id);

        let res = run_watched(
            &self.program,
            |cmd| {
                cmd.args([OsStr::new("-c"), cookies.path().as_os_str()])
                    .args(["-i", &space.url])
                    .args([OsStr::new("-o"), template.as_os_str()])
            },
            self.timeout,
            &[EXTINF_ERROR],
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
            Watched::Exited { status, stderr } => {
                let last_line = stderr.lines().last().unwrap_or_default();
                Err(Error::Download(format!(
                    "{} failed ({status}): {last_line}",
                    self.program
                )))
            }
            Watched::Aborted { line } => {
                warn!("Broken recording playlist detected, stopping {}", self.program);
                Err(Error::Download(line))
            }
            Watched::TimedOut => Err(Error::Download(format!(
                "{} did not finish within {:?}",
                self.program, self.timeout
            ))),
        }
    }
}
