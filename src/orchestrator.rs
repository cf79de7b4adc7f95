use std::path::Path;

use tracing::{debug, info, warn};

use crate::{
    already_processed::{AlreadyProcessed, DownloadRecord},
    cookies::CookieFile,
    io::clear_dir,
    outside::SpaceDownloader,
    result::{Error, Result},
    types::Space,
};

/// Outcome of [`Orchestrator::fetch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    Downloaded(DownloadRecord),
    /// The space was already fetched earlier in the run
    AlreadyProcessed,
}

/// Fetch spaces by trying each downloader in order until one succeeds
pub struct Orchestrator<'a> {
    strategies: Vec<Box<dyn SpaceDownloader + 'a>>,
    cookies: &'a CookieFile,
    processed: AlreadyProcessed,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        strategies: Vec<Box<dyn SpaceDownloader + 'a>>,
        cookies: &'a CookieFile,
        processed: AlreadyProcessed,
    ) -> Self {
        Self {
            strategies,
            cookies,
            processed,
        }
    }

    pub fn processed(&self) -> &AlreadyProcessed {
        &self.processed
    }

    /// Drop the download record of a space whose files could not be delivered
    pub fn forget(&mut self, id: &str) {
        if self.processed.remove(id).is_some() {
            debug!("Space {id} will be downloaded again if requested");
        }
    }

    /// Download the space media into `work_dir`.
    ///
    /// On each failure the directory is emptied before trying the next
    /// downloader, so that no partial download remains.
    pub fn fetch(&mut self, space: &Space, work_dir: &Path) -> Result<Fetch> {
        if self.processed.contains(&space.id) {
            debug!("Space already processed. Skipping it");
            return Ok(Fetch::AlreadyProcessed);
        }

        let mut failures = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            info!("Downloading with {}", strategy.name());

            match strategy.download(space, self.cookies, work_dir) {
                Ok(path) => {
                    let record = DownloadRecord {
                        space_id: space.id.clone(),
                        path,
                        tool: strategy.name().to_owned(),
                    };
                    self.processed.push(record.clone())?;
                    return Ok(Fetch::Downloaded(record));
                }
                Err(err) => {
                    warn!("{} failed: {err}", strategy.name());
                    failures.push(format!("{}: {err}", strategy.name()));
                    clear_dir(work_dir)?;
                }
            }
        }

        if failures.is_empty() {
            return Err(Error::Download("no downloader available".to_owned()));
        }
        Err(Error::Download(failures.join("; ")))
    }
}
