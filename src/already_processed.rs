use std::{collections::BTreeMap, path::PathBuf};

use crate::{
    result::{bail, Result},
    types::SpaceId,
};

/// Result of a successful fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub space_id: SpaceId,
    /// Raw downloaded file, inside the space work directory
    pub path: PathBuf,
    /// Name of the downloader which produced the file
    pub tool: String,
}

/// Spaces already fetched during this run.
///
/// Nothing is persisted: a new run downloads everything again.
#[derive(Debug, Default)]
pub struct AlreadyProcessed {
    records: BTreeMap<SpaceId, DownloadRecord>,
}

impl AlreadyProcessed {
    pub fn push(&mut self, record: DownloadRecord) -> Result<()> {
        if self.records.contains_key(&record.space_id) {
            return bail(format!("Space {} already exist in cache", record.space_id));
        }

        self.records.insert(record.space_id.clone(), record);
        Ok(())
    }

    /// Forget a space, so that a later occurrence is fetched again
    pub fn remove(&mut self, id: &str) -> Option<DownloadRecord> {
        self.records.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&DownloadRecord> {
        self.records.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> DownloadRecord {
        DownloadRecord {
            space_id: id.to_owned(),
            path: PathBuf::from(format!("/tmp/{id}.m4a")),
            tool: "twspace_dl".to_owned(),
        }
    }

    #[test]
    fn push_then_contains() {
        let mut cache = AlreadyProcessed::default();
        assert!(!cache.contains("A"));

        cache.push(record("A")).unwrap();
        assert!(cache.contains("A"));
        assert_eq!(cache.get("A").map(|r| r.tool.as_str()), Some("twspace_dl"));
    }

    #[test]
    fn removed_space_can_be_pushed_again() {
        let mut cache = AlreadyProcessed::default();
        cache.push(record("A")).unwrap();

        assert_eq!(cache.remove("A"), Some(record("A")));
        assert!(!cache.contains("A"));
        assert_eq!(cache.remove("A"), None);
        cache.push(record("A")).unwrap();
    }

    #[test]
    fn duplicate_push_fails() {
        let mut cache = AlreadyProcessed::default();
        cache.push(record("A")).unwrap();
        assert!(cache.push(record("A")).is_err());
        assert!(cache.contains("A"));
    }
}
