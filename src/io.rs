use std::path::{Path, PathBuf};

use miette::{Context, IntoDiagnostic};
use tempfile::TempDir;
use tracing::debug;

use crate::{
    result::{bail, Result},
    types::Extension,
};

/// Find the first `<stem><ext>` or `<stem> (<n>)<ext>` path in `out_dir`
/// such that none of the `extensions` variants exist yet.
///
/// Using the same stem for every extension keeps the artifacts of one space
/// side by side.
pub fn find_unused_stem(out_dir: &Path, stem: &str, extensions: &[Extension]) -> Result<PathBuf> {
    let is_free = |candidate: &str| {
        extensions
            .iter()
            .all(|ext| !out_dir.join(format!("{candidate}{}", ext.with_dot())).exists())
    };

    // Format for 1st file: <stem><ext>
    if is_free(stem) {
        return Ok(out_dir.join(stem));
    }

    // Format for 2nd file and up: <stem> (<count>)<ext>
    for n in 2u16.. {
        let candidate = format!("{stem} ({n})");
        if is_free(&candidate) {
            return Ok(out_dir.join(candidate));
        }
    }

    bail("Code is broken or you have really REALLY too much files with the same name")
}

/// Append the extension to the path, keeping any dot already in the file name
pub fn with_extension(stem: &Path, extension: Extension) -> PathBuf {
    let mut path = stem.as_os_str().to_owned();
    path.push(extension.with_dot());
    PathBuf::from(path)
}

/// Create a temporary directory for the work on one space.
///
/// The directory and its content are removed at the handle drop.
/// **As such, one must not simply get the directory path and drop the handle.**
pub fn work_dir(space_id: &str) -> Result<TempDir> {
    Ok(tempfile::Builder::new()
        .prefix(&format!("spacerec-{space_id}-"))
        .tempdir()?)
}

/// Move a file, copying it when a simple rename is not possible
/// (e.g. the destination is on another filesystem)
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_err() {
        debug!("Moving file failed, falling back to copying");
        std::fs::copy(from, to)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not copy {} to {}", from.display(), to.display()))?;
        std::fs::remove_file(from)?;
    }
    Ok(())
}

/// Remove everything inside the directory, keeping the directory itself
pub fn clear_dir(dir: &Path) -> Result<()> {
    for entry in dir.read_dir()? {
        let path = entry?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Find the complete file whose name starts with `stem` in the directory.
///
/// Downloaders choose the final extension themselves, and leave
/// `.part`/`.ytdl` files behind when interrupted.
pub fn find_file_with_stem(dir: &Path, stem: &str) -> Result<Option<PathBuf>> {
    const PARTIAL_SUFFIXES: [&str; 3] = [".part", ".ytdl", ".temp"];

    let mut found = Vec::new();
    for entry in dir.read_dir()? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_partial = PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s));
        if path.is_file() && name.starts_with(stem) && !is_partial {
            found.push(path);
        }
    }

    // Deterministic choice if a tool left several files
    found.sort();
    Ok(found.into_iter().next())
}
