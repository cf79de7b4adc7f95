use std::path::{Path, PathBuf};

use heck::ToKebabCase;

use crate::{
    io::{find_unused_stem, with_extension},
    result::Result,
    types::{Extension, Space},
};

/// Maximum number of characters of the title kept in file names
const MAX_SLUG_LEN: usize = 80;

/// Build the final paths of the artifacts of a space.
///
/// Paths have the form `<output_dir>/<space_id>/<date>-<title>-#<space_id>.<ext>`.
/// A path never points to an existing file: if one of the requested
/// extensions is taken, a ` (n)` counter is added to every path.
pub fn output_paths(
    output_dir: &Path,
    space: &Space,
    extensions: &[Extension],
) -> Result<Vec<PathBuf>> {
    let dir = output_dir.join(&space.id);
    let stem = find_unused_stem(&dir, &file_stem(space), extensions)?;

    Ok(extensions
        .iter()
        .map(|&ext| with_extension(&stem, ext))
        .collect())
}

/// `<date>-<slugified-title>-#<space_id>`
pub fn file_stem(space: &Space) -> String {
    let date = space.created_at.map_or_else(
        || "undated".to_owned(),
        |d| format!("{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day()),
    );

    format!("{date}-{}-#{}", slugify(&space.title), space.id)
}

/// Lowercase words of the title joined by dashes, safe for any filesystem
pub fn slugify(title: &str) -> String {
    // Keep only the characters that cannot break a path
    let cleaned: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let slug: String = cleaned.to_kebab_case().chars().take(MAX_SLUG_LEN).collect();
    let slug = slug.trim_matches('-');

    if slug.is_empty() {
        "untitled".to_owned()
    } else {
        slug.to_owned()
    }
}
