use std::io::{BufRead, Write};

use crate::{result::Result, types::Space};

/// Parse a comma-separated list of 1-based indexes into 0-based ones.
///
/// An empty answer selects everything. Invalid or out of range
/// entries are ignored, duplicates are removed.
pub fn parse_selection(input: &str, len: usize) -> Vec<usize> {
    let input = input.trim();
    if input.is_empty() {
        return (0..len).collect();
    }

    let mut selected = Vec::new();
    for idx in input
        .split(',')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter(|&n| n >= 1 && n <= len)
        .map(|n| n - 1)
    {
        if !selected.contains(&idx) {
            selected.push(idx);
        }
    }
    selected
}

/// Keep the spaces at the given indexes, in the given order
pub fn pick(spaces: Vec<Space>, indexes: &[usize]) -> Vec<Space> {
    let mut slots: Vec<Option<Space>> = spaces.into_iter().map(Some).collect();
    indexes
        .iter()
        .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
        .collect()
}

/// Print the found spaces, one per line with their 1-based index
pub fn list_spaces<W: Write>(mut out: W, spaces: &[Space]) -> Result<()> {
    writeln!(out, "The following recordings are available:")?;
    for (i, space) in spaces.iter().enumerate() {
        writeln!(
            out,
            "{}. Title: {}, Status: {}, URL: {}",
            i + 1,
            space.title,
            space.state.as_deref().unwrap_or("unknown"),
            space.url
        )?;
    }
    Ok(())
}

/// Ask which spaces to download
pub fn prompt_selection<R: BufRead, W: Write>(mut input: R, mut out: W, len: usize) -> Result<Vec<usize>> {
    write!(
        out,
        "Enter the number of the space(s) to download (comma-separated if multiple), \
        or press Enter to download all: "
    )?;
    out.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(parse_selection(&answer, len))
}

/// List the found spaces, then keep the ones picked beforehand or at the prompt.
///
/// Without a pick nor a prompt, every space is kept.
pub fn select<R: BufRead, W: Write>(
    spaces: Vec<Space>,
    pick_list: Option<&str>,
    interactive: bool,
    input: R,
    mut out: W,
) -> Result<Vec<Space>> {
    if spaces.is_empty() {
        return Ok(spaces);
    }
    list_spaces(&mut out, &spaces)?;

    let indexes = match pick_list {
        Some(answer) => parse_selection(answer, spaces.len()),
        None if interactive => prompt_selection(input, out, spaces.len())?,
        None => return Ok(spaces),
    };
    Ok(pick(spaces, &indexes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spaces(ids: &[&str]) -> Vec<Space> {
        ids.iter().map(|id| Space::from_id((*id).to_owned())).collect()
    }

    #[test]
    fn empty_selects_all() {
        assert_eq!(parse_selection("", 3), vec![0, 1, 2]);
        assert_eq!(parse_selection("  \n", 2), vec![0, 1]);
    }

    #[test]
    fn invalid_entries_are_ignored() {
        assert_eq!(parse_selection("3, 1,x,0,9,3", 4), vec![2, 0]);
        assert!(parse_selection("nope", 4).is_empty());
    }

    #[test]
    fn pick_keeps_order() {
        let picked = pick(spaces(&["a", "b", "c"]), &[2, 0, 7]);
        let ids: Vec<&str> = picked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn listing_and_prompt() {
        let found = spaces(&["a", "b"]);
        let mut listing = Vec::new();
        list_spaces(&mut listing, &found).unwrap();
        let listing = String::from_utf8(listing).unwrap();
        assert!(listing.contains("1. Title: Space a, Status: unknown, URL: https://x.com/i/spaces/a"));
        assert!(listing.contains("2. Title: Space b"));

        let mut prompt = Vec::new();
        let selected = prompt_selection("2\n".as_bytes(), &mut prompt, found.len()).unwrap();
        assert_eq!(selected, vec![1]);
        assert!(!prompt.is_empty());
    }

    #[test]
    fn select_with_pick_list() {
        let mut out = Vec::new();
        let selected = select(spaces(&["a", "b", "c"]), Some("3,1"), false, "".as_bytes(), &mut out).unwrap();

        let ids: Vec<&str> = selected.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert!(String::from_utf8(out).unwrap().contains("3. Title: Space c"));
    }

    #[test]
    fn select_prompts_when_interactive() {
        let mut out = Vec::new();
        let selected = select(spaces(&["a", "b"]), None, true, "2\n".as_bytes(), &mut out).unwrap();

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "b");
    }

    #[test]
    fn select_keeps_everything_by_default() {
        let mut out = Vec::new();
        let selected = select(spaces(&["a", "b"]), None, false, "1\n".as_bytes(), &mut out).unwrap();
        assert_eq!(selected.len(), 2);

        let mut out = Vec::new();
        assert!(select(vec![], None, true, "".as_bytes(), &mut out).unwrap().is_empty());
        assert!(out.is_empty());
    }
}
