use std::sync::OnceLock;

use regex::Regex;

use crate::{
    result::{Error, Result},
    types::SpaceId,
};

/// A space link, with an optional scheme and subdomain, on either domain.
/// Anything after the identifier (path, query, fragment) is ignored.
const SPACE_LINK: &str = r"^(?:https?://)?(?:(?:www|mobile)\.)?(?:x|twitter)\.com/i/spaces/(?P<id>[A-Za-z0-9]+)(?:[/?#].*)?$";

static SPACE_LINK_RE: OnceLock<Regex> = OnceLock::new();

/// Profile names allowed by the social network
const PROFILE_NAME: &str = r"^[A-Za-z0-9_]{1,15}$";

static PROFILE_NAME_RE: OnceLock<Regex> = OnceLock::new();

/// Extract the space identifier from a link
pub fn extract_space_id(link: &str) -> Result<SpaceId> {
    let re = SPACE_LINK_RE.get_or_init(|| Regex::new(SPACE_LINK).unwrap());

    re.captures(link.trim())
        .and_then(|cap| cap.name("id"))
        .map(|id| id.as_str().to_owned())
        .ok_or_else(|| Error::Resolution(format!("'{link}' is not a space link")))
}

/// Check that the profile name can be used as is in an API path
pub fn check_profile_name(name: &str) -> Result<&str> {
    let re = PROFILE_NAME_RE.get_or_init(|| Regex::new(PROFILE_NAME).unwrap());

    if re.is_match(name) {
        Ok(name)
    } else {
        Err(Error::Resolution(format!("'{name}' is not a valid profile name")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_names() {
        for name in ["jack", "Some_User_42", "a", "abcdefghijklmno"] {
            assert_eq!(check_profile_name(name).unwrap(), name);
        }
        for name in ["", "a/b", "../spaces", "x?y=1", "abcdefghijklmnop", "with space", "émile"] {
            assert!(
                matches!(check_profile_name(name), Err(Error::Resolution(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn decorations_do_not_change_the_id() {
        let links = [
            "https://x.com/i/spaces/1OwxWzEbNjXJQ",
            "https://x.com/i/spaces/1OwxWzEbNjXJQ/",
            "https://x.com/i/spaces/1OwxWzEbNjXJQ?s=20",
            "https://x.com/i/spaces/1OwxWzEbNjXJQ/?s=20&t=abc",
            "https://x.com/i/spaces/1OwxWzEbNjXJQ#top",
            "https://x.com/i/spaces/1OwxWzEbNjXJQ/peek",
            "http://www.x.com/i/spaces/1OwxWzEbNjXJQ",
            "https://twitter.com/i/spaces/1OwxWzEbNjXJQ",
            "https://mobile.twitter.com/i/spaces/1OwxWzEbNjXJQ",
            "x.com/i/spaces/1OwxWzEbNjXJQ",
            "  https://x.com/i/spaces/1OwxWzEbNjXJQ \n",
        ];

        for link in links {
            assert_eq!(extract_space_id(link).unwrap(), "1OwxWzEbNjXJQ", "{link}");
        }
    }

    #[test]
    fn malformed_links_are_resolution_errors() {
        let links = [
            "",
            "1OwxWzEbNjXJQ",
            "https://x.com/i/spaces/",
            "https://x.com/someone/status/123",
            "https://example.com/i/spaces/1OwxWzEbNjXJQ",
            "https://notx.com/i/spaces/1OwxWzEbNjXJQ",
        ];

        for link in links {
            assert!(
                matches!(extract_space_id(link), Err(Error::Resolution(_))),
                "{link}"
            );
        }
    }
}
