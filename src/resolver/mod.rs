mod api;
mod link;

use std::collections::HashSet;

use time::OffsetDateTime;
use tracing::{debug, info, info_span, warn};

pub use api::{SpacesApi, XApi};
pub use link::{check_profile_name, extract_space_id};

use crate::{
    cli::Timeframe,
    result::Result,
    types::Space,
};

/// Resolve direct links into spaces.
///
/// Malformed links are logged and skipped, they do not prevent
/// the other links from being processed.
pub fn resolve_links(links: &[String]) -> Vec<Space> {
    let spaces = links
        .iter()
        .filter_map(|link| match extract_space_id(link) {
            Ok(id) => {
                debug!("Link {link} refers to the space {id}");
                Some(Space::from_id(id))
            }
            Err(err) => {
                warn!("{err}");
                None
            }
        })
        .collect();

    merge_spaces(Vec::new(), spaces)
}

/// Append the `found` spaces not already in `spaces`, keeping the order of both
pub fn merge_spaces(mut spaces: Vec<Space>, found: Vec<Space>) -> Vec<Space> {
    for space in found {
        if !spaces.iter().any(|s| s.id == space.id) {
            spaces.push(space);
        }
    }
    spaces
}

/// Find the spaces created by the profiles within the timeframe,
/// most recent first.
///
/// Any error stops the search, as a partial result would look complete.
pub fn search_profiles(
    api: &dyn SpacesApi,
    profiles: &[String],
    timeframe: Timeframe,
    now: OffsetDateTime,
) -> Result<Vec<Space>> {
    let mut spaces = Vec::new();

    for profile in profiles {
        let profile = profile.trim().trim_start_matches('@');
        if profile.is_empty() {
            continue;
        }

        let _span = info_span!("profile", name = profile).entered();
        let user_id = api.user_id(check_profile_name(profile)?)?;
        debug!("Successfully connected to the API");

        let found = api.spaces_by_creator(&user_id)?;
        let recent = within_timeframe(found, now, timeframe);
        if recent.is_empty() {
            info!(
                "No recordings found in the past {} days",
                timeframe.days()
            );
        } else {
            info!(
                "{} recordings found in the past {} days",
                recent.len(),
                timeframe.days()
            );
        }
        spaces.extend(recent);
    }

    Ok(newest_first(spaces))
}

/// Keep the spaces created less than `timeframe` ago, most recent first.
///
/// Spaces without a known creation date cannot be placed and are dropped.
pub fn within_timeframe(spaces: Vec<Space>, now: OffsetDateTime, timeframe: Timeframe) -> Vec<Space> {
    let start = now - timeframe.duration();

    let spaces = spaces
        .into_iter()
        .filter(|space| match space.created_at {
            Some(created_at) => created_at >= start && created_at <= now,
            None => {
                debug!("Space {} has no creation date, ignoring it", space.id);
                false
            }
        })
        .collect();

    newest_first(spaces)
}

/// Sort by creation date, most recent first, and remove duplicated spaces
fn newest_first(mut spaces: Vec<Space>) -> Vec<Space> {
    // Stable sort: equal dates keep the API order
    spaces.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut seen = HashSet::new();
    spaces.retain(|space| seen.insert(space.id.clone()));
    spaces
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use time::{macros::datetime, Duration};

    use super::*;
    use crate::result::Error;

    const NOW: OffsetDateTime = datetime!(2024-06-30 12:00 UTC);

    fn space(id: &str, days_ago: i64) -> Space {
        Space {
            title: format!("Talk {id}"),
            created_at: Some(NOW - Duration::days(days_ago)),
            ..Space::from_id(id.to_owned())
        }
    }

    /// Profiles mapped to their spaces, in no particular order
    struct FakeApi {
        spaces: HashMap<&'static str, Vec<Space>>,
    }

    impl SpacesApi for FakeApi {
        fn user_id(&self, username: &str) -> Result<String> {
            if username == "expired" {
                return Err(Error::Authentication("bad token".to_owned()));
            }
            if self.spaces.contains_key(username) {
                Ok(format!("id-{username}"))
            } else {
                Err(Error::Resolution(format!("profile '{username}' not found")))
            }
        }

        fn spaces_by_creator(&self, user_id: &str) -> Result<Vec<Space>> {
            let username = user_id.trim_start_matches("id-");
            Ok(self.spaces.get(username).cloned().unwrap_or_default())
        }
    }

    fn api() -> FakeApi {
        FakeApi {
            spaces: HashMap::from([
                (
                    "alice",
                    vec![space("a3", 20), space("a1", 1), space("a5", 100), space("a2", 6)],
                ),
                ("bob", vec![space("b1", 3), space("b2", 25)]),
            ]),
        }
    }

    fn ids(spaces: &[Space]) -> Vec<&str> {
        spaces.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn month_is_sorted_newest_first() {
        let spaces =
            search_profiles(&api(), &["alice".to_owned()], Timeframe::Month, NOW).unwrap();
        assert_eq!(ids(&spaces), vec!["a1", "a2", "a3"]);
    }

    #[test]
    fn week_is_a_subset_of_month() {
        let profiles = ["alice".to_owned(), "@bob".to_owned()];
        let month = search_profiles(&api(), &profiles, Timeframe::Month, NOW).unwrap();
        let week = search_profiles(&api(), &profiles, Timeframe::Week, NOW).unwrap();

        assert_eq!(ids(&month), vec!["a1", "b1", "a2", "a3", "b2"]);
        assert_eq!(ids(&week), vec!["a1", "b1", "a2"]);
        assert!(week.iter().all(|s| month.contains(s)));

        // The subset keeps the same relative order
        let filtered: Vec<&Space> = month
            .iter()
            .filter(|s| s.created_at.unwrap() >= NOW - Duration::days(7))
            .collect();
        assert_eq!(filtered, week.iter().collect::<Vec<_>>());
    }

    #[test]
    fn longest_timeframe() {
        let spaces =
            search_profiles(&api(), &["alice".to_owned()], Timeframe::FourMonths, NOW).unwrap();
        assert_eq!(ids(&spaces), vec!["a1", "a2", "a3", "a5"]);
    }

    #[test]
    fn undated_and_future_spaces_are_dropped() {
        let mut future = space("f", 0);
        future.created_at = Some(NOW + Duration::hours(1));
        let spaces = vec![Space::from_id("undated".to_owned()), future, space("ok", 2)];

        assert_eq!(ids(&within_timeframe(spaces, NOW, Timeframe::Week)), vec!["ok"]);
    }

    #[test]
    fn duplicated_profiles_give_unique_spaces() {
        let profiles = ["bob".to_owned(), "bob".to_owned()];
        let spaces = search_profiles(&api(), &profiles, Timeframe::Month, NOW).unwrap();
        assert_eq!(ids(&spaces), vec!["b1", "b2"]);
    }

    #[test]
    fn search_errors_abort() {
        let res = search_profiles(
            &api(),
            &["alice".to_owned(), "nobody".to_owned()],
            Timeframe::Week,
            NOW,
        );
        assert!(matches!(res, Err(Error::Resolution(_))));

        let res = search_profiles(&api(), &["expired".to_owned()], Timeframe::Week, NOW);
        assert!(matches!(res, Err(Error::Authentication(_))));
    }

    #[test]
    fn invalid_profile_name_aborts() {
        let res = search_profiles(&api(), &["alice/../x".to_owned()], Timeframe::Week, NOW);
        assert!(matches!(res, Err(Error::Resolution(_))));
    }

    #[test]
    fn links_skip_malformed_ones() {
        let links = [
            "https://x.com/i/spaces/ABC123?s=20".to_owned(),
            "not a link".to_owned(),
            "https://twitter.com/i/spaces/DEF456/".to_owned(),
        ];
        assert_eq!(ids(&resolve_links(&links)), vec!["ABC123", "DEF456"]);
    }

    #[test]
    fn same_space_linked_twice_is_resolved_once() {
        let links = [
            "https://x.com/i/spaces/ABC123".to_owned(),
            "https://twitter.com/i/spaces/DEF456".to_owned(),
            "https://x.com/i/spaces/ABC123?s=20".to_owned(),
        ];
        assert_eq!(ids(&resolve_links(&links)), vec!["ABC123", "DEF456"]);
    }

    #[test]
    fn links_come_before_found_spaces() {
        let links = resolve_links(&["https://x.com/i/spaces/b1".to_owned()]);
        let found = vec![space("a1", 1), space("b1", 3), space("a2", 6)];

        let merged = merge_spaces(links, found);

        assert_eq!(ids(&merged), vec!["b1", "a1", "a2"]);
        // The direct link wins over the search result
        assert_eq!(merged[0].created_at, None);
    }
}
