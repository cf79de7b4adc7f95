use std::time::Duration;

use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::debug;

use crate::{
    config::ApiSettings,
    resolver::link::check_profile_name,
    result::{err_msg, Error, Result},
    types::{MediaKind, Space},
};

/// Fields requested for each space
const SPACE_FIELDS: &str = "id,title,state,created_at,started_at,host_ids,creator_id";

/// Search of spaces on the social network
pub trait SpacesApi {
    /// Get the account identifier of a profile name
    fn user_id(&self, username: &str) -> Result<String>;

    /// List the spaces created by the account
    fn spaces_by_creator(&self, user_id: &str) -> Result<Vec<Space>>;
}

/// Client of the [X API v2](https://docs.x.com/x-api)
pub struct XApi {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

impl XApi {
    /// The token is required to query the API at all
    pub fn new(settings: &ApiSettings, token: Option<&str>) -> Result<Self> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::Authentication(
                    "An access token is required to search the spaces of profiles".to_owned(),
                )
            })?;

        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build();

        Ok(Self {
            agent,
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
        })
    }

    fn get<T: for<'de> Deserialize<'de>>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!("GET {url} {query:?}");

        let res = self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .query_pairs(query.iter().copied())
            .call();

        let res = match res {
            Ok(res) => res,
            Err(ureq::Error::Status(code @ (401 | 403), res)) => {
                let body = res.into_string().unwrap_or_default();
                debug!("API response content: {body}");
                return Err(Error::Authentication(format!(
                    "the API refused the access token (status {code})"
                )));
            }
            Err(ureq::Error::Status(404, _)) => {
                return Err(Error::Resolution(format!("{path} not found")));
            }
            Err(ureq::Error::Status(code, res)) => {
                let body = res.into_string().unwrap_or_default();
                return Err(err_msg(format!("API request failed with status {code}: {body}")));
            }
            Err(err) => return Err(err_msg(format!("Could not connect to the API: {err}"))),
        };

        res.into_json::<T>()
            .map_err(|err| err_msg(format!("Unexpected API response for {path}: {err}")))
    }
}

impl SpacesApi for XApi {
    fn user_id(&self, username: &str) -> Result<String> {
        let username = check_profile_name(username)?;
        let res: ApiResponse<ApiUser> = self.get(&format!("/users/by/username/{username}"), &[])?;

        match res.data {
            Some(user) => {
                debug!("Profile {} has the id {}", user.username, user.id);
                Ok(user.id)
            }
            None => Err(Error::Resolution(format!(
                "profile '{username}' not found{}",
                res.error_details()
            ))),
        }
    }

    fn spaces_by_creator(&self, user_id: &str) -> Result<Vec<Space>> {
        let res: ApiResponse<Vec<ApiSpace>> = self.get(
            "/spaces/by/creator_ids",
            &[("user_ids", user_id), ("space.fields", SPACE_FIELDS)],
        )?;

        if !res.errors.is_empty() {
            debug!("API errors:{}", res.error_details());
        }

        Ok(res
            .data
            .unwrap_or_default()
            .into_iter()
            .map(ApiSpace::into_space)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

impl<T> ApiResponse<T> {
    fn error_details(&self) -> String {
        self.errors
            .iter()
            .filter_map(|e| e.detail.as_deref().or(e.title.as_deref()))
            .map(|d| format!(" ({d})"))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    title: Option<String>,
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct ApiSpace {
    id: String,
    title: Option<String>,
    state: Option<String>,
    created_at: Option<String>,
    started_at: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl ApiSpace {
    fn into_space(self) -> Space {
        let parse = |date: Option<&str>| date.and_then(|d| OffsetDateTime::parse(d, &Rfc3339).ok());
        let created_at = parse(self.created_at.as_deref()).or_else(|| parse(self.started_at.as_deref()));

        let media_kind = match self.kind.as_deref() {
            Some("video") => Some(MediaKind::Video),
            Some("audio") => Some(MediaKind::Audio),
            _ => None,
        };

        Space {
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("Space {}", self.id)),
            url: Space::url_for(&self.id),
            id: self.id,
            created_at,
            media_kind,
            state: self.state,
        }
    }
}
