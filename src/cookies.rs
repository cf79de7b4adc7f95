use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::result::{Error, Result};

/// Cookie holding the session of the logged in account
const SESSION_COOKIE: &str = "auth_token";

/// Prefix marking HttpOnly cookies, which would otherwise look like a comment
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// One line of a Netscape cookie file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub domain: String,
    /// Unix timestamp, 0 for session cookies
    pub expires: i64,
    pub name: String,
    pub value: String,
}

/// Domains the downloaders send the cookies to
const SITE_DOMAINS: [&str; 2] = ["x.com", "twitter.com"];

impl Cookie {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires != 0 && self.expires < now.unix_timestamp()
    }

    /// Whether the cookie is sent to the social network
    pub fn is_for_site(&self) -> bool {
        let domain = self.domain.trim_start_matches('.').to_lowercase();
        SITE_DOMAINS
            .iter()
            .any(|site| domain == *site || domain.ends_with(&format!(".{site}")))
    }
}

/// A browser-exported cookie file.
///
/// Downstream tools read the file themselves, the parsed cookies are only
/// used to check the file looks usable.
#[derive(Debug)]
pub struct CookieFile {
    path: PathBuf,
    cookies: Vec<Cookie>,
}

impl CookieFile {
    /// Read and check the cookie file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::Authentication(format!(
                "Could not read cookie file {}: {err}",
                path.display()
            ))
        })?;

        let cookies = parse_netscape(&content);
        if cookies.is_empty() {
            return Err(Error::Authentication(format!(
                "No cookie found in {}. Is it a Netscape cookie file?",
                path.display()
            )));
        }
        debug!("{} cookies loaded from {}", cookies.len(), path.display());

        let file = Self {
            path: path.to_path_buf(),
            cookies,
        };
        file.warn_if_unusable(OffsetDateTime::now_utc());

        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Cookie of the social network with the given name
    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies
            .iter()
            .find(|c| c.name == name && c.is_for_site())
    }

    fn warn_if_unusable(&self, now: OffsetDateTime) {
        if let Some(problem) = self.problem(now) {
            warn!("{problem}");
        }

        let expired = self.cookies.iter().filter(|c| c.is_expired(now)).count();
        if expired > 0 {
            debug!("{expired} expired cookies in the cookie file");
        }
    }

    /// Why the downloaders will likely be refused, if they will
    fn problem(&self, now: OffsetDateTime) -> Option<String> {
        if !self.cookies.iter().any(Cookie::is_for_site) {
            return Some(format!(
                "No cookie for {} in {}, was it exported from the right site?",
                SITE_DOMAINS.join(" or "),
                self.path.display()
            ));
        }

        match self.get(SESSION_COOKIE) {
            None => Some(format!(
                "No '{SESSION_COOKIE}' cookie in {}, downloads may be refused",
                self.path.display()
            )),
            Some(cookie) if cookie.value.is_empty() => Some(format!(
                "The '{SESSION_COOKIE}' cookie is empty, log in and export the cookies again"
            )),
            Some(cookie) if cookie.is_expired(now) => Some(format!(
                "The '{SESSION_COOKIE}' cookie has expired, export the cookies again"
            )),
            Some(_) => None,
        }
    }
}

/// Parse the content of a Netscape cookie file, skipping invalid lines
pub fn parse_netscape(content: &str) -> Vec<Cookie> {
    content.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Cookie> {
    let line = line.trim_end_matches(['\r', '\n']);
    let line = match line.strip_prefix(HTTP_ONLY_PREFIX) {
        Some(rest) => rest,
        None if line.starts_with('#') || line.trim().is_empty() => return None,
        None => line,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    // Subdomain flag, path and secure flag do not matter here
    let &[domain, _, _, _, expires, name, value] = fields.as_slice() else {
        return None;
    };

    Some(Cookie {
        domain: domain.to_owned(),
        expires: expires.parse().ok()?,
        name: name.to_owned(),
        value: value.to_owned(),
    })
}
