use std::fmt::Display;

use time::OffsetDateTime;

pub type SpaceId = String;

/// What the recording contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

/// A recorded live session to archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
    pub id: SpaceId,
    pub title: String,
    /// Unknown when the space comes from a direct link
    pub created_at: Option<OffsetDateTime>,
    /// Hint only, the downloaded file decides in the end
    pub media_kind: Option<MediaKind>,
    pub url: String,
    pub state: Option<String>,
}

impl Space {
    /// A space known only by its identifier
    pub fn from_id(id: SpaceId) -> Self {
        Self {
            title: format!("Space {id}"),
            url: Self::url_for(&id),
            id,
            created_at: None,
            media_kind: None,
            state: None,
        }
    }

    /// Canonical link of a space
    pub fn url_for(id: &str) -> String {
        format!("https://x.com/i/spaces/{id}")
    }
}

impl Display for Space {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (#{})", self.title, self.id)
    }
}
