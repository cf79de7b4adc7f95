use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    /// Audio artifact
    M4a,
    /// Video artifact
    Mp4,
}

impl Extension {
    /// Return the extension with the leading dot.
    /// e.g. ".ext"
    pub fn with_dot(self) -> &'static str {
        match self {
            Extension::M4a => ".m4a",
            Extension::Mp4 => ".mp4",
        }
    }

    /// Parse the path file extension.
    /// Return None in case of no or invalid extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "m4a" => Some(Self::M4a),
                "mp4" => Some(Self::Mp4),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_extensions_case_insensitively() {
        assert_eq!(Extension::from_path("a/b.M4A"), Some(Extension::M4a));
        assert_eq!(Extension::from_path("clip.mp4"), Some(Extension::Mp4));
        assert_eq!(Extension::from_path("clip.webm"), None);
        assert_eq!(Extension::from_path("noext"), None);
    }

    #[test]
    fn dotted() {
        assert_eq!(Extension::Mp4.with_dot(), ".mp4");
    }
}
