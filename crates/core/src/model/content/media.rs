use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

//
// ─── ERRORS (domain validation) ────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaValidationError {
    #[error("Media URI cannot be empty.")]
    EmptyMediaUri,

    #[error("Media URL is not valid: {0}")]
    InvalidUrl(String),
}

//
// ─── MEDIA CORE TYPES ──────────────────────────────────────────────────────────
//

/// Location of a media attachment, either bundled on disk or remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaUri {
    FilePath(PathBuf),
    Url(Url),
}

impl MediaUri {
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, MediaValidationError> {
        let p = path.into();
        if p.as_os_str().is_empty() {
            return Err(MediaValidationError::EmptyMediaUri);
        }
        Ok(MediaUri::FilePath(p))
    }

    pub fn from_url(url: impl AsRef<str>) -> Result<Self, MediaValidationError> {
        let s = url.as_ref().trim();
        if s.is_empty() {
            return Err(MediaValidationError::EmptyMediaUri);
        }
        let u = Url::parse(s).map_err(|e| MediaValidationError::InvalidUrl(e.to_string()))?;
        Ok(MediaUri::Url(u))
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            MediaUri::FilePath(p) => Some(p.as_path()),
            MediaUri::Url(_) => None,
        }
    }
}

/// Media attached to a question prompt or explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "uri", rename_all = "snake_case")]
pub enum QuestionMedia {
    Image(MediaUri),
    Video(MediaUri),
}

impl QuestionMedia {
    #[must_use]
    pub fn uri(&self) -> &MediaUri {
        match self {
            QuestionMedia::Image(uri) | QuestionMedia::Video(uri) => uri,
        }
    }

    #[must_use]
    pub fn is_video(&self) -> bool {
        matches!(self, QuestionMedia::Video(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_url_is_rejected() {
        assert_eq!(
            MediaUri::from_url("   ").unwrap_err(),
            MediaValidationError::EmptyMediaUri
        );
    }

    #[test]
    fn malformed_url_is_rejected() {
        let err = MediaUri::from_url("not a url").unwrap_err();
        assert!(matches!(err, MediaValidationError::InvalidUrl(_)));
    }

    #[test]
    fn media_exposes_uri_by_kind() {
        let uri = MediaUri::from_url("https://cdn.example.com/heart.mp4").unwrap();
        let media = QuestionMedia::Video(uri.clone());
        assert!(media.is_video());
        assert_eq!(media.uri(), &uri);
        assert!(media.uri().as_path().is_none());
    }

    #[test]
    fn media_decodes_from_tagged_json() {
        let json = r#"{"kind":"image","uri":{"file_path":"img/lungs.png"}}"#;
        let media: QuestionMedia = serde_json::from_str(json).unwrap();
        assert_eq!(
            media,
            QuestionMedia::Image(MediaUri::from_file("img/lungs.png").unwrap())
        );
    }
}
