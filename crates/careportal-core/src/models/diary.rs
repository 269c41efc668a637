//! Health diary models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum diary title length in characters.
pub const DIARY_TITLE_MAX_LEN: usize = 60;

/// A diary entry stored remotely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiaryEntry {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Image attached to a diary entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// File extension, falling back to `jpg`.
    pub fn extension(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext,
            _ => "jpg",
        }
    }
}

/// Diary form submission (create or edit).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiaryDraft {
    pub title: String,
    pub content: String,
    pub image: Option<ImageUpload>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiaryValidationError {
    #[error("Title is required")]
    MissingTitle,

    #[error("Title must be at most 60 characters (got {0})")]
    TitleTooLong(usize),
}

impl DiaryDraft {
    pub fn validate(&self) -> Result<(), DiaryValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DiaryValidationError::MissingTitle);
        }
        let len = title.chars().count();
        if len > DIARY_TITLE_MAX_LEN {
            return Err(DiaryValidationError::TitleTooLong(len));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension() {
        let image = ImageUpload {
            file_name: "rash.png".into(),
            content_type: "image/png".into(),
            bytes: vec![],
        };
        assert_eq!(image.extension(), "png");

        let image = ImageUpload {
            file_name: "photo".into(),
            ..image
        };
        assert_eq!(image.extension(), "jpg");
    }

    #[test]
    fn test_validate_title() {
        let mut draft = DiaryDraft {
            title: "   ".into(),
            ..Default::default()
        };
        assert_eq!(draft.validate(), Err(DiaryValidationError::MissingTitle));

        draft.title = "x".repeat(61);
        assert_eq!(draft.validate(), Err(DiaryValidationError::TitleTooLong(61)));

        draft.title = "Morning Check-in".into();
        assert!(draft.validate().is_ok());
    }
}
