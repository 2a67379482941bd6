use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const POSTS_PER_PAGE: i64 = 10;
pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 60;
pub const DESCRIPTION_MIN: usize = 3;
pub const DESCRIPTION_MAX: usize = 600;

/// Request body for creating a post.
#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub description: String,
}

/// Request body for updating a post; both fields are replaced.
#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: String,
    pub description: String,
}

/// `postId` query parameter, kept as a string so a malformed id gets the
/// not-found treatment instead of a bare extractor rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostIdQuery {
    pub post_id: Option<String>,
}

/// `page` query parameter, kept as a string so junk input falls back to the
/// first page instead of a bare extractor rejection.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: Option<String>,
}

impl Pagination {
    /// Pages are 1-based; zero, negative, missing and non-numeric values all
    /// land on the first page. Oversized pages clamp the offset.
    pub fn offset(&self) -> i64 {
        match self.page.as_deref().and_then(|p| p.parse::<i64>().ok()) {
            Some(p) if p > 0 => p.saturating_sub(1).saturating_mul(POSTS_PER_PAGE),
            _ => 0,
        }
    }
}

/// Envelope for post payloads.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub message: &'static str,
    pub data: T,
}

pub fn validate_post(title: &str, description: &str) -> Result<(), ValidationError> {
    if title.len() < TITLE_MIN {
        return Err(ValidationError::TitleTooShort);
    }
    if title.len() > TITLE_MAX {
        return Err(ValidationError::TitleTooLong);
    }
    if description.len() < DESCRIPTION_MIN {
        return Err(ValidationError::DescriptionTooShort);
    }
    if description.len() > DESCRIPTION_MAX {
        return Err(ValidationError::DescriptionTooLong);
    }
    Ok(())
}
