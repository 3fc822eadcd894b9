//! Content entities as exchanged with the remote store.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::error::DomainError;

/// A published content item.
///
/// Identity is the `id`; two items with the same id are the same resource even
/// when they come from different sources (live store, cache, fallback dataset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub trending: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Payload for creating a content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContentItem {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub trending: bool,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewContentItem {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("title must not be empty"));
        }
        validate_category(self.category_id.as_deref())
    }
}

/// Partial update for an existing content item. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ContentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.summary.is_none()
            && self.category_id.is_none()
            && self.trending.is_none()
            && self.image_url.is_none()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.is_empty() {
            return Err(DomainError::validation("patch contains no changes"));
        }
        if self
            .title
            .as_deref()
            .is_some_and(|title| title.trim().is_empty())
        {
            return Err(DomainError::validation("title must not be empty"));
        }
        validate_category(self.category_id.as_deref())
    }
}

fn validate_category(category: Option<&str>) -> Result<(), DomainError> {
    match category {
        Some(value) if value.trim().is_empty() => {
            Err(DomainError::validation("category_id must not be blank"))
        }
        _ => Ok(()),
    }
}
