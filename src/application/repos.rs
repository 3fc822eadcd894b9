//! Remote data source abstraction.
//!
//! The content service only needs "select rows ordered by recency, optionally
//! filtered by equality and limited" plus insert/update/delete by identity.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{ContentItem, ContentPatch, NewContentItem};

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("remote request failed: {0}")]
    Transport(String),
    #[error("remote store responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode remote payload: {0}")]
    Decode(String),
    #[error("resource not found")]
    NotFound,
}

impl SourceError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Equality filters and a row cap. Results are always newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentQuery {
    pub id: Option<Uuid>,
    pub category_id: Option<String>,
    pub trending: Option<bool>,
    pub limit: Option<usize>,
}

impl ContentQuery {
    pub fn recent(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            limit: Some(1),
            ..Default::default()
        }
    }

    pub fn trending(mut self) -> Self {
        self.trending = Some(true);
        self
    }

    pub fn in_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    /// Whether `item` satisfies every equality filter of this query.
    pub fn matches(&self, item: &ContentItem) -> bool {
        self.id.is_none_or(|id| item.id == id)
            && self
                .category_id
                .as_deref()
                .is_none_or(|category| item.category_id.as_deref() == Some(category))
            && self.trending.is_none_or(|trending| item.trending == trending)
    }
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn select(&self, query: &ContentQuery) -> Result<Vec<ContentItem>, SourceError>;

    async fn insert(&self, item: &NewContentItem) -> Result<ContentItem, SourceError>;

    async fn update(&self, id: Uuid, patch: &ContentPatch) -> Result<ContentItem, SourceError>;

    async fn delete(&self, id: Uuid) -> Result<(), SourceError>;
}
