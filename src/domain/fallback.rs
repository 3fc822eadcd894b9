//! Static fallback content.
//!
//! The dataset is loaded once at startup and never mutated. It is served only
//! when the live path has not produced a usable result in time.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use uuid::Uuid;

use crate::domain::entities::ContentItem;
use crate::domain::error::DomainError;

const EMBEDDED_DATASET: &str = include_str!("../../fallback/content.toml");

#[derive(Debug, Deserialize)]
struct RawDataset {
    version: String,
    #[serde(default)]
    featured: Vec<ContentItem>,
    #[serde(default)]
    items: Vec<ContentItem>,
    #[serde(default)]
    categories: BTreeMap<String, Vec<ContentItem>>,
}

/// Read-only, versioned fallback collections.
#[derive(Debug, Clone)]
pub struct FallbackDataset {
    version: String,
    featured: Vec<ContentItem>,
    items: Vec<ContentItem>,
    categories: BTreeMap<String, Vec<ContentItem>>,
    by_id: HashMap<Uuid, ContentItem>,
}

impl FallbackDataset {
    /// Parse a dataset from its TOML representation.
    pub fn from_toml(source: &str) -> Result<Self, DomainError> {
        let raw: RawDataset = toml::from_str(source)
            .map_err(|err| DomainError::invariant(format!("invalid fallback dataset: {err}")))?;

        if raw.version.trim().is_empty() {
            return Err(DomainError::invariant("fallback dataset version is empty"));
        }

        let mut by_id: HashMap<Uuid, ContentItem> = HashMap::new();
        let buckets = raw
            .featured
            .iter()
            .chain(raw.items.iter())
            .chain(raw.categories.values().flatten());
        for item in buckets {
            match by_id.get(&item.id) {
                Some(existing) if existing != item => {
                    return Err(DomainError::invariant(format!(
                        "fallback item `{}` appears with conflicting contents",
                        item.id
                    )));
                }
                Some(_) => {}
                None => {
                    by_id.insert(item.id, item.clone());
                }
            }
        }

        Ok(Self {
            version: raw.version,
            featured: raw.featured,
            items: raw.items,
            categories: raw.categories,
            by_id,
        })
    }

    /// The dataset compiled into the binary.
    pub fn embedded() -> Result<Self, DomainError> {
        Self::from_toml(EMBEDDED_DATASET)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn featured(&self) -> &[ContentItem] {
        &self.featured
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    /// Items of one category. Unknown categories yield an empty slice.
    pub fn category(&self, category_id: &str) -> &[ContentItem] {
        self.categories
            .get(category_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn category_ids(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Look up an item across every bucket of the dataset.
    pub fn find(&self, id: Uuid) -> Option<&ContentItem> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
