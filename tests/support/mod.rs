//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use time::macros::datetime;
use uuid::Uuid;

use vellum::application::content::{ContentCache, ContentConfig, ContentService};
use vellum::application::repos::{ContentQuery, ContentSource, SourceError};
use vellum::cache::CacheConfig;
use vellum::domain::entities::{ContentItem, ContentPatch, NewContentItem};
use vellum::domain::fallback::FallbackDataset;

/// In-memory remote store with adjustable latency and failure.
#[derive(Default)]
pub struct FakeSource {
    items: Mutex<Vec<ContentItem>>,
    delay: Mutex<Duration>,
    failing: AtomicBool,
    panicking: AtomicBool,
    selects: AtomicUsize,
    writes: AtomicUsize,
}

impl FakeSource {
    pub fn with_items(items: Vec<ContentItem>) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(items),
            ..Default::default()
        })
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every call panic, as a buggy driver would.
    pub fn set_panicking(&self, panicking: bool) {
        self.panicking.store(panicking, Ordering::SeqCst);
    }

    pub fn selects(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn push(&self, item: ContentItem) {
        self.items.lock().unwrap().push(item);
    }

    async fn latency(&self) -> Result<(), SourceError> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.panicking.load(Ordering::SeqCst) {
            panic!("row decoder blew up");
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::transport("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn select(&self, query: &ContentQuery) -> Result<Vec<ContentItem>, SourceError> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        self.latency().await?;

        let mut rows: Vec<ContentItem> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| query.matches(item))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, item: &NewContentItem) -> Result<ContentItem, SourceError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.latency().await?;

        let created = ContentItem {
            id: Uuid::new_v4(),
            title: item.title.clone(),
            summary: item.summary.clone(),
            category_id: item.category_id.clone(),
            trending: item.trending,
            image_url: item.image_url.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.items.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, patch: &ContentPatch) -> Result<ContentItem, SourceError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.latency().await?;

        let mut items = self.items.lock().unwrap();
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(SourceError::NotFound)?;
        if let Some(title) = &patch.title {
            item.title = title.clone();
        }
        if let Some(summary) = &patch.summary {
            item.summary = summary.clone();
        }
        if let Some(category) = &patch.category_id {
            item.category_id = Some(category.clone());
        }
        if let Some(trending) = patch.trending {
            item.trending = trending;
        }
        if let Some(image) = &patch.image_url {
            item.image_url = Some(image.clone());
        }
        Ok(item.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), SourceError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.latency().await?;

        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Err(SourceError::NotFound);
        }
        Ok(())
    }
}

/// A live item `days` days after the base date; later days are more recent.
pub fn live_item(title: &str, category: &str, trending: bool, days: i64) -> ContentItem {
    ContentItem {
        id: Uuid::new_v4(),
        title: title.to_string(),
        summary: String::new(),
        category_id: Some(category.to_string()),
        trending,
        image_url: None,
        created_at: datetime!(2026-10-01 00:00 UTC) + time::Duration::days(days),
    }
}

pub fn fallback() -> Arc<FallbackDataset> {
    Arc::new(FallbackDataset::embedded().unwrap())
}

pub fn service(source: Arc<FakeSource>) -> (ContentService, Arc<ContentCache>) {
    let cache = Arc::new(ContentCache::new(CacheConfig::default()));
    let service = ContentService::new(
        source,
        cache.clone(),
        fallback(),
        ContentConfig::default(),
    );
    (service, cache)
}
