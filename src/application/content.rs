//! Content read service.
//!
//! Every read checks the TTL cache first and, on a miss, goes to the remote
//! store under a time budget. Reads never fail because of the store: when the
//! live path is slow or broken they answer from the static fallback dataset.
//! Mutations skip the fallback path entirely and clear the whole cache on
//! success.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::application::error::ContentError;
use crate::application::repos::{ContentQuery, ContentSource, SourceError};
use crate::cache::{
    CacheStats, ContentKey, FetchOutcome, RaceResolver, TtlCache, fetch_with_timeout,
};
use crate::domain::entities::{ContentItem, ContentPatch, NewContentItem};
use crate::domain::fallback::FallbackDataset;

const DEFAULT_FEATURED_DEADLINE_MS: u64 = 2_000;
const DEFAULT_LISTING_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_ITEM_TIMEOUT_MS: u64 = 4_000;
const DEFAULT_MUTATION_TIMEOUT_MS: u64 = 6_000;
const DEFAULT_FEATURED_COUNT: usize = 3;
const DEFAULT_ALL_LIMIT: usize = 20;
const DEFAULT_CATEGORY_LIMIT: usize = 12;

/// Per-resource time budgets and row caps.
#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// Race deadline for featured reads.
    pub featured_deadline: Duration,
    /// Bounded fetch for listings (all items, by category).
    pub listing_timeout: Duration,
    /// Bounded fetch for single-item reads.
    pub item_timeout: Duration,
    /// Bounded fetch for admin mutations.
    pub mutation_timeout: Duration,
    pub featured_count: usize,
    pub all_limit: usize,
    pub category_limit: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            featured_deadline: Duration::from_millis(DEFAULT_FEATURED_DEADLINE_MS),
            listing_timeout: Duration::from_millis(DEFAULT_LISTING_TIMEOUT_MS),
            item_timeout: Duration::from_millis(DEFAULT_ITEM_TIMEOUT_MS),
            mutation_timeout: Duration::from_millis(DEFAULT_MUTATION_TIMEOUT_MS),
            featured_count: DEFAULT_FEATURED_COUNT,
            all_limit: DEFAULT_ALL_LIMIT,
            category_limit: DEFAULT_CATEGORY_LIMIT,
        }
    }
}

impl From<&crate::config::Settings> for ContentConfig {
    fn from(settings: &crate::config::Settings) -> Self {
        Self {
            featured_deadline: settings.timeouts.featured_race,
            listing_timeout: settings.timeouts.listing,
            item_timeout: settings.timeouts.item,
            mutation_timeout: settings.timeouts.mutation,
            featured_count: settings.content.featured_count.get(),
            all_limit: settings.content.all_limit.get(),
            category_limit: settings.content.category_limit.get(),
        }
    }
}

/// What the TTL cache holds for a [`ContentKey`].
#[derive(Debug, Clone, PartialEq)]
pub enum CachedContent {
    List(Vec<ContentItem>),
    Item(ContentItem),
}

impl CachedContent {
    fn into_list(self) -> Vec<ContentItem> {
        match self {
            CachedContent::List(items) => items,
            CachedContent::Item(item) => vec![item],
        }
    }
}

pub type ContentCache = TtlCache<ContentKey, CachedContent>;

#[derive(Debug, Clone, Serialize)]
pub struct ContentStats {
    pub cache: CacheStats,
    pub fallback_version: String,
}

pub struct ContentService {
    source: Arc<dyn ContentSource>,
    cache: Arc<ContentCache>,
    featured_race: RaceResolver<ContentKey, CachedContent>,
    fallback: Arc<FallbackDataset>,
    config: ContentConfig,
}

impl ContentService {
    pub fn new(
        source: Arc<dyn ContentSource>,
        cache: Arc<ContentCache>,
        fallback: Arc<FallbackDataset>,
        config: ContentConfig,
    ) -> Self {
        let featured_race = RaceResolver::new(cache.clone(), config.featured_deadline);
        Self {
            source,
            cache,
            featured_race,
            fallback,
            config,
        }
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    pub fn stats(&self) -> ContentStats {
        ContentStats {
            cache: self.cache.stats(),
            fallback_version: self.fallback.version().to_string(),
        }
    }

    /// Exactly `count` items when enough exist across trending, recent and
    /// fallback content; trending items always come first.
    #[instrument(skip(self))]
    pub async fn featured(&self, count: usize) -> Vec<ContentItem> {
        if count == 0 {
            return Vec::new();
        }

        let key = ContentKey::Featured { count };
        let items = match self.cached_list(&key) {
            Some(items) => items,
            None => {
                let live = load_featured(self.source.clone(), count);
                let fallback = CachedContent::List(self.fallback.featured().to_vec());
                self.featured_race
                    .resolve(key, live, fallback)
                    .await
                    .into_inner()
                    .into_list()
            }
        };

        top_up(
            items,
            count,
            [self.fallback.featured(), self.fallback.items()],
        )
    }

    /// The most recent items, or the whole fallback list when the store cannot answer.
    #[instrument(skip(self))]
    pub async fn all(&self) -> Vec<ContentItem> {
        let limit = self.config.all_limit;
        let key = ContentKey::All { limit };
        if let Some(items) = self.cached_list(&key) {
            return items;
        }

        let outcome = fetch_with_timeout(
            self.config.listing_timeout,
            fill_list(
                self.source.clone(),
                self.cache.clone(),
                key,
                ContentQuery::recent(limit),
            ),
        )
        .await;

        match usable_list(outcome, "all") {
            Some(items) => items,
            None => self.fallback.items().to_vec(),
        }
    }

    /// Recent items of one category. Unknown categories resolve to an empty list.
    #[instrument(skip(self))]
    pub async fn by_category(&self, category_id: &str) -> Vec<ContentItem> {
        let limit = self.config.category_limit;
        let key = ContentKey::Category {
            id: category_id.to_string(),
            limit,
        };
        if let Some(items) = self.cached_list(&key) {
            return items;
        }

        let outcome = fetch_with_timeout(
            self.config.listing_timeout,
            fill_list(
                self.source.clone(),
                self.cache.clone(),
                key,
                ContentQuery::recent(limit).in_category(category_id),
            ),
        )
        .await;

        match usable_list(outcome, "by_category") {
            Some(items) => items,
            None => self.fallback.category(category_id).to_vec(),
        }
    }

    /// A single item from the store, the cache, or any fallback bucket.
    ///
    /// `ContentError::NotFound` is the only error this returns.
    #[instrument(skip(self))]
    pub async fn by_id(&self, id: Uuid) -> Result<ContentItem, ContentError> {
        let key = ContentKey::Item(id);
        if let Some(CachedContent::Item(item)) = self.cache.get(&key) {
            return Ok(item);
        }

        let outcome = fetch_with_timeout(
            self.config.item_timeout,
            fill_item(self.source.clone(), self.cache.clone(), id),
        )
        .await;

        match outcome {
            FetchOutcome::Ok(Some(item)) => return Ok(item),
            FetchOutcome::Ok(None) => debug!("item absent from remote store"),
            FetchOutcome::TimedOut => warn!(operation = "by_id", "remote read timed out"),
            FetchOutcome::Failed(err) => {
                warn!(operation = "by_id", error = %err, "remote read failed")
            }
            FetchOutcome::Aborted(reason) => {
                warn!(operation = "by_id", reason = %reason, "remote read aborted")
            }
        }

        self.fallback
            .find(id)
            .cloned()
            .ok_or(ContentError::NotFound { id })
    }

    #[instrument(skip_all, fields(title = %item.title))]
    pub async fn create(&self, item: NewContentItem) -> Result<ContentItem, ContentError> {
        item.validate()?;
        let source = self.source.clone();
        self.mutate("create", async move { source.insert(&item).await })
            .await
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: Uuid, patch: ContentPatch) -> Result<ContentItem, ContentError> {
        patch.validate()?;
        let source = self.source.clone();
        self.mutate("update", async move { source.update(id, &patch).await })
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ContentError> {
        let source = self.source.clone();
        self.mutate("delete", async move { source.delete(id).await })
            .await
    }

    /// Run a mutation under the mutation budget and drop every cached read
    /// once it succeeds, including when it succeeds after the budget.
    async fn mutate<T, F>(&self, operation: &'static str, op: F) -> Result<T, ContentError>
    where
        F: Future<Output = Result<T, SourceError>> + Send + 'static,
        T: Send + 'static,
    {
        let cache = self.cache.clone();
        let timeout = self.config.mutation_timeout;
        let outcome = fetch_with_timeout(timeout, async move {
            let value = op.await?;
            cache.clear();
            debug!(operation, "cache invalidated after mutation");
            Ok(value)
        })
        .await;

        match outcome {
            FetchOutcome::Ok(value) => Ok(value),
            FetchOutcome::TimedOut => Err(ContentError::Timeout {
                operation,
                after: timeout,
            }),
            FetchOutcome::Failed(err) => Err(ContentError::Remote(err)),
            FetchOutcome::Aborted(reason) => {
                Err(ContentError::Remote(SourceError::transport(reason)))
            }
        }
    }

    fn cached_list(&self, key: &ContentKey) -> Option<Vec<ContentItem>> {
        let items = self.cache.get(key).map(CachedContent::into_list);
        if items.is_some() {
            debug!(cache = "ttl", outcome = "hit", key = %key, "serving cached content");
        }
        items
    }
}

/// Trending items first, topped up with recent ones when there are too few.
async fn load_featured(
    source: Arc<dyn ContentSource>,
    count: usize,
) -> Result<CachedContent, SourceError> {
    let mut items = source
        .select(&ContentQuery::recent(count).trending())
        .await?;

    if items.len() < count {
        match source.select(&ContentQuery::recent(count)).await {
            Ok(recent) => items = top_up(items, count, [recent.as_slice()]),
            Err(err) => warn!(error = %err, "recent top-up failed; keeping trending items"),
        }
    }

    items.truncate(count);
    Ok(CachedContent::List(items))
}

async fn fill_list(
    source: Arc<dyn ContentSource>,
    cache: Arc<ContentCache>,
    key: ContentKey,
    query: ContentQuery,
) -> Result<Vec<ContentItem>, SourceError> {
    let items = source.select(&query).await?;
    if !items.is_empty() {
        cache.set(key, CachedContent::List(items.clone()));
    }
    Ok(items)
}

async fn fill_item(
    source: Arc<dyn ContentSource>,
    cache: Arc<ContentCache>,
    id: Uuid,
) -> Result<Option<ContentItem>, SourceError> {
    let item = source
        .select(&ContentQuery::by_id(id))
        .await?
        .into_iter()
        .find(|item| item.id == id);
    if let Some(item) = &item {
        cache.set(ContentKey::Item(id), CachedContent::Item(item.clone()));
    }
    Ok(item)
}

fn usable_list(
    outcome: FetchOutcome<Vec<ContentItem>, SourceError>,
    operation: &'static str,
) -> Option<Vec<ContentItem>> {
    match outcome {
        FetchOutcome::Ok(items) if !items.is_empty() => Some(items),
        FetchOutcome::Ok(_) => {
            debug!(operation, "remote store returned no rows; using fallback");
            None
        }
        FetchOutcome::TimedOut => {
            warn!(operation, "remote read timed out; using fallback");
            None
        }
        FetchOutcome::Failed(err) => {
            warn!(operation, error = %err, "remote read failed; using fallback");
            None
        }
        FetchOutcome::Aborted(reason) => {
            warn!(operation, reason = %reason, "remote read aborted; using fallback");
            None
        }
    }
}

/// Append items from `extras`, in order, until `count` distinct ids are present.
fn top_up<const N: usize>(
    items: Vec<ContentItem>,
    count: usize,
    extras: [&[ContentItem]; N],
) -> Vec<ContentItem> {
    let mut seen = HashSet::with_capacity(count);
    let mut result = Vec::with_capacity(count);
    let candidates = items
        .into_iter()
        .chain(extras.into_iter().flatten().cloned());
    for item in candidates {
        if result.len() == count {
            break;
        }
        if seen.insert(item.id) {
            result.push(item);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn item(n: u128) -> ContentItem {
        ContentItem {
            id: Uuid::from_u128(n),
            title: format!("Item {n}"),
            summary: String::new(),
            category_id: None,
            trending: false,
            image_url: None,
            created_at: datetime!(2026-01-01 00:00 UTC),
        }
    }

    #[test]
    fn top_up_keeps_primary_order_and_skips_duplicates() {
        let primary = vec![item(1), item(2)];
        let extra = vec![item(2), item(3), item(4)];

        let ids: Vec<_> = top_up(primary, 3, [extra.as_slice()])
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(
            ids,
            vec![Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)]
        );
    }

    #[test]
    fn top_up_truncates_long_primary() {
        let primary = vec![item(1), item(2), item(3), item(4)];
        let none: &[ContentItem] = &[];
        assert_eq!(top_up(primary, 2, [none]).len(), 2);
    }

    #[test]
    fn top_up_returns_what_exists_when_short() {
        let primary = vec![item(1)];
        let extra = vec![item(1)];
        assert_eq!(top_up(primary, 3, [extra.as_slice()]).len(), 1);
    }

    #[test]
    fn default_budgets() {
        let config = ContentConfig::default();
        assert_eq!(config.featured_deadline, Duration::from_secs(2));
        assert_eq!(config.listing_timeout, Duration::from_secs(3));
        assert_eq!(config.item_timeout, Duration::from_secs(4));
        assert_eq!(config.mutation_timeout, Duration::from_secs(6));
        assert_eq!(config.all_limit, 20);
        assert_eq!(config.category_limit, 12);
    }
}
