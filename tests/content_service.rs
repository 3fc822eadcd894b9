//! Content service behaviour against a scripted remote store.

mod support;

use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use support::{FakeSource, live_item, service};
use vellum::application::error::ContentError;
use vellum::domain::entities::{ContentPatch, NewContentItem};

fn fallback_featured_ids() -> Vec<Uuid> {
    support::fallback().featured().iter().map(|item| item.id).collect()
}

fn ids(items: &[vellum::domain::entities::ContentItem]) -> Vec<Uuid> {
    items.iter().map(|item| item.id).collect()
}

#[tokio::test(start_paused = true)]
async fn featured_puts_trending_first_then_recent() {
    let trending = live_item("Trending", "guides", true, 1);
    let newest = live_item("Newest", "guides", false, 5);
    let newer = live_item("Newer", "reviews", false, 4);
    let older = live_item("Older", "reviews", false, 3);
    let source = FakeSource::with_items(vec![
        older.clone(),
        trending.clone(),
        newer.clone(),
        newest.clone(),
    ]);
    let (service, _) = service(source);

    let featured = service.featured(3).await;
    assert_eq!(ids(&featured), vec![trending.id, newest.id, newer.id]);
}

#[tokio::test(start_paused = true)]
async fn featured_is_topped_up_from_fallback_when_store_is_empty() {
    let source = FakeSource::with_items(Vec::new());
    let (service, _) = service(source);

    let featured = service.featured(3).await;
    assert_eq!(featured.len(), 3);
    assert_eq!(ids(&featured), fallback_featured_ids());
}

#[tokio::test(start_paused = true)]
async fn featured_never_repeats_an_item() {
    let shared = support::fallback().featured()[0].clone();
    let source = FakeSource::with_items(vec![shared.clone()]);
    let (service, _) = service(source);

    let featured = service.featured(5).await;
    assert_eq!(featured.len(), 5);
    let mut unique = ids(&featured);
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 5);
    assert_eq!(featured[0].id, shared.id);
}

#[tokio::test(start_paused = true)]
async fn slow_featured_returns_fallback_then_reconciles_cache() {
    let live: Vec<_> = (0..3)
        .map(|day| live_item("Live", "guides", true, day))
        .collect();
    let source = FakeSource::with_items(live.clone());
    source.set_delay(Duration::from_secs(5));
    let (service, _) = service(source.clone());

    let started = Instant::now();
    let first = service.featured(3).await;
    assert_eq!(started.elapsed(), Duration::from_secs(2));
    assert_eq!(ids(&first), fallback_featured_ids());

    tokio::time::sleep(Duration::from_secs(4)).await;

    let second = service.featured(3).await;
    let mut expected = ids(&live);
    expected.reverse();
    assert_eq!(ids(&second), expected);
    assert_eq!(source.selects(), 1);
}

#[tokio::test(start_paused = true)]
async fn failing_featured_falls_back_without_waiting() {
    let source = FakeSource::with_items(Vec::new());
    source.set_failing(true);
    let (service, _) = service(source);

    let started = Instant::now();
    let featured = service.featured(3).await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(ids(&featured), fallback_featured_ids());
}

#[tokio::test(start_paused = true)]
async fn listing_times_out_to_fallback() {
    let source = FakeSource::with_items(vec![live_item("Live", "guides", false, 1)]);
    source.set_delay(Duration::from_secs(10));
    let (service, _) = service(source);

    let started = Instant::now();
    let items = service.all().await;
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(items.len(), support::fallback().items().len());
}

#[tokio::test(start_paused = true)]
async fn late_listing_still_fills_the_cache() {
    let live = live_item("Live", "guides", false, 1);
    let source = FakeSource::with_items(vec![live.clone()]);
    source.set_delay(Duration::from_secs(5));
    let (service, _) = service(source.clone());

    let first = service.all().await;
    assert_ne!(ids(&first), vec![live.id]);

    tokio::time::sleep(Duration::from_secs(3)).await;
    let second = service.all().await;
    assert_eq!(ids(&second), vec![live.id]);
    assert_eq!(source.selects(), 1);
}

#[tokio::test(start_paused = true)]
async fn listings_are_cached_for_the_ttl() {
    let source = FakeSource::with_items(vec![live_item("Live", "guides", false, 1)]);
    let (service, _) = service(source.clone());

    service.all().await;
    service.all().await;
    assert_eq!(source.selects(), 1);

    tokio::time::sleep(Duration::from_secs(301)).await;
    service.all().await;
    assert_eq!(source.selects(), 2);
}

#[tokio::test(start_paused = true)]
async fn unknown_category_is_empty() {
    let source = FakeSource::with_items(vec![live_item("Live", "guides", false, 1)]);
    let (service, _) = service(source);

    assert!(service.by_category("does-not-exist").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn category_falls_back_when_store_fails() {
    let source = FakeSource::with_items(Vec::new());
    source.set_failing(true);
    let (service, _) = service(source);

    let items = service.by_category("guides").await;
    assert_eq!(items.len(), 2);
    assert!(
        items
            .iter()
            .all(|item| item.category_id.as_deref() == Some("guides"))
    );
}

#[tokio::test(start_paused = true)]
async fn by_id_prefers_live_then_fallback() {
    let live = live_item("Live", "guides", false, 1);
    let source = FakeSource::with_items(vec![live.clone()]);
    let (service, _) = service(source);

    assert_eq!(service.by_id(live.id).await.unwrap(), live);

    let bundled = support::fallback().items()[4].clone();
    assert_eq!(service.by_id(bundled.id).await.unwrap(), bundled);

    let missing = Uuid::new_v4();
    let err = service.by_id(missing).await.unwrap_err();
    assert!(matches!(err, ContentError::NotFound { id } if id == missing));
}

#[tokio::test(start_paused = true)]
async fn by_id_uses_fallback_when_store_is_down() {
    let source = FakeSource::with_items(Vec::new());
    source.set_failing(true);
    let (service, _) = service(source);

    let bundled = support::fallback().featured()[0].clone();
    assert_eq!(service.by_id(bundled.id).await.unwrap(), bundled);
}

#[tokio::test(start_paused = true)]
async fn by_id_is_served_from_cache_after_first_read() {
    let live = live_item("Live", "guides", false, 1);
    let source = FakeSource::with_items(vec![live.clone()]);
    let (service, _) = service(source.clone());

    assert_eq!(service.by_id(live.id).await.unwrap(), live);
    source.set_failing(true);
    assert_eq!(service.by_id(live.id).await.unwrap(), live);
    assert_eq!(source.selects(), 1);
}

#[tokio::test(start_paused = true)]
async fn panicking_store_falls_back_on_every_read() {
    let source = FakeSource::with_items(Vec::new());
    source.set_panicking(true);
    let (service, _) = service(source);

    assert_eq!(service.all().await.len(), support::fallback().items().len());
    assert_eq!(service.by_category("guides").await.len(), 2);
    assert_eq!(ids(&service.featured(3).await), fallback_featured_ids());

    let bundled = support::fallback().items()[4].clone();
    assert_eq!(service.by_id(bundled.id).await.unwrap(), bundled);
}

#[tokio::test(start_paused = true)]
async fn panicking_store_fails_mutations_without_panicking() {
    let source = FakeSource::with_items(Vec::new());
    source.set_panicking(true);
    let (service, _) = service(source);

    let err = service.delete(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ContentError::Remote(_)));
}

#[tokio::test(start_paused = true)]
async fn successful_mutation_invalidates_cached_reads() {
    let source = FakeSource::with_items(vec![live_item("Live", "guides", false, 1)]);
    let (service, cache) = service(source.clone());

    assert_eq!(service.all().await.len(), 1);
    assert!(!cache.is_empty());

    let created = service
        .create(NewContentItem {
            title: "Fresh".to_string(),
            summary: String::new(),
            category_id: Some("guides".to_string()),
            trending: false,
            image_url: None,
        })
        .await
        .unwrap();
    assert!(cache.is_empty());

    let items = service.all().await;
    assert!(items.iter().any(|item| item.id == created.id));
    assert_eq!(source.selects(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_mutation_times_out_and_invalidates_later() {
    let live = live_item("Live", "guides", false, 1);
    let source = FakeSource::with_items(vec![live.clone()]);
    let (service, cache) = service(source.clone());
    service.all().await;
    assert!(!cache.is_empty());

    source.set_delay(Duration::from_secs(10));
    let started = Instant::now();
    let patch = ContentPatch {
        title: Some("Renamed".to_string()),
        ..Default::default()
    };
    let err = service.update(live.id, patch).await.unwrap_err();
    assert!(matches!(err, ContentError::Timeout { operation: "update", .. }));
    assert_eq!(started.elapsed(), Duration::from_secs(6));
    assert!(!cache.is_empty());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_mutation_keeps_cache() {
    let live = live_item("Live", "guides", false, 1);
    let source = FakeSource::with_items(vec![live.clone()]);
    let (service, cache) = service(source.clone());
    service.all().await;

    source.set_failing(true);
    let err = service.delete(live.id).await.unwrap_err();
    assert!(matches!(err, ContentError::Remote(_)));
    assert!(!cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn invalid_input_never_reaches_the_store() {
    let source = FakeSource::with_items(Vec::new());
    let (service, _) = service(source.clone());

    let err = service
        .create(NewContentItem {
            title: "   ".to_string(),
            summary: String::new(),
            category_id: None,
            trending: false,
            image_url: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ContentError::Invalid(_)));

    let err = service
        .update(Uuid::new_v4(), ContentPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ContentError::Invalid(_)));
    assert_eq!(source.writes(), 0);
}
