//! Deadline race between a live fetch and a static fallback.
//!
//! A read goes `MISS -> FETCHING -> RESOLVED_LIVE | RESOLVED_FALLBACK`. When the
//! fallback wins, the rest of the live fetch moves to a detached task and, if
//! it later produces a different value, overwrites the cache entry
//! (`RECONCILED`). The original caller never observes that last step.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use metrics::counter;
use tracing::{Instrument, debug, info_span, instrument, warn};

use super::store::TtlCache;

const METRIC_RACE_RESOLVED: &str = "vellum_race_resolved_total";
const METRIC_RACE_RECONCILED: &str = "vellum_race_reconciled_total";

/// Which side of the race produced the returned value.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Live(T),
    Fallback(T),
}

impl<T> Resolution<T> {
    pub fn is_live(&self) -> bool {
        matches!(self, Resolution::Live(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Resolution::Live(value) | Resolution::Fallback(value) => value,
        }
    }
}

/// Races live fetches against fallback values under a fixed deadline.
pub struct RaceResolver<K, V> {
    cache: Arc<TtlCache<K, V>>,
    deadline: Duration,
}

impl<K, V> RaceResolver<K, V>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(cache: Arc<TtlCache<K, V>>, deadline: Duration) -> Self {
        Self { cache, deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Resolve to the live value if it arrives before the deadline, otherwise
    /// to `fallback`. Never fails.
    ///
    /// A live value that wins is written to the cache under `key`. A live
    /// failure before the deadline resolves to the fallback immediately.
    #[instrument(skip_all, fields(key = %key, deadline_ms = self.deadline.as_millis() as u64))]
    pub async fn resolve<F, E>(&self, key: K, live: F, fallback: V) -> Resolution<V>
    where
        F: Future<Output = Result<V, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        // Polled in place so that a result ready on the deadline tick is seen.
        let mut live = Box::pin(AssertUnwindSafe(live).catch_unwind().map(live_value::<V, E>));
        let deadline = tokio::time::sleep(self.deadline);
        tokio::pin!(deadline);

        tokio::select! {
            biased;
            result = &mut live => self.settle(key, result, fallback),
            _ = &mut deadline => match live.as_mut().now_or_never() {
                Some(result) => self.settle(key, result, fallback),
                None => {
                    self.reconcile_later(key, live, fallback.clone());
                    record(RaceSide::Fallback);
                    debug!(state = "resolved_fallback", reason = "deadline", "race resolved");
                    Resolution::Fallback(fallback)
                }
            },
        }
    }

    fn settle(&self, key: K, result: Result<V, String>, fallback: V) -> Resolution<V> {
        match result {
            Ok(value) => {
                self.cache.set(key, value.clone());
                record(RaceSide::Live);
                debug!(state = "resolved_live", "race resolved");
                Resolution::Live(value)
            }
            Err(reason) => {
                warn!(state = "resolved_fallback", reason = %reason, "live fetch failed before deadline");
                record(RaceSide::Fallback);
                Resolution::Fallback(fallback)
            }
        }
    }

    fn reconcile_later<L>(&self, key: K, live: L, returned: V)
    where
        L: Future<Output = Result<V, String>> + Send + 'static,
    {
        let cache = self.cache.clone();
        let span = info_span!("race_reconcile", key = %key);
        tokio::spawn(
            async move {
                match live.await {
                    Ok(value) if value != returned => {
                        cache.set(key, value);
                        counter!(METRIC_RACE_RECONCILED).increment(1);
                        debug!(state = "reconciled", "late live value written to cache");
                    }
                    Ok(_) => debug!("late live value matched the fallback"),
                    Err(reason) => debug!(reason = %reason, "late live fetch discarded"),
                }
            }
            .instrument(span),
        );
    }
}

enum RaceSide {
    Live,
    Fallback,
}

fn record(side: RaceSide) {
    let outcome = match side {
        RaceSide::Live => "live",
        RaceSide::Fallback => "fallback",
    };
    counter!(METRIC_RACE_RESOLVED, "outcome" => outcome).increment(1);
}

fn live_value<V, E: fmt::Display>(
    caught: Result<Result<V, E>, Box<dyn Any + Send>>,
) -> Result<V, String> {
    match caught {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_string()),
        Err(_) => Err("live fetch panicked".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{Instant, sleep};

    use super::super::config::CacheConfig;
    use super::*;

    fn resolver(deadline_ms: u64) -> (RaceResolver<String, u32>, Arc<TtlCache<String, u32>>) {
        let cache = Arc::new(TtlCache::new(CacheConfig::default()));
        let resolver = RaceResolver::new(cache.clone(), Duration::from_millis(deadline_ms));
        (resolver, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn live_value_before_deadline_wins() {
        let (resolver, cache) = resolver(2_000);

        let resolution = resolver
            .resolve(
                "k".to_string(),
                async {
                    sleep(Duration::from_millis(1_999)).await;
                    Ok::<_, String>(7)
                },
                0,
            )
            .await;

        assert_eq!(resolution, Resolution::Live(7));
        assert_eq!(cache.get(&"k".to_string()), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn live_value_ready_on_the_deadline_tick_wins() {
        let (resolver, cache) = resolver(2_000);

        let resolution = resolver
            .resolve(
                "k".to_string(),
                async {
                    sleep(Duration::from_millis(2_000)).await;
                    Ok::<_, String>(7)
                },
                0,
            )
            .await;

        assert_eq!(resolution, Resolution::Live(7));
        assert_eq!(cache.get(&"k".to_string()), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_live_fetch_resolves_to_fallback() {
        let (resolver, cache) = resolver(2_000);

        let resolution = resolver
            .resolve("k".to_string(), exploding_fetch(), 1)
            .await;

        assert_eq!(resolution, Resolution::Fallback(1));
        assert!(cache.is_empty());
    }

    async fn exploding_fetch() -> Result<u32, String> {
        panic!("decoder blew up")
    }

    #[tokio::test(start_paused = true)]
    async fn slow_live_value_reconciles_after_fallback() {
        let (resolver, cache) = resolver(2_000);

        let resolution = resolver
            .resolve(
                "k".to_string(),
                async {
                    sleep(Duration::from_secs(5)).await;
                    Ok::<_, String>(7)
                },
                1,
            )
            .await;

        assert_eq!(resolution, Resolution::Fallback(1));
        assert_eq!(cache.get(&"k".to_string()), None);

        sleep(Duration::from_secs(4)).await;
        assert_eq!(cache.get(&"k".to_string()), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_live_fetch_does_not_wait_for_deadline() {
        let (resolver, cache) = resolver(2_000);
        let started = Instant::now();

        let resolution = resolver
            .resolve(
                "k".to_string(),
                async { Err::<u32, _>("remote unavailable".to_string()) },
                1,
            )
            .await;

        assert_eq!(resolution, Resolution::Fallback(1));
        assert!(started.elapsed() < Duration::from_millis(2_000));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn late_value_equal_to_fallback_is_not_cached() {
        let (resolver, cache) = resolver(100);

        let resolution = resolver
            .resolve(
                "k".to_string(),
                async {
                    sleep(Duration::from_millis(500)).await;
                    Ok::<_, String>(1)
                },
                1,
            )
            .await;
        assert!(!resolution.is_live());

        sleep(Duration::from_secs(1)).await;
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn late_failure_is_swallowed() {
        let (resolver, cache) = resolver(100);

        let resolution = resolver
            .resolve(
                "k".to_string(),
                async {
                    sleep(Duration::from_millis(500)).await;
                    Err::<u32, _>("late failure".to_string())
                },
                3,
            )
            .await;
        assert_eq!(resolution.into_inner(), 3);

        sleep(Duration::from_secs(1)).await;
        assert!(cache.is_empty());
    }
}
