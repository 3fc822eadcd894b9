//! Strategy-driven cache in front of a [`Transport`].

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::offline::offline_response;
use super::partition::PartitionError;
use super::registry::CacheRegistry;
use super::request::{NetworkError, OutboundRequest, ResponseSnapshot, Transport};
use super::strategy::{Strategy, StrategyRules, should_intercept};

const METRIC_SERVED: &str = "vellum_network_served_total";
const METRIC_WRITE_FAILED: &str = "vellum_network_cache_write_failed_total";
const METRIC_REVALIDATED: &str = "vellum_network_revalidated_total";

/// Outcome of a bulk populate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PopulateReport {
    pub stored: usize,
    pub failed: usize,
}

/// A [`Transport`] that answers GETs from versioned partitions according to
/// the strategy rules, and passes everything else straight through.
#[derive(Clone)]
pub struct CachingTransport {
    inner: Arc<dyn Transport>,
    registry: Arc<CacheRegistry>,
    rules: Arc<StrategyRules>,
}

impl CachingTransport {
    pub fn new(
        inner: Arc<dyn Transport>,
        registry: Arc<CacheRegistry>,
        rules: StrategyRules,
    ) -> Self {
        Self {
            inner,
            registry,
            rules: Arc::new(rules),
        }
    }

    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn handle(&self, request: OutboundRequest) -> Result<ResponseSnapshot, NetworkError> {
        if !should_intercept(&request) {
            return self.inner.send(request).await;
        }

        let strategy = self.rules.classify(&request.url);
        let kind = self.registry.kind_for(&request.url);
        let partition = self.registry.partition_name(kind);

        let outcome = match strategy {
            Strategy::NetworkOnly => self.network_only(&request).await,
            Strategy::NetworkFirst => self.network_first(&partition, &request).await,
            Strategy::CacheFirst => self.cache_first(&partition, &request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(&partition, &request).await,
        };

        match outcome {
            Ok((response, source)) => {
                counter!(METRIC_SERVED, "strategy" => strategy.as_str(), "source" => source)
                    .increment(1);
                debug!(strategy = strategy.as_str(), source, status = response.status, "served");
                Ok(response)
            }
            Err(err) => {
                counter!(METRIC_SERVED, "strategy" => strategy.as_str(), "source" => "offline")
                    .increment(1);
                warn!(strategy = strategy.as_str(), error = %err, "serving offline fallback");
                Ok(offline_response(&request, kind))
            }
        }
    }

    async fn network_only(
        &self,
        request: &OutboundRequest,
    ) -> Result<(ResponseSnapshot, &'static str), NetworkError> {
        let response = self.inner.send(request.clone()).await?;
        Ok((response, "network"))
    }

    async fn network_first(
        &self,
        partition: &str,
        request: &OutboundRequest,
    ) -> Result<(ResponseSnapshot, &'static str), NetworkError> {
        match self.inner.send(request.clone()).await {
            Ok(response) => {
                self.store_copy(partition, request.cache_key(), &response)
                    .await;
                Ok((response, "network"))
            }
            Err(err) => match self.lookup(partition, request.cache_key()).await {
                Some(cached) => Ok((cached, "cache")),
                None => Err(err),
            },
        }
    }

    async fn cache_first(
        &self,
        partition: &str,
        request: &OutboundRequest,
    ) -> Result<(ResponseSnapshot, &'static str), NetworkError> {
        if let Some(cached) = self.lookup(partition, request.cache_key()).await {
            return Ok((cached, "cache"));
        }
        let response = self.inner.send(request.clone()).await?;
        self.store_copy(partition, request.cache_key(), &response)
            .await;
        Ok((response, "network"))
    }

    async fn stale_while_revalidate(
        &self,
        partition: &str,
        request: &OutboundRequest,
    ) -> Result<(ResponseSnapshot, &'static str), NetworkError> {
        let Some(cached) = self.lookup(partition, request.cache_key()).await else {
            let response = self.inner.send(request.clone()).await?;
            self.store_copy(partition, request.cache_key(), &response)
                .await;
            return Ok((response, "network"));
        };

        let this = self.clone();
        let partition = partition.to_string();
        let request = request.clone();
        tokio::spawn(async move { this.revalidate(partition, request).await });

        Ok((cached, "cache"))
    }

    async fn revalidate(self, partition: String, request: OutboundRequest) {
        match self.inner.send(request.clone()).await {
            Ok(response) => {
                counter!(METRIC_REVALIDATED).increment(1);
                self.store_copy(&partition, request.cache_key(), &response)
                    .await;
            }
            Err(err) => {
                debug!(url = %request.url, error = %err, "background revalidation failed");
            }
        }
    }

    async fn lookup(&self, partition: &str, key: &str) -> Option<ResponseSnapshot> {
        match self.registry.store().get(partition, key).await {
            Ok(found) => found,
            Err(err) => {
                warn!(partition, key, error = %err, "cache read failed");
                None
            }
        }
    }

    /// Best-effort write; failures are logged and otherwise ignored.
    async fn store_copy(&self, partition: &str, key: &str, response: &ResponseSnapshot) {
        if !response.is_cacheable() {
            return;
        }
        if let Err(err) = self.registry.store().put(partition, key, response).await {
            counter!(METRIC_WRITE_FAILED).increment(1);
            warn!(partition, key, error = %err, "cache write failed");
        }
    }

    /// Fetch each URL and store successful responses in their partitions.
    pub async fn populate(&self, urls: &[String]) -> PopulateReport {
        let mut report = PopulateReport::default();
        for raw in urls {
            match self.populate_one(raw).await {
                Ok(()) => report.stored += 1,
                Err(reason) => {
                    warn!(url = %raw, reason = %reason, "populate skipped");
                    report.failed += 1;
                }
            }
        }
        info!(stored = report.stored, failed = report.failed, "network cache populated");
        report
    }

    async fn populate_one(&self, raw: &str) -> Result<(), String> {
        let url = Url::parse(raw).map_err(|err| err.to_string())?;
        let request = OutboundRequest::get(url);
        let response = self
            .inner
            .send(request.clone())
            .await
            .map_err(|err| err.to_string())?;
        if !response.is_cacheable() {
            return Err(format!("status {}", response.status));
        }

        let partition = self.registry.partition_name(self.registry.kind_for(&request.url));
        self.registry
            .store()
            .put(&partition, request.cache_key(), &response)
            .await
            .map_err(|err| err.to_string())
    }

    /// Pre-cache the configured install list.
    pub async fn install(&self) -> PopulateReport {
        let precache = self.registry.config().precache.clone();
        self.populate(&precache).await
    }

    pub async fn activate(&self) -> Result<Vec<String>, PartitionError> {
        self.registry.activate().await
    }
}

#[async_trait]
impl Transport for CachingTransport {
    async fn send(&self, request: OutboundRequest) -> Result<ResponseSnapshot, NetworkError> {
        self.handle(request).await
    }
}
