use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "vellum_cache_ttl_hit_total",
            Unit::Count,
            "Total number of TTL cache hits."
        );
        describe_counter!(
            "vellum_cache_ttl_miss_total",
            Unit::Count,
            "Total number of TTL cache misses, expired reads included."
        );
        describe_counter!(
            "vellum_cache_ttl_expired_total",
            Unit::Count,
            "Total number of TTL cache entries removed on read after expiry."
        );
        describe_counter!(
            "vellum_race_resolved_total",
            Unit::Count,
            "Featured races resolved, labelled by winning side."
        );
        describe_counter!(
            "vellum_race_reconciled_total",
            Unit::Count,
            "Late live results written to the cache after a fallback won."
        );
        describe_counter!(
            "vellum_network_served_total",
            Unit::Count,
            "Intercepted requests, labelled by strategy and answering source."
        );
        describe_counter!(
            "vellum_network_revalidated_total",
            Unit::Count,
            "Background revalidations that reached the network."
        );
        describe_counter!(
            "vellum_network_cache_write_failed_total",
            Unit::Count,
            "Partition writes that failed and were skipped."
        );
        describe_counter!(
            "vellum_network_partition_deleted_total",
            Unit::Count,
            "Partitions of other versions deleted during activation."
        );
        describe_counter!(
            "vellum_network_image_evicted_total",
            Unit::Count,
            "Image entries removed by the eviction sweep."
        );
        describe_histogram!(
            "vellum_remote_request_ms",
            Unit::Milliseconds,
            "Latency of calls to the remote content store."
        );
    });
}
