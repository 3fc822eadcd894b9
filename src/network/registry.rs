//! Versioned partition naming, activation, and image trimming.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use url::Url;

use super::config::NetworkConfig;
use super::partition::{PartitionError, PartitionStore};

const METRIC_PARTITION_DELETED: &str = "vellum_network_partition_deleted_total";
const METRIC_IMAGE_EVICTED: &str = "vellum_network_image_evicted_total";

const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKind {
    Static,
    Api,
    Images,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 3] = [Self::Static, Self::Api, Self::Images];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Api => "api",
            Self::Images => "images",
        }
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    pub name: String,
    pub entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub version: String,
    pub partitions: Vec<PartitionStats>,
}

/// Owns the versioned partition set of one deployment.
pub struct CacheRegistry {
    store: Arc<dyn PartitionStore>,
    config: NetworkConfig,
}

impl CacheRegistry {
    pub fn new(store: Arc<dyn PartitionStore>, config: NetworkConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn PartitionStore> {
        &self.store
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn partition_name(&self, kind: PartitionKind) -> String {
        format!(
            "{}-{}-{}",
            self.config.name_prefix, kind, self.config.version
        )
    }

    fn is_current(&self, name: &str) -> bool {
        PartitionKind::ALL
            .iter()
            .any(|kind| self.partition_name(*kind) == name)
    }

    /// Which partition a response for `url` belongs in.
    pub fn kind_for(&self, url: &Url) -> PartitionKind {
        let host = url.host_str().unwrap_or_default();
        let is_image = self.config.image_hosts.iter().any(|h| h == host)
            || url
                .path()
                .rsplit_once('.')
                .is_some_and(|(_, ext)| {
                    IMAGE_EXTENSIONS
                        .iter()
                        .any(|known| known.eq_ignore_ascii_case(ext))
                });
        if is_image {
            return PartitionKind::Images;
        }

        let path = url.path();
        if self.config.api_hosts.iter().any(|h| h == host)
            || path.starts_with("/rest/")
            || path.starts_with("/api/")
        {
            PartitionKind::Api
        } else {
            PartitionKind::Static
        }
    }

    /// Delete every partition not named for the current version, then make
    /// sure the current ones exist. Returns the deleted names.
    #[instrument(skip(self), fields(version = %self.config.version))]
    pub async fn activate(&self) -> Result<Vec<String>, PartitionError> {
        let mut deleted = Vec::new();
        for name in self.store.partition_names().await? {
            if self.is_current(&name) {
                continue;
            }
            if self.store.delete_partition(&name).await? {
                counter!(METRIC_PARTITION_DELETED).increment(1);
                deleted.push(name);
            }
        }

        for kind in PartitionKind::ALL {
            self.store.open(&self.partition_name(kind)).await?;
        }

        info!(deleted = deleted.len(), "network cache activated");
        Ok(deleted)
    }

    /// Drop the oldest image entries until at most `image_cap` remain.
    pub async fn trim_images(&self) -> Result<usize, PartitionError> {
        let name = self.partition_name(PartitionKind::Images);
        let keys = self.store.keys(&name).await?;
        let excess = keys.len().saturating_sub(self.config.image_cap);

        let mut removed = 0;
        for key in keys.iter().take(excess) {
            if self.store.delete(&name, key).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            counter!(METRIC_IMAGE_EVICTED).increment(removed as u64);
            info!(partition = %name, removed, "trimmed image partition");
        }
        Ok(removed)
    }

    /// Delete every partition in the store, current version included.
    pub async fn clear_all(&self) -> Result<(), PartitionError> {
        for name in self.store.partition_names().await? {
            self.store.delete_partition(&name).await?;
        }
        info!("network cache cleared");
        Ok(())
    }

    pub async fn stats(&self) -> Result<RegistryStats, PartitionError> {
        let mut partitions = Vec::new();
        for name in self.store.partition_names().await? {
            let entries = self.store.keys(&name).await?.len();
            partitions.push(PartitionStats { name, entries });
        }
        Ok(RegistryStats {
            version: self.config.version.clone(),
            partitions,
        })
    }
}

/// Trim the image partition every `every`, starting one period from now.
pub fn spawn_eviction_sweep(registry: Arc<CacheRegistry>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = registry.trim_images().await {
                warn!(error = %err, "image eviction sweep failed");
            }
        }
    })
}
