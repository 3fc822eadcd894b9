use std::path::PathBuf;
use std::time::Duration;

/// Settings of the versioned network cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub version: String,
    pub name_prefix: String,
    /// Directory for persisted partitions; `None` keeps them in memory.
    pub storage_dir: Option<PathBuf>,
    pub image_cap: usize,
    pub eviction_interval: Duration,
    pub precache: Vec<String>,
    pub api_hosts: Vec<String>,
    pub image_hosts: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            name_prefix: "vellum".to_string(),
            storage_dir: None,
            image_cap: 60,
            eviction_interval: Duration::from_secs(30 * 60),
            precache: Vec::new(),
            api_hosts: Vec::new(),
            image_hosts: Vec::new(),
        }
    }
}

impl From<&crate::config::NetworkSettings> for NetworkConfig {
    fn from(settings: &crate::config::NetworkSettings) -> Self {
        Self {
            version: settings.version.clone(),
            name_prefix: settings.name_prefix.clone(),
            storage_dir: settings.storage_dir.clone(),
            image_cap: settings.image_cap.get(),
            eviction_interval: settings.eviction_interval,
            precache: settings.precache.clone(),
            api_hosts: settings.api_hosts.clone(),
            image_hosts: settings.image_hosts.clone(),
        }
    }
}
