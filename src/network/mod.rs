//! Versioned, strategy-driven cache for outbound HTTP traffic.
//!
//! - [`CachingTransport`]: intercepts GETs and applies a [`Strategy`]
//! - [`CacheRegistry`]: versioned partitions, activation, image trimming
//! - [`PartitionStore`]: storage backends ([`MemoryPartitions`], [`FsPartitions`])
//! - [`ControlHandle`]: commands from the rest of the process
//!
//! ## Configuration
//!
//! ```toml
//! [network]
//! version = "2026.10.1"
//! name_prefix = "vellum"
//! image_cap = 60
//! eviction_interval_seconds = 1800
//! ```

mod config;
mod control;
mod interceptor;
mod offline;
mod partition;
mod registry;
mod request;
mod strategy;

pub use config::NetworkConfig;
pub use control::{ControlCommand, ControlError, ControlHandle, spawn_control};
pub use interceptor::{CachingTransport, PopulateReport};
pub use offline::{OFFLINE_HEADER, OFFLINE_STATUS, is_offline, offline_response};
pub use partition::{FsPartitions, MemoryPartitions, PartitionError, PartitionStore};
pub use registry::{
    CacheRegistry, PartitionKind, PartitionStats, RegistryStats, spawn_eviction_sweep,
};
pub use request::{NetworkError, OutboundRequest, ResponseSnapshot, Transport};
pub use strategy::{Strategy, StrategyRules, should_intercept};
