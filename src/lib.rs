//! Resilient content read layer.
//!
//! Reads of a remote content store go through a TTL cache and a time budget,
//! and fall back to a bundled dataset when the store is slow or unreachable.
//! Outbound HTTP additionally passes a versioned, strategy-driven network
//! cache that keeps serving stored responses while offline.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod network;
