//! In-process read acceleration.
//!
//! - [`TtlCache`]: key/value store with a uniform time-to-live per entry
//! - [`fetch_with_timeout`]: bounded-latency wrapper around remote calls
//! - [`RaceResolver`]: live-versus-fallback race with background reconciliation
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 300
//! ```

mod clock;
mod config;
mod fetch;
mod keys;
mod lock;
mod race;
mod store;

pub use clock::{Clock, ManualClock, TokioClock};
pub use config::CacheConfig;
pub use fetch::{FetchOutcome, fetch_with_timeout};
pub use keys::ContentKey;
pub(crate) use lock::mutex_lock;
pub use race::{RaceResolver, Resolution};
pub use store::{CacheStats, TtlCache};
