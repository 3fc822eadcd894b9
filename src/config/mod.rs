//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

pub use cli::{
    CliArgs, Command, FallbackArgs, FallbackCommand, NetworkArgs, NetworkCommand,
    NetworkOverrides, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vellum";
const ENV_PREFIX: &str = "VELLUM";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_FEATURED_RACE_MS: u64 = 2_000;
const DEFAULT_LISTING_MS: u64 = 3_000;
const DEFAULT_ITEM_MS: u64 = 4_000;
const DEFAULT_MUTATION_MS: u64 = 6_000;
const DEFAULT_REQUEST_MS: u64 = 10_000;
const DEFAULT_FEATURED_COUNT: usize = 3;
const DEFAULT_ALL_LIMIT: usize = 20;
const DEFAULT_CATEGORY_LIMIT: usize = 12;
const DEFAULT_REMOTE_TABLE: &str = "items";
const DEFAULT_NAME_PREFIX: &str = "vellum";
const DEFAULT_IMAGE_CAP: usize = 60;
const DEFAULT_EVICTION_INTERVAL_SECS: u64 = 30 * 60;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub timeouts: TimeoutSettings,
    pub content: ContentSettings,
    pub remote: Option<RemoteSettings>,
    pub fallback: FallbackSettings,
    pub network: NetworkSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub admin_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct TimeoutSettings {
    pub featured_race: Duration,
    pub listing: Duration,
    pub item: Duration,
    pub mutation: Duration,
    /// Hard limit on any single outbound HTTP request.
    pub request: Duration,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub featured_count: NonZeroUsize,
    pub all_limit: NonZeroUsize,
    pub category_limit: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub table: String,
}

#[derive(Debug, Clone, Default)]
pub struct FallbackSettings {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct NetworkSettings {
    pub version: String,
    pub name_prefix: String,
    pub storage_dir: Option<PathBuf>,
    pub image_cap: NonZeroUsize,
    pub eviction_interval: Duration,
    pub precache: Vec<String>,
    pub api_hosts: Vec<String>,
    pub image_hosts: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Network(args)) => raw.apply_network_overrides(&args.overrides),
        Some(Command::Fallback(args)) => {
            if let Some(path) = args.path.as_ref() {
                raw.fallback.path = Some(path.clone());
            }
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    timeouts: RawTimeoutSettings,
    content: RawContentSettings,
    remote: RawRemoteSettings,
    fallback: RawFallbackSettings,
    network: RawNetworkSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.remote_base_url.as_ref() {
            self.remote.base_url = Some(url.clone());
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(path) = overrides.fallback_path.as_ref() {
            self.fallback.path = Some(path.clone());
        }

        self.apply_network_overrides(&overrides.network);
    }

    fn apply_network_overrides(&mut self, overrides: &NetworkOverrides) {
        if let Some(version) = overrides.network_version.as_ref() {
            self.network.version = Some(version.clone());
        }
        if let Some(dir) = overrides.network_storage_dir.as_ref() {
            self.network.storage_dir = Some(dir.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            timeouts,
            content,
            remote,
            fallback,
            network,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;
        let timeouts = build_timeout_settings(timeouts)?;
        let content = build_content_settings(content)?;
        let remote = build_remote_settings(remote)?;
        let fallback = FallbackSettings {
            path: fallback.path.filter(|path| !path.as_os_str().is_empty()),
        };
        let network = build_network_settings(network, remote.as_ref())?;

        Ok(Self {
            server,
            logging,
            cache,
            timeouts,
            content,
            remote,
            fallback,
            network,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
        admin_token: non_blank(server.admin_token),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_seconds = cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        ttl: Duration::from_secs(ttl_seconds),
    })
}

fn build_timeout_settings(timeouts: RawTimeoutSettings) -> Result<TimeoutSettings, LoadError> {
    let featured_race = millis(
        timeouts.featured_race_ms.unwrap_or(DEFAULT_FEATURED_RACE_MS),
        "timeouts.featured_race_ms",
    )?;
    let listing = millis(
        timeouts.listing_ms.unwrap_or(DEFAULT_LISTING_MS),
        "timeouts.listing_ms",
    )?;
    let item = millis(
        timeouts.item_ms.unwrap_or(DEFAULT_ITEM_MS),
        "timeouts.item_ms",
    )?;
    let mutation = millis(
        timeouts.mutation_ms.unwrap_or(DEFAULT_MUTATION_MS),
        "timeouts.mutation_ms",
    )?;
    let request = millis(
        timeouts.request_ms.unwrap_or(DEFAULT_REQUEST_MS),
        "timeouts.request_ms",
    )?;
    if request < mutation {
        return Err(LoadError::invalid(
            "timeouts.request_ms",
            "must not be shorter than timeouts.mutation_ms",
        ));
    }

    Ok(TimeoutSettings {
        featured_race,
        listing,
        item,
        mutation,
        request,
    })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    Ok(ContentSettings {
        featured_count: non_zero_usize(
            content.featured_count.unwrap_or(DEFAULT_FEATURED_COUNT),
            "content.featured_count",
        )?,
        all_limit: non_zero_usize(
            content.all_limit.unwrap_or(DEFAULT_ALL_LIMIT),
            "content.all_limit",
        )?,
        category_limit: non_zero_usize(
            content.category_limit.unwrap_or(DEFAULT_CATEGORY_LIMIT),
            "content.category_limit",
        )?,
    })
}

fn build_remote_settings(remote: RawRemoteSettings) -> Result<Option<RemoteSettings>, LoadError> {
    let Some(raw_url) = non_blank(remote.base_url) else {
        return Ok(None);
    };

    let base_url = Url::parse(&raw_url)
        .map_err(|err| LoadError::invalid("remote.base_url", format!("failed to parse: {err}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "remote.base_url",
            "scheme must be http or https",
        ));
    }

    let table = remote
        .table
        .unwrap_or_else(|| DEFAULT_REMOTE_TABLE.to_string());
    if table.trim().is_empty() || table.contains('/') {
        return Err(LoadError::invalid(
            "remote.table",
            "must be a non-empty table name",
        ));
    }

    Ok(Some(RemoteSettings {
        base_url,
        api_key: non_blank(remote.api_key),
        table,
    }))
}

fn build_network_settings(
    network: RawNetworkSettings,
    remote: Option<&RemoteSettings>,
) -> Result<NetworkSettings, LoadError> {
    let version = network
        .version
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
    if !is_name_fragment(&version) {
        return Err(LoadError::invalid(
            "network.version",
            "must be non-empty and use only letters, digits, `.`, `_` or `-`",
        ));
    }

    let name_prefix = network
        .name_prefix
        .unwrap_or_else(|| DEFAULT_NAME_PREFIX.to_string());
    if !is_name_fragment(&name_prefix) {
        return Err(LoadError::invalid(
            "network.name_prefix",
            "must be non-empty and use only letters, digits, `.`, `_` or `-`",
        ));
    }

    let image_cap = non_zero_usize(
        network.image_cap.unwrap_or(DEFAULT_IMAGE_CAP),
        "network.image_cap",
    )?;

    let eviction_secs = network
        .eviction_interval_seconds
        .unwrap_or(DEFAULT_EVICTION_INTERVAL_SECS);
    if eviction_secs == 0 {
        return Err(LoadError::invalid(
            "network.eviction_interval_seconds",
            "must be greater than zero",
        ));
    }

    let precache = network.precache.unwrap_or_default();
    if let Some(bad) = precache.iter().find(|url| Url::parse(url).is_err()) {
        return Err(LoadError::invalid(
            "network.precache",
            format!("`{bad}` is not an absolute URL"),
        ));
    }

    let mut api_hosts = network.api_hosts.unwrap_or_default();
    if let Some(host) = remote.and_then(|remote| remote.base_url.host_str())
        && !api_hosts.iter().any(|known| known == host)
    {
        api_hosts.push(host.to_string());
    }

    Ok(NetworkSettings {
        version,
        name_prefix,
        storage_dir: network
            .storage_dir
            .filter(|dir| !dir.as_os_str().is_empty()),
        image_cap,
        eviction_interval: Duration::from_secs(eviction_secs),
        precache,
        api_hosts,
        image_hosts: network.image_hosts.unwrap_or_default(),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    admin_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTimeoutSettings {
    featured_race_ms: Option<u64>,
    listing_ms: Option<u64>,
    item_ms: Option<u64>,
    mutation_ms: Option<u64>,
    request_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    featured_count: Option<usize>,
    all_limit: Option<usize>,
    category_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRemoteSettings {
    base_url: Option<String>,
    api_key: Option<String>,
    table: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFallbackSettings {
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNetworkSettings {
    version: Option<String>,
    name_prefix: Option<String>,
    storage_dir: Option<PathBuf>,
    image_cap: Option<usize>,
    eviction_interval_seconds: Option<u64>,
    precache: Option<Vec<String>>,
    api_hosts: Option<Vec<String>>,
    image_hosts: Option<Vec<String>>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_usize(value: usize, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn millis(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(value))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn is_name_fragment(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
