use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the vellum binary.
#[derive(Debug, Parser)]
#[command(
    name = "vellum",
    version,
    about = "Resilient content read layer with a versioned network cache"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VELLUM_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Maintain the persistent network cache partitions.
    Network(NetworkArgs),
    /// Inspect the fallback dataset.
    Fallback(FallbackArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct NetworkOverrides {
    /// Override the network cache version tag.
    #[arg(long = "network-version", value_name = "TAG")]
    pub network_version: Option<String>,

    /// Override the directory holding persisted partitions.
    #[arg(long = "network-storage-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub network_storage_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub network: NetworkOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the remote store base URL.
    #[arg(long = "remote-base-url", value_name = "URL")]
    pub remote_base_url: Option<String>,

    /// Toggle the in-process TTL cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the TTL cache lifetime.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Load the fallback dataset from a file instead of the embedded copy.
    #[arg(long = "fallback-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub fallback_path: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct NetworkArgs {
    #[command(flatten)]
    pub overrides: NetworkOverrides,

    #[command(subcommand)]
    pub command: NetworkCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum NetworkCommand {
    /// Delete partitions of other versions and open the current ones.
    Activate,
    /// Delete every partition.
    Clear,
    /// Fetch URLs and store the responses.
    Populate {
        #[arg(value_name = "URL", required = true)]
        urls: Vec<String>,
    },
}

#[derive(Debug, Args, Clone)]
pub struct FallbackArgs {
    /// Dataset file to inspect instead of the configured one.
    #[arg(long = "fallback-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: FallbackCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum FallbackCommand {
    /// Parse the dataset and print a summary.
    Check,
}
