//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use docgraph_types::HASH_HEX_LEN;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "daoctl";
const DEFAULT_CHAIN_ENDPOINT: &str = "https://telos.caleos.io";
const DEFAULT_CHAIN_CONTRACT: &str = "dao.hypha";
const DEFAULT_CHAIN_PAGE_SIZE: u64 = 100;
const DEFAULT_CHAIN_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SNAPSHOT_PATH: &str = ".graph.cache";
const DEFAULT_DOCUMENT_TTL_SECS: u64 = 60 * 60;
const DEFAULT_PAGE_TTL_SECS: u64 = 5 * 60;
const DEFAULT_SHORT_HASH_LEN: usize = 5;
const DEFAULT_PREFETCH_CONCURRENCY: u64 = 4;

/// Command-line arguments for the daoctl binary.
#[derive(Debug, Parser)]
#[command(name = "daoctl", version, about = "Explore the DAO document graph")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "DAOCTL_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Read documents and edges.
    Get(GetArgs),
    /// Manage the local document cache.
    Cache(CacheArgs),
}

#[derive(Debug, Args, Clone)]
pub struct GetArgs {
    #[command(subcommand)]
    pub command: GetCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum GetCommand {
    /// Show a document and walk its edges interactively.
    Document(DocumentArgs),
    /// List cached documents of one type.
    Documents(DocumentsArgs),
    /// Show the edges touching a document.
    Edges(EdgesArgs),
}

#[derive(Debug, Args, Clone, Default)]
pub struct DocumentArgs {
    /// Full hash or short prefix; defaults to the most recently created document.
    #[arg(value_name = "HASH")]
    pub hash: Option<String>,

    /// Print the document as JSON and exit.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,

    /// Print the document once without prompting for the next step.
    #[arg(long = "no-navigate", action = clap::ArgAction::SetTrue)]
    pub no_navigate: bool,
}

#[derive(Debug, Args, Clone)]
pub struct DocumentsArgs {
    /// Document type, e.g. `member` or `role`.
    #[arg(long = "type", value_name = "TYPE")]
    pub document_type: String,
}

#[derive(Debug, Args, Clone)]
pub struct EdgesArgs {
    /// Full hash or short prefix.
    #[arg(value_name = "HASH")]
    pub hash: String,
}

#[derive(Debug, Args, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CacheCommand {
    /// Rebuild the cache from the chain and write a new snapshot.
    Rebuild,
    /// Report what the current snapshot holds.
    Status,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the chain API endpoint.
    #[arg(long = "endpoint", value_name = "URL", global = true)]
    pub endpoint: Option<String>,

    /// Override the DAO contract account.
    #[arg(long = "contract", value_name = "ACCOUNT", global = true)]
    pub contract: Option<String>,

    /// Override the snapshot file location.
    #[arg(long = "cache-file", value_name = "PATH", global = true)]
    pub cache_file: Option<PathBuf>,

    /// Fetch documents on cache miss and keep them in memory.
    #[arg(
        long = "cache-backfill",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub backfill_on_miss: Option<bool>,

    /// Toggle neighbor prefetching during navigation.
    #[arg(
        long = "prefetch",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub prefetch: Option<bool>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub chain: ChainSettings,
    pub cache: CacheSettings,
    pub prefetch: PrefetchSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct ChainSettings {
    pub endpoint: Url,
    pub contract: String,
    pub page_size: NonZeroU32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub snapshot_path: PathBuf,
    pub document_ttl: Duration,
    pub page_ttl: Duration,
    pub short_hash_len: usize,
    pub backfill_on_miss: bool,
}

#[derive(Debug, Clone)]
pub struct PrefetchSettings {
    pub enabled: bool,
    pub concurrency: NonZeroU32,
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

    builder = builder.add_source(Environment::with_prefix("DAOCTL").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    chain: RawChainSettings,
    cache: RawCacheSettings,
    prefetch: RawPrefetchSettings,
    logging: RawLoggingSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(endpoint) = overrides.endpoint.as_ref() {
            self.chain.endpoint = Some(endpoint.clone());
        }
        if let Some(contract) = overrides.contract.as_ref() {
            self.chain.contract = Some(contract.clone());
        }
        if let Some(path) = overrides.cache_file.as_ref() {
            self.cache.snapshot_path = Some(path.clone());
        }
        if let Some(backfill) = overrides.backfill_on_miss {
            self.cache.backfill_on_miss = Some(backfill);
        }
        if let Some(enabled) = overrides.prefetch {
            self.prefetch.enabled = Some(enabled);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            chain,
            cache,
            prefetch,
            logging,
        } = raw;

        Ok(Self {
            chain: build_chain_settings(chain)?,
            cache: build_cache_settings(cache)?,
            prefetch: build_prefetch_settings(prefetch)?,
            logging: build_logging_settings(logging)?,
        })
    }
}

fn build_chain_settings(chain: RawChainSettings) -> Result<ChainSettings, LoadError> {
    let endpoint_value = chain
        .endpoint
        .unwrap_or_else(|| DEFAULT_CHAIN_ENDPOINT.to_string());
    let endpoint = Url::parse(endpoint_value.trim())
        .map_err(|err| LoadError::invalid("chain.endpoint", format!("invalid url: {err}")))?;
    if !matches!(endpoint.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "chain.endpoint",
            "scheme must be http or https",
        ));
    }

    let contract = chain
        .contract
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_CHAIN_CONTRACT.to_string());
    if contract.is_empty() {
        return Err(LoadError::invalid(
            "chain.contract",
            "account must not be empty",
        ));
    }

    let page_size = non_zero_u32(
        chain.page_size.unwrap_or(DEFAULT_CHAIN_PAGE_SIZE),
        "chain.page_size",
    )?;
    let timeout_secs = chain.timeout_seconds.unwrap_or(DEFAULT_CHAIN_TIMEOUT_SECS);
    let timeout = non_zero_secs(timeout_secs, "chain.timeout_seconds")?;

    Ok(ChainSettings {
        endpoint,
        contract,
        page_size,
        timeout,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let snapshot_path = cache
        .snapshot_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH));
    if snapshot_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "cache.snapshot_path",
            "path must not be empty",
        ));
    }

    let document_ttl = non_zero_secs(
        cache.document_ttl_secs.unwrap_or(DEFAULT_DOCUMENT_TTL_SECS),
        "cache.document_ttl_secs",
    )?;
    let page_ttl = non_zero_secs(
        cache.page_ttl_secs.unwrap_or(DEFAULT_PAGE_TTL_SECS),
        "cache.page_ttl_secs",
    )?;

    let short_hash_len = cache.short_hash_len.unwrap_or(DEFAULT_SHORT_HASH_LEN);
    if !(1..=HASH_HEX_LEN).contains(&short_hash_len) {
        return Err(LoadError::invalid(
            "cache.short_hash_len",
            format!("must be between 1 and {HASH_HEX_LEN}"),
        ));
    }

    Ok(CacheSettings {
        snapshot_path,
        document_ttl,
        page_ttl,
        short_hash_len,
        backfill_on_miss: cache.backfill_on_miss.unwrap_or(false),
    })
}

fn build_prefetch_settings(prefetch: RawPrefetchSettings) -> Result<PrefetchSettings, LoadError> {
    let concurrency = non_zero_u32(
        prefetch.concurrency.unwrap_or(DEFAULT_PREFETCH_CONCURRENCY),
        "prefetch.concurrency",
    )?;

    Ok(PrefetchSettings {
        enabled: prefetch.enabled.unwrap_or(true),
        concurrency,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::WARN,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawChainSettings {
    endpoint: Option<String>,
    contract: Option<String>,
    page_size: Option<u64>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    snapshot_path: Option<PathBuf>,
    document_ttl_secs: Option<u64>,
    page_ttl_secs: Option<u64>,
    short_hash_len: Option<usize>,
    backfill_on_miss: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPrefetchSettings {
    enabled: Option<bool>,
    concurrency: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
