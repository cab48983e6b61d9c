use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;

pub const DEFAULT_CONFIG_PATH: &str = "Config.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Prometheus scrape endpoint; only used with the `observability` feature.
    #[serde(default)]
    pub metrics_bind_address: Option<String>,
}

fn default_bind_address() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            metrics_bind_address: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SubgraphSettings {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_qps_limit")]
    pub qps_limit: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_subgraph_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_page_size() -> usize {
    1000
}
fn default_qps_limit() -> u32 {
    10
}
fn default_max_retries() -> usize {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    250
}
fn default_subgraph_timeout_seconds() -> u64 {
    30
}

impl Default for SubgraphSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            qps_limit: default_qps_limit(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            timeout_seconds: default_subgraph_timeout_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenRegistrySettings {
    #[serde(default = "default_token_registry_url")]
    pub api_url: String,
    /// Underlying mappings younger than this are served from cache.
    #[serde(default = "default_freshness_seconds")]
    pub freshness_seconds: u64,
    #[serde(default = "default_token_registry_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_token_registry_url() -> String {
    "https://api-v3.balancer.fi/graphql".to_string()
}
fn default_freshness_seconds() -> u64 {
    300 // 5 minutes
}
fn default_token_registry_timeout_seconds() -> u64 {
    15
}

impl Default for TokenRegistrySettings {
    fn default() -> Self {
        Self {
            api_url: default_token_registry_url(),
            freshness_seconds: default_freshness_seconds(),
            timeout_seconds: default_token_registry_timeout_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainReadSettings {
    /// Multicall3 is deployed at the same address on every supported chain.
    #[serde(default = "default_multicall_address")]
    pub multicall_address: String,
    #[serde(default = "default_multicall_batch_size")]
    pub multicall_batch_size: usize,
}

fn default_multicall_address() -> String {
    "0xcA11bde05977b3631167028862bE2a173976CA11".to_string()
}
fn default_multicall_batch_size() -> usize {
    100
}

impl Default for ChainReadSettings {
    fn default() -> Self {
        Self {
            multicall_address: default_multicall_address(),
            multicall_batch_size: default_multicall_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Endpoints for one supported chain.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ChainSettings {
    /// Chain name as the token registry API spells it, e.g. "MAINNET".
    pub api_slug: String,
    pub rpc_endpoint: String,
    pub subgraph_endpoint: String,
}

fn default_dex_key() -> String {
    "balancer".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub subgraph: SubgraphSettings,
    #[serde(default)]
    pub token_registry: TokenRegistrySettings,
    #[serde(default)]
    pub chain_read: ChainReadSettings,
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default = "default_dex_key")]
    pub dex_key: String,
    #[serde(default)]
    pub chains: HashMap<String, ChainSettings>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let path = env::var("SCREENER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_path(&path)
    }

    /// Loads `path` (TOML) and layers `SCREENER__SECTION__KEY` environment
    /// variables on top.
    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("SCREENER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Subgraph gateways need a key; keep it out of the config file.
        if let Ok(api_key) = env::var("SCREENER_SUBGRAPH_API_KEY") {
            let trimmed = api_key.trim();
            if !trimmed.is_empty() {
                for chain in settings.chains.values_mut() {
                    chain.subgraph_endpoint = chain.subgraph_endpoint.replace("{api_key}", trimmed);
                }
            }
        }

        if settings.subgraph.page_size == 0 {
            return Err(ConfigError::Message("subgraph.page_size must be non-zero".into()));
        }
        if settings.subgraph.qps_limit == 0 {
            return Err(ConfigError::Message("subgraph.qps_limit must be non-zero".into()));
        }

        Ok(settings)
    }
}
