//! # Underlying token resolution
//!
//! Boosted pools hold ERC-4626 wrappers; the screener shows the wrapped asset
//! instead. [`UnderlyingMapping`] is the per-chain substitution table and
//! [`UnderlyingTokenCache`] keeps one per chain, refreshed as a whole when it
//! ages past the freshness window.
//!
//! A failed refresh never fails the caller: the last mapping (however old) is
//! served, or an empty one when nothing was ever fetched.

use crate::chain_reader::ChainReader;
use crate::chains::{ChainConfig, ChainRegistry};
use crate::errors::Result;
use crate::metrics;
use crate::token_registry::TokenRegistry;
use crate::types::conversions::string_to_address;
use crate::types::{AddRemove, Pool, Swap, TokenInfo};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

const CACHE_NAME: &str = "underlying_tokens";

/// Wrapped token address (lowercase) to the underlying token's metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnderlyingMapping {
    tokens: HashMap<String, TokenInfo>,
}

impl UnderlyingMapping {
    pub fn new(entries: impl IntoIterator<Item = (String, TokenInfo)>) -> Self {
        Self {
            tokens: entries
                .into_iter()
                .map(|(wrapped, info)| (wrapped.to_lowercase(), info))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, address: &str) -> Option<&TokenInfo> {
        self.tokens.get(&address.to_lowercase())
    }

    pub fn resolve_one(&self, token: &TokenInfo) -> TokenInfo {
        self.get(&token.address)
            .cloned()
            .unwrap_or_else(|| token.clone())
    }

    pub fn resolve_many(&self, tokens: &[TokenInfo]) -> Vec<TokenInfo> {
        tokens.iter().map(|t| self.resolve_one(t)).collect()
    }

    fn resolve_address(&self, address: &str) -> String {
        self.get(address)
            .map(|info| info.address.clone())
            .unwrap_or_else(|| address.to_string())
    }

    pub fn resolve_in_swaps(&self, swaps: Vec<Swap>) -> Vec<Swap> {
        swaps
            .into_iter()
            .map(|mut swap| {
                swap.token_in = self.resolve_address(&swap.token_in);
                swap.token_out = self.resolve_address(&swap.token_out);
                swap
            })
            .collect()
    }

    /// Substitutes token identity (address, name, symbol, decimals). Balances
    /// are the pool's and are kept.
    pub fn resolve_in_pool(&self, mut pool: Pool) -> Pool {
        for token in &mut pool.tokens {
            if let Some(info) = self.get(&token.address) {
                token.address = info.address.clone();
                token.name = info.name.clone();
                token.symbol = info.symbol.clone();
                token.decimals = info.decimals;
            }
        }
        pool
    }

    pub fn resolve_in_add_removes(&self, records: Vec<AddRemove>) -> Vec<AddRemove> {
        records
            .into_iter()
            .map(|mut record| {
                record.pool = self.resolve_in_pool(record.pool);
                record
            })
            .collect()
    }
}

/// A mapping and when it was fetched.
#[derive(Debug, Clone)]
pub struct CachedMapping {
    pub value: Arc<UnderlyingMapping>,
    pub fetched_at: DateTime<Utc>,
}

/// Empty mappings are never fresh, so a chain with nothing resolved keeps
/// retrying the registry.
pub fn is_fresh(entry: &CachedMapping, now: DateTime<Utc>, window: Duration) -> bool {
    !entry.value.is_empty() && now.signed_duration_since(entry.fetched_at) < window
}

pub struct UnderlyingTokenCache {
    registry: Arc<ChainRegistry>,
    token_registry: Arc<dyn TokenRegistry>,
    chain_reader: Arc<dyn ChainReader>,
    freshness: Duration,
    entries: DashMap<String, CachedMapping>,
}

impl UnderlyingTokenCache {
    pub fn new(
        registry: Arc<ChainRegistry>,
        token_registry: Arc<dyn TokenRegistry>,
        chain_reader: Arc<dyn ChainReader>,
        freshness: Duration,
    ) -> Self {
        Self {
            registry,
            token_registry,
            chain_reader,
            freshness,
            entries: DashMap::new(),
        }
    }

    /// Current mapping for `chain_slug`. Only an unknown chain is an error.
    pub async fn get_mapping(&self, chain_slug: &str) -> Result<Arc<UnderlyingMapping>> {
        let chain = self.registry.get_config(chain_slug)?;

        // Clone out of the shard so no lock is held across the fetch.
        let cached = self.entries.get(&chain.slug).map(|e| e.value().clone());
        if let Some(entry) = &cached {
            if is_fresh(entry, Utc::now(), self.freshness) {
                metrics::increment_cache_hit(CACHE_NAME);
                return Ok(entry.value.clone());
            }
        }
        metrics::increment_cache_miss(CACHE_NAME);

        match self.fetch_mapping(chain).await {
            Ok(mapping) => {
                let mapping = Arc::new(mapping);
                info!(
                    "Refreshed underlying token mapping for {}: {} tokens",
                    chain.slug,
                    mapping.len()
                );
                self.entries.insert(
                    chain.slug.clone(),
                    CachedMapping {
                        value: mapping.clone(),
                        fetched_at: Utc::now(),
                    },
                );
                metrics::set_cache_size(CACHE_NAME, self.entries.len() as f64);
                Ok(mapping)
            }
            Err(e) => {
                warn!(
                    "Underlying token refresh failed for {}, serving {} mapping: {}",
                    chain.slug,
                    if cached.is_some() { "stale" } else { "empty" },
                    e
                );
                Ok(cached.map(|entry| entry.value).unwrap_or_default())
            }
        }
    }

    async fn fetch_mapping(&self, chain: &ChainConfig) -> Result<UnderlyingMapping> {
        let tokens = self.token_registry.tokens(&chain.api_slug).await?;

        let mut links = Vec::new();
        for token in &tokens {
            let Some(underlying) = token.display_underlying() else {
                continue;
            };
            match string_to_address(underlying) {
                Ok(address) => links.push((token.address.to_lowercase(), address)),
                Err(e) => debug!("Skipping {}: {}", token.address, e),
            }
        }
        if links.is_empty() {
            return Ok(UnderlyingMapping::default());
        }

        let addresses: Vec<_> = links.iter().map(|(_, underlying)| *underlying).collect();
        let metadata = self
            .chain_reader
            .token_metadata(&chain.slug, &addresses)
            .await?;

        let entries = links
            .into_iter()
            .zip(metadata)
            .filter_map(|((wrapped, _), meta)| {
                let decimals = meta.decimals?;
                let info = TokenInfo {
                    address: format!("{:#x}", meta.address),
                    name: meta.name.unwrap_or_default(),
                    symbol: meta.symbol.unwrap_or_default(),
                    decimals,
                };
                Some((wrapped, info))
            });
        Ok(UnderlyingMapping::new(entries))
    }

    pub async fn resolve_one(&self, token: &TokenInfo, chain_slug: &str) -> Result<TokenInfo> {
        Ok(self.get_mapping(chain_slug).await?.resolve_one(token))
    }

    pub async fn resolve_many(
        &self,
        tokens: &[TokenInfo],
        chain_slug: &str,
    ) -> Result<Vec<TokenInfo>> {
        Ok(self.get_mapping(chain_slug).await?.resolve_many(tokens))
    }

    pub async fn resolve_in_swaps(&self, swaps: Vec<Swap>, chain_slug: &str) -> Result<Vec<Swap>> {
        Ok(self.get_mapping(chain_slug).await?.resolve_in_swaps(swaps))
    }

    pub async fn resolve_in_add_removes(
        &self,
        records: Vec<AddRemove>,
        chain_slug: &str,
    ) -> Result<Vec<AddRemove>> {
        Ok(self
            .get_mapping(chain_slug)
            .await?
            .resolve_in_add_removes(records))
    }

    pub async fn resolve_in_pool(&self, pool: Pool, chain_slug: &str) -> Result<Pool> {
        Ok(self.get_mapping(chain_slug).await?.resolve_in_pool(pool))
    }
}
