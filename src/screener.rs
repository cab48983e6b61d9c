//! Per-chain screener façade and the multi-chain hub in front of it.
//!
//! A [`Screener`] answers the four adapter queries (latest block, asset, pair,
//! events) for one chain. [`ScreenerHub`] owns one per configured chain and is
//! built once at startup.

use crate::chain_reader::{ChainReader, EthersChainReader};
use crate::chains::{ChainConfig, ChainRegistry};
use crate::errors::{Result, ScreenerError};
use crate::event_engine::EventNormalizer;
use crate::normalization::convert_fee_to_bps;
use crate::pair_id::{
    checksum_pair, checksum_pair_id, derive_pair_ids, is_add_remove_for_pair, parse_pair_id,
};
use crate::settings::Settings;
use crate::subgraph::{GraphQlSubgraphClient, SubgraphClient};
use crate::token_registry::BalancerApiTokenRegistry;
use crate::types::conversions::{checksum_address, format_token_amount, string_to_address};
use crate::types::responses::{
    Asset, AssetResponse, EventsResponse, LatestBlockResponse, Pair, PairPool, PairResponse,
};
use crate::types::EventBlock;
use crate::underlying_cache::UnderlyingTokenCache;
use ethers::utils::to_checksum;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

pub struct Screener {
    chain: ChainConfig,
    dex_key: String,
    subgraph: Arc<dyn SubgraphClient>,
    chain_reader: Arc<dyn ChainReader>,
    underlying: Arc<UnderlyingTokenCache>,
    normalizer: EventNormalizer,
}

impl Screener {
    pub fn new(
        chain: ChainConfig,
        dex_key: impl Into<String>,
        subgraph: Arc<dyn SubgraphClient>,
        chain_reader: Arc<dyn ChainReader>,
        underlying: Arc<UnderlyingTokenCache>,
    ) -> Self {
        let normalizer =
            EventNormalizer::new(chain.slug.clone(), subgraph.clone(), underlying.clone());
        Self {
            chain,
            dex_key: dex_key.into(),
            subgraph,
            chain_reader,
            underlying,
            normalizer,
        }
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    /// Latest block the subgraph has indexed. The timestamp comes from the
    /// chain when the subgraph does not report one.
    #[instrument(skip(self), fields(chain = %self.chain.slug))]
    pub async fn latest_block(&self) -> Result<LatestBlockResponse> {
        let meta = self.subgraph.latest_block().await?;
        let block_timestamp = match meta.timestamp {
            Some(timestamp) => timestamp,
            None => {
                debug!(block = meta.number, "subgraph omitted timestamp, reading chain");
                self.chain_reader
                    .block_timestamp(&self.chain.slug, meta.number)
                    .await?
            }
        };

        Ok(LatestBlockResponse {
            block: EventBlock {
                block_number: meta.number,
                block_timestamp,
            },
        })
    }

    #[instrument(skip(self), fields(chain = %self.chain.slug))]
    pub async fn asset(&self, id: &str) -> Result<AssetResponse> {
        let address = string_to_address(id)?;
        let metadata = self
            .chain_reader
            .token_metadata(&self.chain.slug, &[address])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ScreenerError::NotFound(format!("asset {id}")))?;

        // A contract without ERC-20 metadata is not an asset.
        let (Some(symbol), Some(decimals)) = (metadata.symbol, metadata.decimals) else {
            return Err(ScreenerError::NotFound(format!("asset {id}")));
        };
        let total_supply = format_token_amount(metadata.total_supply.unwrap_or_default(), decimals)?;

        Ok(AssetResponse {
            asset: Asset {
                id: to_checksum(&address, None),
                name: metadata.name.unwrap_or_else(|| symbol.clone()),
                symbol,
                total_supply,
                circulating_supply: None,
            },
        })
    }

    #[instrument(skip(self), fields(chain = %self.chain.slug))]
    pub async fn pair(&self, id: &str) -> Result<PairResponse> {
        let pair = parse_pair_id(id)?;
        let checksummed = checksum_pair(&pair)?;
        if !pair.is_canonical() {
            return Err(ScreenerError::NotFound(format!("pair {checksummed}")));
        }

        let pool = self
            .subgraph
            .pool(&pair.pool_address, None)
            .await?
            .ok_or_else(|| ScreenerError::NotFound(format!("pool {}", checksummed.pool_address)))?;
        let pool = self.underlying.resolve_in_pool(pool, &self.chain.slug).await?;
        if !is_add_remove_for_pair(&pair, &pool) {
            return Err(ScreenerError::NotFound(format!("pair {checksummed}")));
        }

        let asset_ids = pool
            .tokens
            .iter()
            .map(|t| checksum_address(&t.address))
            .collect::<Result<Vec<_>>>()?;
        let pair_ids = derive_pair_ids(&pool)
            .iter()
            .map(|p| checksum_pair_id(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(PairResponse {
            pair: Pair {
                id: checksummed.to_string(),
                dex_key: self.dex_key.clone(),
                asset0_id: checksummed.asset0.clone(),
                asset1_id: checksummed.asset1.clone(),
                created_at_block_number: pool.created_at_block,
                created_at_block_timestamp: pool.created_at_timestamp,
                created_at_txn_id: pool.created_at_tx.clone(),
                creator: pool.creator.as_deref().map(checksum_address).transpose()?,
                fee_bps: convert_fee_to_bps(&pool.swap_fee),
                pool: PairPool {
                    id: checksummed.pool_address.clone(),
                    name: pool.name.clone(),
                    asset_ids,
                    pair_ids,
                },
            },
        })
    }

    pub async fn events(&self, from_block: u64, to_block: u64) -> Result<EventsResponse> {
        Ok(EventsResponse {
            events: self.normalizer.events(from_block, to_block).await?,
        })
    }
}

/// One [`Screener`] per configured chain.
pub struct ScreenerHub {
    screeners: BTreeMap<String, Arc<Screener>>,
}

impl ScreenerHub {
    pub fn new(screeners: impl IntoIterator<Item = Screener>) -> Self {
        Self {
            screeners: screeners
                .into_iter()
                .map(|s| (s.chain.slug.to_lowercase(), Arc::new(s)))
                .collect(),
        }
    }

    /// Wires HTTP clients for every chain in `settings`.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let registry = Arc::new(ChainRegistry::from_settings(settings)?);
        let chain_reader: Arc<dyn ChainReader> =
            Arc::new(EthersChainReader::new(&registry, &settings.chain_read)?);
        let token_registry = Arc::new(BalancerApiTokenRegistry::new(&settings.token_registry)?);
        let freshness = chrono::Duration::seconds(settings.token_registry.freshness_seconds as i64);
        let underlying = Arc::new(UnderlyingTokenCache::new(
            registry.clone(),
            token_registry,
            chain_reader.clone(),
            freshness,
        ));

        let mut screeners = Vec::new();
        for chain in registry.iter() {
            let subgraph: Arc<dyn SubgraphClient> = Arc::new(GraphQlSubgraphClient::new(
                chain.subgraph_endpoint.clone(),
                &settings.subgraph,
            )?);
            screeners.push(Screener::new(
                chain.clone(),
                settings.dex_key.clone(),
                subgraph,
                chain_reader.clone(),
                underlying.clone(),
            ));
        }
        Ok(Self::new(screeners))
    }

    pub fn screener(&self, chain_slug: &str) -> Result<Arc<Screener>> {
        self.screeners
            .get(&chain_slug.to_lowercase())
            .cloned()
            .ok_or_else(|| ScreenerError::UnsupportedChain(chain_slug.to_string()))
    }

    pub fn supported_chains(&self) -> Vec<String> {
        self.screeners.keys().cloned().collect()
    }
}
