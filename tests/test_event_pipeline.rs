//! Integration tests for the screener pipeline against in-memory collaborators
//!
//! Tests cover:
//! - Swap and add/remove normalization end to end
//! - Underlying token substitution in pair ids
//! - Degraded reserves when a pool snapshot cannot be fetched
//! - Pair, asset and latest-block lookups
//!
//! Note: no network access; subgraph, chain and token API are fakes

use async_trait::async_trait;
use balancer_dex_screener::chain_reader::{ChainReader, TokenMetadata};
use balancer_dex_screener::token_registry::{RegistryToken, TokenRegistry};
use balancer_dex_screener::types::{
    AddRemove, AddRemoveType, MetaBlock, NormalizedEvent, Pool, PoolToken, Swap,
};
use balancer_dex_screener::underlying_cache::UnderlyingTokenCache;
use balancer_dex_screener::{
    subgraph::SubgraphClient, ChainConfig, ChainRegistry, Result, Screener, ScreenerError,
    ScreenerHub,
};
use ethers::types::{Address, U256};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

const POOL: &str = "0x85b2b559bc2d21104c4defdd6efca8a20343361d";
const POOL_CS: &str = "0x85B2b559bC2D21104C4DEFdd6EFcA8A20343361D";
const A: &str = "0x7f39c581f595b53c5cb19bd0b3f8da6c935e2ca0";
const A_CS: &str = "0x7f39C581F595B53c5cb19bD0b3f8dA6c935E2Ca0";
const B: &str = "0xae7ab96520de3a18e5e111b5eaab095312d7fe84";
const B_CS: &str = "0xae7ab96520DE3A18E5e111B5EaAb095312D7fE84";
const WRAPPED: &str = "0xd4fa2d31b7968e448877f69a96de69f5de8cd23e";
const UNDERLYING: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
const UNDERLYING_CS: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
const USER: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
const USER_CS: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

#[derive(Default)]
struct FakeSubgraph {
    swaps: Vec<Swap>,
    add_removes: Vec<AddRemove>,
    /// Keyed by block; `None` is the latest state.
    pools: HashMap<Option<u64>, Pool>,
    meta: Option<MetaBlock>,
    fail_listing: bool,
    fail_snapshots: bool,
    listing_calls: AtomicUsize,
}

#[async_trait]
impl SubgraphClient for FakeSubgraph {
    async fn swaps(&self, _from_block: u64, _to_block: u64) -> Result<Vec<Swap>> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(ScreenerError::subgraph("indexer unavailable"));
        }
        Ok(self.swaps.clone())
    }

    async fn add_removes(&self, _from_block: u64, _to_block: u64) -> Result<Vec<AddRemove>> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.add_removes.clone())
    }

    async fn pool(&self, address: &str, block: Option<u64>) -> Result<Option<Pool>> {
        if block.is_some() && self.fail_snapshots {
            return Err(ScreenerError::subgraph("snapshot timeout"));
        }
        Ok(self
            .pools
            .get(&block)
            .filter(|p| p.address.eq_ignore_ascii_case(address))
            .cloned())
    }

    async fn latest_block(&self) -> Result<MetaBlock> {
        self.meta
            .clone()
            .ok_or_else(|| ScreenerError::subgraph("no meta"))
    }
}

#[derive(Default)]
struct FakeChain {
    tokens: HashMap<Address, TokenMetadata>,
    timestamps: HashMap<u64, u64>,
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn token_metadata(&self, _chain: &str, tokens: &[Address]) -> Result<Vec<TokenMetadata>> {
        Ok(tokens
            .iter()
            .map(|address| {
                self.tokens.get(address).cloned().unwrap_or(TokenMetadata {
                    address: *address,
                    name: None,
                    symbol: None,
                    decimals: None,
                    total_supply: None,
                })
            })
            .collect())
    }

    async fn block_timestamp(&self, _chain: &str, block_number: u64) -> Result<u64> {
        self.timestamps
            .get(&block_number)
            .copied()
            .ok_or_else(|| ScreenerError::chain_read("unknown block"))
    }
}

#[derive(Default)]
struct FakeTokenApi {
    tokens: Vec<RegistryToken>,
}

#[async_trait]
impl TokenRegistry for FakeTokenApi {
    async fn tokens(&self, _api_slug: &str) -> Result<Vec<RegistryToken>> {
        Ok(self.tokens.clone())
    }
}

fn chain_config() -> ChainConfig {
    ChainConfig {
        slug: "mainnet".into(),
        api_slug: "MAINNET".into(),
        rpc_endpoint: Url::parse("http://localhost:8545").unwrap(),
        subgraph_endpoint: Url::parse("http://localhost:8000/subgraphs/v3").unwrap(),
    }
}

fn usdc_metadata() -> TokenMetadata {
    TokenMetadata {
        address: Address::from_str(UNDERLYING).unwrap(),
        name: Some("USD Coin".into()),
        symbol: Some("USDC".into()),
        decimals: Some(6),
        total_supply: Some(U256::from(1_500_000u64)),
    }
}

fn screener(subgraph: FakeSubgraph, chain: FakeChain, token_api: FakeTokenApi) -> (Screener, Arc<FakeSubgraph>) {
    let subgraph = Arc::new(subgraph);
    let chain: Arc<dyn ChainReader> = Arc::new(chain);
    let registry = Arc::new(ChainRegistry::from_configs([chain_config()]));
    let underlying = Arc::new(UnderlyingTokenCache::new(
        registry,
        Arc::new(token_api),
        chain.clone(),
        chrono::Duration::minutes(5),
    ));
    let screener = Screener::new(
        chain_config(),
        "balancer",
        subgraph.clone(),
        chain,
        underlying,
    );
    (screener, subgraph)
}

fn pool(tokens: &[(&str, &str)]) -> Pool {
    Pool {
        address: POOL.into(),
        name: "Balancer 50wstETH-50stETH".into(),
        symbol: "B-50wstETH-50stETH".into(),
        swap_fee: "0.001".into(),
        created_at_block: 19_000_000,
        created_at_timestamp: 1_705_000_000,
        created_at_tx: "0xcreate".into(),
        creator: Some("0xba12222222228d8ba445958a75a0704d566bf2c8".into()),
        tokens: tokens
            .iter()
            .map(|(address, balance)| PoolToken {
                address: address.to_string(),
                name: String::new(),
                symbol: String::new(),
                decimals: 18,
                balance: balance.to_string(),
            })
            .collect(),
    }
}

fn swap(token_in: &str, token_out: &str) -> Swap {
    Swap {
        id: "0xt1-0".into(),
        pool: POOL.into(),
        token_in: token_in.into(),
        token_out: token_out.into(),
        token_amount_in: "1000000000000000000".into(),
        token_amount_out: "2000000000000000000".into(),
        block_number: 100,
        block_timestamp: 1_700_000_000,
        transaction_hash: "0xt1".into(),
        log_index: 0,
        user: USER.into(),
    }
}

#[tokio::test]
async fn test_single_swap_end_to_end() {
    let subgraph = FakeSubgraph {
        swaps: vec![swap(A, B)],
        pools: HashMap::from([(Some(100), pool(&[(A, "500"), (B, "700")]))]),
        ..Default::default()
    };
    let (screener, _) = screener(subgraph, FakeChain::default(), FakeTokenApi::default());

    let events = screener.events(100, 100).await.unwrap().events;
    assert_eq!(events.len(), 1);
    let NormalizedEvent::Swap(event) = &events[0] else {
        panic!("expected swap, got {:?}", events[0]);
    };
    assert_eq!(event.pair_id, format!("{POOL_CS}-{A_CS}-{B_CS}"));
    assert_eq!(event.maker, USER_CS);
    assert_eq!(event.price_native, "2");
    assert_eq!(event.asset0_in.as_deref(), Some("1000000000000000000"));
    assert_eq!(event.asset1_out.as_deref(), Some("2000000000000000000"));
    assert_eq!(event.txn_index, 0);
    assert_eq!(event.block.block_number, 100);
    let reserves = event.reserves.as_ref().unwrap();
    assert_eq!((reserves.asset0.as_str(), reserves.asset1.as_str()), ("500", "700"));

    let wire = serde_json::to_value(&events[0]).unwrap();
    assert_eq!(wire["eventType"], "swap");
    assert!(wire.get("asset1In").is_none());
}

#[tokio::test]
async fn test_add_becomes_join_with_positional_amounts() {
    let subgraph = FakeSubgraph {
        add_removes: vec![AddRemove {
            id: "0xt2-4".into(),
            kind: AddRemoveType::Add,
            amounts: vec!["1000".into(), "2000".into()],
            pool: pool(&[(A, "0"), (B, "0")]),
            user: USER.into(),
            block_number: 100,
            block_timestamp: 1_700_000_000,
            transaction_hash: "0xt2".into(),
            log_index: 4,
        }],
        pools: HashMap::from([(Some(100), pool(&[(A, "1000"), (B, "2000")]))]),
        ..Default::default()
    };
    let (screener, _) = screener(subgraph, FakeChain::default(), FakeTokenApi::default());

    let events = screener.events(90, 110).await.unwrap().events;
    assert_eq!(events.len(), 1);
    match &events[0] {
        NormalizedEvent::Join(join) => {
            assert_eq!(join.amount0, "1000");
            assert_eq!(join.amount1, "2000");
            assert_eq!(join.event_index, 4);
            assert!(join.reserves.is_some());
        }
        other => panic!("expected join, got {other:?}"),
    }
}

#[tokio::test]
async fn test_inverted_range_rejected_before_fetching() {
    let (screener, subgraph) = screener(
        FakeSubgraph::default(),
        FakeChain::default(),
        FakeTokenApi::default(),
    );

    let err = screener.events(200, 100).await.unwrap_err();
    assert!(matches!(err, ScreenerError::Format(_)));
    assert_eq!(subgraph.listing_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_listing_failure_fails_request() {
    let subgraph = FakeSubgraph {
        fail_listing: true,
        ..Default::default()
    };
    let (screener, _) = screener(subgraph, FakeChain::default(), FakeTokenApi::default());

    let err = screener.events(1, 2).await.unwrap_err();
    assert!(err.is_upstream());
}

#[tokio::test]
async fn test_snapshot_failure_yields_null_reserves() {
    let subgraph = FakeSubgraph {
        swaps: vec![swap(A, B)],
        fail_snapshots: true,
        ..Default::default()
    };
    let (screener, _) = screener(subgraph, FakeChain::default(), FakeTokenApi::default());

    let events = screener.events(100, 100).await.unwrap().events;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reserves(), None);
    assert_eq!(events[0].pair_id(), format!("{POOL_CS}-{A_CS}-{B_CS}"));
}

#[tokio::test]
async fn test_wrapped_tokens_resolve_to_underlying() {
    let subgraph = FakeSubgraph {
        swaps: vec![swap(WRAPPED, B)],
        pools: HashMap::from([(Some(100), pool(&[(WRAPPED, "10"), (B, "20")]))]),
        ..Default::default()
    };
    let chain = FakeChain {
        tokens: HashMap::from([(Address::from_str(UNDERLYING).unwrap(), usdc_metadata())]),
        ..Default::default()
    };
    let token_api = FakeTokenApi {
        tokens: vec![RegistryToken {
            address: WRAPPED.into(),
            underlying_token_address: Some(UNDERLYING.into()),
            use_underlying_for_add_remove: Some(true),
            is_buffer_allowed: Some(true),
        }],
    };
    let (screener, _) = screener(subgraph, chain, token_api);

    let events = screener.events(100, 100).await.unwrap().events;
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].pair_id(),
        format!("{POOL_CS}-{UNDERLYING_CS}-{B_CS}")
    );
    let reserves = events[0].reserves().unwrap();
    assert_eq!((reserves.asset0.as_str(), reserves.asset1.as_str()), ("10", "20"));
}

#[tokio::test]
async fn test_pair_lookup() {
    let subgraph = FakeSubgraph {
        pools: HashMap::from([(None, pool(&[(A, "1"), (B, "2")]))]),
        ..Default::default()
    };
    let (screener, _) = screener(subgraph, FakeChain::default(), FakeTokenApi::default());

    let pair = screener
        .pair(&format!("{POOL}-{A}-{B}"))
        .await
        .unwrap()
        .pair;
    assert_eq!(pair.id, format!("{POOL_CS}-{A_CS}-{B_CS}"));
    assert_eq!(pair.dex_key, "balancer");
    assert_eq!(pair.asset0_id, A_CS);
    assert_eq!(pair.asset1_id, B_CS);
    assert_eq!(pair.fee_bps, 0.1);
    assert_eq!(pair.creator.as_deref(), Some("0xBA12222222228d8Ba445958a75a0704d566BF2C8"));
    assert_eq!(pair.pool.asset_ids, vec![A_CS, B_CS]);
    assert_eq!(pair.pool.pair_ids.len(), 1);
}

#[tokio::test]
async fn test_pair_lookup_errors() {
    let subgraph = FakeSubgraph {
        pools: HashMap::from([(None, pool(&[(A, "1"), (B, "2")]))]),
        ..Default::default()
    };
    let (screener, _) = screener(subgraph, FakeChain::default(), FakeTokenApi::default());

    assert!(matches!(
        screener.pair("not-a-pair-id").await,
        Err(ScreenerError::Format(_))
    ));
    assert!(matches!(
        screener.pair(&format!("{POOL}-{A}-0x1234")).await,
        Err(ScreenerError::AddressFormat(_))
    ));
    assert!(matches!(
        screener.pair(&format!("{POOL}-{A}-{UNDERLYING}")).await,
        Err(ScreenerError::NotFound(_))
    ));
    assert!(matches!(
        screener.pair(&format!("{B}-{A}-{POOL}")).await,
        Err(ScreenerError::NotFound(_))
    ));

    // Both assets are in the pool, but only the ascending form is a pair id.
    assert!(matches!(
        screener.pair(&format!("{POOL}-{B}-{A}")).await,
        Err(ScreenerError::NotFound(_))
    ));
    assert!(matches!(
        screener.pair(&format!("{POOL}-{A}-{A_CS}")).await,
        Err(ScreenerError::NotFound(_))
    ));
    let pair = screener.pair(&format!("{POOL_CS}-{A_CS}-{B}")).await.unwrap().pair;
    assert_eq!(pair.asset0_id, A_CS);
    assert!(pair.pool.pair_ids.contains(&pair.id));
}

#[tokio::test]
async fn test_asset_lookup() {
    let chain = FakeChain {
        tokens: HashMap::from([(Address::from_str(UNDERLYING).unwrap(), usdc_metadata())]),
        ..Default::default()
    };
    let (screener, _) = screener(FakeSubgraph::default(), chain, FakeTokenApi::default());

    let asset = screener.asset(UNDERLYING).await.unwrap().asset;
    assert_eq!(asset.id, UNDERLYING_CS);
    assert_eq!(asset.symbol, "USDC");
    assert_eq!(asset.total_supply, "1.5");

    assert!(matches!(
        screener.asset(A).await,
        Err(ScreenerError::NotFound(_))
    ));
    assert!(matches!(
        screener.asset("0xnothex").await,
        Err(ScreenerError::AddressFormat(_))
    ));
}

#[tokio::test]
async fn test_latest_block_reads_chain_when_timestamp_missing() {
    let subgraph = FakeSubgraph {
        meta: Some(MetaBlock {
            number: 123,
            timestamp: None,
        }),
        ..Default::default()
    };
    let chain = FakeChain {
        timestamps: HashMap::from([(123, 1_700_000_123)]),
        ..Default::default()
    };
    let (screener, _) = screener(subgraph, chain, FakeTokenApi::default());

    let latest = screener.latest_block().await.unwrap();
    assert_eq!(latest.block.block_number, 123);
    assert_eq!(latest.block.block_timestamp, 1_700_000_123);
}

#[tokio::test]
async fn test_hub_rejects_unknown_chain() {
    let (screener, _) = screener(
        FakeSubgraph::default(),
        FakeChain::default(),
        FakeTokenApi::default(),
    );
    let hub = ScreenerHub::new([screener]);

    assert_eq!(hub.supported_chains(), vec!["mainnet"]);
    assert!(hub.screener("Mainnet").is_ok());
    assert!(matches!(
        hub.screener("fantom"),
        Err(ScreenerError::UnsupportedChain(_))
    ));
}
