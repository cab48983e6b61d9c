//! # Subgraph client
//!
//! Read-only access to a chain's Balancer V3 subgraph. Listings are paginated by
//! id cursor: each page asks for records with `id > lastId`, and the listing ends
//! at the first page shorter than the page size.
//!
//! Requests go through a per-client rate limiter and are retried with exponential
//! backoff before a failure is surfaced as [`ScreenerError::Upstream`].

use crate::errors::{Result, ScreenerError};
use crate::metrics;
use crate::settings::SubgraphSettings;
use crate::types::{AddRemove, MetaBlock, Pool, Swap};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use url::Url;

const POOL_FIELDS: &str = r#"
fragment PoolFields on Pool {
  address
  name
  symbol
  swapFee
  createdAtBlock: blockNumber
  createdAtTimestamp: blockTimestamp
  createdAtTx: transactionHash
  creator: factory
  tokens(orderBy: index, orderDirection: asc) {
    address
    name
    symbol
    decimals
    balance
  }
}
"#;

const SWAPS_QUERY: &str = r#"
query Swaps($fromBlock: BigInt!, $toBlock: BigInt!, $first: Int!, $lastId: Bytes!) {
  items: swaps(
    first: $first
    orderBy: id
    orderDirection: asc
    where: { blockNumber_gte: $fromBlock, blockNumber_lte: $toBlock, id_gt: $lastId }
  ) {
    id
    pool
    tokenIn
    tokenOut
    tokenAmountIn
    tokenAmountOut
    blockNumber
    blockTimestamp
    transactionHash
    logIndex
    user { id }
  }
}
"#;

const ADD_REMOVES_QUERY: &str = r#"
query AddRemoves($fromBlock: BigInt!, $toBlock: BigInt!, $first: Int!, $lastId: Bytes!) {
  items: addRemoves(
    first: $first
    orderBy: id
    orderDirection: asc
    where: { blockNumber_gte: $fromBlock, blockNumber_lte: $toBlock, id_gt: $lastId }
  ) {
    id
    type
    amounts
    blockNumber
    blockTimestamp
    transactionHash
    logIndex
    user { id }
    pool { ...PoolFields }
  }
}
"#;

const POOL_QUERY: &str = r#"
query Pool($id: ID!, $block: Block_height) {
  pool(id: $id, block: $block) { ...PoolFields }
}
"#;

const META_QUERY: &str = r#"
query Meta {
  _meta { block { number timestamp } }
}
"#;

/// Cursor value that sorts before every entity id.
const INITIAL_CURSOR: &str = "0x";

/// Read-only view of one chain's subgraph.
#[async_trait]
pub trait SubgraphClient: Send + Sync {
    /// All swaps with `from_block <= blockNumber <= to_block`.
    async fn swaps(&self, from_block: u64, to_block: u64) -> Result<Vec<Swap>>;

    /// All liquidity adds/removes with `from_block <= blockNumber <= to_block`.
    async fn add_removes(&self, from_block: u64, to_block: u64) -> Result<Vec<AddRemove>>;

    /// Pool state, pinned to `block` when given. `None` when the pool does not
    /// exist at that height.
    async fn pool(&self, address: &str, block: Option<u64>) -> Result<Option<Pool>>;

    async fn latest_block(&self) -> Result<MetaBlock>;
}

/// Entities that can seed the next page's cursor.
trait Paginated {
    fn cursor(&self) -> &str;
}

impl Paginated for Swap {
    fn cursor(&self) -> &str {
        &self.id
    }
}

impl Paginated for AddRemove {
    fn cursor(&self) -> &str {
        &self.id
    }
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct Page<T> {
    items: Vec<T>,
}

#[derive(Deserialize)]
struct PoolData {
    pool: Option<Pool>,
}

#[derive(Deserialize)]
struct MetaInner {
    block: MetaBlock,
}

#[derive(Deserialize)]
struct MetaData {
    #[serde(rename = "_meta")]
    meta: MetaInner,
}

/// [`SubgraphClient`] over HTTP GraphQL.
pub struct GraphQlSubgraphClient {
    endpoint: Url,
    client: reqwest::Client,
    limiter: Arc<DefaultDirectRateLimiter>,
    page_size: usize,
    max_retries: usize,
    retry_base_delay_ms: u64,
}

impl GraphQlSubgraphClient {
    pub fn new(endpoint: Url, settings: &SubgraphSettings) -> Result<Self> {
        let qps = NonZeroU32::new(settings.qps_limit)
            .ok_or_else(|| ScreenerError::Format("subgraph QPS must be non-zero".into()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(ScreenerError::subgraph)?;

        Ok(Self {
            endpoint,
            client,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(qps))),
            page_size: settings.page_size.max(1),
            max_retries: settings.max_retries,
            retry_base_delay_ms: settings.retry_base_delay_ms.max(2),
        })
    }

    async fn send_once<T: DeserializeOwned>(&self, query: &str, variables: &Value) -> Result<T> {
        self.limiter.until_ready().await;

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| ScreenerError::subgraph(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScreenerError::subgraph(format!("HTTP error: {status}")));
        }

        let body: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| ScreenerError::subgraph(format!("JSON parse failed: {e}")))?;

        if !body.errors.is_empty() {
            let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(ScreenerError::subgraph(messages.join("; ")));
        }
        body.data
            .ok_or_else(|| ScreenerError::subgraph("response carried neither data nor errors"))
    }

    async fn query<T: DeserializeOwned>(
        &self,
        name: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<T> {
        metrics::increment_subgraph_request(name);

        // Delays: base, 2*base, 4*base, ... capped at 5s.
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.retry_base_delay_ms / 2)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(self.max_retries);

        let variables = &variables;
        let mut attempt = 0usize;
        let result = Retry::start(strategy, || {
            attempt += 1;
            let current = attempt;
            async move {
                let outcome = self.send_once::<T>(query, variables).await;
                if let Err(e) = &outcome {
                    warn!("Subgraph {} attempt {} failed: {}", name, current, e);
                }
                outcome
            }
        })
        .await;

        if result.is_err() {
            metrics::increment_subgraph_failure(name);
        }
        result
    }

    async fn paginate<T>(
        &self,
        name: &'static str,
        query: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Paginated,
    {
        let mut records = Vec::new();
        let mut last_id = INITIAL_CURSOR.to_string();

        loop {
            let variables = json!({
                "fromBlock": from_block.to_string(),
                "toBlock": to_block.to_string(),
                "first": self.page_size,
                "lastId": last_id,
            });
            let page: Page<T> = self.query(name, query, variables).await?;
            let fetched = page.items.len();
            if let Some(last) = page.items.last() {
                last_id = last.cursor().to_string();
            }
            records.extend(page.items);
            debug!(
                "Subgraph {}: fetched page of {} (total {}) for blocks {}..={}",
                name,
                fetched,
                records.len(),
                from_block,
                to_block
            );

            if fetched < self.page_size {
                break;
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl SubgraphClient for GraphQlSubgraphClient {
    async fn swaps(&self, from_block: u64, to_block: u64) -> Result<Vec<Swap>> {
        self.paginate("swaps", SWAPS_QUERY, from_block, to_block).await
    }

    async fn add_removes(&self, from_block: u64, to_block: u64) -> Result<Vec<AddRemove>> {
        let query = format!("{ADD_REMOVES_QUERY}{POOL_FIELDS}");
        self.paginate("add_removes", &query, from_block, to_block)
            .await
    }

    async fn pool(&self, address: &str, block: Option<u64>) -> Result<Option<Pool>> {
        let query = format!("{POOL_QUERY}{POOL_FIELDS}");
        let variables = json!({
            "id": address.to_lowercase(),
            "block": block.map(|number| json!({ "number": number })),
        });
        let data: PoolData = self.query("pool", &query, variables).await?;
        Ok(data.pool)
    }

    async fn latest_block(&self) -> Result<MetaBlock> {
        let data: MetaData = self.query("meta", META_QUERY, json!({})).await?;
        Ok(data.meta.block)
    }
}
