//! # Event normalization
//!
//! Turns a block range of raw subgraph swaps and liquidity adds/removes into the
//! screener's event stream:
//!
//! 1. Fetch both listings concurrently. Either failing fails the request.
//! 2. Substitute underlying tokens for wrapped ones.
//! 3. Fetch every `(block, pool)` snapshot the range touches, once each. A
//!    failed snapshot only costs the affected events their reserves.
//! 4. Convert swaps and adds/removes into one event per matching pair.
//! 5. Checksum every address and sort by `(blockNumber, txnIndex)`.
//!
//! `txnIndex` is a record's position within its transaction's records of the
//! same kind, so it restarts at zero in every transaction. The final sort uses
//! it as the only tie-break inside a block and is stable.

use crate::errors::{Result, ScreenerError};
use crate::metrics;
use crate::normalization::{calculate_price, calculate_reserves};
use crate::pair_id::{
    derive_pair_ids, format_pair_id, is_add_remove_for_pair, is_swap_for_pair, parse_pair_id,
    PairId,
};
use crate::subgraph::SubgraphClient;
use crate::types::{
    AddRemove, AddRemoveType, EventBlock, LiquidityEvent, NormalizedEvent, Pool, Reserves, Swap,
    SwapEvent,
};
use crate::underlying_cache::{UnderlyingMapping, UnderlyingTokenCache};
use futures::stream::{self, StreamExt};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Snapshot lookups in flight at once for a single request.
const SNAPSHOT_CONCURRENCY: usize = 8;

/// Pool snapshots keyed by `(block, lowercase pool address)`. `None` records a
/// lookup that failed or found nothing.
#[derive(Debug, Default, Clone)]
pub struct PoolSnapshots {
    pools: HashMap<(u64, String), Option<Pool>>,
}

impl PoolSnapshots {
    pub fn insert(&mut self, block_number: u64, pool_address: &str, pool: Option<Pool>) {
        self.pools
            .insert((block_number, pool_address.to_lowercase()), pool);
    }

    pub fn get(&self, block_number: u64, pool_address: &str) -> Option<&Pool> {
        self.pools
            .get(&(block_number, pool_address.to_lowercase()))
            .and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

pub struct EventNormalizer {
    chain_slug: String,
    subgraph: Arc<dyn SubgraphClient>,
    underlying: Arc<UnderlyingTokenCache>,
}

impl EventNormalizer {
    pub fn new(
        chain_slug: impl Into<String>,
        subgraph: Arc<dyn SubgraphClient>,
        underlying: Arc<UnderlyingTokenCache>,
    ) -> Self {
        Self {
            chain_slug: chain_slug.into(),
            subgraph,
            underlying,
        }
    }

    /// Normalized events for `from_block..=to_block`.
    pub async fn events(&self, from_block: u64, to_block: u64) -> Result<Vec<NormalizedEvent>> {
        if from_block > to_block {
            return Err(ScreenerError::Format(format!(
                "fromBlock {from_block} is greater than toBlock {to_block}"
            )));
        }

        let span = info_span!("events", chain = %self.chain_slug, from_block, to_block);
        async move {
            let (swaps, add_removes) = tokio::try_join!(
                self.subgraph.swaps(from_block, to_block),
                self.subgraph.add_removes(from_block, to_block)
            )?;
            debug!(swaps = swaps.len(), add_removes = add_removes.len(), "fetched listings");

            let mapping = self.underlying.get_mapping(&self.chain_slug).await?;
            let swaps = mapping.resolve_in_swaps(swaps);
            let add_removes = mapping.resolve_in_add_removes(add_removes);

            let keys = snapshot_keys(&swaps, &add_removes);
            let snapshots = fetch_snapshots(self.subgraph.as_ref(), &mapping, keys).await;
            debug!(snapshots = snapshots.len(), "fetched pool snapshots");

            let swap_events = convert_swaps(&swaps, &snapshots)?;
            let liquidity_events = convert_add_removes(&add_removes, &snapshots)?;
            record_counts(&swap_events, &liquidity_events);

            let events = merge_events(swap_events, liquidity_events)?;
            info!(events = events.len(), "normalized events");
            Ok::<_, ScreenerError>(events)
        }
        .instrument(span)
        .await
    }
}

/// Distinct `(block, pool)` pairs touched by the range, in first-seen order.
pub fn snapshot_keys(swaps: &[Swap], add_removes: &[AddRemove]) -> Vec<(u64, String)> {
    let swap_keys = swaps
        .iter()
        .map(|s| (s.block_number, s.pool.to_lowercase()));
    let add_remove_keys = add_removes
        .iter()
        .map(|r| (r.block_number, r.pool.address.to_lowercase()));
    swap_keys
        .chain(add_remove_keys)
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Fetches each pool at its block. Failures degrade to a `None` snapshot.
pub async fn fetch_snapshots(
    subgraph: &dyn SubgraphClient,
    mapping: &UnderlyingMapping,
    keys: Vec<(u64, String)>,
) -> PoolSnapshots {
    let results: Vec<_> = stream::iter(keys)
        .map(|(block_number, pool_address)| async move {
            let pool = match subgraph.pool(&pool_address, Some(block_number)).await {
                Ok(Some(pool)) => Some(mapping.resolve_in_pool(pool)),
                Ok(None) => {
                    warn!(pool = %pool_address, block_number, "pool missing at block");
                    None
                }
                Err(e) => {
                    warn!(pool = %pool_address, block_number, error = %e, "pool snapshot failed");
                    None
                }
            };
            if pool.is_none() {
                metrics::increment_reserves_lookup_failure();
            }
            (block_number, pool_address, pool)
        })
        .buffer_unordered(SNAPSHOT_CONCURRENCY)
        .collect()
        .await;

    let mut snapshots = PoolSnapshots::default();
    for (block_number, pool_address, pool) in results {
        snapshots.insert(block_number, &pool_address, pool);
    }
    snapshots
}

fn reserves_for(snapshot: Option<&Pool>, pair: &PairId) -> Option<Reserves> {
    snapshot.and_then(|pool| calculate_reserves(&pool.tokens, &pair.asset0, &pair.asset1))
}

/// Groups `records` by transaction hash (first-seen order) and sorts each
/// transaction's records by log index.
fn by_transaction<'a, T>(
    records: impl IntoIterator<Item = &'a T>,
    tx_hash: impl Fn(&T) -> &str,
    log_index: impl Fn(&T) -> u64,
) -> IndexMap<String, Vec<&'a T>>
where
    T: 'a,
{
    let mut groups: IndexMap<String, Vec<&'a T>> = IndexMap::new();
    for record in records {
        groups
            .entry(tx_hash(record).to_lowercase())
            .or_default()
            .push(record);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|r| log_index(r));
    }
    groups
}

/// Pair ids a swap belongs to. Without a snapshot the pair is built from the
/// swap's own tokens.
fn swap_pairs(swap: &Swap, snapshot: Option<&Pool>) -> Result<Vec<PairId>> {
    let candidates = match snapshot {
        Some(pool) => derive_pair_ids(pool),
        None => vec![format_pair_id(&swap.pool, &swap.token_in, &swap.token_out)],
    };

    let mut pairs = Vec::new();
    for id in candidates {
        let pair = parse_pair_id(&id)?;
        if is_swap_for_pair(&pair, &swap.token_in, &swap.token_out) {
            pairs.push(pair);
        }
    }
    Ok(pairs)
}

fn swap_event(swap: &Swap, pair: &PairId, txn_index: u64, snapshot: Option<&Pool>) -> SwapEvent {
    let token_in_is_asset0 = swap.token_in.eq_ignore_ascii_case(&pair.asset0);
    let amount_in = swap.token_amount_in.clone();
    let amount_out = swap.token_amount_out.clone();

    let (asset0_amount, asset1_amount) = if token_in_is_asset0 {
        (&swap.token_amount_in, &swap.token_amount_out)
    } else {
        (&swap.token_amount_out, &swap.token_amount_in)
    };
    let price_native = calculate_price(asset0_amount, asset1_amount);

    let (asset0_in, asset1_in, asset0_out, asset1_out) = if token_in_is_asset0 {
        (Some(amount_in), None, None, Some(amount_out))
    } else {
        (None, Some(amount_in), Some(amount_out), None)
    };

    SwapEvent {
        block: EventBlock {
            block_number: swap.block_number,
            block_timestamp: swap.block_timestamp,
        },
        txn_id: swap.transaction_hash.clone(),
        txn_index,
        event_index: swap.log_index,
        maker: swap.user.clone(),
        pair_id: pair.to_string(),
        asset0_in,
        asset1_in,
        asset0_out,
        asset1_out,
        price_native,
        reserves: reserves_for(snapshot, pair),
    }
}

/// One swap event per `(swap, matching pair)`.
pub fn convert_swaps(swaps: &[Swap], snapshots: &PoolSnapshots) -> Result<Vec<NormalizedEvent>> {
    let mut groups: IndexMap<(u64, String), Vec<&Swap>> = IndexMap::new();
    for swap in swaps {
        groups
            .entry((swap.block_number, swap.pool.to_lowercase()))
            .or_default()
            .push(swap);
    }

    let mut events = Vec::new();
    for ((block_number, pool_address), group) in groups {
        let snapshot = snapshots.get(block_number, &pool_address);
        let transactions = by_transaction(group, |s| s.transaction_hash.as_str(), |s| s.log_index);

        for txn_swaps in transactions.values() {
            for (txn_index, swap) in txn_swaps.iter().enumerate() {
                for pair in swap_pairs(swap, snapshot)? {
                    events.push(NormalizedEvent::Swap(swap_event(
                        swap,
                        &pair,
                        txn_index as u64,
                        snapshot,
                    )));
                }
            }
        }
    }
    Ok(events)
}

/// Amount for `asset`, read by its position in the record's embedded pool.
fn amount_for(record: &AddRemove, asset: &str) -> String {
    record
        .pool
        .token_index(asset)
        .and_then(|index| record.amounts.get(index))
        .cloned()
        .unwrap_or_else(|| "0".to_string())
}

/// One join/exit per `(record, matching pair)`.
pub fn convert_add_removes(
    records: &[AddRemove],
    snapshots: &PoolSnapshots,
) -> Result<Vec<NormalizedEvent>> {
    let transactions = by_transaction(records, |r| r.transaction_hash.as_str(), |r| r.log_index);

    let mut events = Vec::new();
    for txn_records in transactions.values() {
        for (txn_index, record) in txn_records.iter().enumerate() {
            let snapshot = snapshots.get(record.block_number, &record.pool.address);

            for id in derive_pair_ids(&record.pool) {
                let pair = parse_pair_id(&id)?;
                if !is_add_remove_for_pair(&pair, &record.pool) {
                    continue;
                }

                let event = LiquidityEvent {
                    block: EventBlock {
                        block_number: record.block_number,
                        block_timestamp: record.block_timestamp,
                    },
                    txn_id: record.transaction_hash.clone(),
                    txn_index: txn_index as u64,
                    event_index: record.log_index,
                    maker: record.user.clone(),
                    pair_id: pair.to_string(),
                    amount0: amount_for(record, &pair.asset0),
                    amount1: amount_for(record, &pair.asset1),
                    reserves: reserves_for(snapshot, &pair),
                };
                events.push(match record.kind {
                    AddRemoveType::Add => NormalizedEvent::Join(event),
                    _ => NormalizedEvent::Exit(event),
                });
            }
        }
    }
    Ok(events)
}

/// Concatenates, checksums and stable-sorts by `(blockNumber, txnIndex)`.
pub fn merge_events(
    swaps: Vec<NormalizedEvent>,
    liquidity: Vec<NormalizedEvent>,
) -> Result<Vec<NormalizedEvent>> {
    let mut events = swaps
        .into_iter()
        .chain(liquidity)
        .map(NormalizedEvent::checksummed)
        .collect::<Result<Vec<_>>>()?;
    events.sort_by_key(|e| (e.block().block_number, e.txn_index()));
    Ok(events)
}

fn record_counts(swaps: &[NormalizedEvent], liquidity: &[NormalizedEvent]) {
    let joins = liquidity
        .iter()
        .filter(|e| matches!(e, NormalizedEvent::Join(_)))
        .count();
    metrics::record_normalized_events("swap", swaps.len() as u64);
    metrics::record_normalized_events("join", joins as u64);
    metrics::record_normalized_events("exit", (liquidity.len() - joins) as u64);
}
