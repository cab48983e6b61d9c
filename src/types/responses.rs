// Response envelopes of the DEX Screener adapter protocol.

use super::events::{EventBlock, NormalizedEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestBlockResponse {
    pub block: EventBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub symbol: String,
    /// Human units (raw supply scaled down by the token's decimals).
    pub total_supply: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub circulating_supply: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetResponse {
    pub asset: Asset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairPool {
    pub id: String,
    pub name: String,
    pub asset_ids: Vec<String>,
    pub pair_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    pub id: String,
    pub dex_key: String,
    pub asset0_id: String,
    pub asset1_id: String,
    pub created_at_block_number: u64,
    pub created_at_block_timestamp: u64,
    pub created_at_txn_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub creator: Option<String>,
    pub fee_bps: f64,
    pub pool: PairPool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairResponse {
    pub pair: Pair,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<NormalizedEvent>,
}
