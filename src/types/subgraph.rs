// Records as the Balancer V3 subgraph returns them. BigInt fields arrive as
// JSON strings, so integer fields accept either strings or numbers.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Num(u64),
}

pub(crate) fn de_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Num(n) => Ok(n),
        StringOrNumber::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn de_u8<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = de_u64(deserializer)?;
    u8::try_from(value).map_err(serde::de::Error::custom)
}

fn de_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::Num(n)) => Ok(Some(n)),
        Some(StringOrNumber::Str(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Entity references come back either as a bare id or as `{ "id": ... }`.
fn de_entity_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum EntityRef {
        Id(String),
        Object { id: String },
    }

    Ok(match EntityRef::deserialize(deserializer)? {
        EntityRef::Id(id) => id,
        EntityRef::Object { id } => id,
    })
}

/// One constituent token of a pool with its balance at the snapshot block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolToken {
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(deserialize_with = "de_u8", default)]
    pub decimals: u8,
    /// Decimal string exactly as indexed; never re-parsed.
    #[serde(default)]
    pub balance: String,
}

/// Token identity without a balance, used for underlying-asset substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Pool snapshot. Balances are point-in-time for the block it was fetched at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    /// Fraction of whole, e.g. "0.001" for 0.1%.
    #[serde(default)]
    pub swap_fee: String,
    #[serde(deserialize_with = "de_u64", default)]
    pub created_at_block: u64,
    #[serde(deserialize_with = "de_u64", default)]
    pub created_at_timestamp: u64,
    #[serde(default)]
    pub created_at_tx: String,
    /// Factory that deployed the pool.
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub tokens: Vec<PoolToken>,
}

impl Pool {
    /// Position of `address` in the token list, compared case-insensitively.
    pub fn token_index(&self, address: &str) -> Option<usize> {
        self.tokens
            .iter()
            .position(|t| t.address.eq_ignore_ascii_case(address))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Swap {
    pub id: String,
    #[serde(deserialize_with = "de_entity_id")]
    pub pool: String,
    pub token_in: String,
    pub token_out: String,
    pub token_amount_in: String,
    pub token_amount_out: String,
    #[serde(deserialize_with = "de_u64")]
    pub block_number: u64,
    #[serde(deserialize_with = "de_u64")]
    pub block_timestamp: u64,
    pub transaction_hash: String,
    #[serde(deserialize_with = "de_u64")]
    pub log_index: u64,
    #[serde(deserialize_with = "de_entity_id")]
    pub user: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AddRemoveType {
    Add,
    Remove,
    #[serde(other)]
    Unknown,
}

/// A liquidity deposit or withdrawal. `amounts` is aligned positionally with
/// `pool.tokens`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRemove {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AddRemoveType,
    #[serde(default)]
    pub amounts: Vec<String>,
    pub pool: Pool,
    #[serde(deserialize_with = "de_entity_id")]
    pub user: String,
    #[serde(deserialize_with = "de_u64")]
    pub block_number: u64,
    #[serde(deserialize_with = "de_u64")]
    pub block_timestamp: u64,
    pub transaction_hash: String,
    #[serde(deserialize_with = "de_u64")]
    pub log_index: u64,
}

/// Latest block indexed by the subgraph (`_meta.block`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetaBlock {
    #[serde(deserialize_with = "de_u64")]
    pub number: u64,
    #[serde(deserialize_with = "de_opt_u64", default)]
    pub timestamp: Option<u64>,
}
