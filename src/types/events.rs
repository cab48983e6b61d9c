use crate::errors::Result;
use crate::pair_id::checksum_pair_id;
use crate::types::conversions::checksum_address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBlock {
    pub block_number: u64,
    pub block_timestamp: u64,
}

/// Balances of the two pair assets at the event's block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserves {
    pub asset0: String,
    pub asset1: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapEvent {
    pub block: EventBlock,
    pub txn_id: String,
    pub txn_index: u64,
    pub event_index: u64,
    pub maker: String,
    pub pair_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub asset0_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub asset1_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub asset0_out: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub asset1_out: Option<String>,
    pub price_native: String,
    pub reserves: Option<Reserves>,
}

/// Payload shared by joins and exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityEvent {
    pub block: EventBlock,
    pub txn_id: String,
    pub txn_index: u64,
    pub event_index: u64,
    pub maker: String,
    pub pair_id: String,
    pub amount0: String,
    pub amount1: String,
    pub reserves: Option<Reserves>,
}

/// Output unit of the event listing, tagged on the wire by `eventType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "lowercase")]
pub enum NormalizedEvent {
    Swap(SwapEvent),
    Join(LiquidityEvent),
    Exit(LiquidityEvent),
}

impl NormalizedEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            NormalizedEvent::Swap(_) => "swap",
            NormalizedEvent::Join(_) => "join",
            NormalizedEvent::Exit(_) => "exit",
        }
    }

    pub fn block(&self) -> EventBlock {
        match self {
            NormalizedEvent::Swap(e) => e.block,
            NormalizedEvent::Join(e) | NormalizedEvent::Exit(e) => e.block,
        }
    }

    pub fn txn_index(&self) -> u64 {
        match self {
            NormalizedEvent::Swap(e) => e.txn_index,
            NormalizedEvent::Join(e) | NormalizedEvent::Exit(e) => e.txn_index,
        }
    }

    pub fn pair_id(&self) -> &str {
        match self {
            NormalizedEvent::Swap(e) => &e.pair_id,
            NormalizedEvent::Join(e) | NormalizedEvent::Exit(e) => &e.pair_id,
        }
    }

    pub fn reserves(&self) -> Option<&Reserves> {
        match self {
            NormalizedEvent::Swap(e) => e.reserves.as_ref(),
            NormalizedEvent::Join(e) | NormalizedEvent::Exit(e) => e.reserves.as_ref(),
        }
    }

    /// Rewrites the pair id and maker into checksum form.
    pub fn checksummed(self) -> Result<Self> {
        Ok(match self {
            NormalizedEvent::Swap(mut e) => {
                e.pair_id = checksum_pair_id(&e.pair_id)?;
                e.maker = checksum_address(&e.maker)?;
                NormalizedEvent::Swap(e)
            }
            NormalizedEvent::Join(e) => NormalizedEvent::Join(checksum_liquidity(e)?),
            NormalizedEvent::Exit(e) => NormalizedEvent::Exit(checksum_liquidity(e)?),
        })
    }
}

fn checksum_liquidity(mut event: LiquidityEvent) -> Result<LiquidityEvent> {
    event.pair_id = checksum_pair_id(&event.pair_id)?;
    event.maker = checksum_address(&event.maker)?;
    Ok(event)
}
