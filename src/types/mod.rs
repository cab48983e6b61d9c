//! Data model: subgraph wire records, normalized events and the
//! DEX-Screener response envelopes built from them.

pub mod conversions;
pub mod events;
pub mod responses;
pub mod subgraph;

pub use events::{EventBlock, LiquidityEvent, NormalizedEvent, Reserves, SwapEvent};
pub use subgraph::{AddRemove, AddRemoveType, MetaBlock, Pool, PoolToken, Swap, TokenInfo};
