//! # Balancer DEX Screener
//!
//! A DEX-Screener-compatible view over Balancer V3 pools on several EVM chains.
//! Pairs, assets and events are derived on every request from freshly fetched
//! subgraph data; nothing is persisted.
//!
//! ## Overview
//!
//! - **Pair identity**: pairs are derived from a pool's token list as
//!   `{pool}-{asset0}-{asset1}`, one per unordered token combination
//! - **Underlying resolution**: ERC-4626 wrappers in boosted pools are shown as
//!   the asset they wrap
//! - **Event normalization**: swaps and liquidity adds/removes become a single
//!   deterministically ordered stream of swap, join and exit events
//!
//! ## Architecture
//!
//! ### Collaborators
//! The subgraph, the chain (through Multicall3) and the Balancer token API are
//! reached through traits, so every pipeline stage can run against fakes.
//!
//! ### Pipeline
//! [`event_engine::EventNormalizer`] fetches a block range, resolves tokens,
//! looks up per-block pool snapshots for reserves and merges the result.
//!
//! ### Surface
//! [`screener::ScreenerHub`] maps chain slugs to per-chain
//! [`screener::Screener`]s; the `screener_server` binary exposes them over HTTP.

// Core Types
/// Error taxonomy
pub mod errors;
/// Subgraph records, normalized events and response envelopes
pub mod types;

// Pure Derivations
/// Pair id derivation, parsing and matching
pub mod pair_id;
/// Price, reserve and fee computation
pub mod normalization;

// Collaborators
/// Subgraph client
pub mod subgraph;
/// Multicall batch RPC utilities
pub mod multicall;
/// ERC-20 metadata and block reads
pub mod chain_reader;
/// Balancer API token list
pub mod token_registry;
/// Smart contract ABIs (read-only)
pub mod contracts;

// Pipeline
/// Wrapped to underlying token substitution with per-chain caching
pub mod underlying_cache;
/// Block-range event normalization
pub mod event_engine;
/// Per-chain query façade and multi-chain hub
pub mod screener;

// Infrastructure
/// Supported chains and their endpoints
pub mod chains;
/// Metrics and observability
pub mod metrics;
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use chains::{ChainConfig, ChainRegistry};
pub use errors::{Result, ScreenerError};
pub use event_engine::EventNormalizer;
pub use screener::{Screener, ScreenerHub};
pub use settings::Settings;
pub use types::NormalizedEvent;
