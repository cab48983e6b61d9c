//! # Pair identity
//!
//! A pair is never stored: it is derived from a pool's token list every time it is
//! needed. Its identifier is `{pool}-{asset0}-{asset1}` where the two assets are
//! ordered by case-insensitive comparison while keeping the case they were
//! indexed with. An n-token pool yields exactly C(n, 2) pairs.
//!
//! Parsing lower-cases every field, so parsed ids compare equal regardless of how
//! the caller cased them. Before an id leaves the crate it goes through
//! [`checksum_pair_id`], which rewrites each address into EIP-55 form.

use crate::errors::{Result, ScreenerError};
use crate::types::conversions::checksum_address;
use crate::types::Pool;
use std::fmt;

pub const PAIR_ID_SEPARATOR: char = '-';

/// Parsed pair identifier. All fields are lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairId {
    pub pool_address: String,
    pub asset0: String,
    pub asset1: String,
}

impl PairId {
    pub fn parse(id: &str) -> Result<Self> {
        parse_pair_id(id)
    }

    /// True when the assets are distinct and in ascending order, the only form
    /// [`derive_pair_ids`] ever produces.
    pub fn is_canonical(&self) -> bool {
        self.asset0 < self.asset1
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.pool_address,
            self.asset0,
            self.asset1,
            sep = PAIR_ID_SEPARATOR
        )
    }
}

/// Builds the canonical id for two tokens of `pool_address`, smaller address first.
pub fn format_pair_id(pool_address: &str, token_a: &str, token_b: &str) -> String {
    let (asset0, asset1) = if token_a.to_lowercase() <= token_b.to_lowercase() {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    };
    format!("{pool_address}{PAIR_ID_SEPARATOR}{asset0}{PAIR_ID_SEPARATOR}{asset1}")
}

/// Every pair id of `pool`, emitted in (i, j) order with i < j.
pub fn derive_pair_ids(pool: &Pool) -> Vec<String> {
    let tokens = &pool.tokens;
    if tokens.len() < 2 {
        return Vec::new();
    }

    let mut ids = Vec::with_capacity(tokens.len() * (tokens.len() - 1) / 2);
    for i in 0..tokens.len() {
        for j in (i + 1)..tokens.len() {
            ids.push(format_pair_id(
                &pool.address,
                &tokens[i].address,
                &tokens[j].address,
            ));
        }
    }
    ids
}

pub fn parse_pair_id(id: &str) -> Result<PairId> {
    let fields: Vec<&str> = id.split(PAIR_ID_SEPARATOR).collect();
    if fields.len() != 3 || fields.iter().any(|f| f.is_empty()) {
        return Err(ScreenerError::Format(format!(
            "pair id '{id}' must be <pool>-<asset0>-<asset1>"
        )));
    }

    Ok(PairId {
        pool_address: fields[0].to_lowercase(),
        asset0: fields[1].to_lowercase(),
        asset1: fields[2].to_lowercase(),
    })
}

/// True when the swap trades exactly the two assets of `pair`, in either direction.
pub fn is_swap_for_pair(pair: &PairId, token_in: &str, token_out: &str) -> bool {
    let token_in = token_in.to_lowercase();
    let token_out = token_out.to_lowercase();
    if token_in == token_out {
        return false;
    }

    let forward = token_in == pair.asset0 && token_out == pair.asset1;
    let reverse = token_in == pair.asset1 && token_out == pair.asset0;
    forward || reverse
}

/// True when `pool` is the pair's pool and holds both pair assets.
pub fn is_add_remove_for_pair(pair: &PairId, pool: &Pool) -> bool {
    if !pool.address.eq_ignore_ascii_case(&pair.pool_address) {
        return false;
    }
    pool.token_index(&pair.asset0).is_some() && pool.token_index(&pair.asset1).is_some()
}

pub fn checksum_pair(pair: &PairId) -> Result<PairId> {
    Ok(PairId {
        pool_address: checksum_address(&pair.pool_address)?,
        asset0: checksum_address(&pair.asset0)?,
        asset1: checksum_address(&pair.asset1)?,
    })
}

/// Parses `id` and renders it back with every address in checksum form.
pub fn checksum_pair_id(id: &str) -> Result<String> {
    let pair = parse_pair_id(id)?;
    Ok(checksum_pair(&pair)?.to_string())
}
