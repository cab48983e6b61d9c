//! On-chain reads: ERC-20 metadata through Multicall3, and block timestamps.

use crate::chains::ChainRegistry;
use crate::contracts::Erc20;
use crate::errors::{Result, ScreenerError};
use crate::multicall::{Call, Multicall};
use crate::settings::ChainReadSettings;
use crate::types::conversions::string_to_address;
use async_trait::async_trait;
use ethers::abi::{Function, Token};
use ethers::prelude::*;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// ERC-20 metadata for one token. Fields are `None` when the call reverted or
/// returned something that does not decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub address: Address,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub total_supply: Option<U256>,
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Metadata for `tokens`, in input order.
    async fn token_metadata(&self, chain: &str, tokens: &[Address]) -> Result<Vec<TokenMetadata>>;

    async fn block_timestamp(&self, chain: &str, block_number: u64) -> Result<u64>;
}

/// [`ChainReader`] over JSON-RPC, one HTTP provider per chain.
pub struct EthersChainReader {
    providers: HashMap<String, Arc<Provider<Http>>>,
    multicall_address: Address,
    batch_size: usize,
}

impl EthersChainReader {
    pub fn new(registry: &ChainRegistry, settings: &ChainReadSettings) -> anyhow::Result<Self> {
        let multicall_address = string_to_address(&settings.multicall_address)?;
        let mut providers = HashMap::new();
        for chain in registry.iter() {
            let provider = Provider::<Http>::try_from(chain.rpc_endpoint.as_str())?;
            providers.insert(chain.slug.clone(), Arc::new(provider));
        }

        Ok(Self {
            providers,
            multicall_address,
            batch_size: settings.multicall_batch_size,
        })
    }

    fn provider(&self, chain: &str) -> Result<Arc<Provider<Http>>> {
        self.providers
            .get(&chain.to_lowercase())
            .cloned()
            .ok_or_else(|| ScreenerError::UnsupportedChain(chain.to_string()))
    }
}

fn abi_function<'a>(contract: &'a Erc20<Provider<Http>>, name: &str) -> Result<&'a Function> {
    contract
        .abi()
        .function(name)
        .map_err(|e| ScreenerError::chain_read(format!("ERC-20 ABI lookup failed: {e}")))
}

fn encode(function: &Function) -> Result<Bytes> {
    function
        .encode_input(&[])
        .map(Bytes::from)
        .map_err(|e| ScreenerError::chain_read(format!("ERC-20 encode failed: {e}")))
}

fn first_token(function: &Function, data: &Option<Bytes>) -> Option<Token> {
    let data = data.as_ref().filter(|d| !d.is_empty())?;
    function.decode_output(data).ok()?.into_iter().next()
}

/// Strings, with a fallback for legacy tokens that return `bytes32`.
fn decode_text(function: &Function, data: &Option<Bytes>) -> Option<String> {
    if let Some(text) = first_token(function, data).and_then(|t| t.into_string()) {
        return Some(text);
    }
    let raw = data.as_ref().filter(|d| d.len() == 32)?;
    let trimmed: Vec<u8> = raw.iter().copied().take_while(|b| *b != 0).collect();
    String::from_utf8(trimmed).ok().filter(|s| !s.is_empty())
}

#[async_trait]
impl ChainReader for EthersChainReader {
    async fn token_metadata(&self, chain: &str, tokens: &[Address]) -> Result<Vec<TokenMetadata>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let provider = self.provider(chain)?;
        let multicall = Multicall::new(provider.clone(), self.multicall_address, self.batch_size);

        let dummy = Erc20::new(Address::zero(), provider);
        let name_fn = abi_function(&dummy, "name")?;
        let symbol_fn = abi_function(&dummy, "symbol")?;
        let decimals_fn = abi_function(&dummy, "decimals")?;
        let supply_fn = abi_function(&dummy, "totalSupply")?;
        let selectors = [
            encode(name_fn)?,
            encode(symbol_fn)?,
            encode(decimals_fn)?,
            encode(supply_fn)?,
        ];

        let calls: Vec<Call> = tokens
            .iter()
            .flat_map(|&target| {
                selectors.iter().map(move |call_data| Call {
                    target,
                    call_data: call_data.clone(),
                })
            })
            .collect();
        debug!("Fetching metadata for {} tokens on {}", tokens.len(), chain);
        let results = multicall.run(calls, None).await?;

        Ok(tokens
            .iter()
            .zip(results.chunks(selectors.len()))
            .map(|(&address, slots)| TokenMetadata {
                address,
                name: decode_text(name_fn, &slots[0]),
                symbol: decode_text(symbol_fn, &slots[1]),
                decimals: first_token(decimals_fn, &slots[2])
                    .and_then(|t| t.into_uint())
                    .filter(|d| *d <= U256::from(u8::MAX))
                    .map(|d| d.as_u32() as u8),
                total_supply: first_token(supply_fn, &slots[3]).and_then(|t| t.into_uint()),
            })
            .collect())
    }

    async fn block_timestamp(&self, chain: &str, block_number: u64) -> Result<u64> {
        let provider = self.provider(chain)?;
        let block = provider
            .get_block(block_number)
            .await
            .map_err(|e| ScreenerError::chain_read(format!("eth_getBlockByNumber failed: {e}")))?
            .ok_or_else(|| ScreenerError::NotFound(format!("block {block_number} on {chain}")))?;
        Ok(block.timestamp.low_u64())
    }
}
