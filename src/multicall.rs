use crate::errors::{Result, ScreenerError};
use ethers::abi::{Function, Param, ParamType, StateMutability, Token};
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use log::{debug, warn};
use std::sync::Arc;

/// Largest batch most public RPC providers accept in one `eth_call`.
const MAX_BATCH_SIZE: usize = 200;

/// A single read-only call to be batched in a multicall.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Call {
    pub target: Address,
    pub call_data: Bytes,
}

/// Batches contract reads through Multicall3 `aggregate3`.
///
/// Every call is sent with `allowFailure = true`; a reverted call yields `None`
/// in its slot instead of failing the whole batch. Identical calls are
/// coalesced before sending and fanned back out in the original order.
#[derive(Clone)]
pub struct Multicall<M: Middleware> {
    provider: Arc<M>,
    multicall_address: Address,
    batch_size: usize,
}

impl<M: Middleware + 'static> Multicall<M> {
    pub fn new(provider: Arc<M>, multicall_address: Address, batch_size: usize) -> Self {
        if batch_size > MAX_BATCH_SIZE {
            warn!(
                "Batch size {} exceeds recommended maximum ({}), capping",
                batch_size, MAX_BATCH_SIZE
            );
        }

        Self {
            provider,
            multicall_address,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    /// Runs `calls`, optionally at a specific block. The result has one entry
    /// per input call.
    pub async fn run(&self, calls: Vec<Call>, block: Option<BlockId>) -> Result<Vec<Option<Bytes>>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let mut unique_calls = indexmap::IndexSet::new();
        let original_indices: Vec<usize> = calls
            .iter()
            .map(|call| unique_calls.insert_full(call.clone()).0)
            .collect();
        debug!(
            "Multicall coalesced {} calls into {}",
            calls.len(),
            unique_calls.len()
        );

        let unique_calls: Vec<Call> = unique_calls.into_iter().collect();
        let mut unique_results: Vec<Option<Bytes>> = Vec::with_capacity(unique_calls.len());
        for chunk in unique_calls.chunks(self.batch_size) {
            let results = self.aggregate3(chunk, block).await?;
            if results.len() != chunk.len() {
                return Err(ScreenerError::chain_read(format!(
                    "multicall returned {} results for {} calls",
                    results.len(),
                    chunk.len()
                )));
            }
            unique_results.extend(results);
        }

        Ok(original_indices
            .into_iter()
            .map(|index| unique_results[index].clone())
            .collect())
    }

    async fn aggregate3(&self, calls: &[Call], block: Option<BlockId>) -> Result<Vec<Option<Bytes>>> {
        let call_tokens = calls
            .iter()
            .map(|call| {
                // Call3 { target, allowFailure, callData }
                Token::Tuple(vec![
                    Token::Address(call.target),
                    Token::Bool(true),
                    Token::Bytes(call.call_data.to_vec()),
                ])
            })
            .collect();

        let calldata = aggregate3_function()
            .encode_input(&[Token::Array(call_tokens)])
            .map_err(|e| ScreenerError::chain_read(format!("multicall encode failed: {e}")))?;

        let tx: TypedTransaction = TransactionRequest::new()
            .to(self.multicall_address)
            .data(calldata)
            .into();
        let response = self
            .provider
            .call(&tx, block)
            .await
            .map_err(|e| ScreenerError::chain_read(format!("multicall eth_call failed: {e}")))?;

        decode_results(&response)
    }
}

/// Decodes `aggregate3` return data; failed calls become `None`.
fn decode_results(response: &[u8]) -> Result<Vec<Option<Bytes>>> {
    let decoded = ethers::abi::decode(&[aggregate3_output()], response)
        .map_err(|e| ScreenerError::chain_read(format!("multicall decode failed: {e}")))?;
    let results = decoded
        .into_iter()
        .next()
        .and_then(|t| t.into_array())
        .ok_or_else(|| ScreenerError::chain_read("invalid multicall response format"))?;

    // Result { success, returnData }
    Ok(results
        .into_iter()
        .map(|result| match result {
            Token::Tuple(fields) => match fields.as_slice() {
                [Token::Bool(true), Token::Bytes(data)] => Some(Bytes::from(data.clone())),
                _ => None,
            },
            _ => None,
        })
        .collect())
}

fn aggregate3_output() -> ParamType {
    ParamType::Array(Box::new(ParamType::Tuple(vec![
        ParamType::Bool,
        ParamType::Bytes,
    ])))
}

#[allow(deprecated)]
fn aggregate3_function() -> Function {
    Function {
        name: "aggregate3".to_string(),
        inputs: vec![Param {
            name: "calls".to_string(),
            kind: ParamType::Array(Box::new(ParamType::Tuple(vec![
                ParamType::Address,
                ParamType::Bool,
                ParamType::Bytes,
            ]))),
            internal_type: None,
        }],
        outputs: vec![Param {
            name: "returnData".to_string(),
            kind: aggregate3_output(),
            internal_type: None,
        }],
        constant: None,
        state_mutability: StateMutability::Payable,
    }
}
