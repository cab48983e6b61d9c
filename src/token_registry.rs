//! Token registry client: the Balancer API's per-chain token list, which flags
//! wrapped tokens whose underlying asset should be shown instead.

use crate::errors::{Result, ScreenerError};
use crate::settings::TokenRegistrySettings;
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

const TOKENS_QUERY: &str = r#"
query Tokens($chains: [GqlChain!]) {
  tokenGetTokens(chains: $chains) {
    address
    underlyingTokenAddress
    useUnderlyingForAddRemove
    isBufferAllowed
  }
}
"#;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryToken {
    pub address: String,
    #[serde(default)]
    pub underlying_token_address: Option<String>,
    #[serde(default)]
    pub use_underlying_for_add_remove: Option<bool>,
    #[serde(default)]
    pub is_buffer_allowed: Option<bool>,
}

impl RegistryToken {
    /// The underlying address, when this token should be displayed as it.
    pub fn display_underlying(&self) -> Option<&str> {
        let flagged = self.use_underlying_for_add_remove.unwrap_or(false)
            && self.is_buffer_allowed.unwrap_or(false);
        self.underlying_token_address
            .as_deref()
            .filter(|address| flagged && !address.is_empty())
    }
}

#[async_trait]
pub trait TokenRegistry: Send + Sync {
    /// Every token the registry knows for `api_slug` (e.g. "MAINNET").
    async fn tokens(&self, api_slug: &str) -> Result<Vec<RegistryToken>>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokensData {
    token_get_tokens: Vec<RegistryToken>,
}

#[derive(Deserialize)]
struct TokensResponse {
    data: Option<TokensData>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

pub struct BalancerApiTokenRegistry {
    api_url: Url,
    client: reqwest::Client,
}

impl BalancerApiTokenRegistry {
    pub fn new(settings: &TokenRegistrySettings) -> anyhow::Result<Self> {
        let api_url = Url::parse(&settings.api_url)
            .map_err(|e| anyhow::anyhow!("token_registry.api_url: {e}"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;
        Ok(Self { api_url, client })
    }
}

#[async_trait]
impl TokenRegistry for BalancerApiTokenRegistry {
    async fn tokens(&self, api_slug: &str) -> Result<Vec<RegistryToken>> {
        let response = self
            .client
            .post(self.api_url.clone())
            .json(&json!({ "query": TOKENS_QUERY, "variables": { "chains": [api_slug] } }))
            .send()
            .await
            .map_err(|e| ScreenerError::token_registry(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScreenerError::token_registry(format!("HTTP error: {status}")));
        }

        let body: TokensResponse = response
            .json()
            .await
            .map_err(|e| ScreenerError::token_registry(format!("JSON parse failed: {e}")))?;
        if !body.errors.is_empty() {
            return Err(ScreenerError::token_registry(format!(
                "GraphQL errors: {}",
                serde_json::Value::from(body.errors)
            )));
        }

        let tokens = body
            .data
            .map(|d| d.token_get_tokens)
            .ok_or_else(|| ScreenerError::token_registry("response carried no data"))?;
        debug!("Token registry returned {} tokens for {}", tokens.len(), api_slug);
        Ok(tokens)
    }
}
