//! Chain registry: the set of chains this deployment serves and the endpoints
//! used to reach each one.

use crate::errors::{Result, ScreenerError};
use crate::settings::{ChainSettings, Settings};
use std::collections::BTreeMap;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    pub slug: String,
    pub api_slug: String,
    pub rpc_endpoint: Url,
    pub subgraph_endpoint: Url,
}

impl ChainConfig {
    fn from_settings(slug: &str, chain: &ChainSettings) -> anyhow::Result<Self> {
        let rpc_endpoint = Url::parse(&chain.rpc_endpoint)
            .map_err(|e| anyhow::anyhow!("chains.{slug}.rpc_endpoint: {e}"))?;
        let subgraph_endpoint = Url::parse(&chain.subgraph_endpoint)
            .map_err(|e| anyhow::anyhow!("chains.{slug}.subgraph_endpoint: {e}"))?;
        Ok(Self {
            slug: slug.to_string(),
            api_slug: chain.api_slug.clone(),
            rpc_endpoint,
            subgraph_endpoint,
        })
    }
}

/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: BTreeMap<String, ChainConfig>,
}

impl ChainRegistry {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let mut chains = BTreeMap::new();
        for (slug, chain) in &settings.chains {
            let slug = slug.to_lowercase();
            chains.insert(slug.clone(), ChainConfig::from_settings(&slug, chain)?);
        }
        Ok(Self { chains })
    }

    pub fn from_configs(configs: impl IntoIterator<Item = ChainConfig>) -> Self {
        Self {
            chains: configs
                .into_iter()
                .map(|c| (c.slug.to_lowercase(), c))
                .collect(),
        }
    }

    pub fn get_config(&self, slug: &str) -> Result<&ChainConfig> {
        self.chains
            .get(&slug.to_lowercase())
            .ok_or_else(|| ScreenerError::UnsupportedChain(slug.to_string()))
    }

    /// Sorted list of configured slugs.
    pub fn list_supported_slugs(&self) -> Vec<String> {
        self.chains.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.values()
    }
}
