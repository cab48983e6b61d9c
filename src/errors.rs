//! Error taxonomy shared by every screener operation.
//!
//! Local recovery (null reserves, stale underlying mappings) happens inside the
//! pipeline; anything that reaches a caller is one of these variants.

/// Which external collaborator produced an [`ScreenerError::Upstream`] failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Subgraph,
    ChainRead,
    TokenRegistry,
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Upstream::Subgraph => "subgraph",
            Upstream::ChainRead => "chain-read",
            Upstream::TokenRegistry => "token-registry",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScreenerError {
    /// Malformed pair id, block range or other caller input.
    #[error("Invalid format: {0}")]
    Format(String),
    /// A field that must be an EVM address is not one.
    #[error("Invalid address: {0}")]
    AddressFormat(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),
    #[error("Upstream {source_name} failure: {message}")]
    Upstream {
        source_name: Upstream,
        message: String,
    },
}

impl ScreenerError {
    pub fn subgraph(message: impl std::fmt::Display) -> Self {
        ScreenerError::Upstream {
            source_name: Upstream::Subgraph,
            message: message.to_string(),
        }
    }

    pub fn chain_read(message: impl std::fmt::Display) -> Self {
        ScreenerError::Upstream {
            source_name: Upstream::ChainRead,
            message: message.to_string(),
        }
    }

    pub fn token_registry(message: impl std::fmt::Display) -> Self {
        ScreenerError::Upstream {
            source_name: Upstream::TokenRegistry,
            message: message.to_string(),
        }
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, ScreenerError::Upstream { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScreenerError>;
