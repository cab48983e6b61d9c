// Contract bindings used for on-chain reads.

pub mod erc20;

pub use erc20::Erc20;
