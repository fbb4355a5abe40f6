//! Ethereum chain client for contract classes
//!
//! [`EthersClient`] implements the chain client traits over any `ethers` middleware,
//! encoding JSON arguments against the ABI and turning pending transactions into
//! lifecycle event streams. [`ContractArtifact`] loads compiled contract JSON, and
//! the `codegen` feature generates typed wrappers around bindings.

pub mod artifact;
pub mod client;
pub mod provider;
pub mod tokens;

#[cfg(feature = "codegen")]
pub mod codegen;

pub use artifact::ContractArtifact;
pub use client::{EthersClient, EthersContract, EthersTransaction, CLIENT_VERSION};
pub use provider::{EthereumProvider, EthereumProviderConfig};
pub use tokens::{outputs_to_json, token_to_json, tokenize, tokenize_params};
