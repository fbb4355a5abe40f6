//! Chain client abstraction.
//!
//! Everything chain-specific (encoding, signing, RPC) lives behind these traits.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::Abi;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};
use futures::stream::BoxStream;
use serde_json::Value;

use crate::options::TxFields;
use crate::Result;

/// Lifecycle event of a submitted transaction
#[derive(Debug, Clone)]
pub enum TxEvent {
    /// Transaction was accepted by the node
    TransactionHash(H256),

    /// Transaction reached `number` confirmations
    Confirmation {
        /// Confirmation count
        number: u64,
        /// Receipt at the time of the confirmation
        receipt: TransactionReceipt,
    },

    /// Transaction was included in a block
    Receipt(TransactionReceipt),

    /// Submission failed
    Error(String),
}

impl TxEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            TxEvent::TransactionHash(_) => "transactionHash",
            TxEvent::Confirmation { .. } => "confirmation",
            TxEvent::Receipt(_) => "receipt",
            TxEvent::Error(_) => "error",
        }
    }
}

/// Event stream of a single submission, in emission order
pub type Submission = BoxStream<'static, TxEvent>;

/// A prepared call, transaction or deployment
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionHandle: Send + Sync {
    /// Whether the underlying method is read-only (view/pure)
    fn is_constant(&self) -> bool;

    /// Estimate the gas needed for the transaction
    async fn estimate_gas(&self, tx: &TxFields) -> Result<U256>;

    /// Execute as a read-only call and return the decoded result
    async fn call(&self, tx: &TxFields) -> Result<Value>;

    /// Submit the transaction
    async fn send(&self, tx: &TxFields) -> Result<Submission>;
}

/// Client-side handle of a contract
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContractHandle: Send + Sync {
    /// On-chain address, if bound
    fn address(&self) -> Option<Address>;

    /// Names under which methods can be resolved (names, signatures and selectors)
    fn method_names(&self) -> Vec<String>;

    /// Prepare a method invocation
    fn method(&self, name: &str, args: &[Value]) -> Result<Box<dyn TransactionHandle>>;

    /// Prepare a deployment of `bytecode` with constructor arguments
    fn deploy(&self, bytecode: &Bytes, args: &[Value]) -> Result<Box<dyn TransactionHandle>>;

    /// Sender used when a transaction does not name one
    async fn default_from(&self) -> Option<Address>;

    /// Replace the default sender
    async fn set_default_from(&self, from: Option<Address>);
}

/// External chain client capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Version of the client API the implementation speaks
    fn version(&self) -> String;

    /// Accounts managed by the node
    async fn accounts(&self) -> Result<Vec<Address>>;

    /// Create a contract handle for `abi`, optionally bound to `address`
    fn contract(&self, abi: &Abi, address: Option<Address>) -> Result<Arc<dyn ContractHandle>>;
}
