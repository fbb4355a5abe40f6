//! Contract classes generated from an ABI and optional bytecode.
//!
//! A [`ContractClass`] is produced by [`ContractClass::generate`]. Binding it to a
//! chain client with [`ContractClass::at`] yields a [`Binding`] whose methods are
//! dispatched through [`Binding::invoke`], and [`ContractClass::deploy`] submits a
//! deployment whose outcome is a new binding. Read-only methods become plain calls;
//! everything else goes through the [`ExecutionEngine`], which resolves gas, submits
//! once and relays lifecycle events on a [`PromiEvent`].

pub mod binding;
pub mod client;
pub mod config;
pub mod engine;
pub mod options;
pub mod promievent;

#[cfg(test)]
mod tests;

pub use binding::{Binding, ContractClass};
pub use client::{ChainClient, ContractHandle, Submission, TransactionHandle, TxEvent};
pub use config::{BindingConfig, ConfigError, GasPolicy};
pub use engine::{Execution, ExecutionEngine};
pub use options::{Arg, CallOptions, ExecutionControl, ParsedArgs, TxCallback, TxFields};
pub use promievent::{Deferred, PromiEvent, Subscription};

/// Re-export common types from contract-class-common
pub use contract_class_common::{Error, Result};
