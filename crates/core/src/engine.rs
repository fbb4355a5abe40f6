//! Execution engine: read-only call or gas-estimated send with event relay

use ethers::types::{TransactionReceipt, U256};
use futures::future::BoxFuture;
use futures::StreamExt;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::client::{TransactionHandle, TxEvent};
use crate::config::{BindingConfig, GasPolicy};
use crate::options::{CallOptions, TxCallback};
use crate::promievent::{Deferred, PromiEvent};
use crate::{Error, Result};

/// Outcome of executing a prepared transaction handle
pub enum Execution {
    /// Read-only call; resolves to the decoded return value
    Call(BoxFuture<'static, Result<Value>>),

    /// Submitted transaction; resolves to the receipt and relays lifecycle events
    Send(PromiEvent<TransactionReceipt>),
}

impl Execution {
    /// Whether this is a read-only call
    pub fn is_call(&self) -> bool {
        matches!(self, Execution::Call(_))
    }

    /// The call future, if this is a read-only call
    pub fn into_call(self) -> Option<BoxFuture<'static, Result<Value>>> {
        match self {
            Execution::Call(call) => Some(call),
            Execution::Send(_) => None,
        }
    }

    /// The promise, if this is a submitted transaction
    pub fn into_send(self) -> Option<PromiEvent<TransactionReceipt>> {
        match self {
            Execution::Send(promise) => Some(promise),
            Execution::Call(_) => None,
        }
    }

    /// Wait for the result: the call value, or the receipt as JSON
    pub async fn into_value(self) -> Result<Value> {
        match self {
            Execution::Call(call) => call.await,
            Execution::Send(promise) => {
                let receipt = promise.await?;
                Ok(serde_json::to_value(receipt)?)
            }
        }
    }
}

/// Classifies transaction handles and drives submissions
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    policy: GasPolicy,
    event_capacity: usize,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::from_config(&BindingConfig::default())
    }
}

impl ExecutionEngine {
    /// Create an engine with an explicit gas policy
    pub fn new(policy: GasPolicy, event_capacity: usize) -> Self {
        Self {
            policy,
            event_capacity,
        }
    }

    /// Create an engine from a binding configuration
    pub fn from_config(config: &BindingConfig) -> Self {
        Self::new(config.gas.clone(), config.event_capacity)
    }

    /// Gas policy in use
    pub fn policy(&self) -> &GasPolicy {
        &self.policy
    }

    /// Execute `tx` with `options`.
    ///
    /// Constant methods become a call with the transaction fields only. Anything else
    /// is submitted on a task spawned on the current Tokio runtime, and the returned
    /// promise relays every lifecycle event of the submission. Outside a runtime the
    /// promise rejects without submitting.
    pub fn execute(
        &self,
        tx: Box<dyn TransactionHandle>,
        options: CallOptions,
        callback: Option<TxCallback>,
    ) -> Execution {
        if tx.is_constant() {
            debug!("Constant method, executing as call");
            let fields = options.tx;
            return Execution::Call(Box::pin(async move { tx.call(&fields).await }));
        }

        let (deferred, promise) = PromiEvent::channel(self.event_capacity);
        self.spawn_send(tx, options, callback, deferred);
        Execution::Send(promise)
    }

    /// Resolve the gas limit for a state-changing transaction.
    ///
    /// Priority: `no_estimate_gas` uses the fallback, then an explicit `$gas` or
    /// `gas`, then the client's estimate plus `extra_gas` or the percentage margin.
    /// The result is never below the policy minimum. Zero values count as unset.
    pub async fn resolve_gas(&self, tx: &dyn TransactionHandle, options: &CallOptions) -> Result<U256> {
        let policy = &self.policy;

        let gas = if options.control.no_estimate_gas {
            U256::from(policy.fallback_gas)
        } else if let Some(gas) = non_zero(options.control.gas).or(non_zero(options.tx.gas)) {
            gas
        } else {
            let estimate = tx.estimate_gas(&options.tx.without_nonce()).await?;
            debug!(%estimate, "Estimated gas");
            match non_zero(options.control.extra_gas) {
                Some(extra) => estimate.saturating_add(extra),
                None => policy.apply_margin(estimate),
            }
        };

        Ok(policy.clamp(gas))
    }

    pub(crate) fn spawn_send(
        &self,
        tx: Box<dyn TransactionHandle>,
        options: CallOptions,
        callback: Option<TxCallback>,
        deferred: Deferred<TransactionReceipt>,
    ) {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                reject_without_runtime(deferred);
                return;
            }
        };

        let engine = self.clone();
        runtime.spawn(async move {
            engine.send_and_relay(tx, options, callback, deferred).await;
        });
    }

    async fn send_and_relay(
        &self,
        tx: Box<dyn TransactionHandle>,
        options: CallOptions,
        mut callback: Option<TxCallback>,
        mut deferred: Deferred<TransactionReceipt>,
    ) {
        let gas = match self.resolve_gas(tx.as_ref(), &options).await {
            Ok(gas) => gas,
            Err(err) => {
                deferred.reject(err);
                return;
            }
        };

        let fields = options.tx.clone().with_gas(gas);
        debug!(%gas, from = ?fields.from, "Submitting transaction");

        let mut submission = match tx.send(&fields).await {
            Ok(submission) => submission,
            Err(err) => {
                let message = match &err {
                    Error::Submission(message) => message.clone(),
                    other => other.to_string(),
                };
                deferred.emit(TxEvent::Error(message.clone()));
                if let Some(callback) = callback.take() {
                    callback(Err(Error::Submission(message)));
                }
                deferred.reject(err);
                return;
            }
        };

        while let Some(event) = submission.next().await {
            match &event {
                TxEvent::TransactionHash(hash) => {
                    if let Some(callback) = callback.take() {
                        callback(Ok(*hash));
                    }
                }
                TxEvent::Receipt(receipt) if options.control.verbose => {
                    info!(gas_used = ?receipt.gas_used, tx_hash = ?receipt.transaction_hash, "Transaction receipt");
                }
                TxEvent::Error(message) => {
                    if let Some(callback) = callback.take() {
                        callback(Err(Error::submission(message.clone())));
                    }
                }
                _ => {}
            }

            deferred.emit(event.clone());

            match event {
                TxEvent::Receipt(receipt) => {
                    deferred.resolve(receipt);
                }
                TxEvent::Error(message) => {
                    deferred.reject(Error::Submission(message));
                }
                _ => {}
            }
        }

        if !deferred.is_settled() {
            deferred.reject(Error::submission("submission ended without a receipt"));
        }
    }
}

/// Reject a promise whose work cannot be spawned
pub(crate) fn reject_without_runtime<T>(mut deferred: Deferred<T>) {
    deferred.reject(Error::generic("no Tokio runtime is running to drive the submission"));
}

fn non_zero(value: Option<U256>) -> Option<U256> {
    value.filter(|v| !v.is_zero())
}
