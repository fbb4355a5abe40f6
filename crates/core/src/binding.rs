//! Contract classes and bound contract instances

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use ethers::abi::Abi;
use ethers::types::{Address, Bytes};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

use crate::client::{ChainClient, ContractHandle};
use crate::config::BindingConfig;
use crate::engine::{reject_without_runtime, Execution, ExecutionEngine};
use crate::options::{split_trailing_options, Arg, CallOptions, ParsedArgs, TxCallback};
use crate::promievent::PromiEvent;
use crate::{Error, Result};

/// A contract class: ABI plus optional bytecode, ready to be bound or deployed
#[derive(Debug, Clone)]
pub struct ContractClass {
    abi: Arc<Abi>,
    bytecode: String,
    config: Arc<BindingConfig>,
}

impl ContractClass {
    /// Generate a class from an interface description and optional bytecode.
    ///
    /// Fails with [`Error::Configuration`] when the ABI is absent. Non-empty bytecode
    /// without a `0x` prefix gets one.
    pub fn generate(abi: Option<Abi>, bytecode: &str) -> Result<Self> {
        let abi = abi.ok_or_else(|| Error::configuration("missing abi"))?;

        Ok(Self {
            abi: Arc::new(abi),
            bytecode: normalize_bytecode(bytecode),
            config: Arc::new(BindingConfig::default()),
        })
    }

    /// Generate a class from ABI JSON; a JSON `null` counts as a missing ABI
    pub fn from_json(abi_json: &str, bytecode: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(abi_json)?;
        let abi = match value {
            Value::Null => None,
            value => Some(serde_json::from_value::<Abi>(value)?),
        };
        Self::generate(abi, bytecode)
    }

    /// Replace the configuration used by this class and its bindings
    pub fn with_config(mut self, config: BindingConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Interface description
    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    /// Normalized bytecode; empty when none was supplied
    pub fn bytecode(&self) -> &str {
        &self.bytecode
    }

    /// Active configuration
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Whether the class carries deployable bytecode
    pub fn has_bytecode(&self) -> bool {
        !self.bytecode.is_empty() && self.bytecode != "0x"
    }

    /// Bind the class to `client`, optionally at `address`.
    ///
    /// The client's default accounts are looked up in the background and the first
    /// one becomes the contract's default sender. Lookup failures are swallowed;
    /// [`Binding::ready`] resolves once the lookup has finished either way.
    pub fn at(&self, client: Arc<dyn ChainClient>, address: Option<Address>) -> Result<Binding> {
        check_client(client.as_ref(), &self.config.client_version_prefix)?;

        let contract = client.contract(&self.abi, address)?;
        let methods: BTreeSet<String> = contract
            .method_names()
            .into_iter()
            .filter(|name| !name.starts_with("0x"))
            .collect();
        debug!(?address, methods = methods.len(), "Bound contract");

        let ready = spawn_default_sender(client.clone(), contract.clone());

        Ok(Binding {
            client,
            address,
            contract,
            class: self.clone(),
            methods,
            engine: ExecutionEngine::from_config(&self.config),
            ready,
        })
    }

    /// Deploy a new instance and resolve to a binding at the deployed address.
    ///
    /// The sender is `options.from`, else the client's first account. Missing bytecode,
    /// an incompatible client and encoding errors are returned before anything is
    /// submitted; runtime failures reject the promise.
    pub fn deploy(
        &self,
        client: Arc<dyn ChainClient>,
        args: Vec<Value>,
        options: Option<CallOptions>,
    ) -> Result<PromiEvent<Binding>> {
        if !self.has_bytecode() {
            return Err(Error::MissingBytecode);
        }
        check_client(client.as_ref(), &self.config.client_version_prefix)?;

        let bytecode: Bytes = self
            .bytecode
            .parse()
            .map_err(|e| Error::encoding(format!("invalid bytecode: {}", e)))?;
        let contract = client.contract(&self.abi, None)?;
        let tx = contract.deploy(&bytecode, &args)?;

        let mut options = options.unwrap_or_default();
        let engine = ExecutionEngine::from_config(&self.config);
        let (mut deferred, promise) = PromiEvent::channel(self.config.event_capacity);
        let class = self.clone();

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                reject_without_runtime(deferred);
                return Ok(promise);
            }
        };

        runtime.spawn(async move {
            let sender = match options.tx.from {
                Some(from) => Some(from),
                None => match client.accounts().await {
                    Ok(accounts) => accounts.first().copied(),
                    Err(err) => {
                        deferred.reject(err);
                        return;
                    }
                },
            };
            options.tx.from = sender;
            debug!(from = ?sender, "Deploying contract");

            let (submission, receipt) = deferred.relay();
            engine.spawn_send(tx, options, None, submission);

            let result = match receipt.await {
                Ok(Ok(receipt)) => match receipt.contract_address {
                    Some(address) => class.at(client, Some(address)),
                    None => Err(Error::submission("deployment receipt carries no contract address")),
                },
                Ok(Err(err)) => Err(err),
                Err(_) => Err(Error::generic("deployment dropped before settlement")),
            };

            match result {
                Ok(binding) => deferred.resolve(binding),
                Err(err) => deferred.reject(err),
            };
        });

        Ok(promise)
    }

    /// Deploy with positional arguments; a trailing non-array object is taken as options
    pub fn deploy_dynamic(&self, client: Arc<dyn ChainClient>, args: Vec<Value>) -> Result<PromiEvent<Binding>> {
        if !self.has_bytecode() {
            return Err(Error::MissingBytecode);
        }
        let (args, options) = split_trailing_options(args)?;
        self.deploy(client, args, options)
    }
}

/// A contract class bound to a client and (optionally) an address
pub struct Binding {
    client: Arc<dyn ChainClient>,
    address: Option<Address>,
    contract: Arc<dyn ContractHandle>,
    class: ContractClass,
    methods: BTreeSet<String>,
    engine: ExecutionEngine,
    ready: watch::Receiver<bool>,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("address", &self.address)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

impl Binding {
    /// Contract address, if bound
    pub fn address(&self) -> Option<Address> {
        self.address
    }

    /// Interface description
    pub fn abi(&self) -> &Abi {
        self.class.abi()
    }

    /// Normalized bytecode of the class
    pub fn bytecode(&self) -> &str {
        self.class.bytecode()
    }

    /// Class this binding was created from
    pub fn class(&self) -> &ContractClass {
        &self.class
    }

    /// Chain client
    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    /// Underlying contract handle
    pub fn contract(&self) -> &Arc<dyn ContractHandle> {
        &self.contract
    }

    /// Installed method names: plain names and full signatures
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    /// Whether `name` is an installed method
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains(name)
    }

    /// Wait until the default-sender lookup has finished
    pub async fn ready(&self) {
        let mut ready = self.ready.clone();
        // An error means the lookup task is gone, which also counts as finished
        let _ = ready.wait_for(|done| *done).await;
    }

    /// Another binding of the same class and client at `address`
    pub fn at(&self, address: Address) -> Result<Binding> {
        self.class.at(self.client.clone(), Some(address))
    }

    /// Invoke `name` with method arguments and options
    pub fn invoke(&self, name: &str, args: Vec<Value>, options: CallOptions) -> Result<Execution> {
        self.dispatch(name, args, options, None)
    }

    /// Invoke `name`, notifying `callback` with the transaction hash or the submission error
    pub fn invoke_with_callback(
        &self,
        name: &str,
        args: Vec<Value>,
        options: CallOptions,
        callback: TxCallback,
    ) -> Result<Execution> {
        self.dispatch(name, args, options, Some(callback))
    }

    /// Invoke `name` with positional arguments: a trailing callback, then a trailing
    /// non-array object as options
    pub fn invoke_dynamic(&self, name: &str, args: Vec<Arg>) -> Result<Execution> {
        let parsed = ParsedArgs::parse(args)?;
        self.dispatch(name, parsed.args, parsed.options, parsed.callback)
    }

    fn dispatch(
        &self,
        name: &str,
        args: Vec<Value>,
        options: CallOptions,
        callback: Option<TxCallback>,
    ) -> Result<Execution> {
        if !self.has_method(name) {
            return Err(Error::unknown_method(name));
        }

        let tx = self.contract.method(name, &args)?;
        Ok(self.engine.execute(tx, options, callback))
    }
}

fn normalize_bytecode(bytecode: &str) -> String {
    if bytecode.is_empty() || bytecode.starts_with("0x") {
        bytecode.to_string()
    } else {
        format!("0x{}", bytecode)
    }
}

fn check_client(client: &dyn ChainClient, expected: &str) -> Result<()> {
    let found = client.version();
    if !found.starts_with(expected) {
        return Err(Error::IncompatibleClient {
            found,
            expected: expected.to_string(),
        });
    }
    Ok(())
}

fn spawn_default_sender(client: Arc<dyn ChainClient>, contract: Arc<dyn ContractHandle>) -> watch::Receiver<bool> {
    let (done, ready) = watch::channel(false);

    match Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                // Failures leave the default sender untouched and are not reported
                if let Ok(accounts) = client.accounts().await {
                    contract.set_default_from(accounts.first().copied()).await;
                }
                let _ = done.send(true);
            });
        }
        Err(_) => {
            let _ = done.send(true);
        }
    }

    ready
}
