//! Chain client backed by an `ethers` middleware

use std::sync::Arc;

use async_trait::async_trait;
use contract_class_common::{Error, Result};
use contract_class_core::{ChainClient, ContractHandle, Submission, TransactionHandle, TxEvent, TxFields};
use ethers::abi::{Abi, Function, StateMutability};
use ethers::middleware::Middleware;
use ethers::providers::PendingTransaction;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, H256, U256, U64};
use futures::stream;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::tokens::{outputs_to_json, tokenize_params};

/// Client API version reported to contract classes
pub const CLIENT_VERSION: &str = "1.0.0";

/// [`ChainClient`] over any `ethers` middleware stack
#[derive(Debug)]
pub struct EthersClient<M> {
    middleware: Arc<M>,
    confirmations: usize,
}

impl<M: Middleware + 'static> EthersClient<M> {
    pub fn new(middleware: Arc<M>) -> Self {
        Self {
            middleware,
            confirmations: 1,
        }
    }

    /// Confirmations awaited before a submission reports its receipt
    pub fn with_confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }

    pub fn middleware(&self) -> &Arc<M> {
        &self.middleware
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainClient for EthersClient<M> {
    fn version(&self) -> String {
        CLIENT_VERSION.to_string()
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        self.middleware
            .get_accounts()
            .await
            .map_err(|e| Error::client(e.to_string()))
    }

    fn contract(&self, abi: &Abi, address: Option<Address>) -> Result<Arc<dyn ContractHandle>> {
        Ok(Arc::new(EthersContract {
            middleware: self.middleware.clone(),
            abi: abi.clone(),
            address,
            default_from: Arc::new(RwLock::new(None)),
            confirmations: self.confirmations,
        }))
    }
}

/// Contract handle encoding calls against an ABI
#[derive(Debug)]
pub struct EthersContract<M> {
    middleware: Arc<M>,
    abi: Abi,
    address: Option<Address>,
    default_from: Arc<RwLock<Option<Address>>>,
    confirmations: usize,
}

impl<M: Middleware + 'static> EthersContract<M> {
    /// Resolve `name` as a full signature, or as a plain name with overloads told
    /// apart by argument count
    fn resolve(&self, name: &str, arity: usize) -> Result<&Function> {
        if name.contains('(') {
            return self
                .abi
                .functions()
                .find(|function| signature(function) == name)
                .ok_or_else(|| Error::unknown_method(name));
        }

        let overloads = self
            .abi
            .functions_by_name(name)
            .map_err(|_| Error::unknown_method(name))?;

        match overloads.as_slice() {
            [only] => Ok(only),
            many => many
                .iter()
                .find(|function| function.inputs.len() == arity)
                .ok_or_else(|| {
                    Error::encoding(format!("no overload of {} takes {} arguments", name, arity))
                }),
        }
    }

    fn transaction(&self, to: Option<Address>, data: Bytes, function: Option<Function>, constant: bool) -> EthersTransaction<M> {
        EthersTransaction {
            middleware: self.middleware.clone(),
            to,
            data,
            function,
            constant,
            default_from: self.default_from.clone(),
            confirmations: self.confirmations,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> ContractHandle for EthersContract<M> {
    fn address(&self) -> Option<Address> {
        self.address
    }

    fn method_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for function in self.abi.functions() {
            if !names.contains(&function.name) {
                names.push(function.name.clone());
            }
            names.push(signature(function));
            names.push(format!("0x{}", hex::encode(function.short_signature())));
        }
        names
    }

    fn method(&self, name: &str, args: &[Value]) -> Result<Box<dyn TransactionHandle>> {
        let address = self
            .address
            .ok_or_else(|| Error::configuration("contract is not bound to an address"))?;
        let function = self.resolve(name, args.len())?;

        let tokens = tokenize_params(&function.inputs, args)?;
        let data = function
            .encode_input(&tokens)
            .map_err(|e| Error::encoding(e.to_string()))?;
        let constant = is_read_only(function);
        debug!(method = %signature(function), constant, "Encoded method call");

        Ok(Box::new(self.transaction(
            Some(address),
            data.into(),
            Some(function.clone()),
            constant,
        )))
    }

    fn deploy(&self, bytecode: &Bytes, args: &[Value]) -> Result<Box<dyn TransactionHandle>> {
        let data = match self.abi.constructor() {
            Some(constructor) => {
                let tokens = tokenize_params(&constructor.inputs, args)?;
                constructor
                    .encode_input(bytecode.to_vec(), &tokens)
                    .map_err(|e| Error::encoding(e.to_string()))?
            }
            None if args.is_empty() => bytecode.to_vec(),
            None => {
                return Err(Error::encoding(format!(
                    "contract has no constructor but {} arguments were given",
                    args.len()
                )))
            }
        };

        Ok(Box::new(self.transaction(None, data.into(), None, false)))
    }

    async fn default_from(&self) -> Option<Address> {
        *self.default_from.read().await
    }

    async fn set_default_from(&self, from: Option<Address>) {
        *self.default_from.write().await = from;
    }
}

/// Prepared call, transaction or deployment
pub struct EthersTransaction<M> {
    middleware: Arc<M>,
    to: Option<Address>,
    data: Bytes,
    function: Option<Function>,
    constant: bool,
    default_from: Arc<RwLock<Option<Address>>>,
    confirmations: usize,
}

impl<M: Middleware + 'static> EthersTransaction<M> {
    /// Request carrying the encoded calldata. The sender falls back to the
    /// contract's default sender as it is at this moment.
    async fn request(&self, fields: &TxFields) -> TypedTransaction {
        let from = match fields.from {
            Some(from) => Some(from),
            None => *self.default_from.read().await,
        };

        let mut request = TransactionRequest::new().data(self.data.clone());
        if let Some(to) = self.to.or(fields.to) {
            request = request.to(to);
        }
        if let Some(from) = from {
            request = request.from(from);
        }
        if let Some(gas) = fields.gas {
            request = request.gas(gas);
        }
        if let Some(gas_price) = fields.gas_price {
            request = request.gas_price(gas_price);
        }
        if let Some(value) = fields.value {
            request = request.value(value);
        }
        if let Some(nonce) = fields.nonce {
            request = request.nonce(nonce);
        }
        request.into()
    }
}

#[async_trait]
impl<M: Middleware + 'static> TransactionHandle for EthersTransaction<M> {
    fn is_constant(&self) -> bool {
        self.constant
    }

    async fn estimate_gas(&self, tx: &TxFields) -> Result<U256> {
        let request = self.request(tx).await;
        self.middleware
            .estimate_gas(&request, None)
            .await
            .map_err(|e| Error::estimation(e.to_string()))
    }

    async fn call(&self, tx: &TxFields) -> Result<Value> {
        let request = self.request(tx).await;
        let raw = self
            .middleware
            .call(&request, None)
            .await
            .map_err(|e| Error::call(e.to_string()))?;

        match &self.function {
            Some(function) => {
                let tokens = function
                    .decode_output(&raw)
                    .map_err(|e| Error::call(format!("failed to decode output: {}", e)))?;
                Ok(outputs_to_json(&tokens))
            }
            None => Ok(Value::String(format!("0x{}", hex::encode(&raw)))),
        }
    }

    async fn send(&self, tx: &TxFields) -> Result<Submission> {
        let request = self.request(tx).await;
        let hash = self
            .middleware
            .send_transaction(request, None)
            .await
            .map_err(|e| Error::submission(e.to_string()))?
            .tx_hash();
        debug!(?hash, "Transaction accepted");

        let (events, receiver) = mpsc::unbounded_channel();
        // The receiver is still held here, so this cannot fail
        let _ = events.send(TxEvent::TransactionHash(hash));

        let middleware = self.middleware.clone();
        let confirmations = self.confirmations;
        tokio::spawn(async move {
            watch_receipt(middleware, hash, confirmations, events).await;
        });

        Ok(Box::pin(stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|event| (event, receiver))
        })))
    }
}

async fn watch_receipt<M: Middleware + 'static>(
    middleware: Arc<M>,
    hash: H256,
    confirmations: usize,
    events: mpsc::UnboundedSender<TxEvent>,
) {
    let pending = PendingTransaction::new(hash, middleware.provider()).confirmations(confirmations);

    let outcome = match pending.await {
        Ok(Some(receipt)) => {
            let reverted = receipt.status == Some(U64::zero());
            let mut outcome = vec![
                TxEvent::Receipt(receipt.clone()),
                TxEvent::Confirmation {
                    number: confirmations as u64,
                    receipt,
                },
            ];
            if reverted {
                warn!(?hash, "Transaction reverted");
                outcome.push(TxEvent::Error("transaction reverted".to_string()));
            }
            outcome
        }
        Ok(None) => vec![TxEvent::Error("transaction dropped from the mempool".to_string())],
        Err(err) => vec![TxEvent::Error(err.to_string())],
    };

    for event in outcome {
        // The consumer may have stopped listening
        if events.send(event).is_err() {
            break;
        }
    }
}

/// Canonical `name(type,..)` signature
fn signature(function: &Function) -> String {
    let types: Vec<String> = function
        .inputs
        .iter()
        .map(|param| param.kind.to_string())
        .collect();
    format!("{}({})", function.name, types.join(","))
}

/// View and pure functions, plus pre-0.5 ABIs that only carry `constant: true`
fn is_read_only(function: &Function) -> bool {
    #[allow(deprecated)]
    let legacy_constant = function.constant == Some(true);
    legacy_constant || matches!(function.state_mutability, StateMutability::View | StateMutability::Pure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::providers::{Http, Provider};
    use serde_json::json;

    const ABI: &str = r#"[
      {"type":"constructor","inputs":[{"name":"owner","type":"address"}],"stateMutability":"nonpayable"},
      {"type":"function","name":"balanceOf","inputs":[{"name":"owner","type":"address"}],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
      {"type":"function","name":"mint","inputs":[{"name":"amount","type":"uint256"}],"outputs":[],"stateMutability":"nonpayable"},
      {"type":"function","name":"mint","inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[],"stateMutability":"nonpayable"},
      {"type":"function","name":"settle","inputs":[{"name":"order","type":"tuple","components":[{"name":"id","type":"uint64"},{"name":"tags","type":"bytes32[]"}]}],"outputs":[],"stateMutability":"payable"}
    ]"#;

    const OWNER: &str = "0x00000000000000000000000000000000000000aa";

    fn client() -> EthersClient<Provider<Http>> {
        let provider = Provider::<Http>::try_from("http://localhost:8545").unwrap();
        EthersClient::new(Arc::new(provider))
    }

    fn abi() -> Abi {
        serde_json::from_str(ABI).unwrap()
    }

    #[test]
    fn test_method_names_cover_names_signatures_and_selectors() {
        let contract = client().contract(&abi(), Some(Address::repeat_byte(1))).unwrap();
        let names = contract.method_names();

        assert!(names.contains(&"balanceOf".to_string()));
        assert!(names.contains(&"balanceOf(address)".to_string()));
        assert!(names.contains(&"0x70a08231".to_string()));
        assert!(names.contains(&"mint(address,uint256)".to_string()));
        assert!(names.contains(&"settle((uint64,bytes32[]))".to_string()));
        assert_eq!(names.iter().filter(|name| *name == "mint").count(), 1);
    }

    #[test]
    fn test_constant_methods_are_flagged() {
        let contract = client().contract(&abi(), Some(Address::repeat_byte(1))).unwrap();

        assert!(contract.method("balanceOf", &[json!(OWNER)]).unwrap().is_constant());
        assert!(!contract.method("mint", &[json!(5)]).unwrap().is_constant());
    }

    #[test]
    fn test_legacy_constant_flag_marks_reads() {
        let legacy: Abi = serde_json::from_str(
            r#"[
              {"constant":true,"inputs":[],"name":"total","outputs":[{"name":"","type":"uint256"}],"payable":false,"type":"function"},
              {"constant":false,"inputs":[{"name":"amount","type":"uint256"}],"name":"burn","outputs":[],"payable":false,"type":"function"}
            ]"#,
        )
        .unwrap();
        let contract = client().contract(&legacy, Some(Address::repeat_byte(1))).unwrap();

        assert!(contract.method("total", &[]).unwrap().is_constant());
        assert!(!contract.method("burn", &[json!(1)]).unwrap().is_constant());
    }

    #[test]
    fn test_overloads_resolve_by_signature_or_arity() {
        let contract = client().contract(&abi(), Some(Address::repeat_byte(1))).unwrap();

        assert!(contract.method("mint", &[json!(OWNER), json!(5)]).is_ok());
        assert!(contract.method("mint(uint256)", &[json!(5)]).is_ok());
        assert!(matches!(
            contract.method("mint", &[]),
            Err(Error::Encoding(_))
        ));
        assert!(matches!(
            contract.method("burn", &[]),
            Err(Error::UnknownMethod(_))
        ));
    }

    #[test]
    fn test_method_calls_require_an_address() {
        let contract = client().contract(&abi(), None).unwrap();

        assert!(matches!(
            contract.method("balanceOf", &[json!(OWNER)]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_deploy_encodes_constructor_arguments() {
        let contract = client().contract(&abi(), None).unwrap();
        let bytecode = Bytes::from(vec![0x60, 0x80]);

        assert!(contract.deploy(&bytecode, &[json!(OWNER)]).is_ok());
        assert!(matches!(
            contract.deploy(&bytecode, &[]),
            Err(Error::Encoding(_))
        ));
    }

    #[tokio::test]
    async fn test_request_falls_back_to_default_sender() {
        let address = Address::repeat_byte(1);
        let ethers_client = client();
        let contract = EthersContract {
            middleware: ethers_client.middleware().clone(),
            abi: abi(),
            address: Some(address),
            default_from: Arc::new(RwLock::new(None)),
            confirmations: 1,
        };
        let sender: Address = OWNER.parse().unwrap();
        contract.set_default_from(Some(sender)).await;

        let function = contract.resolve("mint", 1).unwrap().clone();
        let tx = contract.transaction(Some(address), Bytes::from(vec![1]), Some(function), false);

        let request = tx
            .request(&TxFields {
                gas: Some(U256::from(50_000u64)),
                nonce: Some(U256::from(3u64)),
                ..Default::default()
            })
            .await;
        assert_eq!(request.from(), Some(&sender));
        assert_eq!(request.gas(), Some(&U256::from(50_000u64)));
        assert_eq!(request.nonce(), Some(&U256::from(3u64)));
        assert_eq!(request.to_addr(), Some(&address));

        let explicit = Address::repeat_byte(9);
        let request = tx
            .request(&TxFields {
                from: Some(explicit),
                ..Default::default()
            })
            .await;
        assert_eq!(request.from(), Some(&explicit));
    }
}
