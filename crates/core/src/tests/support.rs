//! Recording chain client double
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::abi::Abi;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};
use futures::stream;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::client::{ChainClient, ContractHandle, Submission, TransactionHandle, TxEvent};
use crate::options::TxFields;
use crate::{Error, Result};

pub const TOKEN_ABI: &str = r#"[
  {
    "type": "constructor",
    "inputs": [{"name": "supply", "type": "uint256"}],
    "stateMutability": "nonpayable"
  },
  {
    "type": "function",
    "name": "balanceOf",
    "inputs": [{"name": "owner", "type": "address"}],
    "outputs": [{"name": "", "type": "uint256"}],
    "stateMutability": "view"
  },
  {
    "type": "function",
    "name": "transfer",
    "inputs": [
      {"name": "to", "type": "address"},
      {"name": "amount", "type": "uint256"}
    ],
    "outputs": [{"name": "", "type": "bool"}],
    "stateMutability": "nonpayable"
  }
]"#;

pub const TOKEN_BYTECODE: &str = "6080604052";

/// Everything the client double was asked to do, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Accounts,
    Contract(Option<Address>),
    Deploy(Bytes, Vec<Value>),
    Method(String, Vec<Value>),
    Estimate(TxFields),
    Call(TxFields),
    Send(TxFields),
}

pub type Log = Arc<Mutex<Vec<Recorded>>>;

/// Scripted responses of the client double
#[derive(Clone)]
pub struct Script {
    pub accounts: std::result::Result<Vec<Address>, String>,
    pub estimate: std::result::Result<u64, String>,
    pub call_result: Value,
    pub send_error: Option<String>,
    pub events: Vec<TxEvent>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            accounts: Ok(vec![account(1), account(2)]),
            estimate: Ok(10_000),
            call_result: json!("1000"),
            send_error: None,
            events: lifecycle(None),
        }
    }
}

pub fn account(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub fn receipt(contract_address: Option<Address>) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: H256::from_low_u64_be(0xfeed),
        gas_used: Some(U256::from(21_000u64)),
        contract_address,
        ..Default::default()
    }
}

/// `transactionHash`, `confirmation`, `receipt`
pub fn lifecycle(contract_address: Option<Address>) -> Vec<TxEvent> {
    vec![
        TxEvent::TransactionHash(H256::from_low_u64_be(0xfeed)),
        TxEvent::Confirmation {
            number: 1,
            receipt: receipt(contract_address),
        },
        TxEvent::Receipt(receipt(contract_address)),
    ]
}

pub struct FakeClient {
    pub version: String,
    pub script: Script,
    pub log: Log,
    pub default_from: Arc<RwLock<Option<Address>>>,
}

impl FakeClient {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            version: "1.2.11".to_string(),
            script,
            log: Arc::new(Mutex::new(Vec::new())),
            default_from: Arc::new(RwLock::new(None)),
        })
    }

    pub fn with_version(version: &str) -> Arc<Self> {
        Arc::new(Self {
            version: version.to_string(),
            script: Script::default(),
            log: Arc::new(Mutex::new(Vec::new())),
            default_from: Arc::new(RwLock::new(None)),
        })
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn sends(&self) -> Vec<TxFields> {
        self.recorded()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Send(fields) => Some(fields),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChainClient for FakeClient {
    fn version(&self) -> String {
        self.version.clone()
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        self.log.lock().unwrap().push(Recorded::Accounts);
        self.script.accounts.clone().map_err(Error::client)
    }

    fn contract(&self, abi: &Abi, address: Option<Address>) -> Result<Arc<dyn ContractHandle>> {
        self.log.lock().unwrap().push(Recorded::Contract(address));

        let mut methods = HashMap::new();
        for function in abi.functions() {
            let constant = matches!(
                function.state_mutability,
                ethers::abi::StateMutability::View | ethers::abi::StateMutability::Pure
            );
            methods.insert(function.name.clone(), constant);
        }

        Ok(Arc::new(FakeContract {
            address,
            methods,
            script: self.script.clone(),
            log: self.log.clone(),
            default_from: self.default_from.clone(),
        }))
    }
}

struct FakeContract {
    address: Option<Address>,
    methods: HashMap<String, bool>,
    script: Script,
    log: Log,
    default_from: Arc<RwLock<Option<Address>>>,
}

#[async_trait]
impl ContractHandle for FakeContract {
    fn address(&self) -> Option<Address> {
        self.address
    }

    fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.push("0xa9059cbb".to_string());
        names
    }

    fn method(&self, name: &str, args: &[Value]) -> Result<Box<dyn TransactionHandle>> {
        let constant = *self
            .methods
            .get(name)
            .ok_or_else(|| Error::unknown_method(name))?;
        self.log
            .lock()
            .unwrap()
            .push(Recorded::Method(name.to_string(), args.to_vec()));

        Ok(Box::new(FakeTransaction {
            constant,
            script: self.script.clone(),
            log: self.log.clone(),
        }))
    }

    fn deploy(&self, bytecode: &Bytes, args: &[Value]) -> Result<Box<dyn TransactionHandle>> {
        self.log
            .lock()
            .unwrap()
            .push(Recorded::Deploy(bytecode.clone(), args.to_vec()));

        Ok(Box::new(FakeTransaction {
            constant: false,
            script: self.script.clone(),
            log: self.log.clone(),
        }))
    }

    async fn default_from(&self) -> Option<Address> {
        *self.default_from.read().await
    }

    async fn set_default_from(&self, from: Option<Address>) {
        *self.default_from.write().await = from;
    }
}

pub struct FakeTransaction {
    pub constant: bool,
    pub script: Script,
    pub log: Log,
}

#[async_trait]
impl TransactionHandle for FakeTransaction {
    fn is_constant(&self) -> bool {
        self.constant
    }

    async fn estimate_gas(&self, tx: &TxFields) -> Result<U256> {
        self.log.lock().unwrap().push(Recorded::Estimate(tx.clone()));
        self.script
            .estimate
            .clone()
            .map(U256::from)
            .map_err(Error::estimation)
    }

    async fn call(&self, tx: &TxFields) -> Result<Value> {
        self.log.lock().unwrap().push(Recorded::Call(tx.clone()));
        Ok(self.script.call_result.clone())
    }

    async fn send(&self, tx: &TxFields) -> Result<Submission> {
        self.log.lock().unwrap().push(Recorded::Send(tx.clone()));
        if let Some(message) = &self.script.send_error {
            return Err(Error::submission(message.clone()));
        }
        Ok(Box::pin(stream::iter(self.script.events.clone())))
    }
}
