//! Per-invocation options.
//!
//! Transaction fields and execution-control flags live in separate sections; only
//! [`TxFields`] is ever handed to the chain client. [`CallOptions::from_json`] accepts
//! the flat legacy mapping (`{"from": .., "$gas": .., "verbose": true}`) and drops
//! every key it does not recognize.

use std::fmt;
use std::str::FromStr;

use ethers::types::{Address, Bytes, H256, U256};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Transaction fields understood by the chain client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxFields {
    /// Sender
    pub from: Option<Address>,

    /// Recipient
    pub to: Option<Address>,

    /// Gas price in wei
    pub gas_price: Option<U256>,

    /// Gas limit
    pub gas: Option<U256>,

    /// Value in wei
    pub value: Option<U256>,

    /// Raw calldata
    pub data: Option<Bytes>,

    /// Sender nonce
    pub nonce: Option<U256>,
}

impl TxFields {
    /// Copy of the fields with the nonce removed.
    ///
    /// Estimation runs without a nonce so that several pending transactions from the
    /// same sender can be estimated before the first one is mined.
    pub fn without_nonce(&self) -> Self {
        Self {
            nonce: None,
            ..self.clone()
        }
    }

    /// Replace the gas limit
    pub fn with_gas(mut self, gas: U256) -> Self {
        self.gas = Some(gas);
        self
    }
}

/// Flags steering the execution engine; never sent to the client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionControl {
    /// Gas limit to use instead of estimating (`$gas`)
    pub gas: Option<U256>,

    /// Gas added to the estimate instead of the percentage margin (`$extraGas`)
    pub extra_gas: Option<U256>,

    /// Skip estimation and use the fallback gas (`$noEstimateGas`)
    pub no_estimate_gas: bool,

    /// Log gas used when the receipt arrives
    pub verbose: bool,
}

/// Options of a single invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Fields forwarded to the client
    pub tx: TxFields,

    /// Engine-only flags
    pub control: ExecutionControl,
}

impl CallOptions {
    /// Empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender
    pub fn with_from(mut self, from: Address) -> Self {
        self.tx.from = Some(from);
        self
    }

    /// Set the value in wei
    pub fn with_value(mut self, value: U256) -> Self {
        self.tx.value = Some(value);
        self
    }

    /// Use a fixed gas limit and skip estimation
    pub fn with_gas_override(mut self, gas: U256) -> Self {
        self.control.gas = Some(gas);
        self
    }

    /// Add a fixed amount to the estimate instead of the percentage margin
    pub fn with_extra_gas(mut self, extra: U256) -> Self {
        self.control.extra_gas = Some(extra);
        self
    }

    /// Skip estimation and use the fallback gas
    pub fn without_estimation(mut self) -> Self {
        self.control.no_estimate_gas = true;
        self
    }

    /// Log gas usage on receipt
    pub fn with_verbose(mut self) -> Self {
        self.control.verbose = true;
        self
    }

    /// Parse the flat legacy options mapping.
    ///
    /// Numeric fields accept JSON numbers, decimal strings and `0x` hex strings.
    /// Flags follow truthiness: `false`, `0`, `""` and `null` count as unset.
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| Error::serialization("options must be a JSON object"))?;

        let tx = TxFields {
            from: field(map, "from", parse_address)?,
            to: field(map, "to", parse_address)?,
            gas_price: field(map, "gasPrice", parse_quantity)?,
            gas: field(map, "gas", parse_quantity)?,
            value: field(map, "value", parse_quantity)?,
            data: field(map, "data", parse_data)?,
            nonce: field(map, "nonce", parse_quantity)?,
        };

        let control = ExecutionControl {
            gas: field(map, "$gas", parse_quantity)?,
            extra_gas: field(map, "$extraGas", parse_quantity)?,
            no_estimate_gas: map.get("$noEstimateGas").map(is_truthy).unwrap_or(false),
            verbose: map.get("verbose").map(is_truthy).unwrap_or(false),
        };

        Ok(Self { tx, control })
    }
}

fn field<T>(
    map: &Map<String, Value>,
    key: &str,
    parse: fn(&Value) -> Result<T>,
) -> Result<Option<T>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse(value)
            .map(Some)
            .map_err(|e| Error::serialization(format!("invalid option '{}': {}", key, e))),
    }
}

fn parse_address(value: &Value) -> Result<Address> {
    let text = value
        .as_str()
        .ok_or_else(|| Error::serialization("address must be a string"))?;
    Address::from_str(text).map_err(|e| Error::serialization(e.to_string()))
}

fn parse_quantity(value: &Value) -> Result<U256> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| Error::serialization(format!("{} is not an unsigned integer", number))),
        Value::String(text) => match text.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| Error::serialization(e.to_string())),
            None => U256::from_dec_str(text).map_err(|e| Error::serialization(e.to_string())),
        },
        other => Err(Error::serialization(format!("expected a quantity, got {}", other))),
    }
}

fn parse_data(value: &Value) -> Result<Bytes> {
    let text = value
        .as_str()
        .ok_or_else(|| Error::serialization("data must be a hex string"))?;
    Bytes::from_str(text).map_err(|e| Error::serialization(e.to_string()))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Callback notified once with the transaction hash, or with the submission error
pub type TxCallback = Box<dyn FnOnce(Result<H256>) + Send + 'static>;

/// Positional argument of a dynamic invocation
pub enum Arg {
    /// Method argument, or the options mapping when trailing
    Value(Value),

    /// Completion callback; only valid in last position
    Callback(TxCallback),
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Arg::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

/// Arguments of a dynamic invocation split into their roles
pub struct ParsedArgs {
    /// Method arguments
    pub args: Vec<Value>,

    /// Options taken from a trailing object, or defaults
    pub options: CallOptions,

    /// Trailing callback, if any
    pub callback: Option<TxCallback>,
}

impl ParsedArgs {
    /// Split positional arguments.
    ///
    /// A trailing callback is taken first; then a trailing non-array JSON object on
    /// what remains is parsed as options.
    pub fn parse(mut args: Vec<Arg>) -> Result<Self> {
        let callback = if matches!(args.last(), Some(Arg::Callback(_))) {
            match args.pop() {
                Some(Arg::Callback(callback)) => Some(callback),
                _ => None,
            }
        } else {
            None
        };

        let values = args
            .into_iter()
            .map(|arg| match arg {
                Arg::Value(value) => Ok(value),
                Arg::Callback(_) => Err(Error::encoding("a callback is only accepted as the last argument")),
            })
            .collect::<Result<Vec<_>>>()?;

        let (args, options) = split_trailing_options(values)?;

        Ok(Self {
            args,
            options: options.unwrap_or_default(),
            callback,
        })
    }
}

/// Pop a trailing non-array JSON object and parse it as options
pub fn split_trailing_options(mut args: Vec<Value>) -> Result<(Vec<Value>, Option<CallOptions>)> {
    if let Some(last @ Value::Object(_)) = args.last() {
        let options = CallOptions::from_json(last)?;
        args.pop();
        return Ok((args, Some(options)));
    }
    Ok((args, None))
}
