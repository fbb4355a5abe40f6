//! Ethereum ABI parser
//!
//! Parses contract ABI JSON into the shape the binding generator works from.

use contract_class_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha3::{Digest, Keccak256};

/// Parsed Ethereum contract ABI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthereumAbi {
    /// Contract constructor
    pub constructor: Option<AbiFunction>,
    /// Contract functions (view/pure and state-changing)
    pub functions: Vec<AbiFunction>,
    /// Contract events
    pub events: Vec<AbiEvent>,
    /// Raw ABI, embedded verbatim in generated bindings
    pub raw_abi: Value,
}

/// ABI function definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiFunction {
    /// Function name
    pub name: String,
    /// Function type (function, constructor, fallback, receive)
    pub function_type: String,
    /// Function inputs
    pub inputs: Vec<AbiParameter>,
    /// Function outputs
    pub outputs: Vec<AbiParameter>,
    /// State mutability (pure, view, nonpayable, payable)
    pub state_mutability: String,
    /// Whether function is payable
    pub payable: bool,
    /// Whether function is constant (view/pure)
    pub constant: bool,
    /// Canonical signature, e.g. `transfer(address,uint256)`
    pub signature: Option<String>,
    /// 4-byte selector as `0x` hex
    pub selector: Option<String>,
}

/// ABI event definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiEvent {
    /// Event name
    pub name: String,
    /// Event inputs
    pub inputs: Vec<AbiParameter>,
    /// Whether event is anonymous
    pub anonymous: bool,
    /// Canonical signature, e.g. `Transfer(address,address,uint256)`
    pub signature: String,
    /// Event topic hash
    pub topic: String,
}

/// ABI parameter definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiParameter {
    /// Parameter name
    pub name: String,
    /// Parameter type (e.g., uint256, address, tuple[])
    pub param_type: String,
    /// Components (for tuples and structs)
    pub components: Option<Vec<AbiParameter>>,
    /// Whether parameter is indexed (for events)
    pub indexed: bool,
}

impl AbiParameter {
    /// Canonical type with tuples expanded, e.g. `(address,uint256)[]`
    pub fn canonical_type(&self) -> String {
        match (self.param_type.strip_prefix("tuple"), &self.components) {
            (Some(suffix), Some(components)) => {
                let inner: Vec<String> = components.iter().map(AbiParameter::canonical_type).collect();
                format!("({}){}", inner.join(","), suffix)
            }
            _ => self.param_type.clone(),
        }
    }
}

/// Ethereum ABI parser
#[derive(Debug, Default)]
pub struct AbiParser;

impl AbiParser {
    /// Create a new parser instance
    pub fn new() -> Self {
        Self
    }

    /// Parse an Ethereum ABI file
    pub fn parse_file(&self, file_path: &str) -> Result<EthereumAbi> {
        let content = std::fs::read_to_string(file_path)?;
        self.parse_content(&content)
    }

    /// Parse Ethereum ABI from JSON content
    pub fn parse_content(&self, content: &str) -> Result<EthereumAbi> {
        let value: Value = serde_json::from_str(content)?;
        self.parse_value(&value)
    }

    /// Parse ABI from a JSON value
    pub fn parse_value(&self, value: &Value) -> Result<EthereumAbi> {
        let abi_array = value
            .as_array()
            .ok_or_else(|| Error::configuration("ABI must be an array"))?;

        let mut constructor = None;
        let mut functions = Vec::new();
        let mut events = Vec::new();

        for item in abi_array {
            let item_type = item.get("type").and_then(|v| v.as_str()).unwrap_or("function");

            match item_type {
                "constructor" => {
                    constructor = Some(self.parse_function(item, "constructor")?);
                }
                "function" | "fallback" | "receive" => {
                    functions.push(self.parse_function(item, item_type)?);
                }
                "event" => {
                    events.push(self.parse_event(item)?);
                }
                _ => {
                    // Errors and unknown entries carry nothing callable
                }
            }
        }

        Ok(EthereumAbi {
            constructor,
            functions,
            events,
            raw_abi: value.clone(),
        })
    }

    fn parse_function(&self, value: &Value, function_type: &str) -> Result<AbiFunction> {
        let name = value
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(function_type)
            .to_string();

        let inputs = parameters(value, "inputs", false)?;
        let outputs = parameters(value, "outputs", false)?;

        let state_mutability = value
            .get("stateMutability")
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| {
                // Legacy support
                if value.get("constant").and_then(|v| v.as_bool()).unwrap_or(false) {
                    "view"
                } else if value.get("payable").and_then(|v| v.as_bool()).unwrap_or(false) {
                    "payable"
                } else {
                    "nonpayable"
                }
            })
            .to_string();

        let payable = state_mutability == "payable";
        let constant = state_mutability == "view" || state_mutability == "pure";

        let (signature, selector) = if function_type == "function" {
            let signature = canonical_signature(&name, &inputs);
            let selector = format!("0x{}", hex::encode(&keccak256(&signature)[..4]));
            (Some(signature), Some(selector))
        } else {
            (None, None)
        };

        Ok(AbiFunction {
            name,
            function_type: function_type.to_string(),
            inputs,
            outputs,
            state_mutability,
            payable,
            constant,
            signature,
            selector,
        })
    }

    fn parse_event(&self, value: &Value) -> Result<AbiEvent> {
        let name = value
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::configuration("Event must have a name"))?
            .to_string();

        let inputs = parameters(value, "inputs", true)?;
        let anonymous = value.get("anonymous").and_then(|v| v.as_bool()).unwrap_or(false);
        let signature = canonical_signature(&name, &inputs);
        let topic = format!("0x{}", hex::encode(keccak256(&signature)));

        Ok(AbiEvent {
            name,
            inputs,
            anonymous,
            signature,
            topic,
        })
    }

    /// Human-readable function signature
    pub fn get_function_signature(&self, function: &AbiFunction) -> String {
        let input_types: Vec<String> = function
            .inputs
            .iter()
            .map(|param| {
                if param.name.is_empty() {
                    param.param_type.clone()
                } else {
                    format!("{} {}", param.param_type, param.name)
                }
            })
            .collect();

        let output_types: Vec<String> = function.outputs.iter().map(|param| param.param_type.clone()).collect();

        let outputs_part = if output_types.is_empty() {
            String::new()
        } else {
            format!(" returns ({})", output_types.join(", "))
        };

        format!("function {}({}){}", function.name, input_types.join(", "), outputs_part)
    }
}

impl EthereumAbi {
    /// Callable named functions, excluding fallback and receive
    pub fn callable_functions(&self) -> impl Iterator<Item = &AbiFunction> {
        self.functions.iter().filter(|f| f.function_type == "function")
    }

    /// Events identified by a topic, excluding anonymous ones
    pub fn topic_events(&self) -> impl Iterator<Item = &AbiEvent> {
        self.events.iter().filter(|e| !e.anonymous)
    }
}

fn parameters(value: &Value, key: &str, with_indexed: bool) -> Result<Vec<AbiParameter>> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|array| parse_parameters(array, with_indexed))
        .transpose()
        .map(Option::unwrap_or_default)
}

fn parse_parameters(array: &[Value], with_indexed: bool) -> Result<Vec<AbiParameter>> {
    let mut parameters = Vec::with_capacity(array.len());

    for param in array {
        let name = param.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();

        let param_type = param
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::configuration("Parameter must have a type"))?
            .to_string();

        let components = if param_type.starts_with("tuple") {
            param
                .get("components")
                .and_then(|v| v.as_array())
                .map(|arr| parse_parameters(arr, false))
                .transpose()?
        } else {
            None
        };

        let indexed = with_indexed && param.get("indexed").and_then(|v| v.as_bool()).unwrap_or(false);

        parameters.push(AbiParameter {
            name,
            param_type,
            components,
            indexed,
        });
    }

    Ok(parameters)
}

fn canonical_signature(name: &str, inputs: &[AbiParameter]) -> String {
    let types: Vec<String> = inputs.iter().map(AbiParameter::canonical_type).collect();
    format!("{}({})", name, types.join(","))
}

fn keccak256(data: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data.as_bytes());
    hasher.finalize().into()
}
