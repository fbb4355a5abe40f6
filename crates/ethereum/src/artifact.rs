//! Compiled contract artifacts
//!
//! Accepts the shape written by common build tools,
//! `{"contractName": .., "abi": [..], "bytecode": ..}`, where `bytecode` is either a
//! hex string or an object with an `object` field. A bare ABI array is accepted too.

use std::path::Path;

use contract_class_common::{Error, Result};
use contract_class_core::ContractClass;
use ethers::abi::Abi;
use serde_json::Value;

/// ABI and bytecode loaded from a JSON artifact
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    /// Contract name, if the artifact records one
    pub contract_name: Option<String>,

    /// Parsed interface description
    pub abi: Abi,

    /// The ABI exactly as it appeared in the artifact
    pub abi_json: Value,

    /// Hex bytecode; empty when the artifact has none
    pub bytecode: String,
}

impl ContractArtifact {
    /// Load an artifact file. The contract name falls back to the file stem.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("failed to read {}: {}", path.display(), e)))?;

        let mut artifact = Self::from_json_str(&content)?;
        if artifact.contract_name.is_none() {
            artifact.contract_name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(|stem| stem.split('.').next().unwrap_or(stem).to_string());
        }
        Ok(artifact)
    }

    /// Parse artifact JSON
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(value)
    }

    /// Parse an already decoded artifact
    pub fn from_value(value: Value) -> Result<Self> {
        let (contract_name, abi_json, bytecode) = match value {
            Value::Array(_) => (None, value, String::new()),
            Value::Object(mut map) => {
                let abi_json = map
                    .remove("abi")
                    .ok_or_else(|| Error::configuration("artifact has no abi"))?;
                let contract_name = map
                    .get("contractName")
                    .and_then(Value::as_str)
                    .map(String::from);
                let bytecode = match map.get("bytecode") {
                    Some(Value::String(code)) => code.clone(),
                    Some(Value::Object(code)) => code
                        .get("object")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    _ => String::new(),
                };
                (contract_name, abi_json, bytecode)
            }
            other => {
                return Err(Error::configuration(format!(
                    "artifact must be an object or an ABI array, got {}",
                    other
                )))
            }
        };

        let abi: Abi = serde_json::from_value(abi_json.clone())?;

        Ok(Self {
            contract_name,
            abi,
            abi_json,
            bytecode,
        })
    }

    /// Replace the bytecode
    pub fn with_bytecode(mut self, bytecode: impl Into<String>) -> Self {
        self.bytecode = bytecode.into();
        self
    }

    /// Contract class for this artifact
    pub fn to_class(&self) -> Result<ContractClass> {
        ContractClass::generate(Some(self.abi.clone()), &self.bytecode)
    }
}
