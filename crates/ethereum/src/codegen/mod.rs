//! Code generation for typed contract bindings
//!
//! This module generates a Rust module per contract from its ABI JSON, wrapping the
//! untyped [`Binding`](contract_class_core::Binding) in one typed method per function.

pub mod generator;
pub mod parser;
pub mod templates;


pub use generator::BindingCodegen;
pub use parser::{AbiParser, EthereumAbi};

use std::path::PathBuf;

use contract_class_common::Result;

use crate::artifact::ContractArtifact;

/// Configuration for binding code generation
#[derive(Debug, Clone)]
pub struct BindingCodegenConfig {
    /// Contract name; drives the struct and file names
    pub contract_name: String,
    /// Output directory for generated code
    pub output_dir: String,
    /// Bytecode embedded for deployment
    pub bytecode: Option<String>,
    /// Whether this is a dry run
    pub dry_run: bool,
}

impl BindingCodegenConfig {
    /// Config taking the contract name and bytecode from `artifact`
    pub fn for_artifact(artifact: &ContractArtifact) -> Self {
        let defaults = Self::default();
        Self {
            contract_name: artifact.contract_name.clone().unwrap_or(defaults.contract_name),
            bytecode: Some(artifact.bytecode.clone()).filter(|code| !code.is_empty()),
            ..defaults
        }
    }
}

impl Default for BindingCodegenConfig {
    fn default() -> Self {
        Self {
            contract_name: "Contract".to_string(),
            output_dir: "./generated".to_string(),
            bytecode: None,
            dry_run: false,
        }
    }
}

/// Main entry point for binding generation from an ABI file
pub async fn generate_binding_code(abi_file_path: &str, config: BindingCodegenConfig) -> Result<PathBuf> {
    let parser = AbiParser::new();
    let abi = parser.parse_file(abi_file_path)?;

    let codegen = BindingCodegen::new(config)?;
    codegen.generate(&abi).await
}

/// Binding generation from a compiled artifact
pub async fn generate_from_artifact(artifact: &ContractArtifact, config: BindingCodegenConfig) -> Result<PathBuf> {
    let abi = AbiParser::new().parse_value(&artifact.abi_json)?;

    let codegen = BindingCodegen::new(config)?;
    codegen.generate(&abi).await
}
