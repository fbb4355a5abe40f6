//! Code generator for typed contract bindings
//!
//! Renders one Rust module per contract: a wrapper struct around a [`Binding`] with
//! one method per ABI function. Overloaded functions get numbered method names and
//! dispatch by full signature.
//!
//! [`Binding`]: contract_class_core::Binding

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use contract_class_common::{Error, Result};
use convert_case::{Case, Casing};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::parser::{AbiEvent, AbiFunction, AbiParameter, AbiParser, EthereumAbi};
use super::templates::{BindingTemplateManager, BINDING_MODULE};
use super::BindingCodegenConfig;

/// Method names taken by the wrapper itself
const RESERVED_METHODS: &[&str] = &["class", "at", "deploy", "binding", "address"];

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern", "false",
    "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "priv", "pub", "ref", "return",
    "self", "static", "struct", "super", "trait", "true", "try", "type", "unsafe", "use", "where", "while", "yield",
];

/// Code generator for typed bindings
pub struct BindingCodegen {
    config: BindingCodegenConfig,
    templates: BindingTemplateManager,
}

#[derive(Debug, Serialize)]
struct ParamView {
    name: String,
    rust_type: String,
    json_expr: String,
}

#[derive(Debug, Serialize)]
struct EventView {
    const_name: String,
    human_signature: String,
    topic: String,
}

#[derive(Debug, Serialize)]
struct FunctionView {
    method_name: String,
    dispatch_name: String,
    human_signature: String,
    selector: String,
    constant: bool,
    params: Vec<ParamView>,
}

impl BindingCodegen {
    /// Create a new code generator with the given configuration
    pub fn new(config: BindingCodegenConfig) -> Result<Self> {
        Ok(Self {
            config,
            templates: BindingTemplateManager::new()?,
        })
    }

    /// Render the binding module source
    pub fn render(&self, abi: &EthereumAbi) -> Result<String> {
        let abi_json = serde_json::to_string(&abi.raw_abi)?;
        let bytecode = self.config.bytecode.as_deref().unwrap_or_default();
        if !bytecode.chars().all(|c| c.is_ascii_hexdigit() || c == 'x') {
            return Err(Error::encoding("bytecode must be a hex string"));
        }

        let constructor_params = abi
            .constructor
            .as_ref()
            .map(|constructor| param_views(&constructor.inputs))
            .unwrap_or_default();

        let data = json!({
            "contract_name": self.config.contract_name,
            "struct_name": self.struct_name(),
            "abi_json": abi_json,
            "bytecode": bytecode,
            "constructor_params": constructor_params,
            "functions": function_views(abi),
            "events": event_views(abi),
        });

        self.templates.render(BINDING_MODULE, &data)
    }

    /// Render the module and write it to `{output_dir}/{contract}.rs`, or print it on a dry run
    pub async fn generate(&self, abi: &EthereumAbi) -> Result<PathBuf> {
        info!(contract = %self.config.contract_name, "Generating binding");

        let code = self.render(abi)?;
        let path = Path::new(&self.config.output_dir).join(format!("{}.rs", self.module_name()));
        self.write_file(&path, &code).await?;

        Ok(path)
    }

    /// Module file stem, snake case
    pub fn module_name(&self) -> String {
        sanitize_identifier(&self.config.contract_name).to_case(Case::Snake)
    }

    /// Wrapper struct name, Pascal case
    pub fn struct_name(&self) -> String {
        sanitize_identifier(&self.config.contract_name).to_case(Case::Pascal)
    }

    /// Write content to file (or just print if dry run)
    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        if self.config.dry_run {
            println!("\n--- {} ---", path.display());
            println!("{}", content);
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::configuration(format!("Failed to create directory: {}", e)))?;
            }
            tokio::fs::write(path, content)
                .await
                .map_err(|e| Error::configuration(format!("Failed to write file {}: {}", path.display(), e)))?;
            debug!(path = %path.display(), "Wrote binding");
        }
        Ok(())
    }
}

fn function_views(abi: &EthereumAbi) -> Vec<FunctionView> {
    let parser = AbiParser::new();

    let mut overloads: HashMap<&str, usize> = HashMap::new();
    for function in abi.callable_functions() {
        *overloads.entry(function.name.as_str()).or_default() += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    abi.callable_functions()
        .map(|function| {
            let index = seen.entry(function.name.as_str()).or_default();
            let overloaded = overloads[function.name.as_str()] > 1;
            let view = function_view(&parser, function, overloaded, *index);
            *index += 1;
            view
        })
        .collect()
}

fn event_views(abi: &EthereumAbi) -> Vec<EventView> {
    let mut overloads: HashMap<&str, usize> = HashMap::new();
    for event in abi.topic_events() {
        *overloads.entry(event.name.as_str()).or_default() += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    abi.topic_events()
        .map(|event| {
            let index = seen.entry(event.name.as_str()).or_default();
            let mut const_name = sanitize_identifier(&event.name).to_case(Case::Snake).to_uppercase();
            if overloads[event.name.as_str()] > 1 && *index > 0 {
                const_name = format!("{}_{}", const_name, index);
            }
            *index += 1;

            EventView {
                const_name: format!("{}_TOPIC", const_name),
                human_signature: event_signature(event),
                topic: event.topic.clone(),
            }
        })
        .collect()
}

/// `Transfer(address indexed from, address indexed to, uint256 value)`
fn event_signature(event: &AbiEvent) -> String {
    let params: Vec<String> = event
        .inputs
        .iter()
        .map(|param| {
            let mut part = param.canonical_type();
            if param.indexed {
                part.push_str(" indexed");
            }
            if !param.name.is_empty() {
                part.push(' ');
                part.push_str(&param.name);
            }
            part
        })
        .collect();
    format!("{}({})", event.name, params.join(", "))
}

fn function_view(parser: &AbiParser, function: &AbiFunction, overloaded: bool, index: usize) -> FunctionView {
    let mut method_name = sanitize_identifier(&function.name).to_case(Case::Snake);
    if overloaded && index > 0 {
        method_name = format!("{}_{}", method_name, index);
    }
    if RESERVED_METHODS.contains(&method_name.as_str()) || RUST_KEYWORDS.contains(&method_name.as_str()) {
        method_name.push('_');
    }

    let dispatch_name = match (&function.signature, overloaded) {
        (Some(signature), true) => signature.clone(),
        _ => function.name.clone(),
    };

    FunctionView {
        method_name,
        dispatch_name,
        human_signature: parser.get_function_signature(function),
        selector: function.selector.clone().unwrap_or_default(),
        constant: function.constant,
        params: param_views(&function.inputs),
    }
}

fn param_views(params: &[AbiParameter]) -> Vec<ParamView> {
    params
        .iter()
        .enumerate()
        .map(|(i, param)| {
            let mut name = sanitize_identifier(param.name.trim_start_matches('_')).to_case(Case::Snake);
            if name.is_empty() {
                name = format!("arg{}", i);
            }
            if name == "options" || name == "client" || RUST_KEYWORDS.contains(&name.as_str()) {
                name.push('_');
            }

            let rust_type = rust_type(&param.param_type);
            let json_expr = if rust_type == "I256" {
                format!("json!({}.to_string())", name)
            } else {
                format!("json!({})", name)
            };

            ParamView {
                name,
                rust_type,
                json_expr,
            }
        })
        .collect()
}

/// Rust type used for an ABI parameter type.
///
/// Signed integers travel as decimal strings, so arrays of them and tuples fall
/// back to `serde_json::Value`.
fn rust_type(abi_type: &str) -> String {
    if let Some(base) = abi_type.strip_suffix(']') {
        let open = base.rfind('[').unwrap_or(0);
        let inner = rust_type(&base[..open]);
        return match inner.as_str() {
            "I256" | "serde_json::Value" => "serde_json::Value".to_string(),
            _ => format!("Vec<{}>", inner),
        };
    }

    match abi_type {
        "bool" => "bool".to_string(),
        "address" => "Address".to_string(),
        "string" => "String".to_string(),
        _ if abi_type.starts_with("bytes") => "Bytes".to_string(),
        _ if abi_type.starts_with("uint") => "U256".to_string(),
        _ if abi_type.starts_with("int") => "I256".to_string(),
        _ => "serde_json::Value".to_string(),
    }
}

/// Keep identifier characters only
fn sanitize_identifier(name: &str) -> String {
    name.chars().filter(|c| c.is_alphanumeric() || *c == '_').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_types() {
        assert_eq!(rust_type("uint8"), "U256");
        assert_eq!(rust_type("int24"), "I256");
        assert_eq!(rust_type("bytes32"), "Bytes");
        assert_eq!(rust_type("address[]"), "Vec<Address>");
        assert_eq!(rust_type("uint256[2][]"), "Vec<Vec<U256>>");
        assert_eq!(rust_type("int256[]"), "serde_json::Value");
        assert_eq!(rust_type("tuple"), "serde_json::Value");
    }

    #[test]
    fn test_event_topics_skip_anonymous_and_number_overloads() {
        let abi = AbiParser::new()
            .parse_content(
                r#"[
                  {"type":"event","name":"Moved","inputs":[{"name":"to","type":"address","indexed":true}],"anonymous":false},
                  {"type":"event","name":"Moved","inputs":[{"name":"","type":"uint256","indexed":false}],"anonymous":false},
                  {"type":"event","name":"Hidden","inputs":[],"anonymous":true}
                ]"#,
            )
            .unwrap();

        let views = event_views(&abi);
        let names: Vec<_> = views.iter().map(|v| v.const_name.as_str()).collect();
        assert_eq!(names, vec!["MOVED_TOPIC", "MOVED_1_TOPIC"]);
        assert_eq!(views[0].human_signature, "Moved(address indexed to)");
        assert_eq!(views[1].human_signature, "Moved(uint256)");
        assert_ne!(views[0].topic, views[1].topic);
    }

    #[test]
    fn test_parameter_names_are_valid_identifiers() {
        let params = vec![
            AbiParameter {
                name: "_initialSupply".to_string(),
                param_type: "uint256".to_string(),
                components: None,
                indexed: false,
            },
            AbiParameter {
                name: String::new(),
                param_type: "int8".to_string(),
                components: None,
                indexed: false,
            },
            AbiParameter {
                name: "type".to_string(),
                param_type: "bool".to_string(),
                components: None,
                indexed: false,
            },
        ];

        let views = param_views(&params);
        let names: Vec<_> = views.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["initial_supply", "arg1", "type_"]);
        assert_eq!(views[1].json_expr, "json!(arg1.to_string())");
    }
}
