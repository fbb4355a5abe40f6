//! Template system for typed binding generation
//!
//! Contains the Handlebars template for a binding module.

use contract_class_common::{Error, Result};
use handlebars::Handlebars;

/// Name of the binding module template
pub const BINDING_MODULE: &str = "binding_module";

const BINDING_MODULE_TEMPLATE: &str = r####"//! Generated binding for the {{contract_name}} contract.
//!
//! Do not edit by hand; regenerate from the ABI instead.

use std::sync::Arc;

use contract_class_core::{Binding, CallOptions, ChainClient, ContractClass, Execution, Result};
#[allow(unused_imports)]
use ethers::types::{Address, Bytes, I256, U256};
use serde_json::json;

/// Interface description of {{contract_name}}
pub const ABI: &str = r###"{{abi_json}}"###;

/// Deployment bytecode of {{contract_name}}; empty when unknown
pub const BYTECODE: &str = "{{bytecode}}";
{{#each events}}

/// Topic of `{{human_signature}}`
pub const {{const_name}}: &str = "{{topic}}";
{{/each}}

/// Typed binding for the {{contract_name}} contract
#[derive(Debug)]
pub struct {{struct_name}} {
    binding: Binding,
}

impl {{struct_name}} {
    /// Contract class for {{contract_name}}
    pub fn class() -> Result<ContractClass> {
        ContractClass::from_json(ABI, BYTECODE)
    }

    /// Bind to a deployed instance at `address`
    pub fn at(client: Arc<dyn ChainClient>, address: Address) -> Result<Self> {
        let binding = Self::class()?.at(client, Some(address))?;
        Ok(Self { binding })
    }

    /// Deploy a new instance and bind to it once mined
    pub async fn deploy(client: Arc<dyn ChainClient>{{#each constructor_params}}, {{name}}: {{rust_type}}{{/each}}, options: CallOptions) -> Result<Self> {
        let promise = Self::class()?.deploy(client, vec![{{#each constructor_params}}{{json_expr}}, {{/each}}], Some(options))?;
        let binding = promise.await?;
        Ok(Self { binding })
    }

    /// Untyped binding
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Contract address
    pub fn address(&self) -> Option<Address> {
        self.binding.address()
    }
{{#each functions}}

    /// `{{human_signature}}`
    ///
    /// Selector `{{selector}}`, {{#if constant}}read-only call{{else}}submitted as a transaction{{/if}}.
    pub fn {{method_name}}(&self{{#each params}}, {{name}}: {{rust_type}}{{/each}}, options: CallOptions) -> Result<Execution> {
        self.binding.invoke("{{dispatch_name}}", vec![{{#each params}}{{json_expr}}, {{/each}}], options)
    }
{{/each}}
}
"####;

/// Template manager for binding generation
pub struct BindingTemplateManager {
    handlebars: Handlebars<'static>,
}

impl BindingTemplateManager {
    /// Create a new template manager and register all templates
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        // Output is Rust source, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars
            .register_template_string(BINDING_MODULE, BINDING_MODULE_TEMPLATE)
            .map_err(|e| Error::configuration(format!("Failed to register {} template: {}", BINDING_MODULE, e)))?;

        Ok(Self { handlebars })
    }

    /// Render a template with the given data
    pub fn render(&self, template_name: &str, data: &serde_json::Value) -> Result<String> {
        self.handlebars
            .render(template_name, data)
            .map_err(|e| Error::configuration(format!("Failed to render template {}: {}", template_name, e)))
    }
}
