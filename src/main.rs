//! Contract class command line entry point
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use contract_class_core::{BindingConfig, CallOptions, Execution, PromiEvent, Subscription};
use contract_class_ethereum::codegen::{generate_from_artifact, BindingCodegenConfig};
use contract_class_ethereum::{ContractArtifact, EthereumProviderConfig};
use ethers::types::Address;

#[derive(Parser)]
#[command(name = "contract-class")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Binding config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a typed binding module from an artifact or ABI file
    Generate {
        /// Artifact or ABI JSON file
        artifact: PathBuf,

        /// Bytecode to embed, overriding the artifact's
        #[arg(long)]
        bytecode: Option<String>,

        /// Contract name, overriding the artifact's
        #[arg(long)]
        name: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = "./generated")]
        output_dir: String,

        /// Print the module instead of writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Invoke a contract method
    Call {
        #[command(flatten)]
        node: NodeArgs,

        /// Contract address
        #[arg(long)]
        address: String,

        /// Method name or full signature
        method: String,

        /// Method arguments as JSON; bare words are taken as strings
        args: Vec<String>,

        #[command(flatten)]
        tx: TxArgs,
    },

    /// Deploy a contract
    Deploy {
        #[command(flatten)]
        node: NodeArgs,

        /// Constructor arguments as JSON; bare words are taken as strings
        args: Vec<String>,

        #[command(flatten)]
        tx: TxArgs,
    },
}

#[derive(Args)]
struct NodeArgs {
    /// Node RPC URL; ws:// and wss:// select the WebSocket transport
    #[arg(long, default_value = "http://localhost:8545")]
    rpc_url: String,

    /// Artifact or ABI JSON file
    #[arg(long)]
    artifact: PathBuf,

    /// Confirmations to wait for
    #[arg(long, default_value_t = 1)]
    confirmations: usize,
}

#[derive(Args)]
struct TxArgs {
    /// Sender address
    #[arg(long)]
    from: Option<String>,

    /// Value in wei
    #[arg(long)]
    value: Option<String>,

    /// Gas price in wei
    #[arg(long)]
    gas_price: Option<String>,

    /// Sender nonce
    #[arg(long)]
    nonce: Option<String>,

    /// Gas limit; skips estimation
    #[arg(long)]
    gas: Option<String>,

    /// Gas added to the estimate instead of the percentage margin
    #[arg(long)]
    extra_gas: Option<String>,

    /// Skip estimation and use the fallback gas
    #[arg(long)]
    no_estimate_gas: bool,

    /// Log gas used once the receipt arrives
    #[arg(long)]
    verbose: bool,
}

impl TxArgs {
    fn to_options(&self) -> Result<CallOptions> {
        let mut map = Map::new();
        let fields = [
            ("from", &self.from),
            ("value", &self.value),
            ("gasPrice", &self.gas_price),
            ("nonce", &self.nonce),
            ("$gas", &self.gas),
            ("$extraGas", &self.extra_gas),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                map.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        map.insert("$noEstimateGas".to_string(), json!(self.no_estimate_gas));
        map.insert("verbose".to_string(), json!(self.verbose));

        Ok(CallOptions::from_json(&Value::Object(map))?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BindingConfig::load(path)?,
        None => BindingConfig::default(),
    };

    match cli.command {
        Commands::Generate {
            artifact,
            bytecode,
            name,
            output_dir,
            dry_run,
        } => {
            let artifact = ContractArtifact::load(&artifact)?;

            let mut codegen_config = BindingCodegenConfig::for_artifact(&artifact);
            codegen_config.output_dir = output_dir;
            codegen_config.dry_run = dry_run;
            if let Some(name) = name {
                codegen_config.contract_name = name;
            }
            if bytecode.is_some() {
                codegen_config.bytecode = bytecode;
            }

            let path = generate_from_artifact(&artifact, codegen_config).await?;
            if !dry_run {
                info!(path = %path.display(), "Binding written");
            }
        }

        Commands::Call {
            node,
            address,
            method,
            args,
            tx,
        } => {
            let address: Address = address
                .parse()
                .with_context(|| format!("invalid contract address {}", address))?;
            let class = ContractArtifact::load(&node.artifact)?.to_class()?.with_config(config);
            let client = provider_config(&node).connect().await?;

            let binding = class.at(client, Some(address))?;
            binding.ready().await;

            match binding.invoke(&method, parse_args(&args), tx.to_options()?)? {
                Execution::Call(call) => {
                    println!("{}", serde_json::to_string_pretty(&call.await?)?);
                }
                Execution::Send(promise) => {
                    let receipt = settle_with_events(promise).await?;
                    println!("{}", serde_json::to_string_pretty(&receipt)?);
                }
            }
        }

        Commands::Deploy { node, args, tx } => {
            let class = ContractArtifact::load(&node.artifact)?.to_class()?.with_config(config);
            let client = provider_config(&node).connect().await?;

            let promise = class.deploy(client, parse_args(&args), Some(tx.to_options()?))?;
            let binding = settle_with_events(promise).await?;

            match binding.address() {
                Some(address) => println!("{:?}", address),
                None => println!("deployed without an address"),
            }
        }
    }

    Ok(())
}

fn provider_config(node: &NodeArgs) -> EthereumProviderConfig {
    EthereumProviderConfig {
        confirmations: node.confirmations,
        ..EthereumProviderConfig::for_url(&node.rpc_url)
    }
}

/// Arguments are JSON where they parse as JSON, plain strings otherwise
fn parse_args(args: &[String]) -> Vec<Value> {
    args.iter()
        .map(|arg| serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.clone())))
        .collect()
}

/// Print lifecycle events while waiting for settlement
async fn settle_with_events<T: Send + 'static>(promise: PromiEvent<T>) -> Result<T> {
    let printer = tokio::spawn(print_events(promise.subscribe()));
    let outcome = promise.await;
    printer.await?;
    Ok(outcome?)
}

async fn print_events(mut subscription: Subscription) {
    while let Some(event) = subscription.next().await {
        info!(event = event.name(), "{:?}", event);
    }
}
