use clap::Parser;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, error};

use subordinates_core::store::JsonFileStore;
use subordinates_core::{
    Config, DirectoryLock, Outcome, SubordinatesError, SubordinatesManager, SubordinatesResult,
};

#[derive(Parser)]
#[command(name = "subordinates")]
#[command(about = "Manage subordinate controllers bridged to this controller", long_about = None)]
struct Cli {
    /// Configuration file (TOML); defaults plus environment when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// List subordinates and their sub-subordinates
    List,
    /// Provision a subordinate from a token
    AddSub {
        /// File holding the base64 token, `-` for stdin
        #[arg(long)]
        token_file: String,
    },
    /// Register a sub-subordinate reachable through a subordinate
    AddSubsub {
        #[arg(long)]
        controller_id: String,
        #[arg(long)]
        via: String,
    },
    /// Delete a node; subordinates take their sub-subordinates along
    Del {
        #[arg(long)]
        controller_id: String,
    },
    /// Enable or disable a node
    SetEnabled {
        #[arg(long)]
        controller_id: String,
        #[arg(long, action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Rename a subordinate, optionally changing its address
    UpdateSub {
        #[arg(long)]
        controller_id: String,
        #[arg(long)]
        custom_name: String,
        #[arg(long)]
        ip_address: Option<String>,
    },
    /// Rename a sub-subordinate
    UpdateSubsub {
        #[arg(long)]
        controller_id: String,
        #[arg(long)]
        custom_name: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> SubordinatesResult<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => {
            let mut config = Config::default();
            config.apply_env_overrides()?;
            config.validate()?;
            Ok(config)
        }
    }
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "subordinates={level},subordinates_core={level}"
        ))
    });

    // stdout carries the JSON reply
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn read_token(source: &str) -> SubordinatesResult<String> {
    if source == "-" {
        let mut token = String::new();
        tokio::io::stdin().read_to_string(&mut token).await?;
        Ok(token)
    } else {
        tokio::fs::read_to_string(source).await.map_err(|e| {
            SubordinatesError::configuration("token", format!("Failed to read {}: {}", source, e))
        })
    }
}

fn reply<T>(outcome: &Outcome<T>, controller_id: &str) -> Value {
    match outcome {
        Outcome::Applied(_) => json!({ "result": true, "controller_id": controller_id }),
        Outcome::Refused(refusal) => json!({
            "result": false,
            "controller_id": controller_id,
            "reason": refusal.to_string(),
        }),
    }
}

async fn run(manager: &SubordinatesManager, command: Commands) -> SubordinatesResult<Value> {
    let value = match command {
        Commands::List => {
            let subordinates = manager.list().await?;
            json!({ "subordinates": subordinates })
        }
        Commands::AddSub { token_file } => {
            let token = read_token(&token_file).await?;
            match manager.add_subordinate(&token).await? {
                Outcome::Applied(controller_id) => {
                    json!({ "result": true, "controller_id": controller_id })
                }
                Outcome::Refused(refusal) => {
                    json!({ "result": false, "reason": refusal.to_string() })
                }
            }
        }
        Commands::AddSubsub { controller_id, via } => {
            let outcome = manager.add_sub_subordinate(&controller_id, &via).await?;
            reply(&outcome, &controller_id)
        }
        Commands::Del { controller_id } => {
            let outcome = manager.delete(&controller_id).await?;
            reply(&outcome, &controller_id)
        }
        Commands::SetEnabled {
            controller_id,
            enabled,
        } => {
            let outcome = manager.set_enabled(&controller_id, enabled).await?;
            let mut value = reply(&outcome, &controller_id);
            value["enabled"] = json!(enabled);
            value
        }
        Commands::UpdateSub {
            controller_id,
            custom_name,
            ip_address,
        } => {
            let outcome = manager
                .update_subordinate(&controller_id, &custom_name, ip_address.as_deref())
                .await?;
            reply(&outcome, &controller_id)
        }
        Commands::UpdateSubsub {
            controller_id,
            custom_name,
        } => {
            let outcome = manager
                .update_sub_subordinate(&controller_id, &custom_name)
                .await?;
            reply(&outcome, &controller_id)
        }
    };
    Ok(value)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(2);
        }
    };
    init_logging(&config.logging.level);
    debug!(
        controller_id = %config.controller.id,
        bus = %config.controller.bus,
        store = %config.store.path.display(),
        "Loaded configuration"
    );

    let store = Arc::new(JsonFileStore::new(&config.store.path));
    let manager = SubordinatesManager::from_config(&config, store, DirectoryLock::new());

    match run(&manager, cli.command).await {
        Ok(value) => println!("{}", value),
        Err(e) => {
            error!("Operation failed: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
