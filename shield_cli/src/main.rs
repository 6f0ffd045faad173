//! shield-cli: guarded CRUD against a JSON file store.

mod acl;
mod store;

use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::Value;
use shield_core::{
    load_auth_configs, Entity, Principal, Record, ShieldError, ShieldOptions, ShieldRegistry,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use store::JsonFileStore;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shield-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run guarded CRUD operations against a JSON file store", long_about = None)]
struct Cli {
    /// Sets the level of verbosity
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Shield rule declarations
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// ACL contexts
    #[arg(long, value_name = "FILE")]
    acl: PathBuf,

    /// Root directory of the record store
    #[arg(long, value_name = "DIR", default_value = "shield-data")]
    data: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct Target {
    /// Acting user
    #[arg(short, long)]
    user: String,

    /// Model name, e.g. Study
    #[arg(short, long)]
    model: String,

    /// Primary key of the record
    #[arg(long, value_parser = parse_value)]
    id: Value,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Read one record
    Read {
        #[command(flatten)]
        target: Target,
    },

    /// Read every record matching the filter
    ReadAll {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        model: String,

        /// Attribute filter as key=value (repeatable)
        #[arg(long = "where", value_name = "KEY=VALUE", value_parser = parse_assignment)]
        filter: Vec<(String, Value)>,
    },

    /// Create a new record
    Create {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        model: String,

        /// Attribute as key=value (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, Value)>,
    },

    /// Change attributes of a persisted record
    Update {
        #[command(flatten)]
        target: Target,

        /// Attribute as key=value (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, Value)>,
    },

    /// Delete a persisted record
    Delete {
        #[command(flatten)]
        target: Target,
    },

    /// Ask whether the user may perform any declared action on a record
    Check {
        #[command(flatten)]
        target: Target,

        /// Action name, e.g. archive
        #[arg(short, long)]
        action: String,
    },
}

/// JSON literal if it parses as one, plain string otherwise.
fn parse_value(raw: &str) -> Result<Value, String> {
    Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
}

fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in `{}`", raw));
    }
    Ok((key.to_string(), parse_value(value)?))
}

fn with_attributes(mut record: Record, attributes: Vec<(String, Value)>) -> Record {
    for (key, value) in attributes {
        record.insert(key, value);
    }
    record
}

fn exit_code(err: &ShieldError) -> u8 {
    match err {
        ShieldError::Authorization(_) => 77,
        ShieldError::Configuration(_) | ShieldError::Toml(_) => 78,
        ShieldError::State(_) => 65,
        _ => 1,
    }
}

fn registry(cli: &Cli) -> shield_core::Result<ShieldRegistry<JsonFileStore>> {
    let acl = acl::load_acl_backend(&cli.acl)?;
    let configs = load_auth_configs::<Record, _>(&cli.config)?;
    let store = JsonFileStore::new(&cli.data);

    let models: BTreeMap<_, _> = configs
        .iter()
        .filter_map(|config| config.model_name())
        .map(|name| (name.to_string(), store.clone()))
        .collect();
    debug!(models = ?models.keys().collect::<Vec<_>>(), data = ?store.base_path(), "Guarding models");

    ShieldRegistry::init(ShieldOptions {
        config: Some(configs),
        acl: Some(acl),
        models,
    })
}

async fn run(cli: Cli) -> shield_core::Result<Value> {
    let registry = registry(&cli)?;
    let shield_for = |model: &str| -> shield_core::Result<_> {
        registry
            .get(model)?
            .ok_or_else(|| ShieldError::configuration(format!("Model {} is not guarded", model)))
    };
    let lookup = |target: &Target| Record::new(target.model.as_str()).set("id", target.id.clone());

    let value = match cli.command {
        Commands::Read { target } => {
            let shield = shield_for(&target.model)?;
            let record = shield
                .read(&lookup(&target), &Principal::new(target.user.as_str()), &())
                .await?;
            record_json(&record)
        }
        Commands::ReadAll {
            user,
            model,
            filter,
        } => {
            let shield = shield_for(&model)?;
            let filter = with_attributes(Record::new(model.as_str()), filter);
            let records = shield
                .read_all(&filter, &Principal::new(user.as_str()), &())
                .await?;
            Value::Array(records.iter().map(record_json).collect())
        }
        Commands::Create { user, model, set } => {
            let shield = shield_for(&model)?;
            let record = with_attributes(Record::new(model.as_str()), set);
            let created = shield
                .create(&record, &Principal::new(user.as_str()), &())
                .await?;
            record_json(&created)
        }
        Commands::Update { target, set } => {
            let shield = shield_for(&target.model)?;
            let principal = Principal::new(target.user.as_str());
            let current = shield.read(&lookup(&target), &principal, &()).await?;
            let updated = shield
                .update(&with_attributes(current, set), &principal, &())
                .await?;
            record_json(&updated)
        }
        Commands::Delete { target } => {
            let shield = shield_for(&target.model)?;
            let record = lookup(&target);
            shield
                .delete(&record, &Principal::new(target.user.as_str()), &())
                .await?;
            serde_json::json!({ "deleted": record.primary_key() })
        }
        Commands::Check { target, action } => {
            let shield = shield_for(&target.model)?;
            let principal = Principal::new(target.user.as_str());
            let current = shield.read(&lookup(&target), &principal, &()).await?;
            shield.authorize(action.as_str(), &current, &principal).await?;
            serde_json::json!({ "allowed": action })
        }
    };
    Ok(value)
}

fn record_json(record: &Record) -> Value {
    Value::Object(record.attributes().clone())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(value) => {
            match serde_json::to_string_pretty(&value) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    error!("Failed to render output: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}
