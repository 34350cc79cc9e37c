use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::debug;

use carina_core::provider::Provider;
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_provider_fastly::schemas::{SERVICE_V1, keys};
use carina_provider_fastly::{FastlyConfig, FastlyProvider};

#[derive(Parser)]
#[command(name = "carina")]
#[command(about = "Manage Fastly CDN services", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List services in the account
    Services,
    /// Show the active configuration of a service
    Show {
        /// Service ID
        service_id: String,
    },
    /// Create or update a service from a JSON description
    Apply {
        /// Path to .json file with the service attributes
        file: PathBuf,

        /// Update this existing service instead of creating a new one
        #[arg(long)]
        service_id: Option<String>,
    },
    /// Delete a service
    Destroy {
        /// Service ID
        service_id: String,

        /// Deactivate the active version before deleting
        #[arg(long)]
        force: bool,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Services => run_services().await,
        Commands::Show { service_id } => run_show(&service_id).await,
        Commands::Apply { file, service_id } => run_apply(&file, service_id.as_deref()).await,
        Commands::Destroy {
            service_id,
            force,
            auto_approve,
        } => run_destroy(&service_id, force, auto_approve).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn create_provider() -> Result<FastlyProvider, String> {
    let config = FastlyConfig::from_env().map_err(|e| e.to_string())?;
    debug!("Using {:?}", config);
    FastlyProvider::new(&config).map_err(|e| e.to_string())
}

fn service_id(name: &str) -> ResourceId {
    ResourceId::new(SERVICE_V1, name)
}

async fn run_services() -> Result<(), String> {
    let provider = create_provider()?;
    let services = provider
        .api()
        .list_services()
        .await
        .map_err(|e| format!("Failed to list services: {}", e))?;

    if services.is_empty() {
        println!("{}", "No services found.".yellow());
        return Ok(());
    }

    for service in services {
        let active = match service.active_version {
            Some(v) => format!("v{}", v).green(),
            None => "inactive".dimmed(),
        };
        println!("  {}  {}  {}", service.id.cyan(), service.name.bold(), active);
    }
    Ok(())
}

async fn run_show(identifier: &str) -> Result<(), String> {
    let provider = create_provider()?;
    let state = provider
        .read(&service_id("service"), Some(identifier))
        .await
        .map_err(|e| e.to_string())?;

    if !state.exists {
        return Err(format!("Service {} not found", identifier));
    }

    let json = serde_json::to_string_pretty(&state_to_json(&state)).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

async fn run_apply(file: &Path, identifier: Option<&str>) -> Result<(), String> {
    let resource = load_resource(file)?;
    let provider = create_provider()?;

    let current = provider
        .read(&resource.id, identifier)
        .await
        .map_err(|e| e.to_string())?;

    let state = if current.exists {
        let identifier = current.identifier.clone().unwrap_or_default();
        println!("{} {}", "~".yellow().bold(), resource.id);
        provider
            .update(&resource.id, &identifier, &current, &resource)
            .await
            .map_err(|e| e.to_string())?
    } else {
        if let Some(identifier) = identifier {
            return Err(format!("Service {} not found", identifier));
        }
        println!("{} {}", "+".green().bold(), resource.id);
        provider.create(&resource).await.map_err(|e| e.to_string())?
    };

    let version = state
        .get(keys::ACTIVE_VERSION)
        .and_then(Value::as_int)
        .unwrap_or(0);
    println!();
    println!(
        "{}",
        format!(
            "Apply complete! Service {} is at version {}.",
            state.identifier.as_deref().unwrap_or("?"),
            version
        )
        .green()
        .bold()
    );
    Ok(())
}

async fn run_destroy(identifier: &str, force: bool, auto_approve: bool) -> Result<(), String> {
    let provider = create_provider()?;
    let id = service_id("service");

    let mut last = provider
        .read(&id, Some(identifier))
        .await
        .map_err(|e| e.to_string())?;
    if !last.exists {
        println!("{}", "No service to destroy.".green());
        return Ok(());
    }

    let name = last
        .get(keys::NAME)
        .and_then(Value::as_str)
        .unwrap_or(identifier)
        .to_string();
    println!("  {} {} ({})", "-".red().bold(), name.bold(), identifier);
    println!();

    // Confirmation prompt
    if !auto_approve {
        println!("{}", "Do you really want to destroy this service?".yellow().bold());
        println!(
            "  {}",
            "This action cannot be undone. Type 'yes' to confirm.".yellow()
        );
        print!("\n  Enter a value: ");
        std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .map_err(|e| e.to_string())?;

        if input.trim() != "yes" {
            println!();
            println!("{}", "Destroy cancelled.".yellow());
            return Ok(());
        }
        println!();
    }

    last.attributes
        .insert(keys::FORCE_DESTROY.to_string(), Value::Bool(force));
    provider
        .delete(&id, identifier, &last)
        .await
        .map_err(|e| e.to_string())?;

    println!("{}", format!("Destroy complete! {} deleted.", name).green().bold());
    Ok(())
}

/// Load a service description; the binding name is the file stem
fn load_resource(file: &Path) -> Result<Resource, String> {
    let content = fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse {}: {}", file.display(), e))?;

    let name = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("service");
    resource_from_json(name, &json).map_err(|e| format!("{}: {}", file.display(), e))
}

fn resource_from_json(name: &str, json: &serde_json::Value) -> Result<Resource, String> {
    let object = json
        .as_object()
        .ok_or_else(|| "expected a JSON object of service attributes".to_string())?;

    let mut resource = Resource::new(SERVICE_V1, name);
    for (key, value) in object {
        let value = json_to_value(value).map_err(|e| format!("'{}': {}", key, e))?;
        resource.attributes.insert(key.clone(), value);
    }
    Ok(resource)
}

fn json_to_value(json: &serde_json::Value) -> Result<Value, String> {
    match json {
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| format!("unsupported number {}", n)),
        serde_json::Value::Array(items) => items
            .iter()
            .map(json_to_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| json_to_value(v).map(|v| (k.clone(), v)))
            .collect::<Result<HashMap<_, _>, _>>()
            .map(Value::Map),
        serde_json::Value::Null => Err("null is not a valid value".to_string()),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

fn state_to_json(state: &State) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    if let Some(identifier) = &state.identifier {
        object.insert("id".to_string(), serde_json::Value::from(identifier.as_str()));
    }
    for (key, value) in &state.attributes {
        object.insert(key.clone(), value_to_json(value));
    }
    serde_json::Value::Object(object)
}
