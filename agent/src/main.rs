//! Netauto Agent - Entry Point
//!
//! One-shot deployment runner: reads a change event from disk, drives the
//! orchestrator once and exits. Scheduling and webhook ingress live in the
//! surrounding automation platform; this binary is what it invokes per
//! event. Two operator utilities ride along: declaration snapshots and
//! profile inventory.

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::sync::Arc;

use netauto_agent::deploy::orchestrator::{Orchestrator, RunOutcome};
use netauto_agent::deploy::router::HandlerRegistry;
use netauto_agent::errors::AgentError;
use netauto_agent::filesys::file::File;
use netauto_agent::logs::{init_logging, LogOptions};
use netauto_agent::platform::client::PlatformClient;
use netauto_agent::storage::settings::Settings;
use netauto_agent::utils::version_info;

use tracing::{error, info};

const DEFAULT_SETTINGS_PATH: &str = "/etc/netauto/agent.json";

const USAGE: &str = "Usage: netauto-agent --event=<event.json> [--settings=<agent.json>]\n\
       netauto-agent --snapshot=<tenant>/<app> --device-address=<host>\n\
       netauto-agent --profiles=<type> --device-address=<host>";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version_info()).unwrap());
        return;
    }

    // Retrieve the settings file; a missing default file means defaults.
    let settings_path = cli_args
        .get("settings")
        .cloned()
        .unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string());
    let settings_file = File::new(&settings_path);
    let settings = if settings_file.exists().await {
        match settings_file.read_json::<Settings>().await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to read settings file {}: {}", settings_path, e);
                std::process::exit(2);
            }
        }
    } else if cli_args.contains_key("settings") {
        eprintln!("Settings file {} does not exist", settings_path);
        std::process::exit(2);
    } else {
        Settings::default()
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    let result = if let Some(target) = cli_args.get("snapshot") {
        snapshot(&settings, &cli_args, target).await
    } else if let Some(profile_type) = cli_args.get("profiles") {
        profiles(&settings, &cli_args, profile_type).await
    } else if let Some(event_path) = cli_args.get("event") {
        run(&settings, event_path).await.map(|outcome| match outcome {
            RunOutcome::Deployed {
                target_kind,
                target_id,
            } => info!("Deployed {} {}", target_kind, target_id),
            RunOutcome::TicketStaged(ticket) => {
                info!("Staged ticket {} on branch {}", ticket.ritm, ticket.branch)
            }
        })
    } else {
        eprintln!("{}", USAGE);
        std::process::exit(2)
    };

    if let Err(e) = result {
        error!("Run failed: {}", e);
        std::process::exit(1);
    }
}

/// Run the orchestrator for one event file.
async fn run(settings: &Settings, event_path: &str) -> Result<RunOutcome, AgentError> {
    let platform: Arc<PlatformClient> = Arc::new(settings.platform.client()?);
    let connector = settings.device.connector()?;
    let registry = HandlerRegistry::defaults()?;

    let orchestrator = Orchestrator::new(platform.clone(), platform, connector, registry);

    let raw: serde_json::Value = File::new(event_path).read_json().await?;
    info!("Processing event from {}", event_path);
    orchestrator.handle_event(&raw).await
}

/// Save a declaration snapshot for one deployed application.
async fn snapshot(
    settings: &Settings,
    cli_args: &HashMap<String, String>,
    target: &str,
) -> Result<(), AgentError> {
    let Some((tenant, app_name)) = target.split_once('/') else {
        return Err(AgentError::ConfigError(
            "--snapshot expects <tenant>/<app>".to_string(),
        ));
    };
    let device = connect_from_args(settings, cli_args).await?;

    let saved = device
        .snapshot_application(tenant, app_name, Path::new(&settings.snapshot_dir))
        .await?;
    info!("Snapshot written to {}", saved.display());
    Ok(())
}

/// List non-factory profiles of one type on a device.
async fn profiles(
    settings: &Settings,
    cli_args: &HashMap<String, String>,
    profile_type: &str,
) -> Result<(), AgentError> {
    let device = connect_from_args(settings, cli_args).await?;
    let profiles = device.list_custom_profiles(profile_type).await?;
    println!("{}", serde_json::to_string_pretty(&profiles)?);
    Ok(())
}

async fn connect_from_args(
    settings: &Settings,
    cli_args: &HashMap<String, String>,
) -> Result<bigip_client::DeviceClient, AgentError> {
    let Some(address) = cli_args.get("device-address") else {
        return Err(AgentError::ConfigError(
            "--device-address is required".to_string(),
        ));
    };
    settings.device.connector()?.connect(address).await
}
