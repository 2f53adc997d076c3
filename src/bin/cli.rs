//! Firmware Registry CLI - Main entry point
//!
//! This binary provides the `fwregistry` tool: the HTTP server plus direct
//! administration of the local store.

use anyhow::Context;
use clap::Parser;
use fwregistry_lib::engine::{
    cli::{formatter::CliFormatter, Cli, Commands, OutputFormat, WebhooksAction},
    config::Config,
    database::Database,
    firmware::{validate_identifier, ArtifactRecord, EVENT_DELETED, EVENT_UPLOADED},
    logging,
    migrations::MigrationRunner,
    server::{self, Announce, Registry},
    webhook::{DeliveryOutcome, NewSubscription, SubscriptionRequest},
};
use serde_json::json;
use std::fs::File;
use std::path::Path;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_cli(cli) {
        CliFormatter::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let json_output = cli.format == OutputFormat::Json;
    logging::init(logging::DEFAULT_DIRECTIVE, json_output);

    let config = Config::load(cli.config.as_deref())?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Serve { listen } => cmd_serve(config, listen).await,
            Commands::Migrate => cmd_migrate(&config, json_output),
            Commands::Ingest { artifact_type, version, file } => {
                cmd_ingest(config, &artifact_type, &version, &file, json_output).await
            }
            Commands::List { artifact_type } => cmd_list(config, &artifact_type, json_output),
            Commands::Latest { artifact_type } => cmd_latest(config, &artifact_type, json_output),
            Commands::Remove { artifact_type, version } => {
                cmd_remove(config, &artifact_type, &version, json_output).await
            }
            Commands::Webhooks { action } => cmd_webhooks(config, action, json_output),
        }
    })
}

async fn cmd_serve(mut config: Config, listen: Option<String>) -> anyhow::Result<()> {
    if let Some(addr) = listen {
        config.listen_addr = addr;
    }
    server::serve(config).await
}

fn cmd_migrate(config: &Config, json: bool) -> anyhow::Result<()> {
    let db = Database::new(&config.db_path)?;
    let applied = MigrationRunner::embedded().push(&db)?;

    if json {
        println!("{}", json!({ "success": true, "applied": applied }));
    } else if applied.is_empty() {
        CliFormatter::success("No pending migrations");
    } else {
        CliFormatter::success(&format!("Applied {} migration(s):", applied.len()));
        for name in &applied {
            CliFormatter::item(name);
        }
    }
    Ok(())
}

async fn cmd_ingest(
    config: Config,
    artifact_type: &str,
    version: &str,
    file: &Path,
    json: bool,
) -> anyhow::Result<()> {
    validate_identifier("type", artifact_type)?;
    validate_identifier("version", version)?;

    let registry = Registry::open(config, Announce::Manual)?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "firmware.bin".to_string());
    let reader = File::open(file).with_context(|| format!("failed to open {}", file.display()))?;

    let record = registry.artifacts.ingest(artifact_type, version, &filename, reader)?;
    let view = registry.artifacts.view(&record);
    let outcomes = registry.dispatcher.dispatch(EVENT_UPLOADED, &view).join().await;

    if json {
        println!("{}", json!({ "artifact": view, "deliveries": deliveries_json(&outcomes) }));
    } else {
        CliFormatter::success(&format!("Stored {} {}", artifact_type, version));
        CliFormatter::artifact(&record, view.download_url.as_deref());
        print_deliveries(&outcomes);
    }
    Ok(())
}

fn cmd_list(config: Config, artifact_type: &str, json: bool) -> anyhow::Result<()> {
    validate_identifier("type", artifact_type)?;
    let registry = Registry::open(config, Announce::Manual)?;
    let records = registry.artifacts.list(artifact_type)?;

    if json {
        let views: Vec<_> = records.iter().map(|r| registry.artifacts.view(r)).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else if records.is_empty() {
        CliFormatter::warning(&format!("No firmware stored for {}", artifact_type));
    } else {
        CliFormatter::header(&format!("Firmware: {}", artifact_type));
        CliFormatter::artifact_table(&records);
    }
    Ok(())
}

fn cmd_latest(config: Config, artifact_type: &str, json: bool) -> anyhow::Result<()> {
    validate_identifier("type", artifact_type)?;
    let registry = Registry::open(config, Announce::Manual)?;
    let record = registry.artifacts.latest(artifact_type)?;
    print_record(&registry, &record, json)
}

async fn cmd_remove(config: Config, artifact_type: &str, version: &str, json: bool) -> anyhow::Result<()> {
    validate_identifier("type", artifact_type)?;
    validate_identifier("version", version)?;

    let registry = Registry::open(config, Announce::Manual)?;
    let record = registry.artifacts.remove(artifact_type, version)?;
    let view = registry.artifacts.view(&record);
    let outcomes = registry.dispatcher.dispatch(EVENT_DELETED, &view).join().await;

    if json {
        println!("{}", json!({ "deleted": true, "deliveries": deliveries_json(&outcomes) }));
    } else {
        CliFormatter::success(&format!("Removed {} {}", artifact_type, version));
        print_deliveries(&outcomes);
    }
    Ok(())
}

fn cmd_webhooks(config: Config, action: WebhooksAction, json: bool) -> anyhow::Result<()> {
    let registry = Registry::open(config, Announce::Manual)?;
    let repo = &registry.webhooks;

    match action {
        WebhooksAction::List => {
            let subscriptions = repo.list()?;
            if json {
                let views: Vec<_> = subscriptions.iter().map(|s| s.to_view()).collect();
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else if subscriptions.is_empty() {
                CliFormatter::info("No webhooks registered");
            } else {
                CliFormatter::header("Webhooks");
                CliFormatter::subscription_table(&subscriptions);
            }
        }
        WebhooksAction::Add { url, events, disabled } => {
            let id = repo.create(&subscription(url, events, disabled)?)?;
            if json {
                println!("{}", json!({ "id": id }));
            } else {
                CliFormatter::success(&format!("Registered webhook {}", id));
            }
        }
        WebhooksAction::Update { id, url, events, disabled } => {
            repo.update(id, &subscription(url, events, disabled)?)?;
            if json {
                println!("{}", json!({ "updated": true }));
            } else {
                CliFormatter::success(&format!("Updated webhook {}", id));
            }
        }
        WebhooksAction::Remove { id } => {
            repo.delete(id)?;
            if json {
                println!("{}", json!({ "deleted": true }));
            } else {
                CliFormatter::success(&format!("Removed webhook {}", id));
            }
        }
    }
    Ok(())
}

fn subscription(url: String, events: Vec<String>, disabled: bool) -> anyhow::Result<NewSubscription> {
    let request = SubscriptionRequest {
        url,
        events,
        enabled: Some(!disabled),
    };
    request.into_new().map_err(anyhow::Error::msg)
}

fn print_record(registry: &Registry, record: &ArtifactRecord, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&registry.artifacts.view(record))?);
    } else {
        let url = registry
            .artifacts
            .download_url(&record.artifact_type, &record.version);
        CliFormatter::artifact(record, url.as_deref());
    }
    Ok(())
}

fn print_deliveries(outcomes: &[DeliveryOutcome]) {
    if outcomes.is_empty() {
        CliFormatter::info("No webhook subscribers for this event");
        return;
    }
    CliFormatter::header("Webhook deliveries");
    CliFormatter::deliveries(outcomes);
}

fn deliveries_json(outcomes: &[DeliveryOutcome]) -> serde_json::Value {
    let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
    json!({ "delivered": delivered, "failed": outcomes.len() - delivered })
}
