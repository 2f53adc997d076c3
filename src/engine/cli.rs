//! Firmware Registry CLI Module
//! Command-line interface for serving and administering the registry

pub mod formatter;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fwregistry")]
#[command(author = "Firmware Registry Team")]
#[command(version)]
#[command(about = "Versioned firmware storage with webhook notifications", long_about = None)]
pub struct Cli {
    /// JSON config file (defaults + FW_* environment overrides when absent)
    #[arg(short, long, global = true, env = "FW_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind, overrides listen_addr
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Apply pending database migrations
    Migrate,

    /// Store a local firmware file and notify webhooks
    Ingest {
        /// Firmware type (device family)
        #[arg(value_name = "TYPE")]
        artifact_type: String,

        /// Firmware version
        version: String,

        /// Path to the binary
        file: PathBuf,
    },

    /// List stored versions of a type, newest first
    List {
        #[arg(value_name = "TYPE")]
        artifact_type: String,
    },

    /// Show the newest version of a type
    Latest {
        #[arg(value_name = "TYPE")]
        artifact_type: String,
    },

    /// Delete a stored version and notify webhooks
    Remove {
        #[arg(value_name = "TYPE")]
        artifact_type: String,

        version: String,
    },

    /// Webhook subscription management
    Webhooks {
        #[command(subcommand)]
        action: WebhooksAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum WebhooksAction {
    /// List subscriptions
    List,

    /// Register a new subscription
    Add {
        /// Delivery endpoint
        url: String,

        /// Event to subscribe to (repeatable)
        #[arg(short, long = "event", required = true)]
        events: Vec<String>,

        /// Store the subscription disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Replace an existing subscription
    Update {
        id: i64,

        url: String,

        #[arg(short, long = "event", required = true)]
        events: Vec<String>,

        #[arg(long)]
        disabled: bool,
    },

    /// Delete a subscription
    Remove { id: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::parse_from(["fwregistry", "--format", "json", "ingest", "gateway", "1.2.0", "fw.bin"]);
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Ingest { artifact_type, version, file } => {
                assert_eq!(artifact_type, "gateway");
                assert_eq!(version, "1.2.0");
                assert_eq!(file, PathBuf::from("fw.bin"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_webhook_add_with_repeated_events() {
        let cli = Cli::parse_from([
            "fwregistry",
            "webhooks",
            "add",
            "https://hooks.example.com",
            "--event",
            "firmware.uploaded",
            "-e",
            "firmware.deleted",
        ]);
        match cli.command {
            Commands::Webhooks {
                action: WebhooksAction::Add { url, events, disabled },
            } => {
                assert_eq!(url, "https://hooks.example.com");
                assert_eq!(events, vec!["firmware.uploaded", "firmware.deleted"]);
                assert!(!disabled);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_webhook_add_requires_event() {
        assert!(Cli::try_parse_from(["fwregistry", "webhooks", "add", "http://x"]).is_err());
    }
}
