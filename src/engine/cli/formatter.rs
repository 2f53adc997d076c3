//! CLI Output Formatting Module
//! Provides consistent, colorized output for terminal UX

use colored::Colorize;

use crate::engine::firmware::ArtifactRecord;
use crate::engine::webhook::{DeliveryOutcome, Subscription};

pub struct CliFormatter;

impl CliFormatter {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue().bold(), message);
    }

    /// Print a section header
    pub fn header(title: &str) {
        println!("\n{}", title.bright_cyan().bold());
        println!("{}", "─".repeat(title.len()).bright_black());
    }

    /// Print a key-value pair
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", key.bright_white().bold(), value);
    }

    /// Print a list item
    pub fn item(text: &str) {
        println!("  {} {}", "•".bright_black(), text);
    }

    /// Print a table header
    pub fn table_header(columns: &[&str]) {
        let header = columns
            .iter()
            .map(|c| c.bright_white().bold().to_string())
            .collect::<Vec<_>>()
            .join(" │ ");
        println!("  {}", header);
        println!("  {}", "─".repeat(columns.iter().map(|c| c.len() + 3).sum()).bright_black());
    }

    /// Print a table row
    pub fn table_row(values: &[&str]) {
        println!("  {}", values.join(" │ "));
    }

    /// Print one artifact as a key-value block
    pub fn artifact(record: &ArtifactRecord, download_url: Option<&str>) {
        Self::kv("Type", &record.artifact_type);
        Self::kv("Version", &record.version);
        Self::kv("File", &record.filename);
        Self::kv("Size", &format_size(record.size_bytes));
        Self::kv("SHA-256", &record.sha256);
        Self::kv("Created", &record.created_at.to_rfc3339());
        if let Some(url) = download_url {
            Self::kv("Download", url);
        }
    }

    /// Print artifacts as a table, in the given order
    pub fn artifact_table(records: &[ArtifactRecord]) {
        Self::table_header(&["Version", "Size", "Created", "SHA-256"]);
        for record in records {
            let size = format_size(record.size_bytes);
            let created = record.created_at.format("%Y-%m-%d %H:%M").to_string();
            Self::table_row(&[&record.version, &size, &created, short_digest(&record.sha256)]);
        }
    }

    pub fn subscription_table(subscriptions: &[Subscription]) {
        Self::table_header(&["ID", "Enabled", "Events", "URL"]);
        for sub in subscriptions {
            let id = sub.id.to_string();
            let enabled = if sub.enabled { "yes".green() } else { "no".red() }.to_string();
            let events = sub.events.join(",");
            Self::table_row(&[&id, &enabled, &events, &sub.url]);
        }
    }

    /// Print the result of each webhook delivery
    pub fn deliveries(outcomes: &[DeliveryOutcome]) {
        for outcome in outcomes {
            match outcome {
                DeliveryOutcome::Delivered { attempts, status } => Self::item(&format!(
                    "{} HTTP {} after {} attempt(s)",
                    "delivered".green(),
                    status,
                    attempts
                )),
                DeliveryOutcome::Exhausted { attempts, last_error } => Self::item(&format!(
                    "{} after {} attempt(s): {}",
                    "failed".red(),
                    attempts,
                    last_error
                )),
            }
        }
    }

    /// Print an empty line
    pub fn blank() {
        println!();
    }
}

/// Format file size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

/// First 12 hex characters of a digest
pub fn short_digest(sha256: &str) -> &str {
    sha256.get(..12).unwrap_or(sha256)
}
