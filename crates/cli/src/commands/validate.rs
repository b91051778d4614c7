//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{BackpressurePolicy, BroadcasterConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    listen: String,
    channel_count: usize,
    history_channel_count: usize,
    backpressure: BackpressurePolicy,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    listen: config.server.socket_addr(),
                    channel_count: config.channels.len(),
                    history_channel_count: config
                        .channels
                        .iter()
                        .filter(|c| c.has_history())
                        .count(),
                    backpressure: config.delivery.backpressure,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &BroadcasterConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.channels.iter().all(|c| !c.has_history()) {
        warnings.push(
            "No channel keeps history - reconnecting clients will not be replayed".to_string(),
        );
    }

    if config.delivery.backpressure == BackpressurePolicy::Block {
        warnings.push(
            "delivery.backpressure = \"block\" lets one slow client stall every channel"
                .to_string(),
        );
    }

    if config.delivery.replay_buffer < config.delivery.queue_capacity {
        warnings.push(format!(
            "delivery.replay_buffer ({}) is smaller than delivery.queue_capacity ({})",
            config.delivery.replay_buffer, config.delivery.queue_capacity
        ));
    }

    if config.server.keep_alive_secs == 0 {
        warnings.push(
            "server.keep_alive_secs is 0 - idle proxies may drop quiet streams".to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Listen: {}", summary.listen);
            println!("  Channels: {}", summary.channel_count);
            println!("  With history: {}", summary.history_channel_count);
            println!("  Backpressure: {:?}", summary.backpressure);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::Builder;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config_summary() {
        let file = write_config(
            r#"
[server]
port = 8081

[[channels]]
name = "news"
history_capacity = 100

[[channels]]
name = "sports"
"#,
        );
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };

        let result = validate_config(&args);
        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.channel_count, 2);
        assert_eq!(summary.history_channel_count, 1);
        assert!(summary.listen.ends_with(":8081"));
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: PathBuf::from("/definitely/not/here.toml"),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[test]
    fn test_invalid_config_reports_error() {
        let file = write_config(
            r#"
[[channels]]
name = "news"

[[channels]]
name = "news"
"#,
        );
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_warnings() {
        let mut config = BroadcasterConfig::default();
        config.delivery.backpressure = BackpressurePolicy::Block;
        let warnings = collect_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("history")));
        assert!(warnings.iter().any(|w| w.contains("block")));
    }
}
