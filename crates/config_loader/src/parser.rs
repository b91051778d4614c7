//! Configuration parsing
//!
//! TOML (primary) and JSON.

use contracts::{BroadcasterConfig, ContractError};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse TOML configuration
pub fn parse_toml(content: &str) -> Result<BroadcasterConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON configuration
pub fn parse_json(content: &str) -> Result<BroadcasterConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse by format
pub fn parse(content: &str, format: ConfigFormat) -> Result<BroadcasterConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::BackpressurePolicy;

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
[server]
host = "127.0.0.1"
port = 9090
allow_cors = true
keep_alive_secs = 30

[delivery]
queue_capacity = 16
backpressure = "drop"

[[channels]]
name = "news"
history_capacity = 100

[[channels]]
name = "sports"
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.server.socket_addr(), "127.0.0.1:9090");
        assert!(config.server.allow_cors);
        assert_eq!(config.delivery.queue_capacity, 16);
        assert_eq!(config.delivery.mailbox_capacity, 256);
        assert_eq!(config.delivery.backpressure, BackpressurePolicy::Drop);
        assert_eq!(config.channels.len(), 2);
        assert!(!config.channels[1].has_history());
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{ "channels": [{ "name": "alerts", "history_capacity": 5 }] }"#;
        let config = parse_json(content).unwrap();
        assert_eq!(config.channels[0].name, "alerts");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_parse_unknown_policy() {
        let content = "[delivery]\nbackpressure = \"explode\"\n";
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
