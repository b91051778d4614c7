//! Configuration validation
//!
//! Rules:
//! - channel names are non-empty, unique and contain no '/'
//! - queue and mailbox capacities > 0
//! - route prefix starts with '/' and does not end with one

use std::collections::HashSet;

use contracts::{BroadcasterConfig, ContractError};

/// Validate a BroadcasterConfig
///
/// Returns the first error encountered.
pub fn validate(config: &BroadcasterConfig) -> Result<(), ContractError> {
    validate_server(config)?;
    validate_delivery(config)?;
    validate_channels(config)?;
    Ok(())
}

fn validate_server(config: &BroadcasterConfig) -> Result<(), ContractError> {
    let prefix = &config.server.route_prefix;
    if !prefix.starts_with('/') || (prefix.len() > 1 && prefix.ends_with('/')) {
        return Err(ContractError::config_validation(
            "server.route_prefix",
            format!("route_prefix must start with '/' and not end with one, got '{prefix}'"),
        ));
    }
    if config.server.host.is_empty() {
        return Err(ContractError::config_validation(
            "server.host",
            "host cannot be empty",
        ));
    }
    Ok(())
}

fn validate_delivery(config: &BroadcasterConfig) -> Result<(), ContractError> {
    let delivery = &config.delivery;
    let capacities = [
        ("delivery.mailbox_capacity", delivery.mailbox_capacity),
        ("delivery.queue_capacity", delivery.queue_capacity),
        ("delivery.replay_buffer", delivery.replay_buffer),
    ];
    for (field, value) in capacities {
        if value == 0 {
            return Err(ContractError::config_validation(
                field,
                "capacity must be > 0",
            ));
        }
    }
    Ok(())
}

/// Channel names are global keys
fn validate_channels(config: &BroadcasterConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, channel) in config.channels.iter().enumerate() {
        if channel.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("channels[{idx}].name"),
                "channel name cannot be empty",
            ));
        }
        if channel.name.contains('/') {
            return Err(ContractError::config_validation(
                format!("channels[name={}]", channel.name),
                "channel name cannot contain '/'",
            ));
        }
        if !seen.insert(&channel.name) {
            return Err(ContractError::config_validation(
                format!("channels[name={}]", channel.name),
                "duplicate channel name",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ChannelConfig;

    fn channel(name: &str) -> ChannelConfig {
        ChannelConfig {
            name: name.to_string(),
            history_capacity: 0,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&BroadcasterConfig::default()).is_ok());
    }

    #[test]
    fn test_duplicate_channel() {
        let config = BroadcasterConfig {
            channels: vec![channel("news"), channel("news")],
            ..Default::default()
        };
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_channel_with_slash() {
        let config = BroadcasterConfig {
            channels: vec![channel("a/b")],
            ..Default::default()
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_queue_capacity() {
        let mut config = BroadcasterConfig::default();
        config.delivery.queue_capacity = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("delivery.queue_capacity"));
    }

    #[test]
    fn test_route_prefix() {
        let mut config = BroadcasterConfig::default();
        config.server.route_prefix = "events".to_string();
        assert!(validate(&config).is_err());

        config.server.route_prefix = "/events/".to_string();
        assert!(validate(&config).is_err());

        config.server.route_prefix = "/".to_string();
        assert!(validate(&config).is_ok());
    }
}
