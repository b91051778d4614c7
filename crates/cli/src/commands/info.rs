//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{BackpressurePolicy, BroadcasterConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    server: ServerInfo,
    delivery: DeliveryInfo,
    channels: Vec<ChannelInfo>,
}

#[derive(Serialize)]
struct ServerInfo {
    listen: String,
    stream_route: String,
    allow_cors: bool,
    keep_alive_secs: u64,
}

#[derive(Serialize)]
struct DeliveryInfo {
    mailbox_capacity: usize,
    queue_capacity: usize,
    replay_buffer: usize,
    backpressure: BackpressurePolicy,
}

#[derive(Serialize)]
struct ChannelInfo {
    name: String,
    history_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config);
    }

    Ok(())
}

fn stream_route(config: &BroadcasterConfig) -> String {
    format!(
        "{}/{{channel}}",
        config.server.route_prefix.trim_end_matches('/')
    )
}

fn build_config_info(config: &BroadcasterConfig) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", config.version),
        server: ServerInfo {
            listen: config.server.socket_addr(),
            stream_route: stream_route(config),
            allow_cors: config.server.allow_cors,
            keep_alive_secs: config.server.keep_alive_secs,
        },
        delivery: DeliveryInfo {
            mailbox_capacity: config.delivery.mailbox_capacity,
            queue_capacity: config.delivery.queue_capacity,
            replay_buffer: config.delivery.replay_buffer,
            backpressure: config.delivery.backpressure,
        },
        channels: config
            .channels
            .iter()
            .map(|c| ChannelInfo {
                name: c.name.clone(),
                history_capacity: c.history_capacity,
            })
            .collect(),
    }
}

fn print_config_info(config: &BroadcasterConfig) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Broadcaster Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🌐 Server");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Listen: {}", config.server.socket_addr());
    println!("   ├─ Stream route: GET {}", stream_route(config));
    println!("   ├─ CORS: {}", if config.server.allow_cors { "enabled" } else { "disabled" });
    println!("   └─ Keep-alive: {}s", config.server.keep_alive_secs);

    let delivery = &config.delivery;
    println!("\n⚙️  Delivery");
    println!("   ├─ Mailbox capacity: {}", delivery.mailbox_capacity);
    println!("   ├─ Queue capacity: {}", delivery.queue_capacity);
    println!("   ├─ Replay buffer: {}", delivery.replay_buffer);
    println!("   └─ Backpressure: {:?}", delivery.backpressure);

    println!("\n📣 Channels ({})", config.channels.len());
    for (i, channel) in config.channels.iter().enumerate() {
        let is_last = i == config.channels.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        if channel.has_history() {
            println!(
                "   {} {} (history: {} events)",
                prefix, channel.name, channel.history_capacity
            );
        } else {
            println!("   {} {} (no history)", prefix, channel.name);
        }
    }

    println!();
}
