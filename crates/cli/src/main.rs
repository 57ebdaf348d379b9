//! howler-ctl
//!
//! Operator tool for Howler boards: lists the boards attached to this host
//! and sends raw 24-byte commands to them.

mod config;
mod packet;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use common::setup_logging;
use howler::DeviceRegistry;
use howler::protocol::TRANSFER_LEN;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "howler-ctl")]
#[command(author, version, about = "Talk to Howler USB boards")]
#[command(long_about = "
Discover Howler boards and exchange raw command packets with them.

EXAMPLES:
    # List attached boards
    howler-ctl list

    # Send a command to the first board without waiting for a reply
    howler-ctl send 01 02 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00

    # Send a command to board 1 and print the response
    howler-ctl query --device 1 020100000000000000000000000000000000000000000000

CONFIGURATION:
    Settings are read from the first file found:
    1. Path specified with --config
    2. ~/.config/howler/howler.toml
    3. /etc/howler/howler.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List connected Howler boards (default)
    List,

    /// Send a command without reading a response
    Send {
        /// Board index as shown by `list`
        #[arg(short, long, default_value_t = 0)]
        device: usize,

        /// 24 bytes of hex
        #[arg(required = true, num_args = 1..)]
        bytes: Vec<String>,
    },

    /// Send a command and print the response
    Query {
        /// Board index as shown by `list`
        #[arg(short, long, default_value_t = 0)]
        device: usize,

        /// 24 bytes of hex
        #[arg(required = true, num_args = 1..)]
        bytes: Vec<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let path = config::HowlerConfig::default_path();
        config::HowlerConfig::default()
            .save(&path)
            .context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        config::HowlerConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        config::HowlerConfig::load_or_default()
    };

    let log_level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    setup_logging(log_level).context("Failed to setup logging")?;
    debug!("howler-ctl v{}", env!("CARGO_PKG_VERSION"));

    let mut registry = DeviceRegistry::initialize().context("Failed to scan for Howler devices")?;
    registry.set_timeout(config.transfer.timeout());

    let result = match args.command.unwrap_or(Command::List) {
        Command::List => {
            list_devices(&registry);
            Ok(())
        }
        Command::Send { device, bytes } => send(&mut registry, device, &bytes, false),
        Command::Query { device, bytes } => send(&mut registry, device, &bytes, true),
    };

    registry.teardown();
    result
}

fn list_devices(registry: &DeviceRegistry) {
    if registry.is_empty() {
        println!("No Howler devices found.");
        return;
    }

    println!("Found {} Howler device(s):\n", registry.len());
    for (index, device) in registry.devices().iter().enumerate() {
        let identity = device.identity();
        match device.location() {
            Some((bus, address)) => println!(
                "  [{}] {} - Bus {:03} Device {:03}",
                index, identity, bus, address
            ),
            None => println!("  [{}] {}", index, identity),
        }
    }
}

fn send(registry: &mut DeviceRegistry, index: usize, bytes: &[String], read: bool) -> Result<()> {
    let command = packet::parse_packet(bytes)?;

    let device = registry
        .get_mut(index)
        .ok_or_else(|| anyhow!("No Howler device at index {}", index))?;

    let mut response = [0u8; TRANSFER_LEN];
    let output = if read { Some(&mut response) } else { None };

    device
        .exchange(&command, output)
        .with_context(|| format!("Exchange with Howler device {} failed", index))?;

    info!("Sent command to Howler device {}", index);
    if read {
        println!("{}", packet::format_packet(&response));
    }
    Ok(())
}
