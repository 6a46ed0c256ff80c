//! Air Supply Console
//!
//! Interactive console for an air-supply controller. Reads operation names
//! from stdin (`OPEN`, `GET_PRESSURE`, `SET ref_pres=10`, ...), sends them and
//! prints the controller's reply.
//!
//! Usage:
//!   cargo run --example air_console -- [OPTIONS] [PORT]
//!
//! Options:
//!   --port PORT       Serial port (default: /dev/ttyACM0)
//!   --baud RATE       Baud rate (default: 9600)
//!   --timeout MS      Idle read timeout in ms (default: 1000)
//!   --config FILE     Load settings from a JSON file
//!   --list            List serial ports and exit
//!
//! Set RUST_LOG=airsupply=debug to see the raw traffic.

use airsupply_core::prelude::*;
use airsupply_core::transport::list_ports;
use anyhow::{bail, Context};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!("Usage: air_console [OPTIONS] [PORT]");
    println!();
    println!("Options:");
    println!("  --port, -p PORT      Serial port (default: /dev/ttyACM0)");
    println!("  --baud, -b RATE      Baud rate (default: 9600)");
    println!("  --timeout, -t MS     Idle read timeout in ms (default: 1000)");
    println!("  --config, -c FILE    Load settings from a JSON file");
    println!("  --list, -l           List serial ports and exit");
    println!("  --help, -h           Show this help");
}

fn print_operations() {
    println!("Operations:");
    for (name, description) in AirCommand::CATALOG {
        println!("  {:<14} {}", name, description);
    }
    println!("  {:<14} {}", "QUIT", "Leave the console");
}

fn parse_args() -> anyhow::Result<Option<ChannelConfig>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config = ChannelConfig::default();

    let mut i = 0;
    while i < args.len() {
        let value = |i: usize| {
            args.get(i + 1)
                .with_context(|| format!("{} needs a value", args[i]))
        };
        match args[i].as_str() {
            "--port" | "-p" => {
                config.port_name = value(i)?.clone();
                i += 1;
            }
            "--baud" | "-b" => {
                config.baud_rate = value(i)?.parse().context("invalid baud rate")?;
                i += 1;
            }
            "--timeout" | "-t" => {
                config.read_timeout_ms = value(i)?.parse().context("invalid timeout")?;
                i += 1;
            }
            "--config" | "-c" => {
                config = ChannelConfig::from_file(value(i)?)?;
                i += 1;
            }
            "--list" | "-l" => {
                for port in list_ports() {
                    println!(
                        "{:<20} {}",
                        port.name,
                        port.product.as_deref().unwrap_or("")
                    );
                }
                return Ok(None);
            }
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            arg if !arg.starts_with('-') => config.port_name = arg.to_string(),
            other => bail!("Unknown option: {}", other),
        }
        i += 1;
    }

    config.validate()?;
    Ok(Some(config))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("airsupply=info")),
        )
        .init();

    let Some(config) = parse_args()? else {
        return Ok(());
    };

    println!(
        "Opening {} at {} baud (read timeout {}ms)",
        config.port_name, config.baud_rate, config.read_timeout_ms
    );
    let mut channel = CommandChannel::open(&config, Arc::new(TracingSink))
        .with_context(|| format!("failed to open {}", config.port_name))?;
    print_operations();

    let stdin = io::stdin();
    loop {
        print!("air> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        let command = match line.parse::<AirCommand>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match channel.execute(&command).await {
            Ok(Some(response)) => {
                for reply in &response.lines {
                    println!("  {}", reply);
                }
            }
            Ok(None) => println!("  sent {}", command.to_command()),
            Err(e) => println!("  {}", e),
        }
    }

    channel.shutdown();
    Ok(())
}
