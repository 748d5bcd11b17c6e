// candela CLI
// Drive a lamp the local Bluetooth adapter already knows about

use candela::lamp::{LampClient, LampConfig};
use candela::transport::BtleTransport;
use candela::{ConnectionConfig, PeripheralHandle};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "candela")]
#[command(about = "Control a Candela BLE lamp")]
struct Cli {
    /// Lamp MAC address, e.g. F8:24:41:C6:43:2D
    #[arg(short, long)]
    address: String,

    /// Connect attempts before giving up
    #[arg(long, default_value = "3")]
    attempts: u32,

    /// Milliseconds to wait after the pairing frame
    #[arg(long, default_value = "5000")]
    pair_settle_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch the lamp on
    On,
    /// Switch the lamp off
    Off,
    /// Set brightness (0-100)
    Brightness { level: u8 },
    /// Request the lamp state and print notifications
    Watch {
        /// Listening window in milliseconds (defaults to the configured window)
        #[arg(long)]
        ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let peripheral = PeripheralHandle::parse(&cli.address)?;

    let mut config = LampConfig::new().with_connection(
        ConnectionConfig::new()
            .with_connect_attempts(cli.attempts)
            .with_pair_settle_ms(cli.pair_settle_ms),
    );
    if let Commands::Watch { ms: Some(ms) } = &cli.command {
        config = config.with_notification_window_ms(*ms);
    }

    let transport = BtleTransport::first_adapter().await?;
    let lamp = LampClient::with_config(Arc::new(transport), peripheral, config)?;

    match cli.command {
        Commands::On => lamp.turn_on().await?,
        Commands::Off => lamp.turn_off().await?,
        Commands::Brightness { level } => lamp.set_brightness(level).await?,
        Commands::Watch { .. } => {
            lamp.request_state().await?;
            for snapshot in lamp.read_notifications_default().await? {
                println!("{:?}", snapshot);
            }
        }
    }

    let observed = lamp.observed_state();
    if observed.is_known() {
        println!(
            "{}: on={:?} brightness={:?}",
            lamp.peripheral(),
            observed.is_on,
            observed.brightness
        );
    } else {
        println!("{}: state unknown", lamp.peripheral());
    }

    lamp.disconnect().await?;
    Ok(())
}
