use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ni2c::cli::{format_response, parse_hex_bytes, MessageArg};
use ni2c::{system, BusManager, Config, DevI2c, RawMessage};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ni2c", author, version, about = "I2C bus access tool")]
struct Cli {
    /// JSON file listing buses to register before running the command
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a bus controller under an alias
    Register { bus_path: String, alias: String },
    /// Run messages as one combined transfer
    Transfer {
        /// Bus device to open; defaults to the configured default bus
        #[arg(long)]
        bus: Option<String>,
        /// `w@ADDR[+FLAGS]:BYTE,...` or `r@ADDR[+FLAGS]:LEN`
        #[arg(required = true)]
        messages: Vec<MessageArg>,
    },
    /// Show clock ticks and the time of day
    Clock,
    /// Write hex bytes at an offset of a raw device
    Pwrite { path: String, offset: i64, bytes: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let manager = BusManager::new(DevI2c);

    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("loading {}", path.display()))?;
            config.register_all(&manager).context("registering buses")?;
            config
        }
        None => Config::default(),
    };

    match cli.command {
        Commands::Register { bus_path, alias } => {
            manager
                .register_bus(bus_path.as_bytes(), alias.as_bytes())
                .with_context(|| format!("registering {bus_path} as {alias}"))?;
        }
        Commands::Transfer { bus, messages } => {
            let Some(bus) = bus.as_deref().or(config.default_bus()) else {
                bail!("no bus given and no default bus configured");
            };
            let handle = manager
                .open(bus.as_bytes())
                .with_context(|| format!("opening {bus}"))?;
            let raw: Vec<RawMessage<'_>> =
                messages.iter().map(MessageArg::as_raw).collect();
            let responses = manager
                .transfer(&handle, &raw)
                .with_context(|| format!("transfer on {bus}"))?;
            for response in &responses {
                println!("{}", format_response(response));
            }
        }
        Commands::Clock => {
            println!("ticks_per_second: {}", system::clock_ticks_per_second());
            println!("ticks_since_boot: {}", system::clock_ticks_since_boot()?);
            let tod = system::clock_get_tod();
            println!("time_of_day: {}", serde_json::to_string(&tod)?);
        }
        Commands::Pwrite { path, offset, bytes } => {
            let data = parse_hex_bytes(&bytes)?;
            let written = system::pwrite(path.as_bytes(), &data, offset)
                .with_context(|| format!("writing {path}"))?;
            println!("{written}");
        }
    }

    Ok(())
}
