//! Venue bridge entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Default configuration path, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Bridge between a trading strategy and a remote execution venue
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via VENUE_BRIDGE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Start even if the venue does not answer at startup
    #[arg(long)]
    skip_preflight: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    bridge_telemetry::init_logging()?;

    info!("Starting venue-bridge v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > VENUE_BRIDGE_CONFIG > default
    let config_path = args
        .config
        .or_else(|| std::env::var("VENUE_BRIDGE_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = venue_bridge::AppConfig::from_file(&config_path)?;
    info!(
        socket_url = %config.venue.socket_url,
        direct_url = %config.venue.direct_url,
        symbols = config.symbols.len(),
        "Configuration loaded"
    );

    let app = venue_bridge::Application::new(config)?;

    if args.skip_preflight {
        info!("Preflight skipped");
    } else {
        app.run_preflight().await?;
    }

    app.run().await?;

    Ok(())
}
