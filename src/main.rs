//! CLI for dispatchhub
//!
//! Subcommands:
//! - `server`: run the hub with the correlator attached
//! - `unit`: run a simulated field unit against a running hub

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use dispatchhub::client::{self, FieldUnitOptions};
use dispatchhub::config::{LogSettings, Settings, load_config_from};
use dispatchhub::dispatch;
use dispatchhub::transport::start_websocket_server;
use dispatchhub::utils::{Result, logging};

#[derive(Parser)]
#[command(name = "dispatchhub", version)]
struct Cli {
    /// Configuration file to read instead of `config/default`
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the WebSocket hub and the correlator
    Server,
    /// Run a simulated field unit
    Unit {
        /// Hub URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8765")]
        url: String,
        /// Unit id to register under
        #[arg(long, default_value = "ERT-001")]
        id: String,
        #[arg(long, default_value_t = 100.0)]
        x: f64,
        #[arg(long, default_value_t = 200.0)]
        y: f64,
        /// Seconds between location reports
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
        /// Report resolution this many seconds after acknowledging
        #[arg(long)]
        resolve_after_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match load_config_from(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init(&LogSettings::default());
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.log);

    let outcome = match cli.command {
        Command::Server => run_server(settings).await,
        Command::Unit {
            url,
            id,
            x,
            y,
            interval_secs,
            resolve_after_secs,
        } => {
            client::run(FieldUnitOptions {
                url,
                unit_id: id,
                x,
                y,
                interval: Duration::from_secs(interval_secs.max(1)),
                resolve_after: resolve_after_secs.map(Duration::from_secs),
            })
            .await
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_server(settings: Settings) -> Result<()> {
    let system = dispatch::start(settings.correlator.disconnect_policy);
    info!(policy = ?settings.correlator.disconnect_policy, "correlator attached");

    tokio::select! {
        result = start_websocket_server(&settings, system.hub.clone()) => {
            result?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }
    Ok(())
}
