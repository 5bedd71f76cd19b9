//! CLI for upsub
//!
//! Subcommands:
//! - `demo`: run a publisher and a subscriber for one of the demo topic kinds
//! - `relay`: subscribe to patterns and publish lines typed on stdin

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use upsub::config::{Settings, load_config, load_config_from};
use upsub::demo::{self, DemoContent, DemoKind, DemoOptions};
use upsub::utils::logging;
use upsub::{Exchange, SledStore};

#[derive(Parser)]
#[command(name = "upsub", about = "Publish/subscribe over document change feeds")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: config/default)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a demo publisher and subscriber in this process
    Demo {
        #[arg(value_enum)]
        kind: DemoKind,
        /// Stop after receiving this many messages
        #[arg(long)]
        count: Option<usize>,
        /// Delay between published messages
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },
    /// Subscribe to patterns and publish "<topic> <message>" lines from stdin
    ///
    /// Examples of patterns: weather.us.temp, 'weather.us.*.springfield',
    /// 'weather.#.temp'
    Relay {
        #[arg(required = true)]
        patterns: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    logging::init(level);

    tokio::select! {
        result = run(cli.command, config) => {
            if let Err(e) = result {
                error!("{e}");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }
}

async fn run(command: Command, config: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(SledStore::connect(&config.store)?);

    match command {
        Command::Demo {
            kind,
            count,
            interval_ms,
        } => {
            let exchange = Exchange::new(store, config.exchange.namespace.clone(), kind.exchange_name())
                .with_durability(config.exchange.durability);
            let options = DemoOptions {
                count,
                interval: Duration::from_millis(interval_ms),
            };
            let received = demo::run(Arc::new(exchange), kind, DemoContent::default(), options).await?;
            info!(received, "demo finished");
        }
        Command::Relay { patterns } => {
            let exchange = Exchange::from_settings(store, &config.exchange);
            demo::relay(Arc::new(exchange), patterns).await?;
        }
    }

    Ok(())
}
