//! tc Counter Reader Daemon
//!
//! Main entry point for tc_readerd. snmpd starts it as a `pass_persist`
//! script and talks to it over stdin and stdout.
//!
//! Logs go to stderr: stdout carries protocol lines only.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tc_reader_common::{SystemCommand, TcReaderError, TcReaderResult};
use tc_readerd::{ProtocolHandler, Sampler, SharedNamespace, StdioTalker, TcReaderConfig};
use tokio::signal;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "tc_readerd")]
#[command(about = "Exports tc qdisc and class counters to snmpd via pass_persist", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file; ./tc_reader.toml then /etc/tc_reader.toml when omitted
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(TcReaderConfig::locate);
    let config = match &config_path {
        Some(path) => TcReaderConfig::load_or_default(path)?,
        None => TcReaderConfig::default(),
    };

    init_logging(args.debug || config.debug)?;

    match &config_path {
        Some(path) => info!(path = %path.display(), "tc_readerd: Loaded configuration"),
        None => info!("tc_readerd: No configuration file found, using defaults"),
    }
    config.validate()?;

    match run_daemon(Arc::new(config)).await {
        Ok(()) => {
            info!("tc_readerd: Exiting normally");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "tc_readerd: Exiting with error");
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}

/// Initialize structured logging on stderr
fn init_logging(debug: bool) -> TcReaderResult<()> {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| TcReaderError::config(format!("Failed to set logger: {}", e)))
}

async fn run_daemon(config: Arc<TcReaderConfig>) -> TcReaderResult<()> {
    let namespace = SharedNamespace::new();

    let sampler = Sampler::new(config, Arc::new(SystemCommand), namespace.clone())?;
    let sampler = sampler.start().await;

    let mut handler = ProtocolHandler::new(StdioTalker::stdio(), namespace);
    let result = tokio::select! {
        result = handler.run() => result,
        _ = signal::ctrl_c() => {
            // The stdin reader thread may still be blocked; process exit ends it.
            info!("tc_readerd: Received SIGINT, shutting down");
            Ok(())
        }
    };

    let stats = sampler.stop().await;
    debug!(?stats, "tc_readerd: Final sampler counters");

    result
}
