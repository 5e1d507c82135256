//! bspbar daemon
//!
//! Subscribes to bspwm reports and keeps a desktop strip for one monitor.
//! Panel frames go to stdout as JSON lines; `click N`, `refresh` and `quit`
//! are read from stdin. Logs go to stderr.

mod app;
mod command;
mod output;
mod panel;

use std::path::PathBuf;

use anyhow::{Context, Result};
use bspbar_config::Config;
use bspbar_ipc::{get_socket_path, BspwmClient, ReportSubscriber, UnixTransport};
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::app::{Exit, PanelApp};
use crate::panel::DesktopStrip;

#[derive(Parser, Debug)]
#[command(name = "bspbard")]
#[command(about = "Desktop panel backend for bspwm")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/bspbar/config.kdl")]
    config: String,

    /// Monitor to show (overrides config setting)
    #[arg(short, long)]
    monitor: Option<String>,

    /// bspwm socket path (overrides config and environment)
    #[arg(short, long)]
    socket: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&args.config).into_owned().into();
    let config = bspbar_config::load_config(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.global.log_level.as_filter())),
        )
        .init();

    tracing::info!("Loaded configuration from {}", config_path.display());

    let socket_path = get_socket_path(args.socket.or_else(|| config.bspwm.socket_path.clone()))
        .context("Cannot locate the bspwm socket")?;
    tracing::info!("Using bspwm socket {}", socket_path.display());

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let result = runtime.block_on(run(args.monitor, config, socket_path));

    // A pending stdin read holds a blocking thread that would stall a normal shutdown
    runtime.shutdown_background();
    result
}

async fn run(monitor: Option<String>, config: Config, socket_path: PathBuf) -> Result<()> {
    let transport = UnixTransport::new(&socket_path);
    let subscriber = ReportSubscriber::new(transport.clone(), config.bspwm.subscriber_config());
    let events = subscriber.listen();
    let subscription = subscriber.spawn(&tokio::runtime::Handle::current());

    let strip = DesktopStrip::new(
        monitor.or(config.panel.monitor),
        config.panel.hide_on_fullscreen,
    );
    let mut app = PanelApp::new(strip, BspwmClient::new(transport), tokio::io::stdout());

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted");
            }
            cancel.cancel();
        })
    };

    let exit = app
        .run(events, BufReader::new(tokio::io::stdin()), cancel)
        .await?;
    ctrl_c.abort();

    tracing::info!("Shutting down...");

    match exit {
        // The read loop ended on its own, so join reports why
        Exit::SubscriptionEnded => subscription
            .join()
            .await
            .context("bspwm subscription failed")?,
        Exit::Cancelled | Exit::Quit => subscription.shutdown().await?,
    }

    Ok(())
}
