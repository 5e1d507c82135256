//! bspbar CLI
//!
//! Inspection and control tool for bspwm and the bspbar configuration.

use std::future::Future;
use std::path::{Path, PathBuf};

use bspbar_config::Config;
use bspbar_ipc::{
    get_socket_path, split_command, BspwmClient, ReportSubscriber, RetryPolicy, SubscriberConfig,
    SubscriptionEvent, UnixTransport,
};
use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "bspbar")]
#[command(about = "bspwm report and desktop tool")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/bspbar/config.kdl")]
    config: String,

    /// bspwm socket path (overrides config and environment)
    #[arg(short, long)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the resolved bspwm socket path
    Socket,

    /// Print the current report as JSON
    Report,

    /// Stream subscription events as JSON lines until interrupted
    Watch,

    /// Focus a desktop by its 1-based index
    Focus {
        index: usize,
    },

    /// Send a raw command and print the reply
    Send {
        /// Command words; a single argument is split on whitespace
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        words: Vec<String>,
    },

    /// Validate the configuration file
    Validate,
}

fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&cli.config).into_owned().into();

    match cli.command {
        Commands::Validate => cmd_validate(&config_path),
        Commands::Socket => {
            let (_, socket_path) = resolve(&config_path, cli.socket)?;
            println!("{}", socket_path.display());
            Ok(())
        }
        Commands::Report => {
            let (_, socket_path) = resolve(&config_path, cli.socket)?;
            block_on(cmd_report(&socket_path))
        }
        Commands::Watch => {
            let (config, socket_path) = resolve(&config_path, cli.socket)?;
            block_on(cmd_watch(&socket_path, &config))
        }
        Commands::Focus { index } => {
            let (_, socket_path) = resolve(&config_path, cli.socket)?;
            block_on(cmd_focus(&socket_path, index))
        }
        Commands::Send { words } => {
            let (_, socket_path) = resolve(&config_path, cli.socket)?;
            block_on(cmd_send(&socket_path, &words))
        }
    }
}

/// Load the config (defaults if absent) and find the bspwm socket
fn resolve(config_path: &Path, socket: Option<PathBuf>) -> miette::Result<(Config, PathBuf)> {
    let config = bspbar_config::load_config(config_path)?;
    let socket_path = get_socket_path(socket.or_else(|| config.bspwm.socket_path.clone()))
        .into_diagnostic()?;
    Ok((config, socket_path))
}

fn block_on<F>(future: F) -> miette::Result<()>
where
    F: Future<Output = miette::Result<()>>,
{
    tokio::runtime::Runtime::new().into_diagnostic()?.block_on(future)
}

fn cmd_validate(config_path: &Path) -> miette::Result<()> {
    println!("Validating configuration: {}", config_path.display());

    let config = bspbar_config::parse_config(config_path)?;

    println!("Configuration is valid!");
    println!("  Log level: {}", config.global.log_level.as_filter());
    match &config.bspwm.socket_path {
        Some(path) => println!("  Socket: {}", path.display()),
        None => println!("  Socket: from environment"),
    }
    println!(
        "  Reconnect: {}ms doubling to {}ms, {}",
        config.bspwm.retry_initial_ms,
        config.bspwm.retry_max_ms,
        match config.bspwm.max_retries {
            Some(n) => format!("at most {} retries", n),
            None => "retrying forever".to_string(),
        }
    );
    println!(
        "  Panel monitor: {}",
        config.panel.monitor.as_deref().unwrap_or("<first>")
    );
    Ok(())
}

/// Subscribe once without reconnecting and print the first report
async fn cmd_report(socket_path: &Path) -> miette::Result<()> {
    let settings = SubscriberConfig {
        retry: RetryPolicy {
            max_retries: Some(0),
            ..RetryPolicy::default()
        },
        ..SubscriberConfig::default()
    };
    let subscriber = ReportSubscriber::new(UnixTransport::new(socket_path), settings);
    let mut events = subscriber.listen();
    let handle = subscriber.spawn(&tokio::runtime::Handle::current());

    while let Some(event) = events.recv().await {
        match event {
            SubscriptionEvent::Report { report, .. } => {
                let json = serde_json::to_string_pretty(&*report).into_diagnostic()?;
                println!("{}", json);
                return handle.shutdown().await.into_diagnostic();
            }
            SubscriptionEvent::ParseError { line, reason } => {
                tracing::warn!(line = %line, "{}", reason);
            }
            SubscriptionEvent::Connection { .. } => {}
        }
    }

    // Channel closed before any report: the subscription gave up
    handle.join().await.into_diagnostic()?;
    Err(miette::miette!("bspwm closed the subscription before sending a report"))
}

async fn cmd_watch(socket_path: &Path, config: &Config) -> miette::Result<()> {
    let subscriber = ReportSubscriber::new(
        UnixTransport::new(socket_path),
        config.bspwm.subscriber_config(),
    );
    let mut events = subscriber.listen();
    let handle = subscriber.spawn(&tokio::runtime::Handle::current());

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            cancel.cancel();
        })
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => println!("{}", serde_json::to_string(&event).into_diagnostic()?),
                None => {
                    ctrl_c.abort();
                    return handle.join().await.into_diagnostic();
                }
            },
        }
    }

    handle.shutdown().await.into_diagnostic()
}

async fn cmd_focus(socket_path: &Path, index: usize) -> miette::Result<()> {
    if index == 0 {
        return Err(miette::miette!("Desktop indices start at 1"));
    }
    let client = BspwmClient::new(UnixTransport::new(socket_path));
    client.focus_desktop(index).await.into_diagnostic()
}

async fn cmd_send(socket_path: &Path, words: &[String]) -> miette::Result<()> {
    let command = command_words(words);
    let client = BspwmClient::new(UnixTransport::new(socket_path));
    let reply = client.send(&command[..]).await.into_diagnostic()?;
    print!("{}", reply);
    Ok(())
}

/// `send "desktop ^1 --focus"` and `send desktop ^1 --focus` are the same
fn command_words(words: &[String]) -> Vec<&str> {
    match words {
        [single] => split_command(single),
        _ => words.iter().map(String::as_str).collect(),
    }
}
