use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use exn::ResultExt;
use parcel::error::{ErrorKind, Result};
use parcel::{ClearTarget, Config, Dispatcher, Handoff, Launcher, MediaSender, Payload, Request, SendOptions};
use tokio::io::AsyncReadExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Prepare media and hand it to the messaging client.
#[derive(Parser, Debug)]
#[command(name = "parcel", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long, env = "PARCEL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Acquire the inputs and print the handoff that would reach the client.
    Send {
        /// Channel id or room name.
        #[arg(long)]
        to: String,

        /// File name for a single input, name template for several.
        #[arg(long)]
        name: Option<String>,

        /// Bypass the cache.
        #[arg(long)]
        no_cache: bool,

        /// Per-item timeout in milliseconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Acquire batch items one after another.
        #[arg(long)]
        sequential: bool,

        /// Paths, URLs, data URLs or base64. `-` reads raw bytes from stdin.
        #[arg(required = true)]
        inputs: Vec<String>,
    },

    /// Remove cached files: all of them, or the named entries.
    ClearCache {
        /// Digests or cache file names (`abc123.png`).
        targets: Vec<String>,
    },
}

/// Prints handoffs as JSON on stdout.
struct PrintDispatcher;

#[async_trait]
impl Dispatcher for PrintDispatcher {
    async fn deliver(&self, handoff: &Handoff) -> Result<()> {
        let json = serde_json::to_string_pretty(handoff).or_raise(|| ErrorKind::Dispatch)?;
        println!("{json}");
        Ok(())
    }
}

/// There is no app to bring back from a terminal.
struct LogLauncher;

#[async_trait]
impl Launcher for LogLauncher {
    async fn bring_to_foreground(&self, package: &str) -> Result<()> {
        tracing::info!(%package, "would bring app to the foreground");
        Ok(())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PARCEL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    Registry::default().with(filter).with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).init();
}

async fn read_input(input: String) -> Result<Request> {
    if input != "-" {
        return Ok(Request::new(input));
    }
    let mut bytes = Vec::new();
    tokio::io::stdin().read_to_end(&mut bytes).await.or_raise(|| ErrorKind::Acquire)?;
    Ok(Request::new(bytes))
}

async fn send(
    sender: &MediaSender,
    to: &str,
    inputs: Vec<String>,
    options: SendOptions,
) -> Result<bool> {
    let mut requests = Vec::with_capacity(inputs.len());
    for input in inputs {
        requests.push(read_input(input).await?);
    }
    let payload = match <[Request; 1]>::try_from(requests) {
        Ok([request]) => Payload::One(request),
        Err(requests) => Payload::Many(requests),
    };

    let sent = match sender.try_send(to, payload, options).await {
        Ok(sent) => sent,
        Err(err) => {
            tracing::error!(error = ?err, "send failed");
            return Ok(false);
        },
    };
    if let Some(cleanup) = sent.cleanup {
        let delay = sender.config().cleanup_delay();
        tracing::info!(?delay, "waiting to remove transient files");
        cleanup.join().await;
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = ?err, "could not load configuration");
            return ExitCode::FAILURE;
        },
    };
    let sender = match MediaSender::new(config, Arc::new(PrintDispatcher), Arc::new(LogLauncher)) {
        Ok(sender) => sender,
        Err(err) => {
            tracing::error!(error = ?err, "could not set up sender");
            return ExitCode::FAILURE;
        },
    };

    let ok = match cli.command {
        Command::Send { to, name, no_cache, timeout, sequential, inputs } => {
            let sender = if sequential { sender.with_runner(None) } else { sender };
            let options = SendOptions {
                timeout: timeout.map(Duration::from_millis),
                file_name: name,
                use_cache: no_cache.then_some(false),
            };
            send(&sender, &to, inputs, options).await.unwrap_or_else(|err| {
                tracing::error!(error = ?err, "could not read input");
                false
            })
        },
        Command::ClearCache { targets } => {
            let target = match targets.len() {
                0 => None,
                1 => targets.into_iter().next().map(ClearTarget::One),
                _ => Some(ClearTarget::Many(targets)),
            };
            sender.clear_cache(target).await
        },
    };
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
