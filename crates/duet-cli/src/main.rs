//! duet chat binary.
//!
//! # Usage
//!
//! ```bash
//! # First peer: nobody is listening yet, so it becomes the server
//! duet --nick alice
//!
//! # Second peer: dials the first one
//! duet --nick bob --address 127.0.0.1 --port 10000
//! ```
//!
//! Type a line to send it, `/quit` to leave. Logs go to stderr. The exit
//! status is non-zero if the connection failed instead of being closed.

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use duet_cli::{CliError, Runtime, stdin_lines};
use duet_core::{DEFAULT_PORT, Endpoint};
use duet_net::SessionConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Two-party TCP chat
#[derive(Parser, Debug)]
#[command(name = "duet")]
#[command(about = "Chat with one peer: dial it, or wait for it to dial you")]
#[command(version)]
struct Args {
    /// Nickname announced to the peer
    #[arg(short, long)]
    nick: String,

    /// Peer IP address to dial
    #[arg(short, long, default_value = "127.0.0.1")]
    address: String,

    /// Port to dial, and to listen on if nobody answers
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Local IP address for the fallback listener [default: --address]
    #[arg(short, long)]
    bind: Option<String>,

    /// Treat a dial that takes longer than this as "nobody listening"
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn session_config(&self) -> Result<SessionConfig, CliError> {
        let remote = Endpoint::parse_address(&self.address, self.port)?;
        let local = match &self.bind {
            Some(bind) => Endpoint::parse_address(bind, self.port)?,
            None => remote,
        };

        let mut config = SessionConfig::new(self.nick.as_str(), local, remote);
        config.connect_timeout = self.connect_timeout_ms.map(Duration::from_millis);
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    let config = args.session_config()?;
    tracing::info!("Starting as {} towards {}", config.local_nick, config.remote);

    let runtime = Runtime::start(config, stdin_lines()?, tokio::io::stdout()).await?;

    match runtime.run().await? {
        Some(reason) if !reason.is_graceful() => {
            tracing::warn!("Session ended abnormally: {}", reason);
            Ok(ExitCode::FAILURE)
        },
        _ => Ok(ExitCode::SUCCESS),
    }
}
