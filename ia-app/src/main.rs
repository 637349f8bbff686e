//! Insight agent binary: natural-language questions over a sales database.

mod agent;
mod config;
mod error;
mod routes;
mod safety;
mod server;
mod shaper;
mod tickets;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

const DEFAULT_LOG_FILTER: &str =
    "info,insight_agent=debug,ia_app=debug,ia_tools=debug,ia_llm=debug,ia_tickets=debug,tower_http=info";

#[derive(Debug, Parser)]
#[command(
    name = "insight-agent",
    version,
    about = "Ask questions about users, orders and sales in plain language"
)]
struct Cli {
    /// Config file (defaults to ./insight-agent.toml when present).
    #[arg(long, env = "INSIGHT_AGENT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP server (default).
    Serve,
    /// Validate config, the database file and configured integrations.
    Doctor,
    /// Create the sales and ticket tables if they do not exist yet.
    InitDb,
    /// Print the operation catalog as JSON.
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is normal outside development.
    let dotenv = dotenvy::dotenv();
    init_tracing()?;
    install_panic_hook();
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::serve(cli.config).await,
        Command::Doctor => server::doctor(cli.config).await,
        Command::InitDb => server::init_db(cli.config).await,
        Command::Tools => server::print_tools(),
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let log_format = std::env::var("INSIGHT_AGENT_LOG_FORMAT")
        .unwrap_or_else(|_| "json".to_string())
        .to_ascii_lowercase();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    match log_format.as_str() {
        "json" => builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .init(),
        "pretty" => builder.pretty().init(),
        "compact" => builder.compact().init(),
        other => {
            anyhow::bail!(
                "unsupported INSIGHT_AGENT_LOG_FORMAT={other:?}; expected one of: json, pretty, compact"
            );
        }
    }

    tracing::info!(
        log_format = %log_format,
        env_filter = ?std::env::var("RUST_LOG").ok(),
        "tracing initialized"
    );
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        tracing::error!(
            panic_location = %location,
            panic_payload = %panic_message(info.payload()),
            "panic captured"
        );
        default_hook(info);
    }));
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| msg.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
