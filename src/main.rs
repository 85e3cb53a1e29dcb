//! Slot-Chaser command-line entry point
//!
//! Three operations against the gymnasium reservation portal:
//! - `book`: full booking run (login, poll for the date, claim, pay)
//! - `login`: session warm-up, held open until the browser goes away
//! - `query`: read-only scan of the currently bookable time slots
//!
//! The process exits 0 on success and non-zero on any terminal failure so a
//! calling process can branch on the outcome without parsing output.

use clap::{Parser, Subcommand};
use slot_chaser::booking::OutcomeStatus;
use slot_chaser::config::Config;
use slot_chaser::ops;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(
    name = "slot-chaser",
    version,
    about = "Automated gymnasium slot reservation assistant"
)]
struct Cli {
    /// Path to the configuration file (JSON or TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Run the browser with a visible window
    #[arg(long, global = true)]
    headed: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full booking flow
    Book,
    /// Establish a session and keep it open
    Login,
    /// List the currently bookable time slots as a JSON array
    Query,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.headed {
        config.headless = false;
    }

    // Respect RUST_LOG over the configured level
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .or_else(|| config.log_level.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to initialize logging");
        return ExitCode::FAILURE;
    }

    info!("Slot-Chaser v{}", slot_chaser::VERSION);

    match cli.command {
        Command::Book => match ops::run_booking(&config).await {
            Ok(outcome) => {
                match outcome.status {
                    OutcomeStatus::Success => info!("{}", outcome.message),
                    _ => error!("{}", outcome.message),
                }
                ExitCode::from(outcome.status.exit_code())
            }
            Err(e) => {
                error!("Booking aborted: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::Login => match ops::run_login(&config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Login failed: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::Query => match ops::run_query(&config).await {
            Ok(slots) => {
                match serde_json::to_string(&slots) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to serialize slot list: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Query failed: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}
