//! Operator tool for an HBNB deployment.
//!
//! # Responsibility
//! - Open the storage backend selected by `HBNB_*` environment variables.
//! - Print the status or statistics body as JSON on stdout.

use clap::{Parser, Subcommand};
use hbnb_core::{init_from_config, open_storage, HbnbService, LoggingConfig, StorageConfig};
use log::error;
use serde_json::Value;
use std::process::ExitCode;

/// Inspect the configured HBNB storage backend.
#[derive(Parser, Debug)]
#[command(name = "hbnb_cli")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Print the health payload (default)
    Status,

    /// Print per-collection entity counts
    Stats,
}

impl Command {
    fn name(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Stats => "stats",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Status);
    match run(command) {
        Ok(body) => {
            println!("{body}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            error!(
                "event=cli_run module=cli status=error command={} error={}",
                command.name(),
                message
            );
            eprintln!("hbnb_cli: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<Value, String> {
    if let Err(err) = init_from_config(&LoggingConfig::from_env()) {
        eprintln!("hbnb_cli: logging disabled: {err}");
    }

    let config = StorageConfig::from_env().map_err(|err| err.to_string())?;
    let storage = open_storage(&config).map_err(|err| err.to_string())?;
    let mut service = HbnbService::new(storage);

    let body = match command {
        Command::Status => Ok(service.status()),
        Command::Stats => service
            .stats()
            .map_err(|err| err.to_string())
            .and_then(|stats| serde_json::to_value(stats).map_err(|err| err.to_string())),
    };

    service.close_session().map_err(|err| err.to_string())?;
    body
}
