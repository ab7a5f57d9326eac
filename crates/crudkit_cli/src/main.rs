//! `crudkit` command-line entry point.
//!
//! # Responsibility
//! - Load configuration, start logging and open the database.
//! - Invoke one named procedure per run and print its JSON result.
//!
//! # Invariants
//! - Results go to stdout; `RpcError` JSON goes to stderr with a non-zero
//!   exit status.

use clap::{Parser, Subcommand};
use crudkit_core::db::{open_db, open_db_in_memory};
use crudkit_core::{core_version, init_logging, ping, AppConfig};
use crudkit_rpc::{call, procedure_names, RpcError};
use log::info;
use rusqlite::Connection;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "crudkit", version, about = "Validated CRUD over a local SQLite store")]
struct Cli {
    /// SQLite database file; overrides CRUDKIT_DB_PATH.
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Health check.
    Ping,
    /// Print the core version.
    Version,
    /// List every procedure name.
    Procedures,
    /// Invoke one procedure.
    Call {
        /// Procedure name, e.g. `pantry_item.create`.
        procedure: String,
        /// JSON input; defaults to `null`.
        #[arg(long, value_name = "JSON")]
        input: Option<String>,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Ping => {
            println!("{}", ping());
            ExitCode::SUCCESS
        }
        Command::Version => {
            println!("{}", core_version());
            ExitCode::SUCCESS
        }
        Command::Procedures => {
            for name in procedure_names() {
                println!("{name}");
            }
            ExitCode::SUCCESS
        }
        Command::Call { procedure, input } => {
            match run_call(cli.db, &procedure, input.as_deref()) {
                Ok(output) => {
                    println!("{}", to_pretty(&output));
                    ExitCode::SUCCESS
                }
                Err(failure) => {
                    eprintln!("{failure}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Runs one procedure; the error side is already rendered for stderr.
fn run_call(db_override: Option<PathBuf>, procedure: &str, input: Option<&str>) -> Result<Value, String> {
    let mut config = AppConfig::load().map_err(|err| format!("invalid configuration: {err}"))?;
    if db_override.is_some() {
        config.db_path = db_override;
    }

    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)
            .map_err(|err| format!("logging setup failed: {err}"))?;
    }

    let input = match input {
        Some(raw) => serde_json::from_str(raw).map_err(|err| {
            render_error(&RpcError {
                code: "validation",
                message: format!("input is not valid JSON: {err}"),
                issues: Vec::new(),
            })
        })?,
        None => Value::Null,
    };

    let conn = open_connection(&config).map_err(|err| format!("cannot open database: {err}"))?;
    info!(
        "event=cli_call module=cli status=start procedure={} db={}",
        procedure,
        if config.db_path.is_some() { "file" } else { "memory" }
    );
    call(&conn, procedure, &input).map_err(|err| render_error(&err))
}

fn open_connection(config: &AppConfig) -> crudkit_core::StorageResult<Connection> {
    match &config.db_path {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    }
}

fn render_error(err: &RpcError) -> String {
    serde_json::to_value(err)
        .map(|value| to_pretty(&value))
        .unwrap_or_else(|_| err.to_string())
}

fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
