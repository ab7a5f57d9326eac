//! Named-procedure API over the core services.
//!
//! # Responsibility
//! - Map `"<resource>.<action>"` names to service calls.
//! - Convert core errors into a stable, serializable `RpcError`.
//!
//! # Invariants
//! - Every call logs exactly one `event=rpc_call` line; failures are
//!   logged here and nowhere else.
//! - Input payloads are never logged.
//! - `get` of a missing id returns JSON `null`, not an error.

mod error;
mod procedures;

pub use error::{RpcError, UNKNOWN_PROCEDURE};

use log::{error, info, warn};
use rusqlite::Connection;
use serde_json::Value;
use std::time::Instant;

/// Invokes `procedure` with one JSON `input` against `conn`.
///
/// # Errors
/// - `unknown_procedure` when no procedure has that name.
/// - `validation|not_found|conflict|storage` from the core layer.
pub fn call(conn: &Connection, procedure: &str, input: &Value) -> Result<Value, RpcError> {
    let started_at = Instant::now();
    let Some(entry) = procedures::find(procedure) else {
        warn!(
            "event=rpc_call module=rpc status=error procedure=<unknown> error_code={}",
            UNKNOWN_PROCEDURE
        );
        return Err(RpcError::unknown_procedure(procedure));
    };

    match (entry.handler)(conn, input) {
        Ok(output) => {
            info!(
                "event=rpc_call module=rpc status=ok procedure={} duration_ms={}",
                entry.name,
                started_at.elapsed().as_millis()
            );
            Ok(output)
        }
        Err(err) => {
            let rpc_error = RpcError::from(err);
            if rpc_error.is_client_error() {
                warn!(
                    "event=rpc_call module=rpc status=error procedure={} duration_ms={} error_code={} issues={}",
                    entry.name,
                    started_at.elapsed().as_millis(),
                    rpc_error.code,
                    rpc_error.issues.len()
                );
            } else {
                error!(
                    "event=rpc_call module=rpc status=error procedure={} duration_ms={} error_code={} error={}",
                    entry.name,
                    started_at.elapsed().as_millis(),
                    rpc_error.code,
                    rpc_error.message
                );
            }
            Err(rpc_error)
        }
    }
}

/// All procedure names, grouped by resource in table order.
pub fn procedure_names() -> Vec<&'static str> {
    procedures::procedures()
        .map(|procedure| procedure.name)
        .collect()
}
