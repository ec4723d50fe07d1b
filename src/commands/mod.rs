pub mod cache;
pub mod parse;
pub mod resolve;
pub mod run;

use anyhow::Result;
use cukeprobe::CukeprobeError;
use serde::Serialize;
use serde_json::{Value, json};

/// Pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Error object printed on stdout for a failed command
///
/// Failed scenarios already produced their report on stdout, so they get none.
pub fn error_json(err: &CukeprobeError) -> Option<Value> {
    if matches!(err, CukeprobeError::ScenariosFailed { .. }) {
        return None;
    }
    Some(json!({
        "error": true,
        "message": err.to_string(),
        "exit_code": err.exit_code()
    }))
}

#[cfg(test)]
#[path = "../commands_test.rs"]
mod commands_test;
