//! Mapping of command failures to messages and exit codes

use slipstream_core::SlipStreamError;
use std::process::ExitCode;

/// Exit code of a failed command.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code of a usage error: bad option, unknown command or profile.
pub const EXIT_USAGE: u8 = 2;

const INVALID_CREDENTIALS: &str = "Invalid credentials provided. Log in with `slipstream login`.";
const ACCESS_DENIED: &str = "Access denied: insufficient privileges for this operation.";

/// User-facing message and exit code for an error.
pub fn exit_status(err: &anyhow::Error) -> (String, u8) {
    let Some(slipstream) = err.chain().find_map(|e| e.downcast_ref::<SlipStreamError>()) else {
        return (err.to_string(), EXIT_FAILURE);
    };

    match slipstream.status() {
        Some(401) => (INVALID_CREDENTIALS.to_string(), EXIT_FAILURE),
        Some(403) => (ACCESS_DENIED.to_string(), EXIT_FAILURE),
        _ if slipstream.is_usage() => (slipstream.to_string(), EXIT_USAGE),
        _ => (err.to_string(), EXIT_FAILURE),
    }
}

/// Print an error to stderr and return the exit code to terminate with.
pub fn report(err: &anyhow::Error) -> ExitCode {
    tracing::debug!("{:?}", err);
    let (message, code) = exit_status(err);
    eprintln!("Error: {}", message);
    ExitCode::from(code)
}
