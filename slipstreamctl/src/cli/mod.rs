//! CLI command definitions and handlers
//!
//! This module organizes the CLI into logical submodules:
//! - [`commands`] - Command and subcommand enum definitions
//! - [`aliases`] - Expansion of configured command aliases
//! - [`handlers`] - Command execution handlers
//! - [`report`] - Error messages and exit codes

mod aliases;
mod commands;
mod handlers;
pub mod report;

pub use aliases::*;
pub use commands::*;
pub use handlers::*;
