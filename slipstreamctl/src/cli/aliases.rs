//! Command alias expansion
//!
//! Unknown top-level commands are captured by clap as external subcommands.
//! Their name is looked up in the alias map, the expansion is spliced into the
//! original argument list and the result is parsed again.

use anyhow::Result;
use clap::Parser;
use slipstream_core::SlipStreamError;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::commands::{Cli, Commands};

/// Expand aliases until `cli` holds a built-in command.
///
/// `args` is the full argument list `cli` was parsed from. Parse failures of
/// an expansion are returned as `clap::Error` so the caller can let clap
/// report them.
pub fn resolve_aliases(
    mut cli: Cli,
    mut args: Vec<String>,
    aliases: &BTreeMap<String, String>,
) -> Result<Cli> {
    let mut seen = HashSet::new();

    while let Commands::External(external) = &cli.command {
        let Some(name) = external.first() else {
            return Err(SlipStreamError::Usage("Missing command.".to_string()).into());
        };

        let Some(expansion) = aliases.get(name) else {
            return Err(SlipStreamError::Usage(format!("No such command '{}'.", name)).into());
        };

        if !seen.insert(name.clone()) {
            return Err(SlipStreamError::Usage(format!(
                "Alias '{}' expands to itself.",
                name
            ))
            .into());
        }

        debug!("Expanding alias '{}' to '{}'", name, expansion);

        // The external subcommand is always the tail of the argument list
        let start = args.len().saturating_sub(external.len());
        let mut expanded: Vec<String> = args[..start].to_vec();
        expanded.extend(expansion.split_whitespace().map(str::to_string));
        expanded.extend(external[1..].iter().cloned());

        cli = Cli::try_parse_from(&expanded)?;
        args = expanded;
    }

    Ok(cli)
}
