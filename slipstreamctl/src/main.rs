//! SlipStream CLI
//!
//! Command-line client for the SlipStream cloud deployment service.

use anyhow::Result;
use clap::Parser;
use slipstreamctl::cli::{
    ensure_session, generate_completion, handle_aliases, handle_build, handle_delete,
    handle_list, handle_login, handle_logout, handle_publish, handle_run, handle_terminate,
    handle_usage, open_run, report, resolve_aliases, Cli, Commands,
};
use slipstreamctl::client::SlipStreamClient;
use slipstreamctl::config::Config;
use slipstreamctl::prompt::TerminalPrompt;
use slipstreamctl::session::SessionStore;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

/// Log level for the given `-v` and `-q` counts, warn by default.
fn log_level(verbose: u8, quiet: u8) -> &'static str {
    match 1 + i16::from(verbose) - i16::from(quiet) {
        i16::MIN..=-1 => "off",
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbose: u8, quiet: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = log_level(verbose, quiet);
    let directives = match level {
        "off" | "error" | "warn" => level.to_string(),
        // Keep the HTTP stack quiet unless RUST_LOG asks for it
        _ => format!(
            "warn,slipstream={0},slipstreamctl={0},slipstream_core={0}",
            level
        ),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

async fn run(cli: Cli, args: Vec<String>) -> Result<()> {
    // Aliases live in the config file, so expansion needs a first read
    let cli = if matches!(cli.command, Commands::External(_)) {
        let config = Config::load(cli.config.clone(), cli.profile.clone())?;
        resolve_aliases(cli, args, config.aliases())?
    } else {
        cli
    };

    let mut config = Config::load(cli.config.clone(), cli.profile.clone())?;
    if let Some(endpoint) = &cli.endpoint {
        config.set("endpoint", endpoint.as_str());
    }
    debug!(
        "Using profile '{}' from {} against {}",
        config.profile(),
        config.path().display(),
        config.endpoint()
    );

    let format = cli.format.into();

    match cli.command {
        Commands::Aliases => return handle_aliases(&config, format),
        Commands::Completion { shell } => {
            generate_completion(shell);
            return Ok(());
        }
        _ => {}
    }

    let session = Arc::new(SessionStore::open(config.cookie_file())?);
    let client = SlipStreamClient::with_config(
        config.endpoint(),
        session,
        config.timeout()?,
        cli.insecure,
    )?;

    let prompt = TerminalPrompt;
    if cli.command.needs_session() {
        ensure_session(
            &client,
            &mut config,
            cli.username.as_deref(),
            cli.password.as_deref(),
            &prompt,
        )
        .await?;
    }

    match cli.command {
        Commands::Login => {
            handle_login(
                &client,
                &mut config,
                cli.username.as_deref(),
                cli.password.as_deref(),
                &prompt,
            )
            .await
        }
        Commands::Logout => handle_logout(&client, &mut config).await,
        Commands::List { command } => handle_list(&client, command, format).await,
        Commands::Run { command } => handle_run(&client, command).await,
        Commands::Build { path, cloud, open } => {
            handle_build(&client, &path, cloud.as_deref(), open).await
        }
        Commands::Terminate { run_id } => handle_terminate(&client, &run_id).await,
        Commands::Usage => handle_usage(&client, format).await,
        Commands::Publish { path, version } => {
            handle_publish(&client, &path, version, true).await
        }
        Commands::Unpublish { path, version } => {
            handle_publish(&client, &path, version, false).await
        }
        Commands::Delete { path, version } => handle_delete(&client, &path, version).await,
        Commands::Open { run_id } => open_run(&client, &run_id),
        Commands::Aliases | Commands::Completion { .. } | Commands::External(_) => Ok(()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args_os()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    let cli = Cli::parse_from(&args);

    init_tracing(cli.verbose, cli.quiet);

    match run(cli, args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(clap_err) = e.downcast_ref::<clap::Error>() {
                clap_err.exit();
            }
            report::report(&e)
        }
    }
}
