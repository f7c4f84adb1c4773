//! Command execution handlers

use anyhow::{bail, Context, Result};
use slipstream_core::{Result as CoreResult, SlipStreamError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::SlipStreamClient;
use crate::config::Config;
use crate::format::{self, format_success, format_warning, OutputFormat};
use crate::prompt::CredentialPrompt;

use super::commands::*;

fn is_status(err: &SlipStreamError, status: u16) -> bool {
    err.status() == Some(status)
}

/// Whether a login failure means the credentials were refused.
fn is_rejected_login(err: &SlipStreamError) -> bool {
    is_status(err, 401) || is_status(err, 403)
}

/// Remember who logged in where.
fn remember_login(client: &SlipStreamClient, config: &mut Config, username: &str) -> Result<()> {
    config.set("username", username);
    config.set("endpoint", client.endpoint());
    config.write().context("Failed to save configuration")
}

/// Prompt for credentials until the server accepts them.
async fn login_interactively(
    client: &SlipStreamClient,
    config: &mut Config,
    prompt: &dyn CredentialPrompt,
    default_username: Option<&str>,
) -> Result<()> {
    let mut default_username = default_username
        .or_else(|| config.username())
        .map(str::to_string);

    loop {
        let (username, password) = prompt.credentials(default_username.as_deref())?;

        match client.login(&username, &password).await {
            Ok(()) => return remember_login(client, config, &username),
            Err(e) if is_rejected_login(&e) => {
                debug!("Login refused: {}", e);
                println!("Authentication failed.");
                default_username = Some(username);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Make sure the client holds a session before a server command.
///
/// Explicit credentials win, then a persisted session cookie, then an
/// interactive prompt.
pub async fn ensure_session(
    client: &SlipStreamClient,
    config: &mut Config,
    username: Option<&str>,
    password: Option<&str>,
    prompt: &dyn CredentialPrompt,
) -> Result<()> {
    if let (Some(username), Some(password)) = (username, password) {
        client.login(username, password).await?;
        return remember_login(client, config, username);
    }

    if client.has_session() {
        debug!("Reusing session for {}", client.endpoint());
        return Ok(());
    }

    login_interactively(client, config, prompt, username).await
}

/// Handle login command
pub async fn handle_login(
    client: &SlipStreamClient,
    config: &mut Config,
    username: Option<&str>,
    password: Option<&str>,
    prompt: &dyn CredentialPrompt,
) -> Result<()> {
    match (username, password) {
        (Some(username), Some(password)) => match client.login(username, password).await {
            Ok(()) => remember_login(client, config, username)?,
            Err(e) if is_rejected_login(&e) => {
                debug!("Login refused: {}", e);
                bail!("Authentication failed.");
            }
            Err(e) => return Err(e.into()),
        },
        _ => login_interactively(client, config, prompt, username).await?,
    }

    println!("{}", format_success("Authentication successful."));
    Ok(())
}

/// Handle logout command
pub async fn handle_logout(client: &SlipStreamClient, config: &mut Config) -> Result<()> {
    if client.has_session() {
        if let Err(e) = client.logout().await {
            warn!("Server-side logout failed: {}", e);
        }
    }

    client
        .clear_session()
        .context("Failed to clear session cookies")?;
    config.clear("username")?;
    config.clear("password")?;

    println!("{}", format_success("Local credentials cleared."));
    Ok(())
}

/// Handle aliases command
pub fn handle_aliases(config: &Config, format: OutputFormat) -> Result<()> {
    let output = format::format_aliases(config.aliases(), format)?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

/// Print a listing, or `empty_message` when a table would have no rows.
fn print_listing<T>(
    items: &[T],
    format: OutputFormat,
    empty_message: &str,
    render: fn(&[T], OutputFormat) -> Result<String>,
) -> Result<()> {
    if items.is_empty() && format == OutputFormat::Table {
        println!("{}", empty_message);
    } else {
        println!("{}", render(items, format)?);
    }
    Ok(())
}

/// Handle list commands
pub async fn handle_list(
    client: &SlipStreamClient,
    command: ListCommands,
    format: OutputFormat,
) -> Result<()> {
    match command {
        ListCommands::Applications => {
            let apps = client
                .list_applications()
                .await?
                .collect::<CoreResult<Vec<_>>>()?;
            print_listing(&apps, format, "No applications found.", format::format_modules)?;
        }
        ListCommands::Modules {
            path,
            recurse,
            kind,
        } => {
            let mut modules = client
                .list_modules(path.as_deref(), recurse)
                .try_collect()
                .await?;
            if let Some(kind) = kind {
                modules.retain(|m| m.kind == kind);
            }
            print_listing(
                &modules,
                format,
                "No modules found matching your criteria.",
                format::format_modules,
            )?;
        }
        ListCommands::Runs { inactive } => {
            let runs = client
                .list_runs(inactive)
                .await?
                .collect::<CoreResult<Vec<_>>>()?;
            print_listing(&runs, format, "No runs found.", format::format_runs)?;
        }
        ListCommands::VirtualMachines {
            run_id,
            cloud,
            status,
        } => {
            let status = status.map(|s| s.to_lowercase());
            let mut vms = Vec::new();
            for vm in client.list_virtual_machines().await? {
                let vm = vm?;
                if run_id.is_some() && vm.run_id != run_id {
                    continue;
                }
                if cloud.as_ref().is_some_and(|c| *c != vm.cloud) {
                    continue;
                }
                if status.as_ref().is_some_and(|s| *s != vm.status) {
                    continue;
                }
                vms.push(vm);
            }
            print_listing(
                &vms,
                format,
                "No virtual machines found matching your criteria.",
                format::format_virtual_machines,
            )?;
        }
    }

    Ok(())
}

/// Print a new run id, then open it in a browser if asked to.
fn report_run(client: &SlipStreamClient, run_id: Uuid, open: bool) -> Result<()> {
    println!("{}", run_id);
    if open {
        open_run(client, &run_id)?;
    }
    Ok(())
}

/// Handle run commands
pub async fn handle_run(client: &SlipStreamClient, command: RunCommands) -> Result<()> {
    match command {
        RunCommands::Image { path, cloud, open } => {
            let run_id = client
                .run_image(&path, cloud.as_deref())
                .await
                .with_context(|| format!("Failed to run image {}", path))?;
            report_run(client, run_id, open)
        }
        RunCommands::Deployment { path, params, open } => {
            let run_id = client
                .run_deployment(&path, &params)
                .await
                .with_context(|| format!("Failed to run deployment {}", path))?;
            report_run(client, run_id, open)
        }
    }
}

/// Handle build command
pub async fn handle_build(
    client: &SlipStreamClient,
    path: &str,
    cloud: Option<&str>,
    open: bool,
) -> Result<()> {
    let run_id = client
        .build_image(path, cloud)
        .await
        .with_context(|| format!("Failed to build image {}", path))?;
    report_run(client, run_id, open)
}

/// Handle terminate command
pub async fn handle_terminate(client: &SlipStreamClient, run_id: &Uuid) -> Result<()> {
    client.terminate(run_id).await?;
    println!("{}", format_success("Run successfully terminated."));
    Ok(())
}

/// Handle usage command
pub async fn handle_usage(client: &SlipStreamClient, format: OutputFormat) -> Result<()> {
    let usage = client.usage().await?.collect::<CoreResult<Vec<_>>>()?;
    print_listing(
        &usage,
        format,
        "No usage information found.",
        format::format_usage,
    )
}

/// Version to act on: the given one, or the module's current version.
async fn resolve_version(
    client: &SlipStreamClient,
    path: &str,
    version: Option<u64>,
) -> Result<u64> {
    if let Some(version) = version {
        return Ok(version);
    }

    match client.get_module(path).await {
        Ok(module) => Ok(module.version),
        Err(e) if is_status(&e, 404) => bail!("Module '{}' doesn't exist.", path),
        Err(e) => Err(e.into()),
    }
}

/// Handle publish and unpublish commands
pub async fn handle_publish(
    client: &SlipStreamClient,
    path: &str,
    version: Option<u64>,
    publish: bool,
) -> Result<()> {
    let version = resolve_version(client, path, version).await?;

    let (result, verb, conflict) = if publish {
        (
            client.publish(path, version).await,
            "publish",
            "is already published",
        )
    } else {
        (
            client.unpublish(path, version).await,
            "unpublish",
            "is not published",
        )
    };

    match result {
        Ok(()) => {
            println!(
                "{}",
                format_success(&format!("Module '{}' #{} {}ed.", path, version, verb))
            );
            Ok(())
        }
        Err(e) if is_status(&e, 409) => {
            eprintln!(
                "{}",
                format_warning(&format!("Module '{}' #{} {}.", path, version, conflict))
            );
            Ok(())
        }
        Err(e) if is_status(&e, 404) => bail!("Module '{}' #{} doesn't exist.", path, version),
        Err(e) if is_status(&e, 403) => {
            bail!("Not authorized to {} module '{}' #{}.", verb, path, version)
        }
        Err(e) => Err(e.into()),
    }
}

/// Handle delete command
pub async fn handle_delete(client: &SlipStreamClient, path: &str, version: Option<u64>) -> Result<()> {
    let target = match version {
        Some(version) => format!("{}/{}", path, version),
        None => path.to_string(),
    };

    match client.delete_module(path, version).await {
        Ok(()) => {
            println!("{}", format_success(&format!("Deleted module {}", target)));
            Ok(())
        }
        Err(e) if is_status(&e, 404) => bail!("Module {} does not exist.", target),
        Err(e) if is_status(&e, 403) => bail!("Not authorized to delete module {}.", target),
        Err(e) => Err(e.into()),
    }
}

/// Open a run page in the default browser.
pub fn open_run(client: &SlipStreamClient, run_id: &Uuid) -> Result<()> {
    let url = client.run_url(run_id);
    debug!("Opening {}", url);
    open::that(&url).with_context(|| format!("Failed to open {} in a web browser", url))
}

/// Generate shell completion script
pub fn generate_completion(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}
