//! Interactive credential prompt

use anyhow::{bail, Result};
use dialoguer::{Input, Password};
use std::io::IsTerminal;

/// Source of interactively entered credentials.
pub trait CredentialPrompt {
    /// Ask for a username and a password.
    fn credentials(&self, default_username: Option<&str>) -> Result<(String, String)>;
}

/// Prompt on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn credentials(&self, default_username: Option<&str>) -> Result<(String, String)> {
        if !std::io::stdin().is_terminal() {
            bail!("No credentials provided and stdin is not a terminal. Use -u/--username and -p/--password.");
        }

        eprintln!("Enter your SlipStream credentials.");

        let mut input = Input::<String>::new().with_prompt("Username");
        if let Some(username) = default_username {
            input = input.default(username.to_string());
        }
        let username = input.interact_text()?;

        let password = Password::new()
            .with_prompt("Password (typing will be hidden)")
            .interact()?;

        Ok((username, password))
    }
}
