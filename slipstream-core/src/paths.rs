//! Default locations of persisted client state
//!
//! Both files live under the user's home directory, like most credential-bearing
//! dotfiles. When no home directory can be determined the current directory is
//! used instead.

use std::path::PathBuf;

/// Name of the configuration file in the home directory.
pub const CONFIG_FILE_NAME: &str = ".slipstreamconfig";

/// Private directory holding the session cookie jar.
pub const STATE_DIR_NAME: &str = ".slipstream";

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the default path of the profile configuration file.
///
/// `~/.slipstreamconfig`
pub fn default_config_path() -> PathBuf {
    home_dir().join(CONFIG_FILE_NAME)
}

/// Returns the default path of the persisted cookie jar.
///
/// `~/.slipstream/cookies.txt`
pub fn default_cookie_path() -> PathBuf {
    home_dir().join(STATE_DIR_NAME).join("cookies.txt")
}
