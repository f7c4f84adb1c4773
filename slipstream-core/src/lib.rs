//! SlipStream Core Library
//!
//! Shared types, response mapping, and path helpers for the SlipStream
//! command-line client. Nothing in this crate performs network I/O.

pub mod error;
pub mod module_path;
pub mod paths;
pub mod types;
pub mod xml;

// Re-export commonly used types
pub use error::*;
pub use module_path::{normalize_module_url, strip_version};
pub use paths::{default_config_path, default_cookie_path};
pub use types::*;
