//! SlipStream CLI Library
//!
//! This library provides the core functionality for the `slipstream` command
//! line tool.
//!
//! # Public API
//!
//! The primary public API is the [`client::SlipStreamClient`] which provides
//! programmatic access to a SlipStream server. Sessions persist through
//! [`session::SessionStore`] and profiles through [`config::Config`].
//!
//! ```no_run
//! use slipstreamctl::client::SlipStreamClient;
//! use slipstreamctl::session::SessionStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let session = Arc::new(SessionStore::open(slipstream_core::default_cookie_path())?);
//! let client = SlipStreamClient::with_config("https://slipstream.sixsq.com", session, 30, false)?;
//!
//! client.login("alice", "secret").await?;
//! for run in client.list_runs(false).await? {
//!     println!("{}", run?.id);
//! }
//! # Ok(())
//! # }
//! ```

// Internal CLI implementation - not part of public API
#[doc(hidden)]
pub mod cli;

/// HTTP client for the SlipStream server.
pub mod client;

/// Profile and alias configuration.
pub mod config;

// Internal formatting functions - not part of public API
#[doc(hidden)]
pub mod format;

/// Interactive credential prompt.
pub mod prompt;

/// Persistent cookie jar.
pub mod session;
