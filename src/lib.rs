//! # Armada
//!
//! An interactive CLI that walks you through batch transformations across a
//! fleet of GitHub repositories: discover repos, clone them, run a script,
//! push branches, open pull requests, and collect them on a project board.
//! Progress is saved to a session file after every step, so a multi-hour run
//! survives interruption and can be resumed where it left off.
//!
//! ## Modules
//!
//! - `session` - Session state engine, data model, and file-backed store
//! - `ops` - Operation registry, argument schemas, and the built-in operations
//! - `types` - Display descriptors for each kind of session data
//! - `interactive` - The guided step loop and session picker
//! - `interaction` - Prompt and display abstraction over the terminal
//! - `github` - Thin GitHub REST client for pulls and project boards
//! - `catalog` - Repository catalog service client
//! - `subprocess` - Process runner abstraction and the git CLI wrapper
//! - `config` - Tokens, hosts, and workspace directories
pub mod catalog;
pub mod config;
pub mod error;
pub mod github;
pub mod interaction;
pub mod interactive;
pub mod ops;
pub mod session;
pub mod subprocess;
pub mod types;

#[cfg(test)]
pub mod testkit;

pub use error::{Error, Result};
