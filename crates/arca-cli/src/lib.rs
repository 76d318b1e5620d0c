//! arca-cli: the `arca` command-line tool.
//!
//! # Modules
//!
//! - [`cli`]: clap definitions
//! - [`config_handlers`]: `arca config ...` and the dotted-key TOML helpers
//! - [`commands`]: web service, receipt and printer commands

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config_handlers;

pub use cli::{Cli, Command, ConfigAction};
