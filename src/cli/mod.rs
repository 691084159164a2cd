//! CLI module for skyquery - command-line flags for the interactive session.

pub mod commands;

pub use commands::Cli;
