//! Command-line interface
//!
//! Each subcommand of the `vault` binary maps to one `cmd_*` handler.

pub mod commands;

pub use commands::*;
