//! CLI argument definitions for ex33
//!
//! This module contains all clap-derived structs and enums for CLI parsing.

mod core;
mod mapping;

pub use core::{ArrayPolicyArg, Cli, Commands};
pub use mapping::MappingCommand;
