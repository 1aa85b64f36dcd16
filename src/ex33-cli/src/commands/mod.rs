//! Command handlers for ex33 CLI
//!
//! Each subcommand has its own module with handler functions.

pub mod backups;
pub mod configure;
pub mod mapping;
pub mod save;
