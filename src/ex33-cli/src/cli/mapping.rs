//! Mapping schema command CLI definitions

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum MappingCommand {
    /// Validate a mapping file and list entries without a subcategory
    Check {
        /// Mapping YAML (uses configured mapping if not provided)
        file: Option<PathBuf>,
    },

    /// Give every entry without a subcategory a default one and write the file back
    Fix {
        /// Mapping YAML (uses configured mapping if not provided)
        file: Option<PathBuf>,

        /// Subcategory to assign (uses configured default if not provided)
        #[arg(short, long)]
        subcategory: Option<String>,

        /// Write to this file instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
