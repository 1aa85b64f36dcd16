//! Core CLI definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use super::mapping::MappingCommand;

#[derive(Parser)]
#[command(name = "ex33")]
#[command(about = "Expedition 33 Save Editor", long_about = None)]
pub struct Cli {
    /// Mapping YAML to use instead of the configured one
    #[arg(long = "mapping", global = true, env = "EX33_MAPPING")]
    pub mapping_override: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ArrayPolicyArg {
    /// Array positions must be matched by `[n]` or `[*]`
    Explicit,
    /// Patterns may omit array positions
    AnyPosition,
}

impl From<ArrayPolicyArg> for ex33::ArrayPolicy {
    fn from(arg: ArrayPolicyArg) -> Self {
        match arg {
            ArrayPolicyArg::Explicit => ex33::ArrayPolicy::Explicit,
            ArrayPolicyArg::AnyPosition => ex33::ArrayPolicy::AnyPosition,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure default settings
    #[command(visible_alias = "c")]
    Configure {
        /// Converter executable (uesave)
        #[arg(long)]
        converter: Option<String>,

        /// Converter timeout in seconds (0 disables it)
        #[arg(long)]
        timeout: Option<u64>,

        /// Fixed backup directory (default: Save_Backup next to each file)
        #[arg(long)]
        backup_dir: Option<String>,

        /// Default mapping YAML
        #[arg(long = "default-mapping")]
        mapping_file: Option<String>,

        /// Gap log path
        #[arg(long)]
        gap_log: Option<String>,

        /// How mapping patterns treat array positions
        #[arg(long, value_enum)]
        array_policy: Option<ArrayPolicyArg>,

        /// Subcategory used by `mapping fix`
        #[arg(long)]
        default_subcategory: Option<String>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },

    /// Convert a binary .sav to JSON (backing up first) and summarize it
    #[command(visible_alias = "o")]
    Open {
        /// Path to .sav file
        input: PathBuf,
    },

    /// Show the category tree of a save document
    #[command(visible_alias = "t")]
    Tree {
        /// Path to JSON/YAML save document
        input: PathBuf,

        /// Only show categories and keys matching this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Query a value by key path (e.g. "player.level")
    Get {
        /// Path to JSON/YAML save document
        input: PathBuf,

        /// Key path
        key: String,
    },

    /// Set one or more values and write the document back (with backup)
    Set {
        /// Path to JSON/YAML save document
        input: PathBuf,

        /// Edits as KEY=VALUE; all are applied or none
        #[arg(required = true, value_name = "KEY=VALUE")]
        edits: Vec<String>,
    },

    /// Convert a save document back to a binary .sav (with backup)
    #[command(visible_alias = "x")]
    Export {
        /// Path to JSON/YAML save document
        input: PathBuf,

        /// Target .sav (defaults to the document path with a .sav extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report unmapped keys and entries without a subcategory
    Gaps {
        /// Path to JSON/YAML save document
        input: PathBuf,

        /// Gap log to write (uses configured path if not provided)
        #[arg(short, long)]
        log: Option<PathBuf>,
    },

    /// Mapping schema operations (check, fix)
    #[command(visible_alias = "m")]
    Mapping {
        #[command(subcommand)]
        command: MappingCommand,
    },

    /// List backups of a file
    #[command(visible_alias = "b")]
    Backups {
        /// Original file (.sav, .json or mapping YAML)
        input: PathBuf,

        /// Re-hash each backup and compare with the recorded digest
        #[arg(long)]
        verify: bool,
    },
}
