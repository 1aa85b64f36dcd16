//! Command dispatch functions
//!
//! Breaks up the main match statement into focused dispatch functions.

use std::path::Path;

use anyhow::Result;

use crate::cli::*;
use crate::commands;
use crate::config::Config;

/// Dispatch mapping subcommands
pub fn dispatch_mapping(command: MappingCommand, config: &Config) -> Result<()> {
    match command {
        MappingCommand::Check { file } => commands::mapping::check(file.as_deref(), config),

        MappingCommand::Fix {
            file,
            subcategory,
            output,
        } => commands::mapping::fix(
            file.as_deref(),
            subcategory.as_deref(),
            output.as_deref(),
            config,
        ),
    }
}

/// Dispatch top-level commands
pub fn dispatch(command: Commands, config: &Config, mapping: Option<&Path>) -> Result<()> {
    match command {
        Commands::Configure {
            converter,
            timeout,
            backup_dir,
            mapping_file,
            gap_log,
            array_policy,
            default_subcategory,
            show,
        } => {
            let args = commands::configure::ConfigureArgs {
                converter,
                timeout,
                backup_dir,
                mapping: mapping_file,
                gap_log,
                array_policy,
                default_subcategory,
            };
            commands::configure::handle(args, show)
        }

        Commands::Open { input } => commands::save::open(&input, config, mapping),

        Commands::Tree { input, search } => {
            commands::save::tree(&input, search.as_deref(), config, mapping)
        }

        Commands::Get { input, key } => commands::save::get(&input, &key, config),

        Commands::Set { input, edits } => commands::save::set(&input, &edits, config, mapping),

        Commands::Export { input, output } => {
            commands::save::export(&input, output.as_deref(), config)
        }

        Commands::Gaps { input, log } => {
            commands::save::gaps(&input, log.as_deref(), config, mapping)
        }

        Commands::Mapping { command } => {
            // An explicit --mapping is the file to check or fix
            let command = match (command, mapping) {
                (MappingCommand::Check { file: None }, Some(path)) => MappingCommand::Check {
                    file: Some(path.to_path_buf()),
                },
                (
                    MappingCommand::Fix {
                        file: None,
                        subcategory,
                        output,
                    },
                    Some(path),
                ) => MappingCommand::Fix {
                    file: Some(path.to_path_buf()),
                    subcategory,
                    output,
                },
                (command, _) => command,
            };
            dispatch_mapping(command, config)
        }

        Commands::Backups { input, verify } => commands::backups::handle(&input, verify, config),
    }
}
