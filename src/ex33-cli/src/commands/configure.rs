//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting up ex33 CLI defaults.

use crate::cli::ArrayPolicyArg;
use crate::config::Config;
use anyhow::Result;
use ex33::{BackupLocation, DEFAULT_BACKUP_DIR};

/// Values passed to `ex33 configure`
#[derive(Debug, Default)]
pub struct ConfigureArgs {
    pub converter: Option<String>,
    pub timeout: Option<u64>,
    pub backup_dir: Option<String>,
    pub mapping: Option<String>,
    pub gap_log: Option<String>,
    pub array_policy: Option<ArrayPolicyArg>,
    pub default_subcategory: Option<String>,
}

impl ConfigureArgs {
    fn is_empty(&self) -> bool {
        self.converter.is_none()
            && self.timeout.is_none()
            && self.backup_dir.is_none()
            && self.mapping.is_none()
            && self.gap_log.is_none()
            && self.array_policy.is_none()
            && self.default_subcategory.is_none()
    }

    /// Copy every provided value into `config`
    fn apply_to(self, config: &mut Config) {
        if let Some(converter) = self.converter {
            config.converter = Some(converter);
        }
        if let Some(timeout) = self.timeout {
            config.converter_timeout_secs = Some(timeout);
        }
        if let Some(dir) = self.backup_dir {
            config.backup_dir = Some(dir);
        }
        if let Some(mapping) = self.mapping {
            config.mapping = Some(mapping);
        }
        if let Some(log) = self.gap_log {
            config.gap_log = Some(log);
        }
        if let Some(policy) = self.array_policy {
            config.array_policy = Some(policy.into());
        }
        if let Some(sub) = self.default_subcategory {
            config.default_subcategory = Some(sub);
        }
    }
}

/// Handle the configure command
pub fn handle(args: ConfigureArgs, show: bool) -> Result<()> {
    let mut config = Config::load()?;

    if show {
        show_config(&config);
        return Ok(());
    }

    if args.is_empty() {
        show_usage();
        return Ok(());
    }

    args.apply_to(&mut config);
    config.save()?;
    if let Ok(path) = Config::config_path() {
        println!("Config saved to: {}", path.display());
    }

    Ok(())
}

/// Display current configuration, with defaults filled in
fn show_config(config: &Config) {
    println!("Converter: {}", config.converter().display());
    match config.converter_timeout() {
        Some(timeout) => println!("Converter timeout: {}s", timeout.as_secs()),
        None => println!("Converter timeout: none"),
    }
    match config.backup_location() {
        BackupLocation::Dir(dir) => println!("Backup directory: {}", dir.display()),
        BackupLocation::Beside => {
            println!("Backup directory: {} next to each file", DEFAULT_BACKUP_DIR)
        }
    }
    println!("Mapping: {}", config.mapping_path().display());
    println!("Gap log: {}", config.gap_log_path().display());
    println!("Array policy: {:?}", config.array_policy());
    println!("Default subcategory: {}", config.default_subcategory());

    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}

/// Show usage help for the configure command
fn show_usage() {
    println!("Usage: ex33 configure --converter ~/.cargo/bin/uesave");
    println!("   or: ex33 configure --default-mapping ex33_mapping_full.yaml --array-policy any-position");
    println!("   or: ex33 configure --show");
    println!();
    println!("Note: Expedition 33 saves are converted with uesave.");
    println!("      Point --converter at your uesave executable.");
}
