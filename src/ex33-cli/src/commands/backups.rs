//! Backup listing command handler

use anyhow::{bail, Context, Result};
use ex33::{backup, BackupRecord};
use std::fs;
use std::path::Path;

use crate::config::Config;

/// Whether a ledger entry refers to `input`, however the path was spelled
fn refers_to(record: &BackupRecord, input: &Path) -> bool {
    if record.original == input {
        return true;
    }
    match (fs::canonicalize(&record.original), fs::canonicalize(input)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Backups of `input` recorded in its backup location, oldest first
pub fn find(input: &Path, config: &Config) -> Result<Vec<BackupRecord>> {
    let store = config.backup_location().store_for(input);
    let ledger = store
        .read_ledger()
        .with_context(|| format!("Failed to read {}", store.ledger_path().display()))?;
    Ok(ledger
        .records
        .into_iter()
        .filter(|r| refers_to(r, input))
        .collect())
}

/// Handle `backups` command
pub fn handle(input: &Path, verify: bool, config: &Config) -> Result<()> {
    let records = find(input, config)?;
    if records.is_empty() {
        println!("No backups of {}", input.display());
        return Ok(());
    }

    let mut failed = 0;
    for record in &records {
        let status = if verify {
            match backup::verify(record) {
                Ok(()) => "  ok".to_string(),
                Err(e) => {
                    failed += 1;
                    format!("  FAILED: {}", e)
                }
            }
        } else {
            String::new()
        };
        println!(
            "{}  {}  {} bytes{}",
            record.timestamp,
            record.backup.display(),
            record.size,
            status
        );
    }

    if failed > 0 {
        bail!("{} of {} backups failed verification", failed, records.len());
    }
    Ok(())
}
