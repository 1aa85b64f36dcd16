//! Mapping schema command handlers

use anyhow::{bail, Context, Result};
use ex33::pipeline::staging_path;
use ex33::Schema;
use std::fs;
use std::path::Path;

use crate::config::Config;

fn resolve(file: Option<&Path>, config: &Config) -> std::path::PathBuf {
    file.map(Path::to_path_buf)
        .unwrap_or_else(|| config.mapping_path())
}

/// Handle `mapping check` command
pub fn check(file: Option<&Path>, config: &Config) -> Result<()> {
    let path = resolve(file, config);
    let schema = Schema::from_path(&path)
        .with_context(|| format!("Failed to load mapping {}", path.display()))?;

    println!("{}: {} entries", path.display(), schema.len());

    let missing: Vec<_> = schema.entries_missing_subcategory().collect();
    if missing.is_empty() {
        println!("Every entry has a subcategory");
        return Ok(());
    }

    println!("{} entries without a subcategory:", missing.len());
    for entry in missing {
        println!("  {}\t{}", entry.key(), entry.category.join("/"));
    }
    println!();
    println!("Run 'ex33 mapping fix' to assign a default subcategory.");

    Ok(())
}

fn stage(staging: &Path, yaml: &str, schema: &Schema) -> Result<()> {
    fs::write(staging, yaml).with_context(|| format!("Failed to write {}", staging.display()))?;
    let written = fs::read_to_string(staging)
        .with_context(|| format!("Failed to read back {}", staging.display()))?;
    let reloaded = Schema::from_yaml_str(&written).context("Rewritten mapping does not load")?;
    if reloaded.entries() != schema.entries() {
        bail!("Rewritten mapping does not match the fixed schema");
    }
    Ok(())
}

/// Write `yaml` next to `target`, check it loads back as `schema`, then
/// move it into place. The staging file is removed on failure.
fn commit(target: &Path, yaml: &str, schema: &Schema) -> Result<()> {
    let staging = staging_path(target);
    if let Err(e) = stage(&staging, yaml, schema) {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }
    fs::rename(&staging, target)
        .with_context(|| format!("Failed to replace {}", target.display()))
}

/// Handle `mapping fix` command
///
/// Writes the fixed schema back in the hierarchical layout, backing up the
/// file it replaces.
pub fn fix(
    file: Option<&Path>,
    subcategory: Option<&str>,
    output: Option<&Path>,
    config: &Config,
) -> Result<()> {
    let path = resolve(file, config);
    let mut schema = Schema::from_path(&path)
        .with_context(|| format!("Failed to load mapping {}", path.display()))?;

    let subcategory = subcategory.unwrap_or(config.default_subcategory());
    let filled = schema.fill_missing_subcategories(subcategory);
    if filled == 0 {
        println!("Nothing to fix: every entry has a subcategory");
        return Ok(());
    }

    let target = output.unwrap_or(&path);
    let yaml = schema.to_yaml().context("Failed to serialize mapping")?;

    let backup = config
        .backup_location()
        .store_for(target)
        .create(target)
        .with_context(|| format!("Failed to back up {}", target.display()))?;
    if let Some(record) = backup {
        println!("Backup: {}", record.backup.display());
    }

    commit(target, &yaml, &schema)?;
    println!(
        "Assigned subcategory '{}' to {} entries in {}",
        subcategory,
        filled,
        target.display()
    );

    Ok(())
}
