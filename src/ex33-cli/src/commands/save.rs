//! Save file command handlers

use anyhow::{bail, Context, Result};
use ex33::{
    write_gap_log, CategoryNode, EditBatch, ExternalConverter, GapKind, KeyPath, Pipeline,
    Schema, Session,
};
use std::fmt::Write as _;
use std::path::Path;

use crate::config::Config;

/// Load the mapping schema from `mapping`, or the configured mapping file
pub fn load_schema(config: &Config, mapping: Option<&Path>) -> Result<Schema> {
    let path = mapping
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.mapping_path());
    let schema = Schema::from_path(&path)
        .with_context(|| format!("Failed to load mapping {}", path.display()))?;
    Ok(schema.with_array_policy(config.array_policy()))
}

/// Round-trip pipeline using the configured converter and backup location
pub fn pipeline(config: &Config) -> Pipeline<ExternalConverter> {
    let converter =
        ExternalConverter::uesave(config.converter()).with_timeout(config.converter_timeout());
    Pipeline::new(converter).with_backup_location(config.backup_location())
}

/// Common pattern for read operations: load document -> index -> project
fn load_session(
    pipeline: &Pipeline<ExternalConverter>,
    input: &Path,
    schema: Schema,
) -> Result<Session> {
    let document = pipeline
        .load_document(input)
        .context("Failed to load save document")?;
    Session::new(schema, document).context("Failed to index save document")
}

/// Split `KEY=VALUE` at the first `=`
pub fn parse_assignment(edit: &str) -> Result<(&str, &str)> {
    match edit.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => bail!("Invalid edit '{}': expected KEY=VALUE", edit),
    }
}

/// Handle `open` command
pub fn open(input: &Path, config: &Config, mapping: Option<&Path>) -> Result<()> {
    let schema = load_schema(config, mapping)?;
    let pipeline = pipeline(config);

    let opened = pipeline
        .open_binary(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    for record in &opened.backups {
        println!("Backup: {}", record.backup.display());
    }
    println!("Document: {}", opened.document_path.display());

    let session = Session::new(schema, opened.document).context("Failed to index save document")?;
    print_summary(&session);
    let log = config.gap_log_path();
    write_gaps(&session, &log)?;
    println!("Gap log: {} ({} gaps)", log.display(), session.gaps().len());

    Ok(())
}

/// Handle `tree` command
pub fn tree(
    input: &Path,
    search: Option<&str>,
    config: &Config,
    mapping: Option<&Path>,
) -> Result<()> {
    let session = load_session(&pipeline(config), input, load_schema(config, mapping)?)?;
    write_gaps(&session, &config.gap_log_path())?;

    match search {
        Some(query) => {
            let found = session.search(query);
            if found.leaf_count() == 0 && found.children.is_empty() {
                println!("No categories or keys match '{}'", query);
                return Ok(());
            }
            print!("{}", render_tree(&found));
        }
        None => print!("{}", render_tree(session.tree())),
    }

    Ok(())
}

/// Handle `get` command
pub fn get(input: &Path, key: &str, config: &Config) -> Result<()> {
    let document = pipeline(config)
        .load_document(input)
        .context("Failed to load save document")?;
    let path = KeyPath::parse(key).with_context(|| format!("Invalid key path '{}'", key))?;

    let node = document
        .get(&path)
        .with_context(|| format!("Key not found: {}", path))?;
    match node.as_scalar() {
        Some(value) => println!("{}", value),
        None => {
            let json = node.to_json().context("Failed to serialize value")?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}

/// Handle `set` command
pub fn set(input: &Path, edits: &[String], config: &Config, mapping: Option<&Path>) -> Result<()> {
    let mut batch = EditBatch::new();
    for edit in edits {
        let (key, value) = parse_assignment(edit)?;
        batch.add(key, value);
    }

    let pipeline = pipeline(config);
    let mut session = load_session(&pipeline, input, load_schema(config, mapping)?)?;
    session
        .apply(&batch)
        .context("Edit rejected; the document was not changed")?;

    let backup = pipeline
        .save_document(input, session.document())
        .with_context(|| format!("Failed to write {}", input.display()))?;
    if let Some(record) = backup {
        println!("Backup: {}", record.backup.display());
    }
    write_gaps(&session, &config.gap_log_path())?;

    for (key, _) in batch.iter() {
        if let Some(entry) = session.index().get(key) {
            println!("{} = {}", key, entry.value);
        }
    }

    Ok(())
}

/// Handle `export` command
pub fn export(input: &Path, output: Option<&Path>, config: &Config) -> Result<()> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("sav"));

    let backup = pipeline(config)
        .export_binary(input, &output)
        .with_context(|| format!("Failed to export {}", input.display()))?;
    if let Some(record) = backup {
        println!("Backup: {}", record.backup.display());
    }
    println!("Exported {} -> {}", input.display(), output.display());

    Ok(())
}

/// Handle `gaps` command
pub fn gaps(
    input: &Path,
    log: Option<&Path>,
    config: &Config,
    mapping: Option<&Path>,
) -> Result<()> {
    let session = load_session(&pipeline(config), input, load_schema(config, mapping)?)?;
    let log = log.map(Path::to_path_buf).unwrap_or_else(|| config.gap_log_path());

    for gap in session.gaps() {
        println!("{}\t{}", gap.kind, gap.key);
    }
    write_gaps(&session, &log)?;
    println!("Gap log: {} ({} gaps)", log.display(), session.gaps().len());
    Ok(())
}

/// Regenerate the gap log from the session's current projection
fn write_gaps(session: &Session, log: &Path) -> Result<()> {
    write_gap_log(log, session.gaps())
        .with_context(|| format!("Failed to write gap log {}", log.display()))?;
    tracing::info!(path = %log.display(), gaps = session.gaps().len(), "Wrote gap log");
    Ok(())
}

fn print_summary(session: &Session) {
    let projection = session.projection();
    println!("Keys: {}", session.index().len());
    println!(
        "Unmapped keys: {}",
        projection.gaps_of(GapKind::UnmappedKey).count()
    );
    println!(
        "Entries without subcategory: {}",
        projection.gaps_of(GapKind::MissingSubcategory).count()
    );
}

/// Render a category tree, one line per category and leaf.
/// Matches from a search are marked with `*`.
pub fn render_tree(root: &CategoryNode) -> String {
    let mut out = String::new();
    for leaf in &root.leaves {
        render_leaf(leaf, 0, &mut out);
    }
    for child in &root.children {
        render_node(child, 0, &mut out);
    }
    out
}

fn render_node(node: &CategoryNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let mark = if node.highlighted { "*" } else { "" };
    let _ = writeln!(out, "{}{}{} ({})", indent, node.name, mark, node.leaf_count());
    for leaf in &node.leaves {
        render_leaf(leaf, depth + 1, out);
    }
    for child in &node.children {
        render_node(child, depth + 1, out);
    }
}

fn render_leaf(leaf: &ex33::ProjectedLeaf, depth: usize, out: &mut String) {
    let mark = if leaf.highlighted { "*" } else { "" };
    let _ = writeln!(
        out,
        "{}{}{} = {}  [{}]",
        "  ".repeat(depth),
        leaf.display_name,
        mark,
        leaf.value,
        leaf.key
    );
}
