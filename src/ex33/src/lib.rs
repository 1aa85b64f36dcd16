//! # ex33
//!
//! Expedition 33 save editor library - schema mapping, category projection,
//! and safe round-trip editing.
//!
//! This library provides functionality to:
//! - Convert binary `.sav` files to structured JSON and back (via `uesave`)
//! - Load a mapping schema that names save keys and files them into categories
//! - Project every leaf of a save into a category tree and report mapping gaps
//! - Apply validated, all-or-nothing edits and write them back with backups
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use ex33::{EditBatch, ExternalConverter, Pipeline, Schema, Session};
//!
//! # fn main() -> anyhow::Result<()> {
//! let schema = Schema::from_path(Path::new("ex33_mapping_full.yaml"))?;
//! let pipeline = Pipeline::new(ExternalConverter::uesave("uesave"));
//!
//! // Convert the binary save; both artifacts are backed up first
//! let opened = pipeline.open_binary(Path::new("EXPEDITION_0.sav"))?;
//! let mut session = Session::new(schema, opened.document)?;
//!
//! for gap in session.gaps() {
//!     println!("{}\t{}", gap.kind, gap.key);
//! }
//!
//! session.apply(&EditBatch::new().with("player.level", "80"))?;
//!
//! pipeline.save_document(&opened.document_path, session.document())?;
//! pipeline.export_binary(&opened.document_path, Path::new("EXPEDITION_0.sav"))?;
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod convert;
pub mod document;
pub mod edit;
pub mod index;
pub mod mapping;
pub mod path;
pub mod pipeline;
pub mod project;
pub mod session;

// Re-export commonly used items
#[doc(inline)]
pub use backup::{
    BackupError, BackupLedger, BackupRecord, BackupStore, IntegrityError, DEFAULT_BACKUP_DIR,
};
#[doc(inline)]
pub use convert::{ConversionError, Converter, Direction, ExternalConverter};
#[doc(inline)]
pub use document::{DocumentFormat, SaveDocument, SaveNode, Scalar};
#[doc(inline)]
pub use edit::{apply_batch, EditBatch, EditError, EditValue};
#[doc(inline)]
pub use index::{Index, IndexEntry, IndexError};
#[doc(inline)]
pub use mapping::{
    ArrayPolicy, KeyPattern, MappingEntry, MappingError, PatternSegment, Schema, ValueKind,
};
#[doc(inline)]
pub use path::{KeyPath, PathError, Segment};
#[doc(inline)]
pub use pipeline::{AbortFlag, BackupLocation, OpenedSave, Pipeline, PipelineError};
#[doc(inline)]
pub use project::{
    render_gap_log, write_gap_log, CategoryNode, GapKind, GapRecord, ProjectedLeaf, Projection,
    UNCATEGORIZED,
};
#[doc(inline)]
pub use session::Session;
