//! Safe round-trip pipeline.
//!
//! Wraps every write of a save artifact (structured document or binary
//! save) in the same sequence: back up the current artifact, produce the new
//! one in a staging file next to it, verify the staging file, then rename it
//! over the target. A failure at any step leaves the target and every
//! backup exactly as they were.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::backup::{BackupError, BackupRecord, BackupStore};
use crate::convert::{ConversionError, Converter, Direction};
use crate::document::{DocumentFormat, SaveDocument};
use crate::index::IndexError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("Failed to load document {path}: {source}")]
    Document { path: PathBuf, source: IndexError },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// User-requested abort, honored only before an operation starts touching disk
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        AbortFlag::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where backups go
#[derive(Debug, Clone, Default)]
pub enum BackupLocation {
    /// `Save_Backup` next to each artifact
    #[default]
    Beside,
    /// One fixed directory for everything
    Dir(PathBuf),
}

impl BackupLocation {
    pub fn store_for(&self, artifact: &Path) -> BackupStore {
        match self {
            BackupLocation::Beside => BackupStore::beside(artifact),
            BackupLocation::Dir(dir) => BackupStore::new(dir),
        }
    }
}

/// Staging file next to `target`, so the final rename stays on one filesystem
pub fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!("{}.partial", name))
}

/// Removes the staging file unless the commit happened
struct Staging {
    path: PathBuf,
    committed: bool,
}

impl Staging {
    fn new(target: &Path) -> Self {
        Staging {
            path: staging_path(target),
            committed: false,
        }
    }

    fn commit(mut self, target: &Path) -> Result<(), PipelineError> {
        fs::rename(&self.path, target).map_err(io_error(target))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Result of opening a binary save
#[derive(Debug)]
pub struct OpenedSave {
    pub document_path: PathBuf,
    pub document: SaveDocument,
    pub backups: Vec<BackupRecord>,
}

/// Backup-then-convert-then-verify wrapper around a [`Converter`].
///
/// Operations run one at a time and block; run them off any interactive
/// thread.
pub struct Pipeline<C> {
    converter: C,
    backups: BackupLocation,
    abort: AbortFlag,
}

impl<C: Converter> Pipeline<C> {
    pub fn new(converter: C) -> Self {
        Pipeline {
            converter,
            backups: BackupLocation::default(),
            abort: AbortFlag::new(),
        }
    }

    pub fn with_backup_location(mut self, backups: BackupLocation) -> Self {
        self.backups = backups;
        self
    }

    /// Handle that can abort operations that have not started yet
    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    fn check_abort(&self) -> Result<(), PipelineError> {
        if self.abort.is_aborted() {
            return Err(ConversionError::Aborted.into());
        }
        Ok(())
    }

    fn backup(&self, artifact: &Path) -> Result<Option<BackupRecord>, PipelineError> {
        Ok(self.backups.store_for(artifact).create(artifact)?)
    }

    /// Convert a binary save to its structured document (`<name>.json` beside it).
    ///
    /// The save itself is backed up first, and so is any existing document
    /// before it is replaced.
    pub fn open_binary(&self, save_path: &Path) -> Result<OpenedSave, PipelineError> {
        self.check_abort()?;
        fs::metadata(save_path).map_err(io_error(save_path))?;

        let mut backups = Vec::new();
        backups.extend(self.backup(save_path)?);

        let document_path = save_path.with_extension("json");
        let staging = Staging::new(&document_path);
        self.converter
            .convert(Direction::ToDocument, save_path, &staging.path)?;

        let document = read_converted_document(&staging.path)?;

        backups.extend(self.backup(&document_path)?);
        staging.commit(&document_path)?;

        info!(
            save = %save_path.display(),
            document = %document_path.display(),
            "Opened binary save"
        );
        Ok(OpenedSave {
            document_path,
            document,
            backups,
        })
    }

    /// Read a structured document; never writes anything
    pub fn load_document(&self, path: &Path) -> Result<SaveDocument, PipelineError> {
        let data = fs::read(path).map_err(io_error(path))?;
        SaveDocument::parse(&data, DocumentFormat::from_path(path)).map_err(|source| {
            PipelineError::Document {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Write `document` to `path`, backing up whatever is there first.
    ///
    /// The written bytes must parse back to exactly `document` before the
    /// target is replaced.
    pub fn save_document(
        &self,
        path: &Path,
        document: &SaveDocument,
    ) -> Result<Option<BackupRecord>, PipelineError> {
        self.check_abort()?;
        let backup = self.backup(path)?;

        let data = document.to_bytes().map_err(|source| PipelineError::Document {
            path: path.to_path_buf(),
            source,
        })?;
        let staging = Staging::new(path);
        fs::write(&staging.path, &data).map_err(io_error(&staging.path))?;

        let written = fs::read(&staging.path).map_err(io_error(&staging.path))?;
        match SaveDocument::parse(&written, document.format()) {
            Ok(reparsed) if reparsed.root() == document.root() => {}
            Ok(_) => {
                return Err(invalid_output(
                    &staging.path,
                    "written document differs from the edited one".to_string(),
                ))
            }
            Err(e) => return Err(invalid_output(&staging.path, e.to_string())),
        }

        staging.commit(path)?;
        info!(document = %path.display(), "Saved document");
        Ok(backup)
    }

    /// Convert a structured document back into a binary save at `save_path`
    pub fn export_binary(
        &self,
        document_path: &Path,
        save_path: &Path,
    ) -> Result<Option<BackupRecord>, PipelineError> {
        self.check_abort()?;
        fs::metadata(document_path).map_err(io_error(document_path))?;
        let backup = self.backup(save_path)?;

        let staging = Staging::new(save_path);
        self.converter
            .convert(Direction::ToBinary, document_path, &staging.path)?;

        let size = match fs::metadata(&staging.path) {
            Ok(meta) => meta.len(),
            Err(e) => return Err(invalid_output(&staging.path, e.to_string())),
        };
        if size == 0 {
            return Err(invalid_output(&staging.path, "empty binary save".to_string()));
        }

        staging.commit(save_path)?;
        info!(
            document = %document_path.display(),
            save = %save_path.display(),
            bytes = size,
            "Exported binary save"
        );
        Ok(backup)
    }
}

fn invalid_output(path: &Path, reason: String) -> PipelineError {
    warn!(path = %path.display(), %reason, "Rejected converter output");
    ConversionError::InvalidOutput {
        path: path.to_path_buf(),
        reason,
    }
    .into()
}

fn read_converted_document(path: &Path) -> Result<SaveDocument, PipelineError> {
    let data = fs::read(path).map_err(|e| invalid_output(path, e.to_string()))?;
    SaveDocument::parse(&data, DocumentFormat::from_path(path))
        .map_err(|e| invalid_output(path, e.to_string()))
}
