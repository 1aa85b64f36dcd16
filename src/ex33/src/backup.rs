//! Timestamped backups with hash verification.
//!
//! Every artifact about to be overwritten is first copied into a backup
//! directory as `<stem>_BACKUP-<YYYYmmdd-HHMMSS>.<ext>`. A backup never
//! replaces an earlier one: if the name is taken, `-1`, `-2`, ... is
//! appended. Each copy is hashed against its source and recorded in
//! `backups.json`. Nothing here ever deletes a backup.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Default backup directory name, created next to the artifact
pub const DEFAULT_BACKUP_DIR: &str = "Save_Backup";

/// Ledger file inside the backup directory
pub const LEDGER_FILE: &str = "backups.json";

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("Backup {backup} does not match {original} (sha256 {expected} != {actual})")]
    HashMismatch {
        original: PathBuf,
        backup: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Backup {backup} of {original} is missing")]
    Missing { original: PathBuf, backup: PathBuf },
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Backup verification failed: {0}")]
    Integrity(#[from] IntegrityError),
}

/// A single backup copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Artifact that was backed up
    pub original: PathBuf,

    /// Location of the copy
    pub backup: PathBuf,

    /// When the backup was taken (RFC3339)
    pub timestamp: String,

    /// SHA-256 of the copied bytes
    pub sha256: String,

    /// File size in bytes
    pub size: u64,
}

/// All backups taken into one backup directory, oldest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupLedger {
    pub records: Vec<BackupRecord>,
}

/// Compute SHA-256 hash of a file
pub fn hash_file(path: &Path) -> Result<String, BackupError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Backup file name for `original` with the given timestamp tag.
/// `attempt` 0 is the plain name; later attempts append `-<attempt>`.
pub fn backup_file_name(original: &Path, tag: &str, attempt: u32) -> String {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let suffix = if attempt == 0 {
        String::new()
    } else {
        format!("-{}", attempt)
    };
    match original.extension() {
        Some(ext) => format!(
            "{}_BACKUP-{}{}.{}",
            stem,
            tag,
            suffix,
            ext.to_string_lossy()
        ),
        None => format!("{}_BACKUP-{}{}", stem, tag, suffix),
    }
}

/// A backup directory
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        BackupStore { dir: dir.into() }
    }

    /// The default store for an artifact: `Save_Backup` in the artifact's directory
    pub fn beside(artifact: &Path) -> Self {
        let parent = artifact
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        BackupStore::new(parent.join(DEFAULT_BACKUP_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.join(LEDGER_FILE)
    }

    /// Back up `original` now. Returns `None` if there is nothing to back up.
    pub fn create(&self, original: &Path) -> Result<Option<BackupRecord>, BackupError> {
        self.create_at(original, Local::now())
    }

    /// Back up `original` using `now` for the name and record
    pub fn create_at(
        &self,
        original: &Path,
        now: DateTime<Local>,
    ) -> Result<Option<BackupRecord>, BackupError> {
        if !original.is_file() {
            return Ok(None);
        }
        fs::create_dir_all(&self.dir)?;

        let tag = now.format("%Y%m%d-%H%M%S").to_string();
        let (backup_path, mut backup_file) = self.claim_name(original, &tag)?;

        let mut source = File::open(original)?;
        let size = io::copy(&mut source, &mut backup_file)?;
        backup_file.sync_all()?;
        drop(backup_file);

        let record = BackupRecord {
            original: original.to_path_buf(),
            backup: backup_path,
            timestamp: now.to_rfc3339(),
            sha256: hash_file(original)?,
            size,
        };
        verify(&record)?;

        let mut ledger = self.read_ledger()?;
        ledger.records.push(record.clone());
        self.write_ledger(&ledger)?;

        info!(
            original = %record.original.display(),
            backup = %record.backup.display(),
            "Created backup"
        );
        Ok(Some(record))
    }

    /// Create the first unused backup name, never opening an existing file
    fn claim_name(&self, original: &Path, tag: &str) -> Result<(PathBuf, File), BackupError> {
        let mut attempt = 0;
        loop {
            let candidate = self.dir.join(backup_file_name(original, tag, attempt));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read the ledger; an absent ledger is empty
    pub fn read_ledger(&self) -> Result<BackupLedger, BackupError> {
        let path = self.ledger_path();
        if !path.exists() {
            return Ok(BackupLedger::default());
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn write_ledger(&self, ledger: &BackupLedger) -> Result<(), BackupError> {
        let json = serde_json::to_string_pretty(ledger)?;
        fs::write(self.ledger_path(), json)?;
        Ok(())
    }

    /// Backups recorded for one artifact, oldest first
    pub fn records_for(&self, original: &Path) -> Result<Vec<BackupRecord>, BackupError> {
        Ok(self
            .read_ledger()?
            .records
            .into_iter()
            .filter(|r| r.original == original)
            .collect())
    }
}

/// Check that a recorded backup still exists and matches its recorded hash
pub fn verify(record: &BackupRecord) -> Result<(), BackupError> {
    if !record.backup.is_file() {
        return Err(IntegrityError::Missing {
            original: record.original.clone(),
            backup: record.backup.clone(),
        }
        .into());
    }
    let actual = hash_file(&record.backup)?;
    if actual != record.sha256 {
        return Err(IntegrityError::HashMismatch {
            original: record.original.clone(),
            backup: record.backup.clone(),
            expected: record.sha256.clone(),
            actual,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn create_test_file(path: &Path, content: &[u8]) -> Result<(), BackupError> {
        let mut file = fs::File::create(path)?;
        file.write_all(content)?;
        Ok(())
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 5, 3, 14, 7, 9).unwrap()
    }

    #[test]
    fn test_hash_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test.sav");

        create_test_file(&file_path, b"test content").unwrap();
        let hash = hash_file(&file_path).unwrap();

        assert_eq!(hash.len(), 64); // SHA-256 is 32 bytes = 64 hex chars
        assert_eq!(
            hash,
            "6ae8a75555209fd6c44157c0aed8016e763ff435a19cf186f76863140143ff72"
        );
    }

    #[test]
    fn test_backup_file_name() {
        let original = Path::new("/saves/EXPEDITION_0.sav");
        assert_eq!(
            backup_file_name(original, "20250503-140709", 0),
            "EXPEDITION_0_BACKUP-20250503-140709.sav"
        );
        assert_eq!(
            backup_file_name(original, "20250503-140709", 2),
            "EXPEDITION_0_BACKUP-20250503-140709-2.sav"
        );
        assert_eq!(
            backup_file_name(Path::new("noext"), "t", 0),
            "noext_BACKUP-t"
        );
    }

    #[test]
    fn test_beside() {
        let store = BackupStore::beside(Path::new("/saves/EXPEDITION_0.json"));
        assert_eq!(store.dir(), Path::new("/saves/Save_Backup"));
        let store = BackupStore::beside(Path::new("EXPEDITION_0.json"));
        assert_eq!(store.dir(), Path::new("./Save_Backup"));
    }

    #[test]
    fn test_create_backup_copies_and_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let save_path = temp_dir.path().join("EXPEDITION_0.sav");
        create_test_file(&save_path, b"original").unwrap();

        let store = BackupStore::new(temp_dir.path().join("Save_Backup"));
        let record = store.create_at(&save_path, fixed_time()).unwrap().unwrap();

        assert_eq!(
            record.backup.file_name().unwrap(),
            "EXPEDITION_0_BACKUP-20250503-140709.sav"
        );
        assert_eq!(fs::read(&record.backup).unwrap(), b"original");
        assert_eq!(record.size, 8);
        assert_eq!(record.sha256, hash_file(&save_path).unwrap());
        assert_eq!(store.records_for(&save_path).unwrap(), vec![record]);
    }

    #[test]
    fn test_same_timestamp_never_overwrites() {
        let temp_dir = tempfile::tempdir().unwrap();
        let save_path = temp_dir.path().join("EXPEDITION_0.sav");
        let store = BackupStore::new(temp_dir.path().join("Save_Backup"));

        create_test_file(&save_path, b"first").unwrap();
        let first = store.create_at(&save_path, fixed_time()).unwrap().unwrap();
        create_test_file(&save_path, b"second").unwrap();
        let second = store.create_at(&save_path, fixed_time()).unwrap().unwrap();
        create_test_file(&save_path, b"third").unwrap();
        let third = store.create_at(&save_path, fixed_time()).unwrap().unwrap();

        assert_ne!(first.backup, second.backup);
        assert_ne!(second.backup, third.backup);
        assert_eq!(
            third.backup.file_name().unwrap(),
            "EXPEDITION_0_BACKUP-20250503-140709-2.sav"
        );
        assert_eq!(fs::read(&first.backup).unwrap(), b"first");
        assert_eq!(fs::read(&second.backup).unwrap(), b"second");
        assert_eq!(store.read_ledger().unwrap().records.len(), 3);
    }

    #[test]
    fn test_missing_original_is_not_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(temp_dir.path().join("Save_Backup"));
        let result = store.create(&temp_dir.path().join("absent.json")).unwrap();
        assert!(result.is_none());
        assert!(!store.dir().exists());
    }

    #[test]
    fn test_verify_detects_tampering() {
        let temp_dir = tempfile::tempdir().unwrap();
        let save_path = temp_dir.path().join("test.sav");
        create_test_file(&save_path, b"content").unwrap();

        let store = BackupStore::new(temp_dir.path().join("bk"));
        let record = store.create(&save_path).unwrap().unwrap();
        verify(&record).unwrap();

        create_test_file(&record.backup, b"tampered").unwrap();
        assert!(matches!(
            verify(&record),
            Err(BackupError::Integrity(IntegrityError::HashMismatch { .. }))
        ));

        fs::remove_file(&record.backup).unwrap();
        assert!(matches!(
            verify(&record),
            Err(BackupError::Integrity(IntegrityError::Missing { .. }))
        ));
    }

    #[test]
    fn test_ledger_roundtrip_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let save_path = temp_dir.path().join("test.json");
        create_test_file(&save_path, b"{}").unwrap();

        let dir = temp_dir.path().join("bk");
        BackupStore::new(&dir).create(&save_path).unwrap();

        let reopened = BackupStore::new(&dir);
        let records = reopened.records_for(&save_path).unwrap();
        assert_eq!(records.len(), 1);
        assert!(reopened
            .records_for(&temp_dir.path().join("other.json"))
            .unwrap()
            .is_empty());
    }
}
