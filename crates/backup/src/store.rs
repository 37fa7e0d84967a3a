use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use dllup_file_ops::{
    AtomicReplacer, FileReplacer, calculate_file_checksum, checksum_bytes, normalized_path,
    write_atomic,
};
use dllup_model::{ModuleCandidate, ModuleFamily, VersionTag};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::BackupError;
use crate::record::{BackupRecord, sidecar_for, slugify};

/// Selects records in [`BackupStore::list`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct BackupFilter {
    /// Game display name, case-insensitive.
    pub game: Option<String>,
    pub family: Option<ModuleFamily>,
    /// Original file location.
    pub target: Option<PathBuf>,
}

impl BackupFilter {
    fn matches(&self, record: &BackupRecord) -> bool {
        if let Some(game) = &self.game
            && !record.game.eq_ignore_ascii_case(game)
        {
            return false;
        }
        if let Some(family) = self.family
            && record.family != family
        {
            return false;
        }
        if let Some(target) = &self.target
            && normalized_path(&record.target_path()) != normalized_path(target)
        {
            return false;
        }
        true
    }
}

/// Which records [`BackupStore::prune`] removes.
#[derive(Debug, Clone)]
pub struct PruneOptions {
    /// Records created before this instant are candidates for removal.
    pub cutoff: DateTime<Utc>,
    /// Newest records per original file that are always kept.
    pub keep_per_target: usize,
}

/// Blob and sidecar storage with an in-memory index.
///
/// Safe to share between worker threads: blob names are unique per
/// record and the index is behind a mutex.
pub struct BackupStore {
    root: PathBuf,
    index: Mutex<Vec<BackupRecord>>,
}

impl BackupStore {
    /// Opens (creating if needed) the store at `root` and loads every sidecar.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, BackupError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| BackupError::StorageUnavailable {
            path: root.clone(),
            message: e.to_string(),
        })?;

        let records = load_records(&root);
        info!(root = %root.display(), records = records.len(), "backup store opened");
        Ok(Self {
            root,
            index: Mutex::new(records),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index(&self) -> MutexGuard<'_, Vec<BackupRecord>> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fails unless a file can be created in the store.
    pub fn check_writable(&self) -> Result<(), BackupError> {
        let scratch = self.root.join(format!(".write-check-{}", uuid::Uuid::new_v4()));
        fs::write(&scratch, b"dllup")
            .and_then(|()| fs::remove_file(&scratch))
            .map_err(|e| BackupError::StorageUnavailable {
                path: self.root.clone(),
                message: e.to_string(),
            })
    }

    /// Durably stores `original` as the backup of `candidate`.
    ///
    /// The record is indexed only after the stored copy has been verified
    /// against the original content and version and its sidecar written.
    pub fn create(
        &self,
        candidate: &ModuleCandidate,
        original: &[u8],
        version: VersionTag,
    ) -> Result<BackupRecord, BackupError> {
        let id = uuid::Uuid::new_v4().to_string();
        let dir = self
            .root
            .join(slugify(&candidate.root.display_name))
            .join(candidate.family.slug());
        fs::create_dir_all(&dir)
            .map_err(|e| BackupError::Io(format!("failed to create {}: {e}", dir.display())))?;

        let file_name = candidate.file_name();
        let stem = Path::new(&file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());
        let blob = dir.join(format!("{stem}-{id}.bak"));

        write_atomic(&blob, original)?;

        let sha256 = checksum_bytes(original);
        if let Err(e) = verify_blob(&blob, &sha256, version) {
            discard(&blob);
            return Err(e);
        }

        let record = BackupRecord {
            id,
            game: candidate.root.display_name.clone(),
            launcher: candidate.root.kind,
            root: candidate.root.path.clone(),
            relative_path: candidate.relative_path(),
            family: candidate.family,
            file_name,
            blob,
            version,
            sha256,
            size: original.len() as u64,
            created_at: Utc::now(),
            restored_at: None,
        };

        if let Err(e) = write_sidecar(&record) {
            discard(&record.blob);
            return Err(e);
        }

        debug!(id = %record.id, blob = %record.blob.display(), "backup created");
        self.index().push(record.clone());
        Ok(record)
    }

    /// Returns matching records, newest first.
    pub fn list(&self, filter: &BackupFilter) -> Vec<BackupRecord> {
        let mut records: Vec<BackupRecord> = self
            .index()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        records
    }

    pub fn get(&self, id: &str) -> Option<BackupRecord> {
        self.index().iter().find(|r| r.id == id).cloned()
    }

    /// Returns the newest backup taken from `target`.
    pub fn latest_for(&self, target: &Path) -> Option<BackupRecord> {
        self.list(&BackupFilter {
            target: Some(target.to_path_buf()),
            ..Default::default()
        })
        .into_iter()
        .next()
    }

    /// Puts the stored original back in place and marks the record restored.
    ///
    /// The blob is checked before anything is written and the restored
    /// file's version is checked afterwards. The record stays in the store.
    pub fn restore(&self, record: &BackupRecord) -> Result<BackupRecord, BackupError> {
        let data = fs::read(&record.blob).map_err(|e| {
            BackupError::Io(format!("failed to read blob {}: {e}", record.blob.display()))
        })?;
        let actual = checksum_bytes(&data);
        if actual != record.sha256 {
            return Err(BackupError::Verification(format!(
                "blob {} is corrupt: expected sha256 {}, got {actual}",
                record.blob.display(),
                record.sha256
            )));
        }

        let target = record.target_path();
        if target.exists() {
            AtomicReplacer.replace(&target, &data)?;
        } else {
            write_atomic(&target, &data)?;
        }

        let restored_version = dllup_pe_version::read_version(&target);
        if restored_version != Some(record.version) {
            return Err(BackupError::Verification(format!(
                "restored {} reads as {}, expected {}",
                target.display(),
                restored_version.map_or_else(|| "unknown".to_string(), |v| v.to_string()),
                record.version
            )));
        }

        let mut updated = record.clone();
        updated.restored_at = Some(Utc::now());
        write_sidecar(&updated)?;
        if let Some(slot) = self.index().iter_mut().find(|r| r.id == updated.id) {
            *slot = updated.clone();
        }

        info!(id = %updated.id, target = %target.display(), version = %updated.version, "backup restored");
        Ok(updated)
    }

    /// Deletes records older than the cutoff, keeping the newest
    /// `keep_per_target` per original file. Returns the removed records.
    pub fn prune(&self, options: &PruneOptions) -> Result<Vec<BackupRecord>, BackupError> {
        let mut ordered = self.list(&BackupFilter::default());
        ordered.reverse();
        ordered.sort_by_key(|r| normalized_path(&r.target_path()));

        let mut doomed = Vec::new();
        for group in ordered.chunk_by(|a, b| {
            normalized_path(&a.target_path()) == normalized_path(&b.target_path())
        }) {
            // Oldest first within a group; the tail holds the newest.
            let removable = group.len().saturating_sub(options.keep_per_target);
            doomed.extend(
                group[..removable]
                    .iter()
                    .filter(|r| r.created_at < options.cutoff)
                    .cloned(),
            );
        }

        let mut removed = Vec::new();
        for record in doomed {
            for path in [&record.blob, &record.sidecar_path()] {
                if let Err(e) = fs::remove_file(path)
                    && e.kind() != std::io::ErrorKind::NotFound
                {
                    return Err(BackupError::Io(format!(
                        "failed to remove {}: {e}",
                        path.display()
                    )));
                }
            }
            self.index().retain(|r| r.id != record.id);
            debug!(id = %record.id, "backup pruned");
            removed.push(record);
        }

        info!(removed = removed.len(), "prune finished");
        Ok(removed)
    }
}

fn verify_blob(blob: &Path, sha256: &str, version: VersionTag) -> Result<(), BackupError> {
    let stored = calculate_file_checksum(blob)?;
    if stored != sha256 {
        return Err(BackupError::Verification(format!(
            "stored copy {} does not match the original",
            blob.display()
        )));
    }
    let stored_version = dllup_pe_version::read_version(blob);
    if stored_version != Some(version) {
        return Err(BackupError::Verification(format!(
            "stored copy {} does not read as version {version}",
            blob.display()
        )));
    }
    Ok(())
}

fn write_sidecar(record: &BackupRecord) -> Result<(), BackupError> {
    let json = serde_json::to_string_pretty(record)?;
    write_atomic(&record.sidecar_path(), json.as_bytes())?;
    Ok(())
}

fn discard(blob: &Path) {
    if let Err(e) = fs::remove_file(blob) {
        warn!(blob = %blob.display(), error = %e, "failed to remove rejected backup blob");
    }
}

/// Loads every readable sidecar whose blob still exists.
fn load_records(root: &Path) -> Vec<BackupRecord> {
    let mut records = Vec::new();
    for entry in WalkDir::new(root).max_depth(3).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }

        let parsed = fs::read_to_string(path)
            .map_err(|e| BackupError::Io(e.to_string()))
            .and_then(|text| serde_json::from_str::<BackupRecord>(&text).map_err(BackupError::from));
        match parsed {
            Ok(record) if sidecar_for(&record.blob) == path && record.blob.is_file() => {
                records.push(record);
            }
            Ok(record) => {
                warn!(sidecar = %path.display(), blob = %record.blob.display(), "backup blob missing, ignoring record");
            }
            Err(e) => warn!(sidecar = %path.display(), error = %e, "unreadable backup sidecar"),
        }
    }
    records
}
