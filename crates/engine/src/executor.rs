//! Transactional execution of an update plan.
//!
//! Each update entry is one transaction:
//!
//! 1. re-read the target and check it still carries the planned version;
//! 2. load the payload and check it carries the planned target version;
//! 3. store a verified backup of the original;
//! 4. replace the target atomically and check the new version, retrying
//!    while another process holds the file;
//! 5. if step 4 failed, put the original back from the backup.
//!
//! Entries run concurrently up to `workers`, but two entries naming the
//! same file never overlap.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dllup_backup::{BackupRecord, BackupStore};
use dllup_file_ops::{
    AtomicReplacer, FileOpsError, FileReplacer, available_space, normalized_path,
};
use dllup_model::{
    EngineEvent, EventSink, TransactionOutcome, TransactionResult, UpdatePlanEntry, VersionTag,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ExecutorError;

/// Free space required in the backup store, as a multiple of the total
/// size of the files about to be replaced.
const SPACE_FACTOR: u64 = 2;

/// Execution settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Transactions running at the same time.
    pub workers: usize,
    /// Whether to check free space in the backup store before running.
    pub check_space: bool,
    /// Extra replace attempts while the target is locked by another process.
    pub lock_retries: u32,
    /// Wait between those attempts.
    pub lock_retry_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            check_space: true,
            lock_retries: 3,
            lock_retry_delay: Duration::from_secs(2),
        }
    }
}

type PathToken = Arc<tokio::sync::Mutex<()>>;

/// Exclusive tokens keyed by normalized target path.
///
/// An entry lives only while some transaction holds or waits on it.
#[derive(Default)]
struct PathLocks {
    tokens: Mutex<HashMap<PathBuf, PathToken>>,
}

impl PathLocks {
    fn token(&self, path: &Path) -> (PathBuf, PathToken) {
        let key = normalized_path(path);
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        let token = Arc::clone(tokens.entry(key.clone()).or_default());
        (key, token)
    }

    /// Hands back a token taken with [`PathLocks::token`]. Its guard must
    /// already be dropped.
    fn release(&self, key: &Path, token: PathToken) {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        drop(token);
        // Clones are only made under this lock, so a count of one means
        // nobody else holds or waits on the token.
        if tokens.get(key).is_some_and(|t| Arc::strong_count(t) == 1) {
            tokens.remove(key);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Runs update plans against the filesystem.
pub struct TransactionExecutor {
    store: Arc<BackupStore>,
    config: ExecutorConfig,
    replacer: Arc<dyn FileReplacer>,
    cancel: CancellationToken,
    locks: Arc<PathLocks>,
}

impl TransactionExecutor {
    pub fn new(store: Arc<BackupStore>, config: ExecutorConfig) -> Self {
        Self {
            store,
            config,
            replacer: Arc::new(AtomicReplacer),
            cancel: CancellationToken::new(),
            locks: Arc::new(PathLocks::default()),
        }
    }

    /// Uses `replacer` for the replace step instead of [`AtomicReplacer`].
    pub fn with_replacer(mut self, replacer: Arc<dyn FileReplacer>) -> Self {
        self.replacer = replacer;
        self
    }

    /// Returns a token that stops dispatching new entries when cancelled.
    ///
    /// Transactions already running finish. Cancellation is permanent for
    /// this executor.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &Arc<BackupStore> {
        &self.store
    }

    /// Checks that the plan can run without risking an unbacked write.
    ///
    /// The backup store must accept new files and, when enabled, hold at
    /// least twice the combined size of every update target.
    pub fn preflight(&self, plan: &[UpdatePlanEntry]) -> Result<(), ExecutorError> {
        let targets: Vec<&Path> = plan
            .iter()
            .filter(|e| e.action.is_update())
            .map(|e| e.candidate.path.as_path())
            .collect();
        if targets.is_empty() {
            return Ok(());
        }

        self.store.check_writable().map_err(|e| {
            ExecutorError::Precondition(format!("backup storage is not writable: {e}"))
        })?;

        if self.config.check_space {
            let total: u64 = targets
                .iter()
                .filter_map(|p| fs::metadata(p).ok())
                .map(|m| m.len())
                .sum();
            let required = total.saturating_mul(SPACE_FACTOR);
            let available = available_space(self.store.root()).map_err(|e| {
                ExecutorError::Precondition(format!("cannot measure free space: {e}"))
            })?;
            if available < required {
                return Err(ExecutorError::Precondition(format!(
                    "insufficient space for backups in {}: need {required} bytes, {available} available",
                    self.store.root().display()
                )));
            }
        }
        Ok(())
    }

    /// Executes `plan`, returning one result per entry in index order.
    ///
    /// Only precondition failures are returned as errors, before anything
    /// is written. Entries that are not updates are reported as skipped
    /// without touching the filesystem; entries not yet dispatched when the
    /// run is cancelled are reported as skipped too.
    pub async fn execute(
        &self,
        plan: Vec<UpdatePlanEntry>,
        sink: &dyn EventSink,
    ) -> Result<Vec<TransactionResult>, ExecutorError> {
        self.preflight(&plan)?;

        let total = plan.len();
        let results: Arc<Mutex<Vec<TransactionResult>>> =
            Arc::new(Mutex::new(Vec::with_capacity(total)));
        let mut pending = VecDeque::new();
        let mut dispatched = Vec::new();

        for entry in plan {
            if entry.action.is_update() {
                pending.push_back(entry);
            } else {
                let reason = entry.action.reason().unwrap_or("not an update").to_string();
                record(&results, sink, TransactionResult::skipped(entry, reason));
            }
        }

        let slots = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut running: JoinSet<TransactionResult> = JoinSet::new();

        while !pending.is_empty() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(remaining = pending.len(), "run cancelled, no further updates dispatched");
                    break;
                }
                permit = Arc::clone(&slots).acquire_owned() => {
                    let Ok(permit) = permit else { break };
                    let Some(entry) = pending.pop_front() else { break };
                    sink.emit(EngineEvent::TransactionStarted {
                        index: entry.index,
                        path: entry.candidate.path.clone(),
                    });
                    dispatched.push(entry.clone());

                    let locks = Arc::clone(&self.locks);
                    let store = Arc::clone(&self.store);
                    let replacer = Arc::clone(&self.replacer);
                    let results = Arc::clone(&results);
                    let config = self.config.clone();
                    running.spawn(async move {
                        let _permit = permit;
                        let (key, token) = locks.token(&entry.candidate.path);
                        let guard = Arc::clone(&token).lock_owned().await;

                        let fallback = entry.clone();
                        let result = tokio::task::spawn_blocking(move || {
                            run_transaction(entry, &store, replacer.as_ref(), &config)
                        })
                        .await
                        .unwrap_or_else(|e| {
                            error!(path = %fallback.candidate.path.display(), error = %e, "transaction task aborted");
                            TransactionResult::failed_untouched(
                                fallback,
                                format!("transaction aborted: {e}"),
                            )
                        });
                        // Recorded before the path token is released.
                        lock(&results).push(result.clone());
                        drop(guard);
                        locks.release(&key, token);
                        result
                    });
                }
                Some(joined) = running.join_next(), if !running.is_empty() => {
                    finished(joined, sink);
                }
            }
        }

        for entry in pending {
            record(
                &results,
                sink,
                TransactionResult::skipped(entry, "cancelled before start"),
            );
        }
        while let Some(joined) = running.join_next().await {
            finished(joined, sink);
        }

        let mut results = std::mem::take(&mut *lock(&results));
        let reported: HashSet<usize> = results.iter().map(|r| r.entry.index).collect();
        for entry in dispatched {
            if !reported.contains(&entry.index) {
                let result = TransactionResult::failed_untouched(entry, "transaction did not report");
                sink.emit(EngineEvent::TransactionFinished(result.clone()));
                results.push(result);
            }
        }
        results.sort_by_key(|r| r.entry.index);

        let count = |outcome| results.iter().filter(|r| r.outcome == outcome).count();
        let succeeded = count(TransactionOutcome::Success);
        let failed = count(TransactionOutcome::Failed);
        let rolled_back = count(TransactionOutcome::RolledBack);
        let skipped = count(TransactionOutcome::Skipped);
        info!(succeeded, failed, rolled_back, skipped, "run finished");
        sink.emit(EngineEvent::RunFinished {
            succeeded,
            failed,
            rolled_back,
            skipped,
        });
        Ok(results)
    }
}

fn lock(results: &Mutex<Vec<TransactionResult>>) -> MutexGuard<'_, Vec<TransactionResult>> {
    results.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record(results: &Mutex<Vec<TransactionResult>>, sink: &dyn EventSink, result: TransactionResult) {
    lock(results).push(result.clone());
    sink.emit(EngineEvent::TransactionFinished(result));
}

fn finished(joined: Result<TransactionResult, tokio::task::JoinError>, sink: &dyn EventSink) {
    match joined {
        Ok(result) => sink.emit(EngineEvent::TransactionFinished(result)),
        // Reported as "did not report" once the run drains.
        Err(e) => error!(error = %e, "transaction task failed"),
    }
}

fn describe(version: Option<VersionTag>) -> String {
    version.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

/// Whether `error` looks like another process holding the file open.
fn is_lock_error(error: &FileOpsError) -> bool {
    let FileOpsError::Io { source, .. } = error else {
        return false;
    };
    // ERROR_SHARING_VIOLATION and ERROR_LOCK_VIOLATION.
    if cfg!(windows) && matches!(source.raw_os_error(), Some(32 | 33)) {
        return true;
    }
    matches!(
        source.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::ResourceBusy
    )
}

/// Runs the replace step, retrying lock errors up to `config.lock_retries`
/// times.
fn replace_with_retry(
    replacer: &dyn FileReplacer,
    target: &Path,
    payload: &[u8],
    config: &ExecutorConfig,
) -> Result<(), FileOpsError> {
    let mut attempt = 0;
    loop {
        match replacer.replace(target, payload) {
            Err(e) if is_lock_error(&e) && attempt < config.lock_retries => {
                attempt += 1;
                warn!(
                    path = %target.display(),
                    attempt,
                    retries = config.lock_retries,
                    error = %e,
                    "target is locked, retrying"
                );
                std::thread::sleep(config.lock_retry_delay);
            }
            other => return other,
        }
    }
}

fn run_transaction(
    entry: UpdatePlanEntry,
    store: &BackupStore,
    replacer: &dyn FileReplacer,
    config: &ExecutorConfig,
) -> TransactionResult {
    let target = entry.candidate.path.clone();
    let (Some(expected), Some(wanted), Some(payload_ref)) =
        (entry.current, entry.target, entry.payload.clone())
    else {
        return TransactionResult::failed_untouched(
            entry,
            "plan entry has no known baseline, target or payload",
        );
    };

    let original = match fs::read(&target) {
        Ok(bytes) => bytes,
        Err(e) => {
            return TransactionResult::failed_untouched(
                entry,
                format!("failed to read {}: {e}", target.display()),
            );
        }
    };
    let found = dllup_pe_version::read_version_bytes(&original);
    if found != Some(expected) {
        warn!(path = %target.display(), %expected, found = %describe(found), "target changed since planning");
        return TransactionResult::failed_untouched(
            entry,
            format!(
                "concurrent modification detected: planned {expected}, found {}",
                describe(found)
            ),
        );
    }

    let payload = match payload_ref.load() {
        Ok(bytes) => bytes,
        Err(e) => {
            return TransactionResult::failed_untouched(
                entry,
                format!("failed to load payload {payload_ref}: {e}"),
            );
        }
    };
    let offered = dllup_pe_version::read_version_bytes(&payload);
    if offered != Some(wanted) {
        return TransactionResult::failed_untouched(
            entry,
            format!("payload {payload_ref} is {}, expected {wanted}", describe(offered)),
        );
    }

    let backup = match store.create(&entry.candidate, &original, expected) {
        Ok(record) => record,
        Err(e) => {
            warn!(path = %target.display(), error = %e, "backup failed, target left untouched");
            return TransactionResult::failed_untouched(entry, format!("backup failed: {e}"));
        }
    };

    let replaced = replace_with_retry(replacer, &target, &payload, config)
        .map_err(|e| e.to_string())
        .and_then(|()| {
            let now = dllup_pe_version::read_version(&target);
            if now == Some(wanted) {
                Ok(())
            } else {
                Err(format!("replaced file reads as {}, expected {wanted}", describe(now)))
            }
        });

    match replaced {
        Ok(()) => {
            info!(path = %target.display(), from = %expected, to = %wanted, "module updated");
            TransactionResult {
                entry,
                outcome: TransactionOutcome::Success,
                detail: Some(format!("{expected} -> {wanted}")),
                modified: true,
                backup_id: Some(backup.id),
                backup_blob: Some(backup.blob),
            }
        }
        Err(reason) => roll_back(entry, store, &backup, &original, reason),
    }
}

/// Puts the original back after a failed replace.
fn roll_back(
    entry: UpdatePlanEntry,
    store: &BackupStore,
    backup: &BackupRecord,
    original: &[u8],
    reason: String,
) -> TransactionResult {
    let target = entry.candidate.path.clone();
    let matches_original = || fs::read(&target).is_ok_and(|now| now == original);

    let (outcome, detail) = if matches_original() {
        debug!(path = %target.display(), "replace failed before touching the target");
        (
            TransactionOutcome::RolledBack,
            format!("update failed, original left in place: {reason}"),
        )
    } else {
        let restored = store.restore(backup);
        if matches_original() {
            warn!(path = %target.display(), %reason, "update failed, original restored");
            (
                TransactionOutcome::RolledBack,
                format!("update failed, original restored: {reason}"),
            )
        } else {
            let restore_error = restored.err().map_or_else(
                || "restored content does not match".to_string(),
                |e| e.to_string(),
            );
            error!(
                path = %target.display(),
                blob = %backup.blob.display(),
                %reason,
                %restore_error,
                "rollback failed"
            );
            (
                TransactionOutcome::Failed,
                format!(
                    "update failed ({reason}) and rollback failed ({restore_error}); original saved at {}",
                    backup.blob.display()
                ),
            )
        }
    };

    let modified = outcome == TransactionOutcome::Failed;
    TransactionResult {
        entry,
        outcome,
        detail: Some(detail),
        modified,
        backup_id: Some(backup.id.clone()),
        backup_blob: Some(backup.blob.clone()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use dllup_backup::BackupFilter;
    use dllup_model::{
        InstallationRoot, LauncherKind, ModuleCandidate, ModuleFamily, PayloadRef, UpdateAction,
    };
    use dllup_pe_version::fixture::synthesize_module;
    use tokio::sync::mpsc;

    use super::*;

    const OLD: VersionTag = VersionTag::new(3, 7, 0, 0);
    const NEW: VersionTag = VersionTag::new(3, 10, 5, 0);

    struct Fixture {
        _dir: tempfile::TempDir,
        games: PathBuf,
        store: Arc<BackupStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let games = dir.path().join("games");
            let store = Arc::new(BackupStore::open(dir.path().join("backups")).unwrap());
            Self {
                _dir: dir,
                games,
                store,
            }
        }

        /// Writes a DLSS module at `version` into game `name`.
        fn module(&self, name: &str, version: VersionTag) -> ModuleCandidate {
            let root = self.games.join(name);
            fs::create_dir_all(&root).unwrap();
            let path = root.join("nvngx_dlss.dll");
            fs::write(&path, synthesize_module(Some(version))).unwrap();
            ModuleCandidate::new(
                InstallationRoot::new(LauncherKind::Custom, root),
                path,
                ModuleFamily::Dlss,
            )
        }

        fn executor(&self) -> TransactionExecutor {
            TransactionExecutor::new(Arc::clone(&self.store), quick_retries())
        }
    }

    fn update(index: usize, candidate: ModuleCandidate, current: VersionTag, target: VersionTag) -> UpdatePlanEntry {
        UpdatePlanEntry {
            index,
            candidate,
            current: Some(current),
            target: Some(target),
            payload: Some(PayloadRef::Bytes(synthesize_module(Some(target)).into())),
            action: UpdateAction::Update,
        }
    }

    fn quick_retries() -> ExecutorConfig {
        ExecutorConfig {
            lock_retry_delay: Duration::from_millis(1),
            ..ExecutorConfig::default()
        }
    }

    fn version_of(path: &Path) -> Option<VersionTag> {
        dllup_pe_version::read_version(path)
    }

    /// Fails without touching the target.
    struct RefusingReplacer;

    impl FileReplacer for RefusingReplacer {
        fn replace(&self, target: &Path, _contents: &[u8]) -> Result<(), FileOpsError> {
            Err(FileOpsError::Io {
                path: target.to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "rename refused"),
            })
        }
    }

    /// Leaves a torn file behind, then fails.
    struct TearingReplacer;

    impl FileReplacer for TearingReplacer {
        fn replace(&self, target: &Path, contents: &[u8]) -> Result<(), FileOpsError> {
            fs::write(target, &contents[..contents.len() / 2]).unwrap();
            Err(FileOpsError::InvalidPath(target.to_path_buf()))
        }
    }

    /// Reports success but writes a module with the wrong version.
    struct WrongVersionReplacer;

    impl FileReplacer for WrongVersionReplacer {
        fn replace(&self, target: &Path, _contents: &[u8]) -> Result<(), FileOpsError> {
            fs::write(target, synthesize_module(Some(VersionTag::new(9, 9, 9, 9)))).unwrap();
            Ok(())
        }
    }

    #[tokio::test]
    async fn update_backs_up_then_replaces() {
        let fx = Fixture::new();
        let candidate = fx.module("Alpha", OLD);
        let original = fs::read(&candidate.path).unwrap();

        let results = fx
            .executor()
            .execute(vec![update(0, candidate.clone(), OLD, NEW)], &dllup_model::NullSink)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.outcome, TransactionOutcome::Success);
        assert!(result.modified);
        assert_eq!(version_of(&candidate.path), Some(NEW));

        let records = fx.store.list(&BackupFilter::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, OLD);
        assert_eq!(Some(&records[0].id), result.backup_id.as_ref());
        assert_eq!(fs::read(&records[0].blob).unwrap(), original);
    }

    #[tokio::test]
    async fn skipped_entries_never_write() {
        let fx = Fixture::new();
        let excluded = fx.module("Excluded", OLD);
        let corrupt = fx.module("Corrupt", OLD);
        fs::write(&corrupt.path, b"MZ broken").unwrap();
        let before: Vec<Vec<u8>> = [&excluded, &corrupt]
            .iter()
            .map(|c| fs::read(&c.path).unwrap())
            .collect();

        let mut a = update(0, excluded.clone(), OLD, NEW);
        a.action = UpdateAction::SkipExcluded {
            reason: "anti-cheat".into(),
        };
        let mut b = update(1, corrupt.clone(), OLD, NEW);
        b.current = None;
        b.action = UpdateAction::SkipUnknownVersion {
            reason: "installed version could not be read".into(),
        };

        let results = fx.executor().execute(vec![a, b], &dllup_model::NullSink).await.unwrap();
        assert!(results.iter().all(|r| r.outcome == TransactionOutcome::Skipped && !r.modified));
        assert_eq!(results[0].detail.as_deref(), Some("anti-cheat"));
        assert_eq!(fs::read(&excluded.path).unwrap(), before[0]);
        assert_eq!(fs::read(&corrupt.path).unwrap(), before[1]);
        assert!(fx.store.list(&BackupFilter::default()).is_empty());
    }

    #[tokio::test]
    async fn unknown_baseline_is_never_written_even_if_marked_update() {
        let fx = Fixture::new();
        let candidate = fx.module("Alpha", OLD);
        let before = fs::read(&candidate.path).unwrap();
        let mut entry = update(0, candidate.clone(), OLD, NEW);
        entry.current = None;

        let results = fx.executor().execute(vec![entry], &dllup_model::NullSink).await.unwrap();
        assert_eq!(results[0].outcome, TransactionOutcome::Failed);
        assert!(!results[0].modified);
        assert_eq!(fs::read(&candidate.path).unwrap(), before);
        assert!(fx.store.list(&BackupFilter::default()).is_empty());
    }

    #[tokio::test]
    async fn concurrent_modification_aborts_entry() {
        let fx = Fixture::new();
        let candidate = fx.module("Alpha", OLD);
        let entry = update(0, candidate.clone(), OLD, NEW);
        // Someone else patched the game after planning.
        fs::write(&candidate.path, synthesize_module(Some(VersionTag::new(3, 8, 0, 0)))).unwrap();

        let results = fx.executor().execute(vec![entry], &dllup_model::NullSink).await.unwrap();
        assert_eq!(results[0].outcome, TransactionOutcome::Failed);
        assert!(results[0].detail.as_deref().unwrap().contains("concurrent modification"));
        assert_eq!(version_of(&candidate.path), Some(VersionTag::new(3, 8, 0, 0)));
        assert!(fx.store.list(&BackupFilter::default()).is_empty());
    }

    #[tokio::test]
    async fn payload_with_wrong_version_is_rejected() {
        let fx = Fixture::new();
        let candidate = fx.module("Alpha", OLD);
        let mut entry = update(0, candidate.clone(), OLD, NEW);
        entry.payload = Some(PayloadRef::Bytes(synthesize_module(Some(OLD)).into()));

        let results = fx.executor().execute(vec![entry], &dllup_model::NullSink).await.unwrap();
        assert_eq!(results[0].outcome, TransactionOutcome::Failed);
        assert_eq!(version_of(&candidate.path), Some(OLD));
        assert!(fx.store.list(&BackupFilter::default()).is_empty());
    }

    #[tokio::test]
    async fn refused_rename_rolls_back() {
        let fx = Fixture::new();
        let candidate = fx.module("Alpha", OLD);
        let before = fs::read(&candidate.path).unwrap();

        let results = fx
            .executor()
            .with_replacer(Arc::new(RefusingReplacer))
            .execute(vec![update(0, candidate.clone(), OLD, NEW)], &dllup_model::NullSink)
            .await
            .unwrap();

        assert_eq!(results[0].outcome, TransactionOutcome::RolledBack);
        assert!(!results[0].modified);
        assert_eq!(fs::read(&candidate.path).unwrap(), before);
        // The backup taken before the attempt is kept.
        assert_eq!(fx.store.list(&BackupFilter::default()).len(), 1);
    }

    #[tokio::test]
    async fn torn_write_is_restored_from_backup() {
        let fx = Fixture::new();
        let candidate = fx.module("Alpha", OLD);
        let before = fs::read(&candidate.path).unwrap();

        let results = fx
            .executor()
            .with_replacer(Arc::new(TearingReplacer))
            .execute(vec![update(0, candidate.clone(), OLD, NEW)], &dllup_model::NullSink)
            .await
            .unwrap();

        assert_eq!(results[0].outcome, TransactionOutcome::RolledBack);
        assert_eq!(fs::read(&candidate.path).unwrap(), before);
        let record = fx.store.get(results[0].backup_id.as_ref().unwrap()).unwrap();
        assert!(record.restored_at.is_some());
    }

    #[tokio::test]
    async fn wrong_version_after_replace_is_rolled_back() {
        let fx = Fixture::new();
        let candidate = fx.module("Alpha", OLD);
        let before = fs::read(&candidate.path).unwrap();

        let results = fx
            .executor()
            .with_replacer(Arc::new(WrongVersionReplacer))
            .execute(vec![update(0, candidate.clone(), OLD, NEW)], &dllup_model::NullSink)
            .await
            .unwrap();

        assert_eq!(results[0].outcome, TransactionOutcome::RolledBack);
        assert!(results[0].detail.as_deref().unwrap().contains("9.9.9.9"));
        assert_eq!(fs::read(&candidate.path).unwrap(), before);
    }

    #[tokio::test]
    async fn unwritable_backup_store_fails_before_any_write() {
        let fx = Fixture::new();
        let candidate = fx.module("Alpha", OLD);
        let before = fs::read(&candidate.path).unwrap();
        let root = fx.store.root().to_path_buf();
        fs::remove_dir_all(&root).unwrap();
        fs::write(&root, b"not a directory").unwrap();

        let err = fx
            .executor()
            .execute(vec![update(0, candidate.clone(), OLD, NEW)], &dllup_model::NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Precondition(_)));
        assert_eq!(fs::read(&candidate.path).unwrap(), before);
    }

    #[test]
    fn preflight_ignores_plans_without_updates() {
        let fx = Fixture::new();
        let candidate = fx.module("Alpha", NEW);
        let mut entry = update(0, candidate, NEW, NEW);
        entry.action = UpdateAction::SkipUpToDate;
        let root = fx.store.root().to_path_buf();
        fs::remove_dir_all(&root).unwrap();
        fs::write(&root, b"not a directory").unwrap();

        assert!(fx.executor().preflight(&[entry]).is_ok());
    }

    #[tokio::test]
    async fn results_cover_every_entry_in_order() {
        let fx = Fixture::new();
        let mut plan = Vec::new();
        for (i, name) in ["A", "B", "C", "D", "E"].iter().enumerate() {
            let mut entry = update(i, fx.module(name, OLD), OLD, NEW);
            if i % 2 == 1 {
                entry.action = UpdateAction::SkipUpToDate;
            }
            plan.push(entry);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let results = fx.executor().execute(plan, &tx).await.unwrap();
        let indices: Vec<usize> = results.iter().map(|r| r.entry.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);

        drop(tx);
        let mut finished = Vec::new();
        let mut summary = None;
        while let Some(event) = rx.recv().await {
            match event {
                EngineEvent::TransactionFinished(r) => finished.push(r.entry.index),
                EngineEvent::RunFinished {
                    succeeded,
                    skipped,
                    ..
                } => summary = Some((succeeded, skipped)),
                _ => {}
            }
        }
        finished.sort_unstable();
        assert_eq!(finished, vec![0, 1, 2, 3, 4]);
        assert_eq!(summary, Some((3, 2)));
    }

    /// Writes the full payload to a temp file, then stops before the rename.
    #[derive(Default)]
    struct InterruptedRenameReplacer {
        temp: Mutex<Option<PathBuf>>,
    }

    impl FileReplacer for InterruptedRenameReplacer {
        fn replace(&self, target: &Path, contents: &[u8]) -> Result<(), FileOpsError> {
            let temp = dllup_file_ops::temp_path_for(target)?;
            fs::write(&temp, contents).unwrap();
            *self.temp.lock().unwrap() = Some(temp);
            Err(FileOpsError::Io {
                path: target.to_path_buf(),
                source: io::Error::new(io::ErrorKind::Interrupted, "stopped before rename"),
            })
        }
    }

    #[tokio::test]
    async fn interruption_before_rename_leaves_target_intact() {
        let fx = Fixture::new();
        let candidate = fx.module("Alpha", OLD);
        let before = fs::read(&candidate.path).unwrap();
        let replacer = Arc::new(InterruptedRenameReplacer::default());

        let results = fx
            .executor()
            .with_replacer(replacer.clone())
            .execute(vec![update(0, candidate.clone(), OLD, NEW)], &dllup_model::NullSink)
            .await
            .unwrap();

        assert_eq!(results[0].outcome, TransactionOutcome::RolledBack);
        assert!(!results[0].modified);
        assert_eq!(fs::read(&candidate.path).unwrap(), before);

        // The new content was fully staged, so only the rename was missed.
        let temp = replacer.temp.lock().unwrap().clone().unwrap();
        assert_eq!(dllup_pe_version::read_version(&temp), Some(NEW));
        // Nothing to restore.
        let record = fx.store.get(results[0].backup_id.as_ref().unwrap()).unwrap();
        assert!(record.restored_at.is_none());
    }

    /// Fails with `kind` for the first `failures` calls, then replaces.
    struct FlakyReplacer {
        kind: io::ErrorKind,
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakyReplacer {
        fn new(kind: io::ErrorKind, failures: usize) -> Arc<Self> {
            Arc::new(Self {
                kind,
                failures,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl FileReplacer for FlakyReplacer {
        fn replace(&self, target: &Path, contents: &[u8]) -> Result<(), FileOpsError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(FileOpsError::Io {
                    path: target.to_path_buf(),
                    source: io::Error::new(self.kind, "held by another process"),
                });
            }
            AtomicReplacer.replace(target, contents)
        }
    }

    #[tokio::test]
    async fn locked_target_is_retried_until_free() {
        let fx = Fixture::new();
        let candidate = fx.module("Alpha", OLD);
        let replacer = FlakyReplacer::new(io::ErrorKind::PermissionDenied, 2);

        let results = fx
            .executor()
            .with_replacer(replacer.clone())
            .execute(vec![update(0, candidate.clone(), OLD, NEW)], &dllup_model::NullSink)
            .await
            .unwrap();

        assert_eq!(results[0].outcome, TransactionOutcome::Success);
        assert_eq!(replacer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(version_of(&candidate.path), Some(NEW));
    }

    #[tokio::test]
    async fn lock_outlasting_retries_rolls_back() {
        let fx = Fixture::new();
        let candidate = fx.module("Alpha", OLD);
        let before = fs::read(&candidate.path).unwrap();
        let replacer = FlakyReplacer::new(io::ErrorKind::ResourceBusy, 10);
        let executor = TransactionExecutor::new(
            Arc::clone(&fx.store),
            ExecutorConfig {
                lock_retries: 2,
                ..quick_retries()
            },
        )
        .with_replacer(replacer.clone());

        let results = executor
            .execute(vec![update(0, candidate.clone(), OLD, NEW)], &dllup_model::NullSink)
            .await
            .unwrap();

        assert_eq!(results[0].outcome, TransactionOutcome::RolledBack);
        assert_eq!(replacer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(fs::read(&candidate.path).unwrap(), before);
    }

    #[tokio::test]
    async fn other_replace_errors_are_not_retried() {
        let fx = Fixture::new();
        let candidate = fx.module("Alpha", OLD);
        let replacer = FlakyReplacer::new(io::ErrorKind::InvalidData, 1);

        let results = fx
            .executor()
            .with_replacer(replacer.clone())
            .execute(vec![update(0, candidate.clone(), OLD, NEW)], &dllup_model::NullSink)
            .await
            .unwrap();

        assert_eq!(results[0].outcome, TransactionOutcome::RolledBack);
        assert_eq!(replacer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(version_of(&candidate.path), Some(OLD));
    }

    #[test]
    fn path_tokens_are_dropped_when_released() {
        let locks = PathLocks::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nvngx_dlss.dll");

        let (key, first) = locks.token(&path);
        let (_, second) = locks.token(&path);
        assert_eq!(locks.tracked(), 1);
        locks.release(&key, first);
        assert_eq!(locks.tracked(), 1);
        locks.release(&key, second);
        assert_eq!(locks.tracked(), 0);
    }

    /// Records how many replaces overlap on each path.
    #[derive(Default)]
    struct OverlapRecorder {
        active: Mutex<HashMap<PathBuf, usize>>,
        worst: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FileReplacer for OverlapRecorder {
        fn replace(&self, target: &Path, contents: &[u8]) -> Result<(), FileOpsError> {
            let now = {
                let mut active = self.active.lock().unwrap();
                let n = active.entry(target.to_path_buf()).or_default();
                *n += 1;
                *n
            };
            self.worst.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            let result = AtomicReplacer.replace(target, contents);
            *self.active.lock().unwrap().get_mut(target).unwrap() -= 1;
            result
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_path_entries_never_overlap() {
        let fx = Fixture::new();
        let shared = fx.module("Shared", NEW);
        let other = fx.module("Other", NEW);

        // Rewriting a module with identical content keeps every entry
        // valid, so all of them reach the replace step.
        let mut plan = Vec::new();
        for i in 0..8 {
            let candidate = if i % 4 == 3 { other.clone() } else { shared.clone() };
            plan.push(update(i, candidate, NEW, NEW));
        }

        let recorder = Arc::new(OverlapRecorder::default());
        let executor = TransactionExecutor::new(
            Arc::clone(&fx.store),
            ExecutorConfig {
                workers: 8,
                check_space: false,
                ..ExecutorConfig::default()
            },
        )
        .with_replacer(recorder.clone());

        let results = executor.execute(plan, &dllup_model::NullSink).await.unwrap();
        assert!(results.iter().all(|r| r.outcome == TransactionOutcome::Success));
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 8);
        assert_eq!(recorder.worst.load(Ordering::SeqCst), 1);
        // Tokens are dropped once nobody waits on them.
        assert_eq!(executor.locks.tracked(), 0);
    }

    #[tokio::test]
    async fn cancelled_run_dispatches_nothing() {
        let fx = Fixture::new();
        let candidate = fx.module("Alpha", OLD);
        let before = fs::read(&candidate.path).unwrap();
        let executor = fx.executor();
        executor.cancel_token().cancel();

        let results = executor
            .execute(vec![update(0, candidate.clone(), OLD, NEW)], &dllup_model::NullSink)
            .await
            .unwrap();
        assert_eq!(results[0].outcome, TransactionOutcome::Skipped);
        assert_eq!(results[0].detail.as_deref(), Some("cancelled before start"));
        assert_eq!(fs::read(&candidate.path).unwrap(), before);
    }

    /// Cancels the run from inside the first replace.
    struct CancellingReplacer(CancellationToken);

    impl FileReplacer for CancellingReplacer {
        fn replace(&self, target: &Path, contents: &[u8]) -> Result<(), FileOpsError> {
            self.0.cancel();
            AtomicReplacer.replace(target, contents)
        }
    }

    #[tokio::test]
    async fn in_flight_transaction_finishes_after_cancel() {
        let fx = Fixture::new();
        let plan = vec![
            update(0, fx.module("A", OLD), OLD, NEW),
            update(1, fx.module("B", OLD), OLD, NEW),
            update(2, fx.module("C", OLD), OLD, NEW),
        ];
        let executor = TransactionExecutor::new(
            Arc::clone(&fx.store),
            ExecutorConfig {
                workers: 1,
                ..ExecutorConfig::default()
            },
        );
        let token = executor.cancel_token();
        let executor = executor.with_replacer(Arc::new(CancellingReplacer(token)));

        let results = executor.execute(plan, &dllup_model::NullSink).await.unwrap();
        let outcomes: Vec<_> = results.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                TransactionOutcome::Success,
                TransactionOutcome::Skipped,
                TransactionOutcome::Skipped
            ]
        );
        assert_eq!(version_of(&results[1].entry.candidate.path), Some(OLD));
    }
}
