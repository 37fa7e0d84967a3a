use std::sync::Arc;

use dllup_discovery::{DEFAULT_MAX_DEPTH, ModulePatterns, PathDiscoverer, find_modules};
use dllup_exclusion::ExclusionFilter;
use dllup_model::{EngineEvent, EventSink, InstallationRoot, UpdatePlanEntry};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::catalog::ReplacementCatalog;
use crate::planner::{Preferences, ScannedModule, UpdatePlanner};

/// Roots buffered between discovery and the walkers.
const ROOT_QUEUE: usize = 64;

/// Everything a scan needs besides the discoverer.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub filter: ExclusionFilter,
    pub patterns: ModulePatterns,
    pub catalog: ReplacementCatalog,
    pub preferences: Preferences,
    pub max_depth: usize,
    /// Roots walked at the same time.
    pub concurrency: usize,
}

impl ScanContext {
    pub fn new(filter: ExclusionFilter, catalog: ReplacementCatalog) -> Self {
        Self {
            filter,
            patterns: ModulePatterns::default(),
            catalog,
            preferences: Preferences::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            concurrency: 4,
        }
    }
}

/// Discovers roots, walks them for modules and plans every module found.
///
/// Discovery runs on a blocking thread and feeds roots as they are found.
/// Each root is walked on its own blocking task, at most
/// `ctx.concurrency` at a time. Modules under excluded roots are listed
/// but their versions are never read. Nothing is cached between calls.
pub async fn scan(
    discoverer: &PathDiscoverer,
    ctx: &ScanContext,
    sink: &dyn EventSink,
) -> Vec<UpdatePlanEntry> {
    sink.emit(EngineEvent::ScanStarted);

    let (tx, mut rx) = mpsc::channel::<InstallationRoot>(ROOT_QUEUE);
    let producer_discoverer = discoverer.clone();
    let producer = tokio::task::spawn_blocking(move || {
        for root in producer_discoverer.roots() {
            if tx.blocking_send(root).is_err() {
                break;
            }
        }
    });

    let patterns = Arc::new(ctx.patterns.clone());
    let limit = Arc::new(Semaphore::new(ctx.concurrency.max(1)));
    let mut walks = JoinSet::new();
    let mut roots = 0usize;

    while let Some(root) = rx.recv().await {
        roots += 1;
        let verdict = ctx.filter.evaluate(&root);
        sink.emit(EngineEvent::RootDiscovered {
            root: root.clone(),
            eligible: verdict.eligible,
        });
        let excluded = (!verdict.eligible)
            .then(|| verdict.reason.unwrap_or_else(|| "excluded".to_string()));

        let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
            break;
        };
        let patterns = Arc::clone(&patterns);
        let max_depth = ctx.max_depth;
        walks.spawn_blocking(move || {
            let _permit = permit;
            scan_root(&root, &patterns, max_depth, excluded)
        });
    }

    if let Err(e) = producer.await {
        warn!(error = %e, "discovery task failed");
    }

    let mut modules = Vec::new();
    while let Some(joined) = walks.join_next().await {
        match joined {
            Ok(found) => {
                for module in &found {
                    sink.emit(EngineEvent::ModuleFound {
                        candidate: module.candidate.clone(),
                    });
                }
                modules.extend(found);
            }
            Err(e) => warn!(error = %e, "root walk failed"),
        }
    }

    let plan = UpdatePlanner::new(&ctx.catalog, &ctx.preferences).plan(modules);
    let updates = plan.iter().filter(|e| e.action.is_update()).count();
    info!(roots, modules = plan.len(), updates, "scan complete");
    sink.emit(EngineEvent::PlanReady {
        total: plan.len(),
        updates,
    });
    plan
}

fn scan_root(
    root: &InstallationRoot,
    patterns: &ModulePatterns,
    max_depth: usize,
    excluded: Option<String>,
) -> Vec<ScannedModule> {
    let candidates = find_modules(root, patterns, max_depth);
    debug!(root = %root.path.display(), found = candidates.len(), "root walked");
    candidates
        .into_iter()
        .map(|candidate| {
            let current = if excluded.is_some() {
                None
            } else {
                dllup_pe_version::read_version(&candidate.path)
            };
            ScannedModule {
                candidate,
                current,
                excluded: excluded.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use dllup_discovery::{DiscoveryEnv, Launcher};
    use dllup_exclusion::{ExclusionEntry, ExclusionTable, UserOverrides};
    use dllup_model::{ModuleFamily, PayloadRef, UpdateAction, VersionTag};
    use dllup_pe_version::fixture::synthesize_module;

    use super::*;
    use crate::catalog::CatalogEntry;

    fn discoverer(folders: &[&Path]) -> PathDiscoverer {
        let env = DiscoveryEnv {
            custom_folders: folders.iter().map(|p| p.to_path_buf()).collect(),
            ..Default::default()
        };
        PathDiscoverer::with_launchers(env, vec![Launcher::Custom])
    }

    fn context(table: ExclusionTable) -> ScanContext {
        let mut catalog = ReplacementCatalog::new();
        let payload = synthesize_module(Some(VersionTag::new(3, 10, 5, 0)));
        catalog.insert_family(
            ModuleFamily::Dlss,
            CatalogEntry::new(VersionTag::new(3, 10, 5, 0), PayloadRef::Bytes(payload.into())),
        );
        ScanContext::new(ExclusionFilter::new(table, &UserOverrides::new()), catalog)
    }

    fn game(parent: &Path, name: &str, module: Vec<u8>) -> std::path::PathBuf {
        let root = parent.join(name);
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::write(root.join("bin/nvngx_dlss.dll"), module).unwrap();
        root
    }

    #[tokio::test]
    async fn scan_plans_every_root() {
        let dir = tempfile::tempdir().unwrap();
        let old = synthesize_module(Some(VersionTag::new(3, 7, 0, 0)));
        let a = game(dir.path(), "Alpha", old.clone());
        let b = game(dir.path(), "Bravo", old);
        let c = game(dir.path(), "Corrupt", b"MZ not really a module".to_vec());

        let table = ExclusionTable::from_entries([ExclusionEntry::new("Bravo", Some("anti-cheat"))]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let plan = scan(&discoverer(&[&a, &b, &c]), &context(table), &tx).await;

        assert_eq!(plan.len(), 3);
        assert!(plan.iter().enumerate().all(|(i, e)| e.index == i));
        assert_eq!(plan[0].candidate.root.display_name, "Alpha");
        assert_eq!(plan[0].action, UpdateAction::Update);
        assert_eq!(plan[0].current, Some(VersionTag::new(3, 7, 0, 0)));
        assert!(matches!(plan[1].action, UpdateAction::SkipExcluded { .. }));
        assert_eq!(plan[1].current, None);
        assert!(matches!(plan[2].action, UpdateAction::SkipUnknownVersion { .. }));

        drop(tx);
        let mut discovered = 0;
        let mut found = 0;
        let mut ready = None;
        while let Some(event) = rx.recv().await {
            match event {
                EngineEvent::RootDiscovered { .. } => discovered += 1,
                EngineEvent::ModuleFound { .. } => found += 1,
                EngineEvent::PlanReady { total, updates } => ready = Some((total, updates)),
                _ => {}
            }
        }
        assert_eq!(discovered, 3);
        assert_eq!(found, 3);
        assert_eq!(ready, Some((3, 1)));
    }

    #[tokio::test]
    async fn scans_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let root = game(
            dir.path(),
            "Alpha",
            synthesize_module(Some(VersionTag::new(3, 7, 0, 0))),
        );
        let discoverer = discoverer(&[&root]);
        let ctx = context(ExclusionTable::default());

        let first = scan(&discoverer, &ctx, &dllup_model::NullSink).await;
        assert_eq!(first[0].action, UpdateAction::Update);

        fs::write(
            root.join("bin/nvngx_dlss.dll"),
            synthesize_module(Some(VersionTag::new(3, 10, 5, 0))),
        )
        .unwrap();
        let second = scan(&discoverer, &ctx, &dllup_model::NullSink).await;
        assert_eq!(second[0].action, UpdateAction::SkipUpToDate);
    }

    #[tokio::test]
    async fn empty_discovery_gives_empty_plan() {
        let ctx = context(ExclusionTable::default());
        let plan = scan(&discoverer(&[]), &ctx, &dllup_model::NullSink).await;
        assert!(plan.is_empty());
    }
}
