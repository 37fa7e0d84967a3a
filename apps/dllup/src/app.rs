//! Wires configuration into the engine and runs one command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use dllup_backup::{BackupFilter, BackupRecord, BackupStore, PruneOptions};
use dllup_discovery::{DiscoveryEnv, ModulePatterns, PathDiscoverer};
use dllup_engine::{
    ExecutorConfig, Preferences, ReplacementCatalog, ScanContext, TransactionExecutor, scan,
};
use dllup_exclusion::{ExclusionFilter, ExclusionTable};
use dllup_model::{
    EngineEvent, NullSink, TransactionOutcome, TransactionResult, UpdatePlanEntry,
};
use tokio::sync::mpsc;

use crate::cli::Command;
use crate::config::Config;

/// Runs `command` to completion.
pub async fn run(command: Command, mut config: Config, config_path: &Path) -> anyhow::Result<()> {
    match command {
        Command::Scan { all } => {
            let plan = scan_plan(&config).await;
            print_plan(&plan, all);
            Ok(())
        }
        Command::Update => update(&config).await,
        Command::Backups { game, family } => {
            let store = open_store(&config)?;
            let records = store.list(&BackupFilter {
                game,
                family,
                target: None,
            });
            if records.is_empty() {
                println!("no backups");
            }
            for record in &records {
                print_record(record);
            }
            Ok(())
        }
        Command::Restore { id, path } => {
            let store = open_store(&config)?;
            let record = match (id, path) {
                (Some(id), _) => store
                    .get(&id)
                    .with_context(|| format!("no backup with id {id}"))?,
                (None, Some(path)) => store
                    .latest_for(&path)
                    .with_context(|| format!("no backup of {}", path.display()))?,
                (None, None) => anyhow::bail!("give a backup id or --path"),
            };
            let restored = store.restore(&record)?;
            println!(
                "restored {} {} to {}",
                restored.file_name,
                restored.version,
                restored.target_path().display()
            );
            Ok(())
        }
        Command::Prune {
            older_than_days,
            keep,
        } => {
            let age = chrono::TimeDelta::try_days(older_than_days)
                .with_context(|| format!("{older_than_days} days is out of range"))?;
            let store = open_store(&config)?;
            let removed = store.prune(&PruneOptions {
                cutoff: Utc::now() - age,
                keep_per_target: keep,
            })?;
            println!("removed {} backup(s)", removed.len());
            Ok(())
        }
        Command::Exclude { pattern } => {
            config.overrides.exclude(pattern.clone());
            config.save_to(config_path)?;
            println!("excluded '{pattern}'");
            Ok(())
        }
        Command::Include { pattern } => {
            config.overrides.include(pattern.clone());
            config.save_to(config_path)?;
            println!("included '{pattern}'");
            Ok(())
        }
        Command::Forget { pattern } => {
            if config.overrides.clear(&pattern) {
                config.save_to(config_path)?;
                println!("forgot '{pattern}'");
            } else {
                println!("no override for '{pattern}'");
            }
            Ok(())
        }
    }
}

async fn update(config: &Config) -> anyhow::Result<()> {
    let plan = scan_plan(config).await;
    let updates = plan.iter().filter(|e| e.action.is_update()).count();
    if updates == 0 {
        println!("everything is up to date ({} module(s) checked)", plan.len());
        return Ok(());
    }

    let store = Arc::new(open_store(config)?);
    let executor = TransactionExecutor::new(store, executor_config(config));

    let cancel = executor.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing updates already running");
            cancel.cancel();
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let EngineEvent::TransactionFinished(result) = event
                && result.entry.action.is_update()
            {
                print_result(&result);
            }
        }
    });

    let outcome = executor.execute(plan, &tx).await;
    drop(tx);
    interrupt.abort();
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "progress printer failed");
    }
    let results = outcome?;

    let count = |o| results.iter().filter(|r| r.outcome == o).count();
    println!(
        "{} updated, {} rolled back, {} failed, {} skipped",
        count(TransactionOutcome::Success),
        count(TransactionOutcome::RolledBack),
        count(TransactionOutcome::Failed),
        count(TransactionOutcome::Skipped),
    );
    let failed = count(TransactionOutcome::Failed);
    if failed > 0 {
        anyhow::bail!("{failed} update(s) failed; see the details above");
    }
    Ok(())
}

fn executor_config(config: &Config) -> ExecutorConfig {
    ExecutorConfig {
        workers: config.workers,
        check_space: config.check_space,
        lock_retries: config.lock_retries,
        lock_retry_delay: Duration::from_millis(config.lock_retry_delay_ms),
    }
}

async fn scan_plan(config: &Config) -> Vec<UpdatePlanEntry> {
    let ctx = scan_context(config);
    scan(&discoverer(config), &ctx, &NullSink).await
}

fn open_store(config: &Config) -> anyhow::Result<BackupStore> {
    BackupStore::open(&config.backup_dir)
        .with_context(|| format!("cannot open backups at {}", config.backup_dir.display()))
}

fn discoverer(config: &Config) -> PathDiscoverer {
    let mut env = DiscoveryEnv::detect();
    env.custom_folders.extend(config.custom_folders.iter().cloned());
    for (kind, dirs) in config.launcher_overrides() {
        for dir in dirs {
            env.add_library_override(kind, dir.clone());
        }
    }
    PathDiscoverer::new(env)
}

fn patterns(config: &Config) -> ModulePatterns {
    let mut patterns = ModulePatterns::default();
    for (file_name, family) in &config.extra_patterns {
        patterns.insert(file_name, *family);
    }
    patterns
}

fn exclusion_filter(config: &Config) -> ExclusionFilter {
    let table = match &config.exclusion_file {
        Some(path) => ExclusionTable::load(path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "exclusion table unusable, only user overrides apply");
            ExclusionTable::default()
        }),
        None => ExclusionTable::default(),
    };
    ExclusionFilter::new(table, &config.overrides)
}

fn catalog(dir: Option<&PathBuf>, patterns: &ModulePatterns) -> ReplacementCatalog {
    let Some(dir) = dir else {
        tracing::warn!("no payload_dir configured, nothing can be updated");
        return ReplacementCatalog::new();
    };
    ReplacementCatalog::from_payload_dir(dir, patterns).unwrap_or_else(|e| {
        tracing::warn!(dir = %dir.display(), error = %e, "cannot read payload directory");
        ReplacementCatalog::new()
    })
}

fn scan_context(config: &Config) -> ScanContext {
    let patterns = patterns(config);
    let catalog = catalog(config.payload_dir.as_ref(), &patterns);
    let mut ctx = ScanContext::new(exclusion_filter(config), catalog);
    ctx.patterns = patterns;
    ctx.preferences = Preferences::only(config.enabled_families.iter().copied());
    ctx.max_depth = config.max_depth;
    ctx.concurrency = config.workers.max(1);
    ctx
}

fn version_or_unknown(version: Option<dllup_model::VersionTag>) -> String {
    version.map_or_else(|| "?".to_string(), |v| v.to_string())
}

fn print_plan(plan: &[UpdatePlanEntry], all: bool) {
    let mut shown = 0;
    for entry in plan.iter().filter(|e| all || e.action.is_update()) {
        shown += 1;
        println!(
            "{:>4}  {:<28} {:<24} {:>14} -> {:<14} {}",
            entry.index,
            entry.candidate.root.display_name,
            entry.candidate.file_name(),
            version_or_unknown(entry.current),
            version_or_unknown(entry.target),
            entry.action,
        );
    }
    let updates = plan.iter().filter(|e| e.action.is_update()).count();
    if shown == 0 && !plan.is_empty() {
        println!("everything is up to date");
    }
    println!("{} module(s) found, {updates} to update", plan.len());
}

fn print_result(result: &TransactionResult) {
    let entry = &result.entry;
    println!(
        "[{}] {} {}: {}",
        result.outcome,
        entry.candidate.root.display_name,
        entry.candidate.file_name(),
        result.detail.as_deref().unwrap_or(""),
    );
}

fn print_record(record: &BackupRecord) {
    let restored = record
        .restored_at
        .map(|t| format!(" (restored {})", t.format("%Y-%m-%d %H:%M")))
        .unwrap_or_default();
    println!(
        "{}  {}  {:<28} {:<24} {}{}",
        record.id,
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.game,
        record.file_name,
        record.version,
        restored,
    );
}

#[cfg(test)]
mod tests {
    use std::fs;

    use dllup_model::ModuleFamily;

    use super::*;

    #[test]
    fn extra_patterns_extend_defaults() {
        let mut config = Config::default();
        config
            .extra_patterns
            .insert("FFX_FSR3.dll".into(), ModuleFamily::Fsr);
        let patterns = patterns(&config);
        assert_eq!(patterns.family_for("ffx_fsr3.dll"), Some(ModuleFamily::Fsr));
        assert_eq!(patterns.family_for("nvngx_dlss.dll"), Some(ModuleFamily::Dlss));
    }

    #[test]
    fn broken_exclusion_file_keeps_user_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let table = tmp.path().join("exclusions.json");
        fs::write(&table, "not json").unwrap();

        let mut config = Config {
            exclusion_file: Some(table),
            ..Config::default()
        };
        config.overrides.exclude("Valorant");
        let filter = exclusion_filter(&config);

        let root = dllup_model::InstallationRoot::new(dllup_model::LauncherKind::Custom, "/g/Valorant");
        assert!(!filter.evaluate(&root).eligible);
        let other = dllup_model::InstallationRoot::new(dllup_model::LauncherKind::Custom, "/g/Hades");
        assert!(filter.evaluate(&other).eligible);
    }

    #[test]
    fn retry_settings_reach_the_executor() {
        let config = Config {
            lock_retries: 5,
            lock_retry_delay_ms: 250,
            ..Config::default()
        };
        let executor = executor_config(&config);
        assert_eq!(executor.lock_retries, 5);
        assert_eq!(executor.lock_retry_delay, Duration::from_millis(250));
        assert_eq!(executor.workers, config.workers);
    }

    #[test]
    fn missing_payload_dir_gives_empty_catalog() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("payloads");
        assert!(catalog(Some(&missing), &ModulePatterns::default()).is_empty());
        assert!(catalog(None, &ModulePatterns::default()).is_empty());
    }

    #[tokio::test]
    async fn override_commands_persist() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        let config = Config::load_from(&path).unwrap();

        run(Command::Exclude { pattern: "Valorant".into() }, config, &path)
            .await
            .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.overrides.excludes(), ["Valorant".to_string()]);

        run(Command::Forget { pattern: "Valorant".into() }, config, &path)
            .await
            .unwrap();
        assert!(Config::load_from(&path).unwrap().overrides.is_empty());
    }
}
