use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use dllup_model::InstallationRoot;
use tracing::debug;

use crate::env::DiscoveryEnv;
use crate::launcher::Launcher;

/// Enumerates installation roots across a set of launchers.
#[derive(Debug, Clone)]
pub struct PathDiscoverer {
    env: DiscoveryEnv,
    launchers: Vec<Launcher>,
}

impl PathDiscoverer {
    /// Creates a discoverer running every launcher strategy.
    pub fn new(env: DiscoveryEnv) -> Self {
        Self::with_launchers(env, Launcher::all().to_vec())
    }

    /// Creates a discoverer running only `launchers`.
    pub fn with_launchers(env: DiscoveryEnv, launchers: Vec<Launcher>) -> Self {
        Self { env, launchers }
    }

    pub fn env(&self) -> &DiscoveryEnv {
        &self.env
    }

    /// Returns a lazy iterator over the roots of every launcher.
    ///
    /// A launcher's strategy only runs once the roots of the previous one
    /// are consumed. Each call starts over; a root whose canonical path
    /// was already yielded in this pass is skipped.
    pub fn roots(&self) -> Roots<'_> {
        Roots {
            env: &self.env,
            launchers: self.launchers.iter(),
            pending: VecDeque::new(),
            seen: HashSet::new(),
        }
    }
}

/// Iterator returned by [`PathDiscoverer::roots`].
pub struct Roots<'a> {
    env: &'a DiscoveryEnv,
    launchers: std::slice::Iter<'a, Launcher>,
    pending: VecDeque<InstallationRoot>,
    seen: HashSet<PathBuf>,
}

impl Iterator for Roots<'_> {
    type Item = InstallationRoot;

    fn next(&mut self) -> Option<InstallationRoot> {
        loop {
            if let Some(root) = self.pending.pop_front() {
                if self.seen.insert(dedup_key(&root.path)) {
                    return Some(root);
                }
                debug!(path = %root.path.display(), kind = %root.kind, "duplicate root skipped");
                continue;
            }

            let launcher = self.launchers.next()?;
            self.pending.extend(launcher.discover(self.env));
        }
    }
}

fn dedup_key(path: &Path) -> PathBuf {
    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if cfg!(windows) {
        PathBuf::from(canonical.to_string_lossy().to_lowercase())
    } else {
        canonical
    }
}

#[cfg(test)]
mod tests {
    use dllup_model::LauncherKind;

    use super::*;

    #[test]
    fn overlapping_sources_are_deduplicated() {
        let library = tempfile::tempdir().unwrap();
        fs::create_dir_all(library.path().join("Game")).unwrap();

        let mut env = DiscoveryEnv {
            custom_folders: vec![library.path().join("Game")],
            ..Default::default()
        };
        env.add_library_override(LauncherKind::Epic, library.path());

        let discoverer = PathDiscoverer::with_launchers(env, vec![Launcher::Epic, Launcher::Custom]);
        let roots: Vec<InstallationRoot> = discoverer.roots().collect();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].kind, LauncherKind::Epic);
    }

    #[test]
    fn each_call_restarts() {
        let library = tempfile::tempdir().unwrap();
        fs::create_dir_all(library.path().join("A")).unwrap();
        fs::create_dir_all(library.path().join("B")).unwrap();

        let mut env = DiscoveryEnv::default();
        env.add_library_override(LauncherKind::Gog, library.path());
        let discoverer = PathDiscoverer::new(env);

        assert_eq!(discoverer.roots().count(), 2);
        assert_eq!(discoverer.roots().count(), 2);
    }

    #[test]
    fn iterator_is_lazy() {
        let library = tempfile::tempdir().unwrap();
        fs::create_dir_all(library.path().join("A")).unwrap();
        let mut env = DiscoveryEnv::default();
        env.add_library_override(LauncherKind::Steam, library.path());

        let discoverer = PathDiscoverer::new(env);
        let mut roots = discoverer.roots();
        let first = roots.next().unwrap();
        assert_eq!(first.display_name, "A");
        // Later launchers have not run yet.
        assert_eq!(roots.launchers.len(), Launcher::all().len() - 1);
    }

    #[test]
    fn empty_environment() {
        let discoverer = PathDiscoverer::new(DiscoveryEnv::default());
        assert_eq!(discoverer.roots().count(), 0);
    }
}
