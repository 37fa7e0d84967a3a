use std::fmt;

use dllup_model::{InstallationRoot, LauncherKind};
use tracing::{debug, warn};

use crate::env::DiscoveryEnv;
use crate::fs_util::child_roots;
use crate::{battlenet, ea, epic, gog, prefix, steam, ubisoft, xbox};

/// A discovery strategy, one per launcher ecosystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Launcher {
    Steam,
    Proton,
    Wine,
    Epic,
    Gog,
    Ubisoft,
    Ea,
    BattleNet,
    Xbox,
    Custom,
}

impl Launcher {
    /// Returns all strategies in discovery order.
    pub fn all() -> &'static [Launcher] {
        &[
            Launcher::Steam,
            Launcher::Proton,
            Launcher::Wine,
            Launcher::Epic,
            Launcher::Gog,
            Launcher::Ubisoft,
            Launcher::Ea,
            Launcher::BattleNet,
            Launcher::Xbox,
            Launcher::Custom,
        ]
    }

    /// The kind stamped on every root this strategy yields.
    pub fn kind(self) -> LauncherKind {
        match self {
            Launcher::Steam => LauncherKind::Steam,
            Launcher::Proton => LauncherKind::ProtonPrefix,
            Launcher::Wine => LauncherKind::WinePrefix,
            Launcher::Epic => LauncherKind::Epic,
            Launcher::Gog => LauncherKind::Gog,
            Launcher::Ubisoft => LauncherKind::Ubisoft,
            Launcher::Ea => LauncherKind::Ea,
            Launcher::BattleNet => LauncherKind::BattleNet,
            Launcher::Xbox => LauncherKind::XboxPc,
            Launcher::Custom => LauncherKind::Custom,
        }
    }

    /// Returns the roots this launcher knows about, plus one root per
    /// subdirectory of each library folder configured for it.
    pub fn discover(self, env: &DiscoveryEnv) -> Vec<InstallationRoot> {
        let mut roots = match self {
            Launcher::Steam => steam::discover_steam(env),
            Launcher::Proton => steam::discover_proton(env),
            Launcher::Wine => prefix::discover_wine(env),
            Launcher::Epic => epic::discover(env),
            Launcher::Gog => gog::discover(env),
            Launcher::Ubisoft => ubisoft::discover(env),
            Launcher::Ea => ea::discover(env),
            Launcher::BattleNet => battlenet::discover(env),
            Launcher::Xbox => xbox::discover(env),
            Launcher::Custom => custom_roots(env),
        };

        for dir in env.library_overrides_for(self.kind()) {
            if !dir.is_dir() {
                warn!(launcher = %self, dir = %dir.display(), "configured library folder does not exist");
                continue;
            }
            roots.extend(child_roots(self.kind(), dir));
        }

        debug!(launcher = %self, count = roots.len(), "launcher discovery finished");
        roots
    }
}

fn custom_roots(env: &DiscoveryEnv) -> Vec<InstallationRoot> {
    env.custom_folders
        .iter()
        .filter(|dir| {
            let exists = dir.is_dir();
            if !exists {
                warn!(dir = %dir.display(), "custom folder does not exist");
            }
            exists
        })
        .map(|dir| InstallationRoot::new(LauncherKind::Custom, dir.clone()))
        .collect()
}

impl fmt::Display for Launcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}
