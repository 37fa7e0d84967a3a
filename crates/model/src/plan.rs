use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::family::ModuleFamily;
use crate::root::InstallationRoot;
use crate::version::VersionTag;

/// A module file matched by filename under an installation root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModuleCandidate {
    pub root: InstallationRoot,
    pub path: PathBuf,
    pub family: ModuleFamily,
}

impl ModuleCandidate {
    pub fn new(root: InstallationRoot, path: impl Into<PathBuf>, family: ModuleFamily) -> Self {
        Self {
            root,
            path: path.into(),
            family,
        }
    }

    /// File name of the module (e.g. `nvngx_dlss.dll`).
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path of the module relative to its installation root.
    ///
    /// Falls back to the bare file name when the module does not live
    /// under the root (which discovery never produces).
    pub fn relative_path(&self) -> PathBuf {
        self.path
            .strip_prefix(&self.root.path)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(self.file_name()))
    }
}

/// Replacement payload for a module, already fetched and verified upstream.
#[derive(Clone)]
pub enum PayloadRef {
    /// Payload stored as a file on disk.
    File(PathBuf),
    /// Payload held in memory.
    Bytes(Arc<[u8]>),
}

impl PayloadRef {
    /// Loads the payload bytes.
    pub fn load(&self) -> std::io::Result<Arc<[u8]>> {
        match self {
            PayloadRef::File(path) => Ok(Arc::from(std::fs::read(path)?)),
            PayloadRef::Bytes(bytes) => Ok(Arc::clone(bytes)),
        }
    }
}

impl fmt::Debug for PayloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadRef::File(path) => f.debug_tuple("File").field(path).finish(),
            PayloadRef::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

impl fmt::Display for PayloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadRef::File(path) => write!(f, "{}", path.display()),
            PayloadRef::Bytes(bytes) => write!(f, "<{} bytes in memory>", bytes.len()),
        }
    }
}

/// Decision taken for one module candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UpdateAction {
    Update,
    SkipUpToDate,
    SkipExcluded { reason: String },
    SkipUnknownVersion { reason: String },
    /// Installed version cannot be upgraded in place (e.g. DLSS 1.x).
    SkipIncompatible { reason: String },
}

impl UpdateAction {
    pub fn is_update(&self) -> bool {
        matches!(self, UpdateAction::Update)
    }

    /// Human-readable explanation for skip actions.
    pub fn reason(&self) -> Option<&str> {
        match self {
            UpdateAction::Update => None,
            UpdateAction::SkipUpToDate => Some("already up to date"),
            UpdateAction::SkipExcluded { reason }
            | UpdateAction::SkipUnknownVersion { reason }
            | UpdateAction::SkipIncompatible { reason } => Some(reason),
        }
    }
}

impl fmt::Display for UpdateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateAction::Update => write!(f, "update"),
            UpdateAction::SkipUpToDate => write!(f, "skip (up to date)"),
            UpdateAction::SkipExcluded { reason } => write!(f, "skip (excluded: {reason})"),
            UpdateAction::SkipUnknownVersion { reason } => {
                write!(f, "skip (unknown version: {reason})")
            }
            UpdateAction::SkipIncompatible { reason } => {
                write!(f, "skip (incompatible: {reason})")
            }
        }
    }
}

/// One planned action for one module candidate.
#[derive(Debug, Clone, Serialize)]
pub struct UpdatePlanEntry {
    /// Position in the flat plan; results are reported in this order.
    pub index: usize,
    pub candidate: ModuleCandidate,
    pub current: Option<VersionTag>,
    pub target: Option<VersionTag>,
    #[serde(skip)]
    pub payload: Option<PayloadRef>,
    pub action: UpdateAction,
}
