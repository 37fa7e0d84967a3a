//! Xbox app (PC Game Pass) libraries.
//!
//! Each drive holding an Xbox library carries a `.GamingRoot` file: the
//! magic `RGBX`, a little-endian `u32` folder count, then that many
//! UTF-16LE NUL-terminated folder names relative to the drive root.

use std::fs;

use dllup_model::{InstallationRoot, LauncherKind};
use tracing::{debug, warn};

use crate::DiscoveryError;
use crate::env::DiscoveryEnv;
use crate::fs_util::child_roots;

const MAGIC: &[u8; 4] = b"RGBX";

/// Parses a `.GamingRoot` file into library folder names.
fn parse_gaming_root(data: &[u8]) -> Result<Vec<String>, DiscoveryError> {
    if data.len() < 8 || &data[..4] != MAGIC {
        return Err(DiscoveryError::Manifest("missing RGBX header".into()));
    }
    let count = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;

    let mut pos = 8;
    let mut folders = Vec::new();
    for _ in 0..count {
        let (name, new_pos) = read_utf16z(data, pos)?;
        pos = new_pos;
        let name = name.trim_start_matches(['\\', '/']).to_string();
        if !name.is_empty() {
            folders.push(name);
        }
    }
    Ok(folders)
}

/// Reads a NUL-terminated UTF-16LE string, returning it and the position
/// after the terminator.
fn read_utf16z(data: &[u8], mut pos: usize) -> Result<(String, usize), DiscoveryError> {
    let mut units = Vec::new();
    loop {
        if pos + 2 > data.len() {
            return Err(DiscoveryError::Manifest(
                "unterminated folder name".into(),
            ));
        }
        let unit = u16::from_le_bytes([data[pos], data[pos + 1]]);
        pos += 2;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    Ok((String::from_utf16_lossy(&units), pos))
}

pub(crate) fn discover(env: &DiscoveryEnv) -> Vec<InstallationRoot> {
    let mut roots = Vec::new();

    for drive in &env.drive_roots {
        let marker = drive.join(".GamingRoot");
        let data = match fs::read(&marker) {
            Ok(data) => data,
            Err(_) => continue,
        };
        match parse_gaming_root(&data) {
            Ok(folders) => {
                for folder in folders {
                    let library = drive.join(&folder);
                    debug!(library = %library.display(), "xbox library");
                    roots.extend(child_roots(LauncherKind::XboxPc, &library));
                }
            }
            Err(e) => warn!(file = %marker.display(), error = %e, "skipping .GamingRoot"),
        }
    }

    roots
}
