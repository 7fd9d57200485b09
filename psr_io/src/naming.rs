//! Output file naming.

use std::fs;
use std::path::{Path, PathBuf};

/// Path of the snapshot taken at `epoch`: `{dir}/{prefix}_{epoch}.npz`.
pub fn snapshot_path(dir: &Path, prefix: &str, epoch: usize) -> PathBuf {
    dir.join(format!("{}_{}.npz", prefix, epoch))
}

/// All snapshots with the given prefix in `dir`, sorted by epoch.
///
/// A missing directory yields an empty list.
pub fn list_snapshots(dir: &Path, prefix: &str) -> Vec<(usize, PathBuf)> {
    let mut found = Vec::new();
    let lead = format!("{}_", prefix);

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let epoch = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(&lead))
                .and_then(|n| n.strip_suffix(".npz"))
                .and_then(|n| n.parse::<usize>().ok());
            if let Some(epoch) = epoch {
                found.push((epoch, path));
            }
        }
    }

    found.sort_by_key(|(epoch, _)| *epoch);
    found
}
