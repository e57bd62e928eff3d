//! Fixture helpers for building content trees in tests.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Create `rel` (and its parents) under `root`.
pub(crate) fn mkdir(root: &Path, rel: &str) {
    fs::create_dir_all(root.join(rel)).unwrap();
}

/// Write `content` to `rel` under `root`, creating parent directories.
pub(crate) fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Write a type marker (`=page-type` or `:page-type`) into `dir`.
pub(crate) fn mark(root: &Path, dir: &str, marker: &str, type_name: &str) {
    let dir = root.join(dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(marker), format!("{type_name}\n")).unwrap();
}

/// Set the modification time of a file or directory.
pub(crate) fn set_mtime(path: &Path, time: SystemTime) {
    let file = fs::File::open(path).unwrap();
    file.set_modified(time).unwrap();
}

/// A fixed point in time, `secs` after the epoch.
pub(crate) fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000 + secs)
}
