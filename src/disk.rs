//! Approximate on-disk size report.

use std::path::Path;

const REPORT_THRESHOLD: u64 = 1024 * 1024;

/// Print every directory under `root` larger than 1 MiB, with zero-padded
/// byte counts so the output sorts lexically. Symlinks are counted, not
/// followed. Returns the total size of `root`.
pub fn print_sizes(root: &Path) -> u64 {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };

    let mut size = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(stat) = std::fs::symlink_metadata(&path) else {
            continue;
        };
        if stat.is_dir() && !stat.is_symlink() {
            size += print_sizes(&path);
        } else {
            size += stat.len();
        }
    }

    if size > REPORT_THRESHOLD {
        println!("{size:016} {}", root.display());
    }
    size
}
