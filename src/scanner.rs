//! Data File Scanner
//!
//! One-shot walk of the data directory. Used for start-up diagnostics and the
//! `/_mock/routes` listing; never consulted while resolving a request.

use std::path::Path;

use tracing::warn;
use walkdir::WalkDir;

/// Lists files under `root` whose extension is `ext`.
///
/// Paths are relative to `root`, `/`-separated, in depth-first order sorted by
/// file name. Entries that cannot be read are skipped with a warning. A
/// missing root yields an empty list.
pub fn find_data_files(root: &Path, ext: &str) -> Vec<String> {
    let ext = ext.trim_start_matches('.');
    let mut files = Vec::new();

    if !root.is_dir() {
        return files;
    }

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry while scanning mock data");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let matches_ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(ext))
            .unwrap_or(false);
        if !matches_ext {
            continue;
        }

        if let Ok(relative) = entry.path().strip_prefix(root) {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
    }

    files
}
