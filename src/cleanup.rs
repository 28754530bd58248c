//! Removal of crops that are no longer listed in the faces list.

use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::manifest::Manifest;

/// Result of a cleanup operation
#[derive(Debug, Clone, Default)]
pub struct CleanupResult {
    pub orphans: Vec<PathBuf>,
    pub files_deleted: usize,
    pub bytes_freed: u64,
}

/// Files under `output_root` whose manifest entry is missing, sorted.
///
/// Walked paths go through [`crate::manifest::entry_for`] before the lookup,
/// so `Faces`, `./Faces` and an absolute spelling of the root all match.
pub fn find_orphans(output_root: &Path, manifest: &Manifest) -> Result<Vec<PathBuf>> {
    let mut orphans = Vec::new();

    for entry in WalkDir::new(output_root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(output_root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            Error::fs("failed to walk", path, source)
        })?;

        if entry.file_type().is_file() && !manifest.contains(entry.path()) {
            orphans.push(entry.into_path());
        }
    }

    orphans.sort();
    Ok(orphans)
}

/// Delete every orphan under `output_root`. With `dry_run` nothing is removed.
pub fn remove_orphans(
    output_root: &Path,
    manifest: &Manifest,
    dry_run: bool,
) -> Result<CleanupResult> {
    let mut result = CleanupResult {
        orphans: find_orphans(output_root, manifest)?,
        ..Default::default()
    };

    if dry_run {
        return Ok(result);
    }

    for path in &result.orphans {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        match std::fs::remove_file(path) {
            Ok(()) => {
                result.files_deleted += 1;
                result.bytes_freed += size;
            }
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }

    info!(
        "Removed {} of {} orphaned files ({} bytes)",
        result.files_deleted,
        result.orphans.len(),
        result.bytes_freed
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"png").unwrap();
    }

    #[test]
    fn test_find_orphans() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("Faces");
        let kept = root.join("Alice/a-1.png");
        let stale = root.join("Bob/b-2.png");
        let composite = root.join("Family\u{2215}Alice/c-3.png");
        touch(&kept);
        touch(&stale);
        touch(&composite);

        let mut manifest = Manifest::new();
        manifest.merge([&kept, &composite]);

        assert_eq!(find_orphans(&root, &manifest).unwrap(), vec![stale]);
    }

    #[test]
    fn test_listed_files_are_never_orphans() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("Faces");
        let mut manifest = Manifest::new();
        for i in 0..20 {
            let path = root.join(format!("L{}", i % 3)).join(format!("f{i}.png"));
            touch(&path);
            manifest.insert(&path);
        }

        assert!(find_orphans(&root, &manifest).unwrap().is_empty());
    }

    #[test]
    fn test_remove_orphans() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("Faces");
        let kept = root.join("Alice/a-1.png");
        let stale = root.join("Alice/a-2.png");
        touch(&kept);
        touch(&stale);

        let mut manifest = Manifest::new();
        manifest.insert(&kept);

        let dry = remove_orphans(&root, &manifest, true).unwrap();
        assert_eq!(dry.orphans.len(), 1);
        assert_eq!(dry.files_deleted, 0);
        assert!(stale.exists());

        let result = remove_orphans(&root, &manifest, false).unwrap();
        assert_eq!(result.files_deleted, 1);
        assert_eq!(result.bytes_freed, 3);
        assert!(!stale.exists());
        assert!(kept.exists());
    }
}
