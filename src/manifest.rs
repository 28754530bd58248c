//! The faces list: every output path the extractor has produced.
//!
//! One path per line, newline terminated. Entries are relative to the
//! working directory when the path lies below it and absolute otherwise, so
//! `Faces/x.png`, `./Faces/x.png` and `$PWD/Faces/x.png` name one entry.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeSet<String>,
}

/// Manifest key for an output path, relative to the working directory.
pub fn entry_for(path: &Path) -> String {
    match std::env::current_dir() {
        Ok(cwd) => entry_for_in(&cwd, path),
        Err(_) => normalize(path).to_string_lossy().into_owned(),
    }
}

/// Manifest key for `path` as seen from `base`.
pub fn entry_for_in(base: &Path, path: &Path) -> String {
    let base = normalize(base);
    let absolute = normalize(&base.join(path));
    match absolute.strip_prefix(&base) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_string_lossy().into_owned(),
        _ => absolute.to_string_lossy().into_owned(),
    }
}

/// Lexical cleanup: drops `.` and resolves `..` against the preceding
/// component. Symlinks are not followed.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(|line| entry_for(Path::new(line)))
            .collect();
        Self { entries }
    }

    /// Load a manifest, treating a missing file as empty.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        Self::load_existing(path)
    }

    /// Load a manifest that must already exist.
    pub fn load_existing(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ManifestMissing(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::fs("failed to read faces list", path, e))?;
        Ok(Self::parse(&content))
    }

    /// Add a path; returns whether it was new.
    pub fn insert(&mut self, path: &Path) -> bool {
        self.entries.insert(entry_for(path))
    }

    /// Union with `paths`; returns how many entries were new.
    pub fn merge<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .filter(|p| self.insert(p.as_ref()))
            .count()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains(&entry_for(path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn to_text(&self) -> String {
        self.entries.iter().map(|e| format!("{e}\n")).collect()
    }

    /// Write through a temporary file in the same directory, then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::fs("failed to create directory", dir, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| Error::fs("failed to create temporary file in", dir, e))?;
        tmp.write_all(self.to_text().as_bytes())
            .map_err(|e| Error::fs("failed to write faces list", path, e))?;
        tmp.persist(path)
            .map_err(|e| Error::fs("failed to replace faces list", path, e.error))?;
        Ok(())
    }
}
