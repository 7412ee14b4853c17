//! Recursive copy and delete of module trees.
//!
//! Both walks use `walkdir`, which keeps its own stack of open directories, so
//! deeply nested trees do not grow the call stack.
//!
//! ## Exclusions
//!
//! - filename globs (`go.mod`, `*_test.go`) match the file name only
//! - path prefixes (`vendor`, `testdata/big`) match whole leading components of
//!   the path relative to the copy source, and prune the subtree when they match
//!   a directory

use crate::error::{GovenError, Result};
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A set of filename globs.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|source| GovenError::Pattern {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, filename: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(filename))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// What `copy_tree` leaves behind.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    filenames: PatternSet,
    prefixes: Vec<PathBuf>,
}

impl Exclusions {
    pub fn new<S: AsRef<str>, P: AsRef<Path>>(filenames: &[S], prefixes: &[P]) -> Result<Self> {
        Ok(Self {
            filenames: PatternSet::new(filenames)?,
            prefixes: prefixes
                .iter()
                .map(|p| normalize_prefix(p.as_ref()))
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
        })
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn excludes_filename(&self, filename: &str) -> bool {
        self.filenames.matches(filename)
    }

    /// `relative` is relative to the copy source.
    pub fn excludes_path(&self, relative: &Path) -> bool {
        self.prefixes.iter().any(|prefix| relative.starts_with(prefix))
    }
}

// "./vendor/" and "vendor" must behave the same
fn normalize_prefix(prefix: &Path) -> PathBuf {
    prefix
        .components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

/// Copy `source` into `destination`, mirroring directories.
///
/// Existing files at the destination are overwritten, existing directories are
/// reused. Returns the number of files copied. Stops at the first I/O error.
pub fn copy_tree(source: &Path, destination: &Path, exclusions: &Exclusions) -> Result<usize> {
    if !source.is_dir() {
        return Err(GovenError::precondition(
            source,
            "copy source is not a directory",
        ));
    }

    let mut copied = 0;
    let walker = WalkDir::new(source)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
            relative.as_os_str().is_empty() || !exclusions.excludes_path(relative)
        });

    for entry in walker {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .unwrap_or(entry.path());
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| GovenError::io("create directory", &target, e))?;
            continue;
        }

        let filename = entry.file_name().to_string_lossy();
        if exclusions.excludes_filename(&filename) {
            continue;
        }

        copy_file(entry.path(), &target)?;
        copied += 1;
    }

    Ok(copied)
}

fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    let data = fs::read(source).map_err(|e| GovenError::io("read file", source, e))?;
    fs::write(destination, data).map_err(|e| GovenError::io("write file", destination, e))
}

/// Delete `path` and everything under it, files first, then directories
/// bottom-up. A missing path is not an error.
pub fn remove_tree(path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }

    for entry in WalkDir::new(path).contents_first(true) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            fs::remove_dir(entry.path())
                .map_err(|e| GovenError::io("delete directory", entry.path(), e))?;
        } else {
            fs::remove_file(entry.path())
                .map_err(|e| GovenError::io("delete file", entry.path(), e))?;
        }
    }
    Ok(())
}
