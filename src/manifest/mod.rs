//! In-memory model of a `go.mod` file.
//!
//! The model keeps what vendoring needs to edit (module identity, `require`,
//! `replace`) as typed entries and carries every other directive through
//! verbatim, so a load/save cycle never loses `exclude`, `retract` or
//! `godebug` lines.
//!
//! Mutations are staged in memory; nothing touches disk until [`ModuleManifest::save`].

mod format;
mod parser;

use crate::error::{GovenError, Result};
use std::fmt;
use std::fs;
use std::path::Path;

/// Name of the manifest file.
pub const MANIFEST_FILE: &str = "go.mod";

/// Name of the checksum file next to the manifest.
pub const CHECKSUM_FILE: &str = "go.sum";

/// A module path with an optional version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleVersion {
    pub path: String,
    pub version: Option<String>,
}

impl ModuleVersion {
    pub fn new(path: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            path: path.into(),
            version: version.map(str::to_string),
        }
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.path, v),
            None => f.write_str(&self.path),
        }
    }
}

/// A `require` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub path: String,
    pub version: String,
    /// Marked `// indirect`
    pub indirect: bool,
    /// Rest of the line comment, without the `indirect` marker
    pub note: Option<String>,
}

/// A `replace` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub old: ModuleVersion,
    pub new: ModuleVersion,
}

impl Override {
    /// The replacement is a directory rather than another module.
    pub fn is_local(&self) -> bool {
        is_local_path(&self.new.path)
    }
}

/// Whether a replacement path names a directory (`./x`, `../x`, `/x`, `C:\x`).
pub fn is_local_path(path: &str) -> bool {
    path == "."
        || path == ".."
        || path.starts_with("./")
        || path.starts_with("../")
        || path.starts_with('/')
        || path.starts_with(".\\")
        || path.starts_with("..\\")
        || is_windows_absolute(path)
}

fn is_windows_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleManifest {
    module_path: String,
    go_version: Option<String>,
    toolchain: Option<String>,
    requirements: Vec<Requirement>,
    overrides: Vec<Override>,
    /// Directives carried through untouched, in source order
    verbatim: Vec<String>,
}

impl ModuleManifest {
    pub fn new(module_path: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            ..Self::default()
        }
    }

    /// Read and parse a `go.mod` file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| GovenError::io("read manifest", path, e))?;
        Self::parse(path, &text)
    }

    /// Parse manifest text; `path` is only used in error messages.
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        parser::parse(path, text)
    }

    /// Serialize and write the manifest.
    pub fn save(&self, path: &Path) -> Result<()> {
        if self.module_path.is_empty() {
            return Err(GovenError::InvalidArgument(format!(
                "refusing to write \"{}\" without a module path",
                path.display()
            )));
        }
        fs::write(path, self.to_string()).map_err(|e| GovenError::io("write manifest", path, e))
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    pub fn go_version(&self) -> Option<&str> {
        self.go_version.as_deref()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn overrides(&self) -> &[Override] {
        &self.overrides
    }

    pub fn requirement(&self, path: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.path == path)
    }

    pub fn has_requirement(&self, path: &str) -> bool {
        self.requirement(path).is_some()
    }

    /// Stage a new module identity. Source files are not touched.
    pub fn set_module_path(&mut self, path: impl Into<String>) {
        self.module_path = path.into();
    }

    /// Add a requirement, or update the version of an existing one.
    pub fn add_requirement(&mut self, path: &str, version: &str, indirect: bool) {
        match self.requirements.iter_mut().find(|r| r.path == path) {
            Some(existing) => {
                existing.version = version.to_string();
                existing.indirect = indirect;
            }
            None => self.requirements.push(Requirement {
                path: path.to_string(),
                version: version.to_string(),
                indirect,
                note: None,
            }),
        }
    }

    /// Remove the requirement on `path`. Returns whether one was removed.
    pub fn drop_requirement(&mut self, path: &str) -> bool {
        let before = self.requirements.len();
        self.requirements.retain(|r| r.path != path);
        before != self.requirements.len()
    }

    /// Remove the override of `path` at exactly `version` (`None` matches an
    /// override that applies to every version). Returns whether one was removed.
    pub fn drop_override(&mut self, path: &str, version: Option<&str>) -> bool {
        let before = self.overrides.len();
        self.overrides
            .retain(|o| !(o.old.path == path && o.old.version.as_deref() == version));
        before != self.overrides.len()
    }

    /// Remove `exclude` entries for `path`, dropping a directive that ends up
    /// empty. Returns whether any entry was removed.
    pub fn drop_exclusions(&mut self, path: &str) -> bool {
        let mut removed = false;
        self.verbatim.retain_mut(|raw| match parser::strip_exclusion(raw, path) {
            None => true,
            Some(rest) => {
                removed = true;
                *raw = rest;
                !raw.is_empty()
            }
        });
        removed
    }

    pub fn add_override(&mut self, old: ModuleVersion, new: ModuleVersion) {
        self.overrides.retain(|o| o.old != old);
        self.overrides.push(Override { old, new });
    }
}

impl fmt::Display for ModuleManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format::render(self))
    }
}
