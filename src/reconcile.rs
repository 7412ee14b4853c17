//! Post-vendoring consistency step.
//!
//! After the manifest is rewritten the host toolchain recomputes `go.sum` and
//! prunes requirements that are no longer imported. The step runs last; when it
//! fails the vendored tree is left on disk as is.

use crate::error::{GovenError, Result};
use std::path::Path;
use std::process::Command;

pub trait Reconciler {
    fn reconcile(&self, module_dir: &Path) -> Result<()>;

    /// Human-readable name for status output.
    fn describe(&self) -> String;
}

/// Runs `go mod tidy` in the module directory.
#[derive(Debug, Clone)]
pub struct GoModTidy {
    program: String,
}

impl GoModTidy {
    pub fn new() -> Self {
        Self::with_program("go")
    }

    /// Use a specific `go` binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GoModTidy {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler for GoModTidy {
    fn reconcile(&self, module_dir: &Path) -> Result<()> {
        let err = |message: String| GovenError::Reconcile {
            command: self.describe(),
            path: module_dir.to_path_buf(),
            message,
        };

        let output = Command::new(&self.program)
            .args(["mod", "tidy"])
            .current_dir(module_dir)
            .output()
            .map_err(|e| err(e.to_string()))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(err(if stderr.is_empty() {
            output.status.to_string()
        } else {
            stderr
        }))
    }

    fn describe(&self) -> String {
        format!("{} mod tidy", self.program)
    }
}

/// Skips reconciliation (`--no-tidy`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconcile;

impl Reconciler for NoReconcile {
    fn reconcile(&self, _module_dir: &Path) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "none".to_string()
    }
}
