//! Vendoring orchestrator.
//!
//! A run makes a module self-contained:
//!
//! 1. resolve paths and, when `--out` is given, copy the module there
//! 2. check that `vendor/` exists when every requirement is vendored
//! 3. load `go.mod` from the output
//! 4. copy each `replace` target into `<out>/<folder>/<module path>`
//! 5. with `--required`, copy the remaining requirements out of `vendor/`,
//!    then delete `vendor/`
//! 6. rewrite references to every vendored module, longest path first
//! 7. rename the module itself, if asked
//! 8. write `go.mod`
//! 9. run `go mod tidy`
//!
//! The run stops at the first error and does not roll back. Treat the output
//! directory as disposable until the run reports success.

use crate::config::{MATERIALIZED_DIR, VendorOptions};
use crate::error::{GovenError, Result};
use crate::manifest::{CHECKSUM_FILE, MANIFEST_FILE, ModuleManifest};
use crate::materialize::{self, Exclusions, PatternSet};
use crate::reconcile::{GoModTidy, NoReconcile, Reconciler};
use crate::rewrite::{self, ReferenceRewriter, RenamePlan};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Where a vendored module came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOrigin {
    /// A `replace` directive
    Override,
    /// A requirement copied out of `vendor/`
    Requirement,
}

/// One module copied into the vendor folder.
#[derive(Debug, Clone)]
pub struct VendorAction {
    pub origin: ActionOrigin,
    /// Directory the module was copied from
    pub source_path: PathBuf,
    /// Module path that was replaced
    pub original_ref: String,
    /// Module path the sources now use
    pub vendored_ref: String,
    /// `<folder>/<original_ref>`, relative to the output root
    pub local_path: PathBuf,
    pub files: usize,
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct VendorReport {
    /// Module root that was vendored (the output copy, or the module itself)
    pub module_dir: PathBuf,
    pub original_module: String,
    pub module_path: String,
    pub actions: Vec<VendorAction>,
    /// Requirements dropped without a copy, and overrides left in place
    pub skipped: Vec<String>,
    pub files_rewritten: usize,
}

struct ResolvedPaths {
    source_dir: PathBuf,
    manifest_name: String,
    output_dir: PathBuf,
}

pub struct Vendorer {
    options: VendorOptions,
    rewriter: Box<dyn ReferenceRewriter>,
    reconciler: Box<dyn Reconciler>,
}

impl Vendorer {
    pub fn new(options: VendorOptions) -> Self {
        let rewriter = options.rewrite_mode.rewriter();
        let reconciler: Box<dyn Reconciler> = if options.tidy {
            Box::new(GoModTidy::new())
        } else {
            Box::new(NoReconcile)
        };
        Self {
            options,
            rewriter,
            reconciler,
        }
    }

    pub fn with_rewriter(mut self, rewriter: Box<dyn ReferenceRewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn with_reconciler(mut self, reconciler: Box<dyn Reconciler>) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn options(&self) -> &VendorOptions {
        &self.options
    }

    pub fn run(&self) -> Result<VendorReport> {
        let opts = &self.options;
        opts.validate()?;
        let source_patterns = PatternSet::new(&opts.source_patterns)?;
        let dep_exclusions = self.dependency_exclusions()?;

        // 1. resolve paths, copy the module
        let paths = self.resolve_paths()?;

        // 2. precondition
        let materialized_src = paths.source_dir.join(MATERIALIZED_DIR);
        if opts.vendor_required {
            if !materialized_src.is_dir() {
                return Err(GovenError::precondition(
                    &materialized_src,
                    "can't find vendor folder, run \"go mod vendor\" in the module first",
                ));
            }
            // vendor/ is deleted after its modules are copied out
            if Path::new(&opts.vendor_folder).starts_with(MATERIALIZED_DIR) {
                return Err(GovenError::precondition(
                    &materialized_src,
                    format!(
                        "vendor folder \"{}\" lies inside the \"go mod vendor\" output",
                        opts.vendor_folder
                    ),
                ));
            }
        }
        self.copy_module(&paths)?;

        // 3. load
        let manifest_path = paths.output_dir.join(&paths.manifest_name);
        let mut manifest = ModuleManifest::load(&manifest_path)?;
        let original_module = manifest.module_path().to_string();
        println!(
            "{} Vendoring {} into {}",
            "📦".blue(),
            original_module.bold(),
            paths.output_dir.display()
        );

        let materialized_out = paths.output_dir.join(MATERIALIZED_DIR);
        let mut plan = RenamePlan::new();
        let mut pending: Vec<VendorAction> = Vec::new();
        let mut skipped = Vec::new();

        // 4. overrides
        for replace in manifest.overrides().to_vec() {
            let source_path = if replace.is_local() {
                paths.source_dir.join(&replace.new.path)
            } else if opts.vendor_required {
                materialized_out.join(&replace.old.path)
            } else {
                println!(
                    "{} Leaving {} => {}: not a local directory",
                    "!".yellow(),
                    replace.old,
                    replace.new
                );
                skipped.push(replace.old.path.clone());
                continue;
            };
            let action = self.plan_action(
                ActionOrigin::Override,
                &original_module,
                &replace.old.path,
                source_path,
            );
            plan.push(&action.original_ref, &action.vendored_ref)?;
            manifest.drop_requirement(&replace.old.path);
            manifest.drop_override(&replace.old.path, replace.old.version.as_deref());
            manifest.drop_exclusions(&replace.old.path);
            if !pending.iter().any(|a| a.original_ref == action.original_ref) {
                pending.push(action);
            }
        }

        // 5. remaining requirements
        if opts.vendor_required {
            for req in manifest.requirements().to_vec() {
                let source_path = materialized_out.join(&req.path);
                manifest.drop_requirement(&req.path);
                manifest.drop_exclusions(&req.path);
                if !source_path.is_dir() {
                    // go mod vendor leaves out modules that provide no packages
                    skipped.push(req.path.clone());
                    continue;
                }
                let action = self.plan_action(
                    ActionOrigin::Requirement,
                    &original_module,
                    &req.path,
                    source_path,
                );
                plan.push(&action.original_ref, &action.vendored_ref)?;
                pending.push(action);
            }
        }

        // Ambiguous renames must fail before anything is copied into the vendor folder
        plan.validate()?;
        for rename in plan.iter() {
            check_kept_modules(&manifest, &rename.from, &rename.to)?;
        }
        let new_module = opts
            .new_module_name
            .clone()
            .filter(|name| *name != original_module);
        if let Some(new_module) = &new_module {
            check_kept_modules(&manifest, &original_module, new_module)?;
        }

        let mut actions = Vec::with_capacity(pending.len());
        for mut action in pending {
            let destination = paths.output_dir.join(&action.local_path);
            action.files =
                materialize::copy_tree(&action.source_path, &destination, &dep_exclusions)?;
            println!(
                "   {} {} -> {}",
                "+".green(),
                action.original_ref,
                action.local_path.display()
            );
            actions.push(action);
        }

        if opts.vendor_required {
            materialize::remove_tree(&materialized_out)?;
            println!("   {} Removed {}", "-".red(), materialized_out.display());
        }

        // 6. dependency renames
        let mut changed = plan.apply(&paths.output_dir, &source_patterns, self.rewriter.as_ref())?;

        // 7. module identity
        let mut module_path = original_module.clone();
        if let Some(new_module) = new_module {
            for path in rewrite::rewrite_references(
                &paths.output_dir,
                &source_patterns,
                &original_module,
                &new_module,
                self.rewriter.as_ref(),
            )? {
                if !changed.contains(&path) {
                    changed.push(path);
                }
            }
            manifest.set_module_path(&new_module);
            for action in &mut actions {
                if let Some(rest) = action.vendored_ref.strip_prefix(&original_module) {
                    action.vendored_ref = format!("{}{}", new_module, rest);
                }
            }
            println!(
                "   {} Renamed module {} -> {}",
                "~".cyan(),
                original_module,
                new_module.bold()
            );
            module_path = new_module;
        }

        if opts.verbose {
            for path in &changed {
                let shown = path.strip_prefix(&paths.output_dir).unwrap_or(path);
                println!("   {} {}", "~".cyan(), shown.display());
            }
        }
        println!(
            "   {} Rewrote references in {} files",
            "~".cyan(),
            changed.len()
        );

        // 8. persist
        manifest.save(&manifest_path)?;

        // 9. reconcile
        if opts.tidy {
            println!("   {} Running {}", "⚡".yellow(), self.reconciler.describe());
        }
        self.reconciler.reconcile(&paths.output_dir)?;

        println!("{} Vendor complete.", "✓".green());
        Ok(VendorReport {
            module_dir: paths.output_dir,
            original_module,
            module_path,
            actions,
            skipped,
            files_rewritten: changed.len(),
        })
    }

    fn resolve_paths(&self) -> Result<ResolvedPaths> {
        let opts = &self.options;
        let manifest_path =
            fs::canonicalize(&opts.manifest_path).map_err(|source| GovenError::PathResolution {
                path: opts.manifest_path.clone(),
                source,
            })?;
        if !manifest_path.is_file() {
            return Err(GovenError::precondition(
                &manifest_path,
                "can't find go module file",
            ));
        }
        let source_dir = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let manifest_name = manifest_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| MANIFEST_FILE.to_string());

        let output_dir = match &opts.output_path {
            Some(out) => {
                fs::create_dir_all(out).map_err(|e| GovenError::io("create directory", out, e))?;
                fs::canonicalize(out).map_err(|source| GovenError::PathResolution {
                    path: out.clone(),
                    source,
                })?
            }
            None => source_dir.clone(),
        };

        Ok(ResolvedPaths {
            source_dir,
            manifest_name,
            output_dir,
        })
    }

    fn copy_module(&self, paths: &ResolvedPaths) -> Result<()> {
        if paths.output_dir == paths.source_dir {
            return Ok(());
        }
        let opts = &self.options;
        let mut prefixes = opts.exclude_paths.clone();
        if !opts.vendor_required {
            prefixes.push(MATERIALIZED_DIR.to_string());
        }
        // an output directory inside the module must not copy into itself
        if let Ok(inner) = paths.output_dir.strip_prefix(&paths.source_dir) {
            prefixes.push(inner.to_string_lossy().into_owned());
        }

        if fs::read_dir(&paths.output_dir).is_ok_and(|mut entries| entries.next().is_some()) {
            println!(
                "{} Output {} is not empty; existing files may be overwritten",
                "!".yellow(),
                paths.output_dir.display()
            );
        }

        let exclusions = Exclusions::new(&[] as &[&str], &prefixes)?;
        let files = materialize::copy_tree(&paths.source_dir, &paths.output_dir, &exclusions)?;
        println!(
            "   {} Copied {} files to {}",
            "+".green(),
            files,
            paths.output_dir.display()
        );
        Ok(())
    }

    fn dependency_exclusions(&self) -> Result<Exclusions> {
        let mut patterns = vec![MANIFEST_FILE.to_string(), CHECKSUM_FILE.to_string()];
        patterns.extend(self.options.exclude_patterns.iter().cloned());
        Exclusions::new(&patterns, &[] as &[&str])
    }

    fn plan_action(
        &self,
        origin: ActionOrigin,
        module: &str,
        dependency: &str,
        source_path: PathBuf,
    ) -> VendorAction {
        let prefix = self.options.vendor_prefix();
        let mut local_path = PathBuf::from(&self.options.vendor_folder);
        for segment in dependency.split('/') {
            local_path.push(segment);
        }
        VendorAction {
            origin,
            source_path,
            original_ref: dependency.to_string(),
            vendored_ref: format!("{}/{}/{}", module, prefix, dependency),
            local_path,
            files: 0,
        }
    }
}

/// A rename of `old` must not drag along requirements or overrides that stay
/// external, such as `example.org/dep/v2` when only `example.org/dep` is vendored.
fn check_kept_modules(manifest: &ModuleManifest, old: &str, new: &str) -> Result<()> {
    let kept = manifest
        .requirements()
        .iter()
        .map(|r| r.path.as_str())
        .chain(manifest.overrides().iter().map(|o| o.old.path.as_str()));
    for path in kept {
        if rewrite::in_namespace(path, old) {
            return Err(GovenError::Rename(format!(
                "renaming \"{}\" to \"{}\" would also rewrite the external module \"{}\"",
                old, new, path
            )));
        }
    }
    Ok(())
}
