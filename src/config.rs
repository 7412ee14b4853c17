//! Run configuration.
//!
//! Settings come from three places, highest precedence first: command-line
//! flags, an optional `goven.toml`, built-in defaults. They are folded once into
//! an immutable [`VendorOptions`] that the orchestrator owns for the run.
//!
//! ```toml
//! [vendor]
//! folder = "internal/third_party"
//! required = true
//! ignore = ["testdata"]
//! exclude = ["*_test.go"]
//! rewrite = "imports"
//!
//! [release]
//! repository = "https://github.com/acme/client-go.git"
//! ```

use crate::error::{GovenError, Result};
use crate::rewrite::RewriteMode;
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const CONFIG_FILE: &str = "goven.toml";
pub const DEFAULT_MANIFEST: &str = "./go.mod";
pub const DEFAULT_OUT: &str = "./out";
pub const DEFAULT_VENDOR_FOLDER: &str = "goven";
pub const DEFAULT_SOURCE_PATTERN: &str = "*.go";

/// Directory `go mod vendor` fills with every required module.
pub const MATERIALIZED_DIR: &str = "vendor";

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct GovenConfig {
    pub vendor: VendorSection,
    pub release: ReleaseSection,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct VendorSection {
    pub module: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub in_place: Option<bool>,
    pub folder: Option<String>,
    pub name: Option<String>,
    pub required: Option<bool>,
    pub ignore: Vec<String>,
    pub exclude: Vec<String>,
    pub patterns: Vec<String>,
    pub rewrite: Option<RewriteMode>,
    pub tidy: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ReleaseSection {
    pub repository: Option<String>,
    pub path: Option<String>,
}

impl GovenConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| GovenError::io("read config", path, e))?;
        toml::from_str(&content).map_err(|source| GovenError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `explicit` if given, else `goven.toml` in the current directory if
    /// present, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let local = Path::new(CONFIG_FILE);
        if local.exists() {
            Self::load(local)
        } else {
            Ok(Self::default())
        }
    }
}

/// Vendoring flags as given on the command line; `None`/empty means "not given".
#[derive(Debug, Default, Clone)]
pub struct VendorFlags {
    pub module: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub in_place: bool,
    pub folder: Option<String>,
    pub name: Option<String>,
    pub required: bool,
    pub ignore: Vec<String>,
    pub exclude: Vec<String>,
    pub patterns: Vec<String>,
    pub rewrite: Option<RewriteMode>,
    pub no_tidy: bool,
    pub verbose: bool,
}

/// Everything one vendoring run needs.
#[derive(Debug, Clone)]
pub struct VendorOptions {
    /// Path to `go.mod`
    pub manifest_path: PathBuf,
    /// Copy the module here first; `None` vendors in place
    pub output_path: Option<PathBuf>,
    /// Folder inside the module that receives vendored modules
    pub vendor_folder: String,
    /// New module path for the vendored module
    pub new_module_name: Option<String>,
    /// Also vendor every requirement from `vendor/` (needs `go mod vendor` first)
    pub vendor_required: bool,
    /// Path prefixes left out when copying the module
    pub exclude_paths: Vec<String>,
    /// Filename globs left out of vendored dependencies
    pub exclude_patterns: Vec<String>,
    /// Files whose references are rewritten
    pub source_patterns: Vec<String>,
    pub rewrite_mode: RewriteMode,
    /// Run `go mod tidy` at the end
    pub tidy: bool,
    pub verbose: bool,
}

impl Default for VendorOptions {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from(DEFAULT_MANIFEST),
            output_path: Some(PathBuf::from(DEFAULT_OUT)),
            vendor_folder: DEFAULT_VENDOR_FOLDER.to_string(),
            new_module_name: None,
            vendor_required: false,
            exclude_paths: Vec::new(),
            exclude_patterns: Vec::new(),
            source_patterns: vec![DEFAULT_SOURCE_PATTERN.to_string()],
            rewrite_mode: RewriteMode::default(),
            tidy: true,
            verbose: false,
        }
    }
}

impl VendorOptions {
    /// Fold flags over the config file over defaults.
    pub fn resolve(flags: VendorFlags, config: &VendorSection) -> Self {
        let defaults = Self::default();
        let pick_list = |flag: Vec<String>, file: &Vec<String>, default: Vec<String>| {
            if !flag.is_empty() {
                flag
            } else if !file.is_empty() {
                file.clone()
            } else {
                default
            }
        };

        let in_place = flags.in_place || config.in_place.unwrap_or(false);
        let output_path = if in_place {
            None
        } else {
            flags
                .out
                .or_else(|| config.out.clone())
                .or(defaults.output_path)
        };

        Self {
            manifest_path: flags
                .module
                .or_else(|| config.module.clone())
                .unwrap_or(defaults.manifest_path),
            output_path,
            vendor_folder: flags
                .folder
                .or_else(|| config.folder.clone())
                .unwrap_or(defaults.vendor_folder),
            new_module_name: flags.name.or_else(|| config.name.clone()),
            vendor_required: flags.required || config.required.unwrap_or(false),
            exclude_paths: pick_list(flags.ignore, &config.ignore, defaults.exclude_paths),
            exclude_patterns: pick_list(flags.exclude, &config.exclude, defaults.exclude_patterns),
            source_patterns: pick_list(flags.patterns, &config.patterns, defaults.source_patterns),
            rewrite_mode: flags
                .rewrite
                .or(config.rewrite)
                .unwrap_or(defaults.rewrite_mode),
            tidy: !flags.no_tidy && config.tidy.unwrap_or(true),
            verbose: flags.verbose,
        }
    }

    /// Reject option values no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        let folder = Path::new(&self.vendor_folder);
        if self.vendor_folder.trim().is_empty() {
            return Err(GovenError::InvalidArgument(
                "vendor folder must not be empty".to_string(),
            ));
        }
        if folder
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(GovenError::InvalidArgument(format!(
                "vendor folder \"{}\" must be a plain relative path inside the module",
                self.vendor_folder
            )));
        }
        if let Some(name) = &self.new_module_name
            && (name.trim().is_empty() || name.contains(char::is_whitespace))
        {
            return Err(GovenError::InvalidArgument(format!(
                "invalid module name \"{}\"",
                name
            )));
        }
        if self.source_patterns.is_empty() {
            return Err(GovenError::InvalidArgument(
                "at least one source file pattern is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Vendor folder as it appears inside module references.
    pub fn vendor_prefix(&self) -> String {
        Path::new(&self.vendor_folder)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}
