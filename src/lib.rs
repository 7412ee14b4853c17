//! # goven - Go module vendoring
//!
//! goven makes a Go module self-contained: the modules it depends on are
//! copied into the module's own tree, every import of them is rewritten to the
//! new location, and `go.mod` is trimmed so the build no longer fetches them.
//!
//! ## Quick Start
//!
//! ```bash
//! # Vendor every `replace` target of ./go.mod into ./out/goven/...
//! goven vendor
//!
//! # Vendor all requirements too, and rename the module
//! go mod vendor
//! goven vendor --required --name github.com/acme/client-vendored
//!
//! # Vendor, then commit and tag the result in the module's repository
//! goven release --version v1.4.0
//! ```
//!
//! ## Module Organization
//!
//! - [`materialize`] - Recursive copy/delete with exclusions
//! - [`rewrite`] - Module reference rewriting and rename plans
//! - [`manifest`] - `go.mod` model, parser and writer
//! - [`vendor`] - The vendoring pipeline
//! - [`release`] - Publishing the vendored module with git

/// Run configuration (`goven.toml`, flags, defaults).
pub mod config;

/// Error taxonomy shared by every module.
pub mod error;

/// `go.mod` parsing, editing and formatting.
pub mod manifest;

/// Recursive copy and delete of module trees.
pub mod materialize;

/// `go mod tidy` after vendoring.
pub mod reconcile;

/// Git publishing of vendored output.
pub mod release;

/// Reference rewriting across source trees.
pub mod rewrite;

/// Terminal summary table.
pub mod ui;

/// Vendoring orchestrator.
pub mod vendor;

pub use config::VendorOptions;
pub use error::{GovenError, Result};
pub use manifest::ModuleManifest;
pub use vendor::{VendorReport, Vendorer};
