//! End-to-end vendoring scenarios
//!
//! These tests build small Go module trees in a temporary directory and run
//! the full vendoring pipeline over them with `go mod tidy` disabled.

use goven::config::VendorOptions;
use goven::manifest::ModuleManifest;
use goven::materialize::PatternSet;
use goven::rewrite::{self, TextRewriter};
use goven::vendor::ActionOrigin;
use goven::{GovenError, Vendorer};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).unwrap()
}

fn options(root: &Path) -> VendorOptions {
    VendorOptions {
        manifest_path: root.join("app/go.mod"),
        output_path: Some(root.join("out")),
        tidy: false,
        ..VendorOptions::default()
    }
}

/// Every `*.go` file under `root` that still mentions `reference` at a
/// module-path boundary.
fn dangling(root: &Path, reference: &str) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "go"))
        .filter(|e| {
            let content = fs::read_to_string(e.path()).unwrap();
            !rewrite::find_references(&content, reference).is_empty()
        })
        .map(|e| e.path().to_path_buf())
        .collect()
}

/// Module `example.org/app` with one local override for `example.org/dep`.
fn create_override_project(root: &Path) {
    write(
        root,
        "app/go.mod",
        r#"module example.org/app

go 1.22

require (
	example.org/dep v1.0.0
	example.org/other v0.3.0
)

replace example.org/dep v1.0.0 => ../local/dep
"#,
    );
    write(
        root,
        "app/main.go",
        r#"package main

import (
	"fmt"

	"example.org/dep"
	"example.org/dep/sub"
	"example.org/other"
)

func main() {
	fmt.Println(dep.Hello(), sub.Name, other.X)
}
"#,
    );
    write(root, "app/README.md", "uses example.org/dep\n");
    write(root, "local/dep/go.mod", "module example.org/dep\n\ngo 1.22\n");
    write(root, "local/dep/go.sum", "");
    write(
        root,
        "local/dep/dep.go",
        "package dep\n\nimport \"example.org/dep/sub\"\n\nfunc Hello() string { return sub.Name }\n",
    );
    write(root, "local/dep/sub/sub.go", "package sub\n\nconst Name = \"sub\"\n");
    write(root, "local/dep/dep_test.go", "package dep\n");
}

#[test]
fn test_override_is_vendored_into_folder() {
    let root = tempfile::tempdir().unwrap();
    create_override_project(root.path());
    let mut opts = options(root.path());
    opts.vendor_folder = "vendor".to_string();

    let report = Vendorer::new(opts).run().unwrap();
    let out = root.path().join("out");

    // completeness
    let manifest = ModuleManifest::load(&out.join("go.mod")).unwrap();
    assert!(!manifest.has_requirement("example.org/dep"));
    assert!(manifest.overrides().is_empty());
    assert!(manifest.has_requirement("example.org/other"));

    // placement, without the dependency's own manifest files
    assert!(out.join("vendor/example.org/dep/dep.go").is_file());
    assert!(out.join("vendor/example.org/dep/sub/sub.go").is_file());
    assert!(!out.join("vendor/example.org/dep/go.mod").exists());
    assert!(!out.join("vendor/example.org/dep/go.sum").exists());

    // no dangling references in Go sources
    assert!(dangling(&out, "example.org/dep").is_empty());
    let main = read(&out, "main.go");
    assert!(main.contains("\"example.org/app/vendor/example.org/dep\""));
    assert!(main.contains("\"example.org/app/vendor/example.org/dep/sub\""));
    assert!(main.contains("\"example.org/other\""));
    let dep = read(&out, "vendor/example.org/dep/dep.go");
    assert!(dep.contains("\"example.org/app/vendor/example.org/dep/sub\""));

    // files outside the source patterns are left alone
    assert_eq!(read(&out, "README.md"), "uses example.org/dep\n");

    // the source module is untouched
    assert!(read(root.path(), "app/main.go").contains("\"example.org/dep\""));
    assert!(read(root.path(), "app/go.mod").contains("replace"));

    assert_eq!(report.original_module, "example.org/app");
    assert_eq!(report.module_path, "example.org/app");
    assert_eq!(report.actions.len(), 1);
    let action = &report.actions[0];
    assert_eq!(action.origin, ActionOrigin::Override);
    assert_eq!(action.original_ref, "example.org/dep");
    assert_eq!(action.vendored_ref, "example.org/app/vendor/example.org/dep");
    assert_eq!(action.files, 3);
    assert!(report.files_rewritten >= 2);
}

#[test]
fn test_module_rename_without_dependencies() {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "app/go.mod", "module example.org/app\n\ngo 1.22\n");
    write(
        root.path(),
        "app/main.go",
        "package main\n\nimport \"example.org/app/internal/util\"\n\nfunc main() { util.Run() }\n",
    );
    write(
        root.path(),
        "app/internal/util/util.go",
        "package util\n\n// Package path: example.org/app/internal/util\nfunc Run() {}\n",
    );
    let mut opts = options(root.path());
    opts.new_module_name = Some("example.org/renamed".to_string());

    let report = Vendorer::new(opts).run().unwrap();
    let out = root.path().join("out");

    let manifest = ModuleManifest::load(&out.join("go.mod")).unwrap();
    assert_eq!(manifest.module_path(), "example.org/renamed");
    assert!(read(&out, "main.go").contains("\"example.org/renamed/internal/util\""));
    assert!(dangling(&out, "example.org/app").is_empty());
    assert!(!out.join("goven").exists());
    assert!(report.actions.is_empty());
    assert_eq!(report.module_path, "example.org/renamed");
}

#[test]
fn test_rename_applies_to_vendored_references() {
    let root = tempfile::tempdir().unwrap();
    create_override_project(root.path());
    let mut opts = options(root.path());
    opts.new_module_name = Some("example.org/app-vendored".to_string());

    let report = Vendorer::new(opts).run().unwrap();
    let out = root.path().join("out");

    let main = read(&out, "main.go");
    assert!(main.contains("\"example.org/app-vendored/goven/example.org/dep\""));
    assert!(dangling(&out, "example.org/app").is_empty());
    assert_eq!(
        report.actions[0].vendored_ref,
        "example.org/app-vendored/goven/example.org/dep"
    );
}

#[test]
fn test_prefix_sibling_module_is_not_rewritten() {
    let root = tempfile::tempdir().unwrap();
    write(
        root.path(),
        "app/go.mod",
        r#"module example.org/app

require (
	example.org/a v1.0.0
	example.org/ab v1.0.0
)

replace example.org/a => ../a
"#,
    );
    write(
        root.path(),
        "app/main.go",
        "package main\n\nimport (\n\t\"example.org/a\"\n\t\"example.org/ab\"\n)\n",
    );
    write(root.path(), "a/a.go", "package a\n");

    Vendorer::new(options(root.path())).run().unwrap();
    let out = root.path().join("out");

    let main = read(&out, "main.go");
    assert!(main.contains("\"example.org/app/goven/example.org/a\""));
    assert!(main.contains("\"example.org/ab\""));
    let manifest = ModuleManifest::load(&out.join("go.mod")).unwrap();
    assert!(manifest.has_requirement("example.org/ab"));
    assert!(!manifest.has_requirement("example.org/a"));
}

#[test]
fn test_vendoring_may_not_capture_kept_major_version() {
    let root = tempfile::tempdir().unwrap();
    write(
        root.path(),
        "app/go.mod",
        r#"module example.org/app

require (
	example.org/dep v1.0.0
	example.org/dep/v2 v2.0.0
)

replace example.org/dep => ../dep
"#,
    );
    write(
        root.path(),
        "app/main.go",
        "package main\n\nimport (\n\t\"example.org/dep\"\n\tv2 \"example.org/dep/v2\"\n)\n",
    );
    write(root.path(), "dep/dep.go", "package dep\n");

    let err = Vendorer::new(options(root.path())).run().unwrap_err();
    assert!(matches!(err, GovenError::Rename(_)), "{err}");
    assert!(err.to_string().contains("example.org/dep/v2"), "{err}");

    // nothing was vendored or rewritten
    let out = root.path().join("out");
    assert!(!out.join("goven").exists());
    assert!(read(&out, "main.go").contains("v2 \"example.org/dep/v2\""));
}

#[test]
fn test_exclude_of_vendored_module_is_dropped() {
    let root = tempfile::tempdir().unwrap();
    create_override_project(root.path());
    let manifest = read(root.path(), "app/go.mod");
    write(
        root.path(),
        "app/go.mod",
        &format!("{manifest}\nexclude example.org/dep v0.9.0\n\nexclude example.org/other v0.1.0\n"),
    );

    Vendorer::new(options(root.path())).run().unwrap();
    let saved = read(&root.path().join("out"), "go.mod");

    assert!(!saved.contains("example.org/dep v0.9.0"), "{saved}");
    assert!(saved.contains("exclude example.org/other v0.1.0"), "{saved}");
}

#[test]
fn test_required_modules_are_vendored_and_vendor_dir_removed() {
    let root = tempfile::tempdir().unwrap();
    write(
        root.path(),
        "app/go.mod",
        r#"module example.org/app

require (
	example.org/lib v1.2.0
	example.org/empty v0.1.0 // indirect
)
"#,
    );
    write(
        root.path(),
        "app/main.go",
        "package main\n\nimport \"example.org/lib/pkg\"\n\nfunc main() { pkg.Do() }\n",
    );
    write(root.path(), "app/vendor/modules.txt", "# example.org/lib v1.2.0\n");
    write(root.path(), "app/vendor/example.org/lib/pkg/pkg.go", "package pkg\n\nfunc Do() {}\n");
    let mut opts = options(root.path());
    opts.vendor_required = true;

    let report = Vendorer::new(opts).run().unwrap();
    let out = root.path().join("out");

    // cleanup
    assert!(!out.join("vendor").exists());
    assert!(root.path().join("app/vendor").is_dir());

    assert!(out.join("goven/example.org/lib/pkg/pkg.go").is_file());
    let manifest = ModuleManifest::load(&out.join("go.mod")).unwrap();
    assert!(manifest.requirements().is_empty());
    assert!(read(&out, "main.go").contains("\"example.org/app/goven/example.org/lib/pkg\""));
    assert_eq!(report.skipped, vec!["example.org/empty".to_string()]);
    assert_eq!(report.actions[0].origin, ActionOrigin::Requirement);
}

#[test]
fn test_non_local_override_is_left_without_required() {
    let root = tempfile::tempdir().unwrap();
    write(
        root.path(),
        "app/go.mod",
        "module example.org/app\n\nrequire example.org/x v1.0.0\n\nreplace example.org/x => example.org/fork v1.0.1\n",
    );
    write(root.path(), "app/main.go", "package main\n\nimport \"example.org/x\"\n");

    let report = Vendorer::new(options(root.path())).run().unwrap();
    let out = root.path().join("out");

    assert_eq!(report.skipped, vec!["example.org/x".to_string()]);
    let manifest = ModuleManifest::load(&out.join("go.mod")).unwrap();
    assert_eq!(manifest.overrides().len(), 1);
    assert!(read(&out, "main.go").contains("\"example.org/x\""));
}

#[test]
fn test_exclusions_and_ignored_paths() {
    let root = tempfile::tempdir().unwrap();
    create_override_project(root.path());
    write(root.path(), "app/testdata/fixture.go", "package testdata\n");
    let mut opts = options(root.path());
    opts.exclude_patterns = vec!["*_test.go".to_string()];
    opts.exclude_paths = vec!["testdata".to_string()];

    Vendorer::new(opts).run().unwrap();
    let out = root.path().join("out");

    assert!(!out.join("testdata").exists());
    assert!(out.join("goven/example.org/dep/dep.go").is_file());
    assert!(!out.join("goven/example.org/dep/dep_test.go").exists());
}

#[test]
fn test_in_place_run_rewrites_module() {
    let root = tempfile::tempdir().unwrap();
    create_override_project(root.path());
    let opts = VendorOptions {
        manifest_path: root.path().join("app/go.mod"),
        output_path: None,
        tidy: false,
        ..VendorOptions::default()
    };

    Vendorer::new(opts).run().unwrap();
    let app = root.path().join("app");

    assert!(app.join("goven/example.org/dep/dep.go").is_file());
    assert!(read(&app, "main.go").contains("\"example.org/app/goven/example.org/dep\""));
    assert!(!read(&app, "go.mod").contains("replace"));
}

#[test]
fn test_rewrite_is_idempotent_over_vendored_tree() {
    let root = tempfile::tempdir().unwrap();
    create_override_project(root.path());
    Vendorer::new(options(root.path())).run().unwrap();
    let out = root.path().join("out");

    let patterns = PatternSet::new(&["*.go"]).unwrap();
    let changed = rewrite::rewrite_references(
        &out,
        &patterns,
        "example.org/dep",
        "example.org/app/goven/example.org/dep",
        &TextRewriter,
    )
    .unwrap();
    assert!(changed.is_empty(), "{changed:?}");
}

#[test]
fn test_missing_override_directory_fails() {
    let root = tempfile::tempdir().unwrap();
    write(
        root.path(),
        "app/go.mod",
        "module example.org/app\n\nreplace example.org/gone => ../gone\n",
    );

    let err = Vendorer::new(options(root.path())).run().unwrap_err();
    assert!(matches!(err, GovenError::Precondition { .. }), "{err}");
}

#[test]
fn test_malformed_manifest_fails_with_line() {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "app/go.mod", "module example.org/app\nrequire (\n\tbroken\n)\n");

    let err = Vendorer::new(options(root.path())).run().unwrap_err();
    match err {
        GovenError::Parse { line, .. } => assert_eq!(line, 3),
        other => panic!("unexpected error: {other}"),
    }
}
