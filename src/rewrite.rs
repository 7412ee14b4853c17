//! Module reference rewriting across a source tree.
//!
//! A reference `example.org/a` only matches at module-path segment boundaries:
//! it is not preceded by a path character and not followed by a segment
//! character. That keeps `example.org/ab` and `other.org/example.org/a` intact
//! and makes a rewrite to `<module>/<vendor>/example.org/a` idempotent.
//!
//! Renames are collected into a [`RenamePlan`] and applied longest reference
//! first. [`RenamePlan::validate`] rejects plans where one rewrite would feed
//! another.

use crate::error::{GovenError, Result};
use crate::materialize::PatternSet;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

/// Replaces references to one module path with another inside a single file.
pub trait ReferenceRewriter {
    /// Returns the new content, or `None` if nothing matched.
    fn rewrite(&self, content: &str, from: &str, to: &str) -> Option<String>;
}

/// Whole-file substitution at segment boundaries. Syntax-unaware: references
/// inside comments and string literals are rewritten as well.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRewriter;

impl ReferenceRewriter for TextRewriter {
    fn rewrite(&self, content: &str, from: &str, to: &str) -> Option<String> {
        replace_at_boundaries(content, from, to)
    }
}

/// Rewrites only the quoted paths of Go `import` declarations.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImportRewriter;

static IMPORT_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"\\]*)"|`([^`]*)`"#).expect("import literal regex"));

impl ReferenceRewriter for ImportRewriter {
    fn rewrite(&self, content: &str, from: &str, to: &str) -> Option<String> {
        let mut out = String::with_capacity(content.len());
        let mut changed = false;
        let mut in_block = false;
        let mut consumed = 0;

        for line in content.split_inclusive('\n') {
            consumed += line.len();
            let trimmed = line.trim_start();
            let (code, comment) = split_comment(line);

            if in_block {
                if code.contains(')') {
                    in_block = false;
                }
            } else if let Some(rest) = strip_keyword(trimmed, "import") {
                if rest.trim_start().starts_with('(') && !code.contains(')') {
                    in_block = true;
                }
            } else {
                if ["func ", "type ", "var ", "const "]
                    .iter()
                    .any(|kw| line.starts_with(kw))
                {
                    // imports always precede the first declaration
                    out.push_str(&content[consumed - line.len()..]);
                    break;
                }
                out.push_str(line);
                continue;
            }

            let rewritten = rewrite_import_literals(code, from, to);
            if rewritten != code {
                changed = true;
            }
            out.push_str(&rewritten);
            out.push_str(comment);
        }

        changed.then_some(out)
    }
}

fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    match rest.chars().next() {
        Some(c) if c.is_whitespace() || c == '(' || c == '"' || c == '`' => Some(rest),
        _ => None,
    }
}

// import paths never contain "//", so the first one starts a comment
fn split_comment(line: &str) -> (&str, &str) {
    match line.find("//") {
        Some(idx) => line.split_at(idx),
        None => (line, ""),
    }
}

fn rewrite_import_literals(code: &str, from: &str, to: &str) -> String {
    IMPORT_LITERAL
        .replace_all(code, |caps: &regex::Captures| {
            let (quote, value) = match (caps.get(1), caps.get(2)) {
                (Some(m), _) => ('"', m.as_str()),
                (_, Some(m)) => ('`', m.as_str()),
                _ => return caps[0].to_string(),
            };
            match value.strip_prefix(from) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                    format!("{quote}{to}{rest}{quote}")
                }
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Which rewriter a run uses.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RewriteMode {
    /// Boundary-aware substitution over the whole file
    #[default]
    Text,
    /// Only import declarations
    Imports,
}

impl RewriteMode {
    pub fn rewriter(self) -> Box<dyn ReferenceRewriter> {
        match self {
            Self::Text => Box::new(TextRewriter),
            Self::Imports => Box::new(ImportRewriter),
        }
    }
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '~' | '/')
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '~')
}

/// Byte offsets of every non-overlapping boundary match of `reference`.
pub fn find_references(text: &str, reference: &str) -> Vec<usize> {
    if reference.is_empty() {
        return Vec::new();
    }
    let mut found = Vec::new();
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find(reference) {
        let start = search_from + rel;
        let end = start + reference.len();
        let before_ok = text[..start].chars().next_back().is_none_or(|c| !is_path_char(c));
        let after_ok = text[end..].chars().next().is_none_or(|c| !is_segment_char(c));
        if before_ok && after_ok {
            found.push(start);
            search_from = end;
        } else {
            // advance one char to keep slicing on a char boundary
            let step = text[start..].chars().next().map_or(1, char::len_utf8);
            search_from = start + step;
        }
    }
    found
}

/// Replace every boundary match of `from` with `to`; `None` when nothing matched.
pub fn replace_at_boundaries(text: &str, from: &str, to: &str) -> Option<String> {
    let hits = find_references(text, from);
    if hits.is_empty() {
        return None;
    }
    let mut out = String::with_capacity(text.len() + hits.len() * to.len());
    let mut last = 0;
    for start in hits {
        out.push_str(&text[last..start]);
        out.push_str(to);
        last = start + from.len();
    }
    out.push_str(&text[last..]);
    Some(out)
}

/// True when `reference` is `namespace` itself or a package below it.
pub fn in_namespace(reference: &str, namespace: &str) -> bool {
    reference
        .strip_prefix(namespace)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Rewrite `from` to `to` in every file under `root` whose name matches
/// `patterns`. Files are only written when their content changes. Returns the
/// changed files.
pub fn rewrite_references(
    root: &Path,
    patterns: &PatternSet,
    from: &str,
    to: &str,
    rewriter: &dyn ReferenceRewriter,
) -> Result<Vec<PathBuf>> {
    let mut changed = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if !patterns.matches(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let path = entry.path();
        let content = fs::read_to_string(path).map_err(|e| GovenError::io("read file", path, e))?;
        if let Some(rewritten) = rewriter.rewrite(&content, from, to)
            && rewritten != content
        {
            fs::write(path, rewritten).map_err(|e| GovenError::io("write file", path, e))?;
            changed.push(path.to_path_buf());
        }
    }
    Ok(changed)
}

/// One `from -> to` module reference rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// Ordered set of renames applied as one sweep.
#[derive(Debug, Clone, Default)]
pub struct RenamePlan {
    renames: Vec<Rename>,
}

impl RenamePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, from: impl Into<String>, to: impl Into<String>) -> Result<()> {
        let (from, to) = (from.into(), to.into());
        if from.is_empty() {
            return Err(GovenError::Rename("empty module reference".to_string()));
        }
        if let Some(existing) = self.renames.iter().find(|r| r.from == from) {
            if existing.to == to {
                return Ok(());
            }
            return Err(GovenError::Rename(format!(
                "\"{}\" is renamed to both \"{}\" and \"{}\"",
                from, existing.to, to
            )));
        }
        if from != to {
            self.renames.push(Rename { from, to });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    /// Renames in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Rename> {
        self.renames.iter()
    }

    /// Renames in application order: longest `from` first, insertion order on ties.
    pub fn ordered(&self) -> Vec<&Rename> {
        let mut ordered: Vec<&Rename> = self.renames.iter().collect();
        ordered.sort_by(|a, b| b.from.len().cmp(&a.from.len()));
        ordered
    }

    pub fn validate(&self) -> Result<()> {
        let ordered = self.ordered();
        for rename in &ordered {
            if !find_references(&rename.to, &rename.from).is_empty() {
                return Err(GovenError::Rename(format!(
                    "\"{}\" would be rewritten to \"{}\", which is inside its own namespace",
                    rename.from, rename.to
                )));
            }
        }
        for (i, earlier) in ordered.iter().enumerate() {
            for later in &ordered[i + 1..] {
                if !find_references(&earlier.to, &later.from).is_empty() {
                    return Err(GovenError::Rename(format!(
                        "\"{}\" (rewritten from \"{}\") would be rewritten again by \"{}\"",
                        earlier.to, earlier.from, later.from
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate, then apply every rename under `root`. Returns the changed
    /// files, without duplicates, in first-changed order.
    pub fn apply(
        &self,
        root: &Path,
        patterns: &PatternSet,
        rewriter: &dyn ReferenceRewriter,
    ) -> Result<Vec<PathBuf>> {
        self.validate()?;
        let mut changed: Vec<PathBuf> = Vec::new();
        for rename in self.ordered() {
            for path in rewrite_references(root, patterns, &rename.from, &rename.to, rewriter)? {
                if !changed.contains(&path) {
                    changed.push(path);
                }
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"package main

import (
	"fmt"

	"example.org/a"
	ab "example.org/ab/util"
	"example.org/a/sub"
)

// uses example.org/a for things
func main() {
	fmt.Println("example.org/a")
}
"#;

    #[test]
    fn test_boundaries_skip_longer_paths() {
        let out = replace_at_boundaries(SOURCE, "example.org/a", "m/vendor/example.org/a").unwrap();
        assert!(out.contains("\"m/vendor/example.org/a\"\n"));
        assert!(out.contains("\"m/vendor/example.org/a/sub\""));
        assert!(out.contains("\"example.org/ab/util\""));
        assert!(out.contains("// uses m/vendor/example.org/a for things"));
    }

    #[test]
    fn test_text_rewrite_is_idempotent() {
        let once = TextRewriter
            .rewrite(SOURCE, "example.org/a", "m/vendor/example.org/a")
            .unwrap();
        assert!(
            TextRewriter
                .rewrite(&once, "example.org/a", "m/vendor/example.org/a")
                .is_none()
        );
    }

    #[test]
    fn test_no_match_returns_none() {
        assert!(replace_at_boundaries("package x", "example.org/a", "b").is_none());
        assert!(replace_at_boundaries("example.org/abc", "example.org/a", "b").is_none());
    }

    #[test]
    fn test_import_rewriter_leaves_code_alone() {
        let out = ImportRewriter
            .rewrite(SOURCE, "example.org/a", "m/vendor/example.org/a")
            .unwrap();
        assert!(out.contains("\t\"m/vendor/example.org/a\"\n"));
        assert!(out.contains("\t\"m/vendor/example.org/a/sub\"\n"));
        assert!(out.contains("ab \"example.org/ab/util\""));
        assert!(out.contains("fmt.Println(\"example.org/a\")"));
        assert!(out.contains("// uses example.org/a for things"));
    }

    #[test]
    fn test_import_rewriter_single_line_import() {
        let src = "package x\n\nimport d \"example.org/d/pkg\" // keep example.org/d\n\nvar _ = d.X\n";
        let out = ImportRewriter.rewrite(src, "example.org/d", "m/v/example.org/d").unwrap();
        assert_eq!(
            out,
            "package x\n\nimport d \"m/v/example.org/d/pkg\" // keep example.org/d\n\nvar _ = d.X\n"
        );
    }

    #[test]
    fn test_import_rewriter_stops_at_first_declaration() {
        let src = "package x\n\nfunc f() {}\n\nimport \"example.org/d\"\n";
        assert!(ImportRewriter.rewrite(src, "example.org/d", "y").is_none());
    }

    #[test]
    fn test_plan_orders_longest_first() {
        let mut plan = RenamePlan::new();
        plan.push("example.org/a", "m/v/example.org/a").unwrap();
        plan.push("example.org/a/sub", "m/v/example.org/a/sub").unwrap();
        let ordered: Vec<&str> = plan.ordered().iter().map(|r| r.from.as_str()).collect();
        assert_eq!(ordered, vec!["example.org/a/sub", "example.org/a"]);
        plan.validate().unwrap();
    }

    #[test]
    fn test_plan_rejects_conflicting_targets() {
        let mut plan = RenamePlan::new();
        plan.push("a.org/x", "m/v/a.org/x").unwrap();
        plan.push("a.org/x", "m/v/a.org/x").unwrap();
        assert!(plan.push("a.org/x", "elsewhere").is_err());
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_plan_rejects_self_nested_target() {
        let mut plan = RenamePlan::new();
        plan.push("example.org/repo", "example.org/repo/cmd/v/example.org/repo")
            .unwrap();
        assert!(matches!(plan.validate(), Err(GovenError::Rename(_))));
    }

    #[test]
    fn test_plan_rejects_chained_rewrites() {
        let mut plan = RenamePlan::new();
        // the longer rename runs first and produces a reference the shorter one matches
        plan.push("other.org/long/name", "a.org/x/moved").unwrap();
        plan.push("a.org/x", "m/v/a.org/x").unwrap();
        assert!(matches!(plan.validate(), Err(GovenError::Rename(_))));
    }

    #[test]
    fn test_in_namespace() {
        assert!(in_namespace("example.org/a", "example.org/a"));
        assert!(in_namespace("example.org/a/b", "example.org/a"));
        assert!(!in_namespace("example.org/ab", "example.org/a"));
    }

    #[test]
    fn test_rewrite_references_only_touches_matching_files() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("main.go"), "import \"example.org/d\"\n").unwrap();
        fs::write(root.path().join("README.md"), "example.org/d\n").unwrap();
        let patterns = PatternSet::new(&["*.go"]).unwrap();

        let changed = rewrite_references(
            root.path(),
            &patterns,
            "example.org/d",
            "m/goven/example.org/d",
            &TextRewriter,
        )
        .unwrap();

        assert_eq!(changed, vec![root.path().join("main.go")]);
        assert_eq!(
            fs::read_to_string(root.path().join("README.md")).unwrap(),
            "example.org/d\n"
        );

        let again = rewrite_references(
            root.path(),
            &patterns,
            "example.org/d",
            "m/goven/example.org/d",
            &TextRewriter,
        )
        .unwrap();
        assert!(again.is_empty());
    }
}
