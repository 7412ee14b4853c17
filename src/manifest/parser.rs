use super::{ModuleManifest, ModuleVersion, Override, Requirement, is_local_path};
use crate::error::{GovenError, Result};
use std::path::Path;

/// Directives kept as raw text.
const VERBATIM: &[&str] = &["exclude", "retract", "godebug", "tool", "ignore"];

struct Line<'a> {
    number: usize,
    raw: &'a str,
    tokens: Vec<String>,
    comment: Option<String>,
}

pub(super) fn parse(path: &Path, text: &str) -> Result<ModuleManifest> {
    let err = |line: usize, message: String| GovenError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut lines = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let (tokens, comment) = tokenize(raw).map_err(|m| err(idx + 1, m))?;
        lines.push(Line {
            number: idx + 1,
            raw,
            tokens,
            comment,
        });
    }

    let mut manifest = ModuleManifest::default();
    let mut seen_module = false;
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        i += 1;
        if line.tokens.is_empty() {
            continue;
        }
        let keyword = line.tokens[0].as_str();
        let is_verbatim = VERBATIM.contains(&keyword);

        if line.tokens.len() == 2 && line.tokens[1] == "(" {
            let open = line;
            let mut raw_block = vec![open.raw.trim_end().to_string()];
            let mut closed = false;
            while i < lines.len() {
                let inner = &lines[i];
                i += 1;
                if inner.tokens.len() == 1 && inner.tokens[0] == ")" {
                    raw_block.push(")".to_string());
                    closed = true;
                    break;
                }
                if is_verbatim {
                    raw_block.push(inner.raw.trim_end().to_string());
                } else if !inner.tokens.is_empty() {
                    apply_entry(
                        &mut manifest,
                        &mut seen_module,
                        keyword,
                        &inner.tokens,
                        inner.comment.as_deref(),
                    )
                    .map_err(|m| err(inner.number, m))?;
                }
            }
            if !closed {
                return Err(err(open.number, format!("unterminated {} block", keyword)));
            }
            if is_verbatim {
                manifest.verbatim.push(raw_block.join("\n"));
            }
            continue;
        }

        if is_verbatim {
            manifest.verbatim.push(line.raw.trim().to_string());
            continue;
        }
        apply_entry(
            &mut manifest,
            &mut seen_module,
            keyword,
            &line.tokens[1..],
            line.comment.as_deref(),
        )
        .map_err(|m| err(line.number, m))?;
    }

    if !seen_module {
        return Err(err(1, "missing module statement".to_string()));
    }
    Ok(manifest)
}

fn apply_entry(
    manifest: &mut ModuleManifest,
    seen_module: &mut bool,
    keyword: &str,
    args: &[String],
    comment: Option<&str>,
) -> std::result::Result<(), String> {
    match keyword {
        "module" => {
            let [path] = args else {
                return Err("usage: module module/path".to_string());
            };
            if *seen_module {
                return Err("repeated module statement".to_string());
            }
            *seen_module = true;
            manifest.module_path = path.clone();
        }
        "go" => {
            let [version] = args else {
                return Err("usage: go 1.23".to_string());
            };
            manifest.go_version = Some(version.clone());
        }
        "toolchain" => {
            let [name] = args else {
                return Err("usage: toolchain go1.23.0".to_string());
            };
            manifest.toolchain = Some(name.clone());
        }
        "require" => {
            let [path, version] = args else {
                return Err("usage: require module/path v1.2.3".to_string());
            };
            check_version(version)?;
            if manifest.has_requirement(path) {
                return Err(format!("repeated requirement on {}", path));
            }
            let (indirect, note) = split_requirement_comment(comment);
            manifest.requirements.push(Requirement {
                path: path.clone(),
                version: version.clone(),
                indirect,
                note,
            });
        }
        "replace" => manifest.overrides.push(parse_override(args)?),
        other => return Err(format!("unknown directive: {}", other)),
    }
    Ok(())
}

fn parse_override(args: &[String]) -> std::result::Result<Override, String> {
    const USAGE: &str = "usage: replace module/path [v1.2.3] => other/module v1.4\n\t or replace module/path [v1.2.3] => ../local/directory";
    let arrow = args
        .iter()
        .position(|t| t == "=>")
        .ok_or_else(|| USAGE.to_string())?;
    let (old, new) = (&args[..arrow], &args[arrow + 1..]);

    let old = match old {
        [path] => ModuleVersion::new(path.clone(), None),
        [path, version] => {
            check_version(version)?;
            ModuleVersion::new(path.clone(), Some(version))
        }
        _ => return Err(USAGE.to_string()),
    };
    let new = match new {
        [path] => {
            if !is_local_path(path) {
                return Err(format!(
                    "replacement module without version must be directory path (rooted or starting with ./ or ../): {}",
                    path
                ));
            }
            ModuleVersion::new(path.clone(), None)
        }
        [path, version] => {
            if is_local_path(path) {
                return Err(format!(
                    "replacement directory cannot have a version: {} {}",
                    path, version
                ));
            }
            check_version(version)?;
            ModuleVersion::new(path.clone(), Some(version))
        }
        _ => return Err(USAGE.to_string()),
    };
    Ok(Override { old, new })
}

fn check_version(version: &str) -> std::result::Result<(), String> {
    if version.starts_with('v') && version.len() > 1 {
        Ok(())
    } else {
        Err(format!("invalid version \"{}\": must start with v", version))
    }
}

/// `// indirect; note` becomes `(true, Some("note"))`.
fn split_requirement_comment(comment: Option<&str>) -> (bool, Option<String>) {
    let Some(comment) = comment.map(str::trim) else {
        return (false, None);
    };
    let (indirect, note) = match comment.strip_prefix("indirect") {
        Some("") => (true, ""),
        Some(rest) if rest.starts_with(';') => (true, rest[1..].trim()),
        _ => (false, comment),
    };
    (indirect, (!note.is_empty()).then(|| note.to_string()))
}

/// Rewrite a raw `exclude` directive without its entries for `path`.
/// `None` when nothing matched; an empty string when no entry is left.
pub(super) fn strip_exclusion(raw: &str, path: &str) -> Option<String> {
    let mut lines = raw.lines();
    let first = lines.next()?;
    let (head, _) = tokenize(first).ok()?;
    if head.first().map(String::as_str) != Some("exclude") {
        return None;
    }
    let targets = |tokens: &[String]| tokens.first().is_some_and(|t| t == path);
    if head.get(1).map(String::as_str) != Some("(") {
        return targets(&head[1..]).then(String::new);
    }

    let mut kept = vec![first.to_string()];
    let mut entries = 0;
    let mut changed = false;
    for line in lines {
        let (tokens, _) = tokenize(line).ok()?;
        if targets(&tokens) {
            changed = true;
            continue;
        }
        if tokens.first().is_some_and(|t| t != ")") {
            entries += 1;
        }
        kept.push(line.to_string());
    }
    if !changed {
        return None;
    }
    Some(if entries == 0 { String::new() } else { kept.join("\n") })
}

/// Split a line into tokens and a trailing `//` comment.
fn tokenize(line: &str) -> std::result::Result<(Vec<String>, Option<String>), String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = line.char_indices().peekable();

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() {
            tokens.push(std::mem::take(current));
        }
    };

    while let Some((idx, c)) = chars.next() {
        match c {
            '/' if line[idx..].starts_with("//") => {
                flush(&mut current, &mut tokens);
                return Ok((tokens, Some(line[idx + 2..].to_string())));
            }
            '"' => {
                flush(&mut current, &mut tokens);
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, 'n')) => value.push('\n'),
                            Some((_, 't')) => value.push('\t'),
                            Some((_, other)) => value.push(other),
                            None => break,
                        },
                        other => value.push(other),
                    }
                }
                if !closed {
                    return Err("unterminated quoted string".to_string());
                }
                tokens.push(value);
            }
            '`' => {
                flush(&mut current, &mut tokens);
                let mut value = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '`' {
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
                if !closed {
                    return Err("unterminated raw string".to_string());
                }
                tokens.push(value);
            }
            '=' if matches!(chars.peek(), Some((_, '>'))) => {
                chars.next();
                flush(&mut current, &mut tokens);
                tokens.push("=>".to_string());
            }
            '(' | ')' => {
                flush(&mut current, &mut tokens);
                tokens.push(c.to_string());
            }
            c if c.is_whitespace() => flush(&mut current, &mut tokens),
            c => current.push(c),
        }
    }
    flush(&mut current, &mut tokens);
    Ok((tokens, None))
}
