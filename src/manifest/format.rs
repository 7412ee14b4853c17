use super::{ModuleManifest, ModuleVersion, Requirement};

pub(super) fn render(manifest: &ModuleManifest) -> String {
    let mut out = format!("module {}\n", quote(&manifest.module_path));

    if let Some(go) = &manifest.go_version {
        out.push_str(&format!("\ngo {}\n", go));
    }
    if let Some(toolchain) = &manifest.toolchain {
        out.push_str(&format!("\ntoolchain {}\n", toolchain));
    }

    let (direct, indirect): (Vec<&Requirement>, Vec<&Requirement>) =
        manifest.requirements.iter().partition(|r| !r.indirect);
    write_section(&mut out, "require", direct.iter().map(|r| requirement_line(r)));
    write_section(&mut out, "require", indirect.iter().map(|r| requirement_line(r)));

    write_section(
        &mut out,
        "replace",
        manifest
            .overrides
            .iter()
            .map(|o| format!("{} => {}", module_version(&o.old), module_version(&o.new))),
    );

    for raw in &manifest.verbatim {
        out.push('\n');
        out.push_str(raw);
        out.push('\n');
    }
    out
}

fn write_section(out: &mut String, keyword: &str, entries: impl Iterator<Item = String>) {
    let entries: Vec<String> = entries.collect();
    match entries.as_slice() {
        [] => {}
        [single] => out.push_str(&format!("\n{} {}\n", keyword, single)),
        many => {
            out.push_str(&format!("\n{} (\n", keyword));
            for entry in many {
                out.push('\t');
                out.push_str(entry);
                out.push('\n');
            }
            out.push_str(")\n");
        }
    }
}

fn requirement_line(req: &Requirement) -> String {
    let line = format!("{} {}", quote(&req.path), req.version);
    match (req.indirect, &req.note) {
        (true, Some(note)) => format!("{} // indirect; {}", line, note),
        (true, None) => format!("{} // indirect", line),
        (false, Some(note)) => format!("{} // {}", line, note),
        (false, None) => line,
    }
}

fn module_version(mv: &ModuleVersion) -> String {
    match &mv.version {
        Some(v) => format!("{} {}", quote(&mv.path), v),
        None => quote(&mv.path),
    }
}

/// Quote a token when it would not survive re-tokenizing bare.
fn quote(token: &str) -> String {
    let needs_quotes = token.is_empty()
        || token.contains("//")
        || token.contains("=>")
        || token
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '`' | '(' | ')' | '\\'));
    if !needs_quotes {
        return token.to_string();
    }
    let mut quoted = String::with_capacity(token.len() + 2);
    quoted.push('"');
    for c in token.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
