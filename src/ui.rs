//! Terminal summary table.
//!
//! ```text
//!   ┌──────────────────┬────────────┬──────────────────────────────────────┐
//!   │ Module           │ Source     │ Vendored As                          │
//!   ├──────────────────┼────────────┼──────────────────────────────────────┤
//!   │ example.org/dep  │ ../dep     │ example.org/app/goven/example.org/dep│
//!   └──────────────────┴────────────┴──────────────────────────────────────┘
//! ```

use crate::vendor::{ActionOrigin, VendorReport};
use colored::*;
use console::{measure_text_width, truncate_str};

const MIN_COLUMN: usize = 8;

pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Rows with the wrong number of cells are ignored.
    pub fn add_row(&mut self, row: Vec<String>) {
        if row.len() == self.headers.len() {
            self.rows.push(row);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn print(&self) {
        let (_, width) = console::Term::stdout().size();
        print!("{}", self.render(width as usize));
    }

    /// Render to fit in `max_width` columns, shrinking the widest column first.
    pub fn render(&self, max_width: usize) -> String {
        if self.headers.is_empty() {
            return String::new();
        }
        let mut widths: Vec<usize> = self.headers.iter().map(|h| measure_text_width(h)).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(measure_text_width(cell));
            }
        }

        // indent + outer borders + " x │" per column
        let overhead = 3 + 3 * widths.len();
        while overhead + widths.iter().sum::<usize>() > max_width {
            let Some(widest) = widths
                .iter_mut()
                .filter(|w| **w > MIN_COLUMN)
                .max_by_key(|w| **w)
            else {
                break;
            };
            *widest -= 1;
        }

        let border = |left: &str, mid: &str, right: &str| {
            let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("  {}{}{}\n", left, segments.join(mid), right)
        };
        let line = |cells: &[String], bold: bool| {
            let mut out = String::from("  │");
            for (cell, &width) in cells.iter().zip(&widths) {
                let cell = cell.replace(['\n', '\r', '\t'], " ");
                let truncated = truncate_str(&cell, width, "...");
                let plain: &str = &truncated;
                let pad = width.saturating_sub(measure_text_width(plain));
                let shown = if bold {
                    plain.bold().to_string()
                } else {
                    plain.to_string()
                };
                out.push_str(&format!(" {}{} │", shown, " ".repeat(pad)));
            }
            out.push('\n');
            out
        };

        let mut out = border("┌", "┬", "┐");
        out.push_str(&line(&self.headers, true));
        out.push_str(&border("├", "┼", "┤"));
        for row in &self.rows {
            out.push_str(&line(row, false));
        }
        out.push_str(&border("└", "┴", "┘"));
        out
    }
}

/// Table of what a vendoring run copied.
pub fn vendor_summary(report: &VendorReport) -> Table {
    let mut table = Table::new(&["Module", "From", "Vendored As", "Files"]);
    for action in &report.actions {
        let from = match action.origin {
            ActionOrigin::Override => action.source_path.display().to_string(),
            ActionOrigin::Requirement => "vendor/".to_string(),
        };
        table.add_row(vec![
            action.original_ref.green().to_string(),
            from,
            action.vendored_ref.clone(),
            action.files.to_string(),
        ]);
    }
    table
}
