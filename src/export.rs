//! Debug export of parsed units.
//!
//! Writes `processed_chunks.json` (every unit with its metadata) and
//! `processed_chunks.csv` (a spreadsheet-friendly overview) so the parser's
//! output can be inspected before indexing. Nothing downstream reads these
//! files.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::LegalUnit;

pub const JSON_FILE: &str = "processed_chunks.json";
pub const CSV_FILE: &str = "processed_chunks.csv";

const CSV_HEADER: [&str; 4] = ["Source File", "Article ID", "Content Preview", "Full Content"];

/// Characters of content shown in the CSV preview column.
const PREVIEW_CHARS: usize = 100;

/// UTF-8 byte order mark, so spreadsheet apps pick the right encoding.
const UTF8_BOM: &str = "\u{feff}";

/// Paths written by [`export_units`].
#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub json: PathBuf,
    pub csv: PathBuf,
}

pub fn export_units(units: &[LegalUnit], dir: &Path) -> Result<ExportPaths> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    let json = dir.join(JSON_FILE);
    std::fs::write(&json, serde_json::to_string_pretty(units)?)
        .with_context(|| format!("Failed to write {}", json.display()))?;

    let csv = dir.join(CSV_FILE);
    std::fs::write(&csv, render_csv(units))
        .with_context(|| format!("Failed to write {}", csv.display()))?;

    info!(units = units.len(), dir = %dir.display(), "wrote debug export");
    Ok(ExportPaths { json, csv })
}

fn render_csv(units: &[LegalUnit]) -> String {
    let mut out = String::from(UTF8_BOM);
    write_row(&mut out, &CSV_HEADER);
    for unit in units {
        let preview: String = unit
            .content
            .chars()
            .take(PREVIEW_CHARS)
            .collect::<String>()
            .replace('\n', " ");
        write_row(
            &mut out,
            &[
                unit.metadata.law_id.as_str(),
                unit.metadata.article.as_str(),
                preview.as_str(),
                unit.content.as_str(),
            ],
        );
    }
    out
}

fn write_row(out: &mut String, fields: &[&str]) {
    let row: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
    out.push_str(&row.join(","));
    out.push_str("\r\n");
}

/// Quote a field when it contains a delimiter, quote, or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
