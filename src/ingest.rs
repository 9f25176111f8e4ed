//! Corpus ingestion.
//!
//! Lists the raw corpus directory (non-recursive, sorted by filename so
//! builds are deterministic), extracts each document's paragraphs and runs
//! the structural parser. A document that cannot be read is logged and
//! recorded in the [`IngestReport`]; the remaining documents are still
//! processed.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use walkdir::WalkDir;

use crate::extract::{read_paragraphs, SUPPORTED_EXTENSIONS};
use crate::models::LegalUnit;
use crate::parser::parse_document;
use crate::progress::{BuildProgressEvent, BuildProgressReporter};

/// Outcome for one successfully parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub file_name: String,
    pub units: usize,
}

/// A document skipped because it could not be read or extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    /// All units, in document order then parse order.
    pub units: Vec<LegalUnit>,
    pub documents: Vec<DocumentSummary>,
    pub failures: Vec<DocumentFailure>,
}

/// Supported source files directly under `dir`, sorted by filename.
pub fn list_corpus(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Corpus directory does not exist: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let supported = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if supported {
            files.push(entry.into_path());
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Extract and parse one document.
pub fn ingest_file(path: &Path) -> Result<Vec<LegalUnit>> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", path.display()))?;
    let lines = read_paragraphs(path)?;
    Ok(parse_document(file_name, &lines))
}

/// Parse every supported document in `dir`.
pub fn ingest_corpus(dir: &Path, progress: &dyn BuildProgressReporter) -> Result<IngestReport> {
    let files = list_corpus(dir)?;
    let total = files.len() as u64;
    info!(dir = %dir.display(), files = files.len(), "ingesting corpus");

    let mut report = IngestReport::default();
    for (i, path) in files.iter().enumerate() {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        progress.report(BuildProgressEvent::Parsing {
            file: file_name.clone(),
            n: i as u64 + 1,
            total,
        });

        match ingest_file(path) {
            Ok(units) => {
                info!(file = %file_name, units = units.len(), "parsed document");
                report.documents.push(DocumentSummary {
                    file_name,
                    units: units.len(),
                });
                report.units.extend(units);
            }
            Err(e) => {
                error!(file = %file_name, error = %e, "failed to parse document");
                report.failures.push(DocumentFailure {
                    file_name,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;

    const DECREE: &str = "CHÍNH PHỦ\nSố: 168/2024/NĐ-CP\nĐiều 6. Xử phạt người điều khiển xe ô tô\n1. Phạt tiền từ 400.000 đồng đến 600.000 đồng:\na) Không chấp hành hiệu lệnh\nb) Không có báo hiệu\n";

    #[test]
    fn lists_supported_files_sorted_non_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "x").unwrap();
        std::fs::write(dir.path().join("a.DOCX"), "x").unwrap();
        std::fs::write(dir.path().join("notes.pdf"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("c.txt"), "x").unwrap();

        let files = list_corpus(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.DOCX", "b.txt"]);
    }

    #[test]
    fn missing_corpus_dir_is_error() {
        assert!(list_corpus(Path::new("/nonexistent/raw")).is_err());
    }

    #[test]
    fn bad_file_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("168_2024_ND-CP.txt"), DECREE).unwrap();
        std::fs::write(dir.path().join("broken.docx"), b"not a zip").unwrap();

        let report = ingest_corpus(dir.path(), &NoProgress).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file_name, "broken.docx");
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].units, 3);
        assert_eq!(report.units.len(), 3);
        assert_eq!(
            report.units[0].citation(),
            "168/2024/NĐ-CP - Điều 6 Khoản 1"
        );
    }

    #[test]
    fn empty_corpus_yields_no_units() {
        let dir = tempfile::tempdir().unwrap();
        let report = ingest_corpus(dir.path(), &NoProgress).unwrap();
        assert!(report.units.is_empty());
        assert!(report.failures.is_empty());
    }
}
