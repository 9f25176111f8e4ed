//! Classification rules used by the structural parser.
//!
//! Every heuristic the parser relies on lives here as a standalone function:
//! document type from the filename, the citation root ("law name") from the
//! document's front matter, and the three structural line markers (article,
//! clause, point). The parser composes them; each is tested in isolation.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::DocType;

/// How many leading paragraphs are scanned for the document number line.
pub const LAW_NAME_SCAN_LINES: usize = 30;

/// `Điều 12. Title` / `Điều 12:` / `ĐIỀU 12`
static ARTICLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Điều\s+(\d+)[.:]?\s*(.*)$").unwrap());

/// `3. Clause text`
static CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\.\s+(.*)$").unwrap());

/// `a) Point text`, including the Vietnamese letter `đ`.
static POINT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^([a-zđ])\)\s+(.*)$").unwrap());

/// `Số: 168/2024/NĐ-CP` or `Luật số: 36/2024/QH15`
static LAW_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(Số|Luật số)[:\s]+(\d+[/\-].*)").unwrap());

/// `36_2024_qh15...` style statute filenames.
static STATUTE_FILE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+_\d+_qh").unwrap());

/// One row of the filename rule table: any matching needle selects the type.
struct DocTypeRule {
    doc_type: DocType,
    contains: &'static [&'static str],
    pattern: Option<&'static LazyLock<Regex>>,
}

static DOC_TYPE_RULES: &[DocTypeRule] = &[
    DocTypeRule {
        doc_type: DocType::Statute,
        contains: &["luat"],
        pattern: Some(&STATUTE_FILE_RE),
    },
    DocTypeRule {
        doc_type: DocType::Decree,
        contains: &["nd-cp", "nghi_dinh"],
        pattern: None,
    },
    DocTypeRule {
        doc_type: DocType::Circular,
        contains: &["tt-", "thong_tu"],
        pattern: None,
    },
];

/// Infer the document type from its filename. Rules are checked in order;
/// the first match wins.
pub fn classify_doc_type(file_name: &str) -> DocType {
    let name = file_name.to_lowercase();
    DOC_TYPE_RULES
        .iter()
        .find(|rule| {
            rule.contains.iter().any(|needle| name.contains(needle))
                || rule.pattern.is_some_and(|re| re.is_match(&name))
        })
        .map(|rule| rule.doc_type)
        .unwrap_or(DocType::Other)
}

/// Stable document identifier: the filename without its extension.
pub fn law_id(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string()
}

/// Find the document number line (`Số: ...` / `Luật số: ...`) in the front
/// matter and return it with the label removed.
pub fn detect_law_name(lines: &[String]) -> Option<String> {
    lines
        .iter()
        .take(LAW_NAME_SCAN_LINES)
        .map(|l| l.trim())
        .find(|l| LAW_NUMBER_RE.is_match(l))
        .map(|l| l.replace("Số:", "").replace("Luật số:", "").trim().to_string())
}

/// Citation root used when the front matter has no number line.
///
/// Decree filenames such as `168_2024_ND-CP` are rendered as
/// `Nghị định 168/2024/NĐ-CP`; anything else falls back to the id itself.
pub fn fallback_law_name(law_id: &str) -> String {
    if !law_id.to_lowercase().contains("nd-cp") {
        return law_id.to_string();
    }

    let mut parts = law_id.split('_');
    let number = parts.next().unwrap_or(law_id);
    match parts.next() {
        Some(year) if year.len() == 4 && year.chars().all(|c| c.is_ascii_digit()) => {
            format!("Nghị định {}/{}/NĐ-CP", number, year)
        }
        _ => format!("Nghị định {}/NĐ-CP", number),
    }
}

/// Resolve the citation root for a document.
pub fn law_name(law_id: &str, lines: &[String]) -> String {
    detect_law_name(lines).unwrap_or_else(|| fallback_law_name(law_id))
}

/// A matched article heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleMarker {
    pub id: String,
    /// Text after the number, possibly empty when the title wraps.
    pub remainder: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClauseMarker {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointMarker {
    /// Lowercased point letter.
    pub id: String,
    pub text: String,
}

pub fn match_article(line: &str) -> Option<ArticleMarker> {
    ARTICLE_RE.captures(line).map(|c| ArticleMarker {
        id: c[1].to_string(),
        remainder: c[2].trim().to_string(),
    })
}

pub fn match_clause(line: &str) -> Option<ClauseMarker> {
    CLAUSE_RE.captures(line).map(|c| ClauseMarker {
        id: c[1].to_string(),
        text: c[2].trim().to_string(),
    })
}

pub fn match_point(line: &str) -> Option<PointMarker> {
    POINT_RE.captures(line).map(|c| PointMarker {
        id: c[1].to_lowercase(),
        text: c[2].trim().to_string(),
    })
}

/// True if `line` opens no structure of its own, so a preceding article
/// heading may absorb it as the second line of a wrapped title.
pub fn is_title_continuation(line: &str) -> bool {
    match_article(line).is_none() && match_clause(line).is_none() && match_point(line).is_none()
}

/// Render the article title, `Điều <id>. <remainder>`.
pub fn article_title(id: &str, remainder: &str) -> String {
    if remainder.is_empty() {
        format!("Điều {}.", id)
    } else {
        format!("Điều {}. {}", id, remainder)
    }
}
