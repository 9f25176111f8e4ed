//! Structural parser for Vietnamese legal documents.
//!
//! Turns a document's paragraph sequence into citation-addressable
//! [`LegalUnit`]s. The parser is a line-scan state machine over three
//! markers, checked in priority order on every line:
//!
//! 1. **Article** (`Điều N. Title`) closes the open clause and opens an
//!    article. A following line that is not itself a marker is treated as the
//!    second line of a wrapped title and consumed.
//! 2. **Clause** (`N. text`), only inside an article.
//! 3. **Point** (`a) text`), only inside a clause.
//!
//! Any other line continues the last point of the open clause, or the
//! clause's lead-in text when it has no points yet. Lines before the first
//! article (front matter) are ignored.
//!
//! Each clause is committed as one parent unit (the whole clause with every
//! point) plus one child unit per point (clause lead-in + that point).

use crate::classify::{self, article_title, is_title_continuation};
use crate::models::{DocType, LegalUnit, UnitMetadata, ALL_POINTS, INTRO_CLAUSE};

/// Separator between the document name and the article title in unit headers.
const HEADER_SEPARATOR: &str = " > ";

/// Document-level facts shared by every unit of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub doc_type: DocType,
    pub law_name: String,
    pub law_id: String,
}

impl DocumentInfo {
    /// Classify a document from its filename and front matter.
    pub fn classify(file_name: &str, lines: &[String]) -> Self {
        let law_id = classify::law_id(file_name);
        Self {
            doc_type: classify::classify_doc_type(file_name),
            law_name: classify::law_name(&law_id, lines),
            law_id,
        }
    }
}

#[derive(Debug)]
struct OpenArticle {
    id: String,
    title: String,
}

#[derive(Debug)]
struct OpenPoint {
    id: String,
    content: String,
}

#[derive(Debug)]
struct OpenClause {
    id: String,
    intro_lines: Vec<String>,
    points: Vec<OpenPoint>,
}

impl OpenClause {
    fn intro() -> Self {
        Self {
            id: INTRO_CLAUSE.to_string(),
            intro_lines: Vec::new(),
            points: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.intro_lines.is_empty() && self.points.is_empty()
    }
}

/// Per-document parse state. Dropped once the document's units are emitted.
struct ParseState<'a> {
    info: &'a DocumentInfo,
    article: Option<OpenArticle>,
    clause: Option<OpenClause>,
    units: Vec<LegalUnit>,
}

impl<'a> ParseState<'a> {
    fn new(info: &'a DocumentInfo) -> Self {
        Self {
            info,
            article: None,
            clause: None,
            units: Vec::new(),
        }
    }

    /// Commit the open clause (if any) as parent + child units.
    fn flush_clause(&mut self) {
        let Some(clause) = self.clause.take() else {
            return;
        };
        let Some(article) = &self.article else {
            return;
        };
        // An article heading followed directly by "1." leaves an empty lead-in.
        if clause.id == INTRO_CLAUSE && clause.is_empty() {
            return;
        }

        let header = format!("{}{}{}", self.info.law_name, HEADER_SEPARATOR, article.title);
        let clause_line = format!("Khoản {}: {}", clause.id, clause.intro_lines.join("\n"));
        let clause_citation = format!(
            "{} - Điều {} Khoản {}",
            self.info.law_name, article.id, clause.id
        );

        let mut parent_content = format!("{}\n{}", header, clause_line);
        for p in &clause.points {
            parent_content.push_str(&format!("\nĐiểm {}) {}", p.id, p.content));
        }
        let parent = LegalUnit {
            content: parent_content,
            metadata: unit_metadata(
                self.info,
                &article.id,
                &clause.id,
                ALL_POINTS,
                clause_citation.clone(),
                true,
            ),
        };
        self.units.push(parent);

        for p in &clause.points {
            let content = format!("{}\n{}\nĐiểm {}) {}", header, clause_line, p.id, p.content);
            let citation = format!("{} Điểm {}", clause_citation, p.id);
            let child = LegalUnit {
                content,
                metadata: unit_metadata(self.info, &article.id, &clause.id, &p.id, citation, false),
            };
            self.units.push(child);
        }
    }
}

fn unit_metadata(
    info: &DocumentInfo,
    article: &str,
    clause: &str,
    point: &str,
    citation: String,
    is_parent: bool,
) -> UnitMetadata {
    UnitMetadata {
        doc_type: info.doc_type,
        law_name: info.law_name.clone(),
        law_id: info.law_id.clone(),
        article: article.to_string(),
        clause: clause.to_string(),
        point: point.to_string(),
        citation,
        is_parent,
    }
}

/// Parse one document's paragraphs into legal units.
///
/// `lines` must already be trimmed with empty paragraphs removed (see
/// [`crate::extract`]). The output depends only on the inputs, so parsing
/// the same document twice yields identical units.
pub fn parse_document(file_name: &str, lines: &[String]) -> Vec<LegalUnit> {
    let info = DocumentInfo::classify(file_name, lines);
    parse_with_info(&info, lines)
}

/// Parse with pre-computed document facts.
pub fn parse_with_info(info: &DocumentInfo, lines: &[String]) -> Vec<LegalUnit> {
    let mut state = ParseState::new(info);
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].as_str();
        i += 1;

        if let Some(article) = classify::match_article(line) {
            state.flush_clause();

            let mut title = article_title(&article.id, &article.remainder);
            if let Some(next) = lines.get(i) {
                if is_title_continuation(next) {
                    title.push(' ');
                    title.push_str(next);
                    i += 1;
                }
            }

            state.article = Some(OpenArticle {
                id: article.id,
                title,
            });
            state.clause = Some(OpenClause::intro());
            continue;
        }

        if state.article.is_none() {
            continue;
        }

        if let Some(clause) = classify::match_clause(line) {
            state.flush_clause();
            state.clause = Some(OpenClause {
                id: clause.id,
                intro_lines: vec![clause.text],
                points: Vec::new(),
            });
            continue;
        }

        let Some(open) = state.clause.as_mut() else {
            continue;
        };

        if let Some(point) = classify::match_point(line) {
            open.points.push(OpenPoint {
                id: point.id,
                content: point.text,
            });
            continue;
        }

        match open.points.last_mut() {
            Some(last) => {
                last.content.push(' ');
                last.content.push_str(line);
            }
            None => open.intro_lines.push(line.to_string()),
        }
    }

    state.flush_clause();
    state.units
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn sample_decree() -> Vec<String> {
        lines(&[
            "CHÍNH PHỦ",
            "Số: 168/2024/NĐ-CP",
            "NGHỊ ĐỊNH",
            "Điều 6. Xử phạt người điều khiển xe ô tô",
            "1. Phạt tiền từ 400.000 đồng đến 600.000 đồng đối với người điều khiển xe thực hiện một trong các hành vi vi phạm sau đây:",
            "a) Không chấp hành hiệu lệnh, chỉ dẫn của biển báo hiệu,",
            "vạch kẻ đường;",
            "b) Không báo hiệu bằng đèn khẩn cấp;",
            "2. Phạt tiền từ 800.000 đồng đến 1.000.000 đồng đối với hành vi dừng xe không đúng quy định.",
            "Điều 7.",
            "XỬ PHẠT NGƯỜI ĐIỀU KHIỂN XE MÔ TÔ",
            "1. Phạt tiền đối với hành vi không đội mũ bảo hiểm.",
        ])
    }

    #[test]
    fn emits_parent_and_children_in_order() {
        let units = parse_document("168_2024_ND-CP.docx", &sample_decree());
        let citations: Vec<&str> = units.iter().map(|u| u.citation()).collect();
        assert_eq!(
            citations,
            vec![
                "168/2024/NĐ-CP - Điều 6 Khoản 1",
                "168/2024/NĐ-CP - Điều 6 Khoản 1 Điểm a",
                "168/2024/NĐ-CP - Điều 6 Khoản 1 Điểm b",
                "168/2024/NĐ-CP - Điều 6 Khoản 2",
                "168/2024/NĐ-CP - Điều 7 Khoản 1",
            ]
        );
    }

    #[test]
    fn parent_content_has_header_clause_and_points() {
        let units = parse_document("168_2024_ND-CP.docx", &sample_decree());
        let parent = &units[0];
        assert!(parent.metadata.is_parent);
        assert_eq!(parent.metadata.point, "all");
        assert_eq!(parent.metadata.doc_type, DocType::Decree);
        assert_eq!(parent.metadata.law_id, "168_2024_ND-CP");
        let content_lines: Vec<&str> = parent.content.lines().collect();
        assert_eq!(
            content_lines[0],
            "168/2024/NĐ-CP > Điều 6. Xử phạt người điều khiển xe ô tô"
        );
        assert!(content_lines[1].starts_with("Khoản 1: Phạt tiền từ 400.000"));
        assert_eq!(
            content_lines[2],
            "Điểm a) Không chấp hành hiệu lệnh, chỉ dẫn của biển báo hiệu, vạch kẻ đường;"
        );
        assert_eq!(content_lines[3], "Điểm b) Không báo hiệu bằng đèn khẩn cấp;");
    }

    #[test]
    fn child_content_has_single_point() {
        let units = parse_document("168_2024_ND-CP.docx", &sample_decree());
        let child = &units[2];
        assert!(!child.metadata.is_parent);
        assert_eq!(child.metadata.point, "b");
        assert_eq!(child.metadata.clause, "1");
        assert!(child.content.contains("Khoản 1: Phạt tiền"));
        assert!(child.content.ends_with("Điểm b) Không báo hiệu bằng đèn khẩn cấp;"));
        assert!(!child.content.contains("Điểm a)"));
    }

    #[test]
    fn wrapped_article_title_is_absorbed() {
        let doc = lines(&["Điều 5.", "QUY ĐỊNH CHUNG", "1. Nội dung..."]);
        let units = parse_document("luat_test.docx", &doc);
        assert_eq!(units.len(), 1);
        assert!(units[0]
            .content
            .starts_with("luat_test > Điều 5. QUY ĐỊNH CHUNG\nKhoản 1: Nội dung..."));
        assert!(!units[0].content.contains("Khoản intro"));
    }

    #[test]
    fn clause_without_points_yields_parent_only() {
        let units = parse_document("168_2024_ND-CP.docx", &sample_decree());
        let clause2: Vec<_> = units
            .iter()
            .filter(|u| u.metadata.article == "6" && u.metadata.clause == "2")
            .collect();
        assert_eq!(clause2.len(), 1);
        assert!(clause2[0].metadata.is_parent);
    }

    #[test]
    fn front_matter_is_discarded() {
        let units = parse_document("168_2024_ND-CP.docx", &sample_decree());
        assert!(units.iter().all(|u| !u.content.contains("CHÍNH PHỦ")));
    }

    #[test]
    fn intro_text_becomes_intro_clause() {
        let doc = lines(&[
            "Điều 3. Giải thích từ ngữ",
            "Trong Nghị định này, các từ ngữ dưới đây được hiểu như sau:",
            "1. Xe cơ giới là phương tiện giao thông.",
        ]);
        let units = parse_document("nghi_dinh_x.docx", &doc);
        // The second line is absorbed into the title by the continuation rule.
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].metadata.clause, "1");

        let doc = lines(&[
            "Điều 3. Giải thích từ ngữ",
            "1. Xe cơ giới là phương tiện giao thông.",
            "Điều 4. Hiệu lực thi hành",
            "Nghị định này có hiệu lực từ ngày ký.",
            "Các quy định trước đây bị bãi bỏ.",
        ]);
        let units = parse_document("nghi_dinh_x.docx", &doc);
        let last = units.last().unwrap();
        assert_eq!(last.metadata.article, "4");
        assert_eq!(last.metadata.clause, "intro");
        assert_eq!(last.metadata.citation, "nghi_dinh_x - Điều 4 Khoản intro");
        assert!(last.content.ends_with("Khoản intro: Các quy định trước đây bị bãi bỏ."));
    }

    #[test]
    fn intro_points_before_first_clause() {
        let doc = lines(&[
            "Điều 9. Các hành vi bị nghiêm cấm",
            "Nghiêm cấm các hành vi sau:",
            "a) Đua xe trái phép;",
            "b) Chống người thi hành công vụ.",
        ]);
        let units = parse_document("luat_x.docx", &doc);
        // "Nghiêm cấm..." is the title continuation, the points hang off the intro clause.
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].metadata.citation, "luat_x - Điều 9 Khoản intro");
        assert_eq!(units[1].metadata.citation, "luat_x - Điều 9 Khoản intro Điểm a");
    }

    #[test]
    fn points_outside_article_are_ignored() {
        let doc = lines(&["a) Không thuộc điều nào", "1. Cũng không"]);
        assert!(parse_document("x.docx", &doc).is_empty());
    }

    #[test]
    fn parsing_is_idempotent() {
        let doc = sample_decree();
        let first = parse_document("168_2024_ND-CP.docx", &doc);
        let second = parse_document("168_2024_ND-CP.docx", &doc);
        assert_eq!(first, second);
    }

    #[test]
    fn every_child_has_a_parent() {
        let units = parse_document("168_2024_ND-CP.docx", &sample_decree());
        for child in units.iter().filter(|u| u.metadata.point != "all") {
            assert!(units.iter().any(|p| p.metadata.point == "all"
                && p.metadata.is_parent
                && p.metadata.article == child.metadata.article
                && p.metadata.clause == child.metadata.clause));
        }
    }

    #[test]
    fn citations_are_unique_within_document() {
        let units = parse_document("168_2024_ND-CP.docx", &sample_decree());
        let citations: HashSet<&str> = units.iter().map(|u| u.citation()).collect();
        assert_eq!(citations.len(), units.len());
    }

    #[test]
    fn decree_fallback_name_used_without_number_line() {
        let doc = lines(&["Điều 1. Phạm vi", "1. Nội dung."]);
        let units = parse_document("100_2019_ND-CP.docx", &doc);
        assert_eq!(units[0].metadata.law_name, "Nghị định 100/2019/NĐ-CP");
        assert_eq!(units[0].citation(), "Nghị định 100/2019/NĐ-CP - Điều 1 Khoản 1");
    }
}
