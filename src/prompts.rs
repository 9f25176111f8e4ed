//! Prompt text sent to the completion model.

use crate::models::ScoredUnit;

/// System instruction for rewriting a lay question into statutory wording.
pub const QUERY_REWRITE_SYSTEM: &str = "Bạn là chuyên gia pháp lý. Nhiệm vụ của bạn là viết lại câu hỏi của người dùng thành một câu truy vấn tìm kiếm chuẩn xác trong văn bản luật.
- Dùng từ ngữ chuyên ngành (Ví dụ: \"vượt đèn đỏ\" -> \"không chấp hành hiệu lệnh của đèn tín hiệu giao thông\").
- Giữ nguyên ý định tìm mức phạt hoặc hành vi.
- Chỉ trả về câu viết lại, không giải thích gì thêm.";

const ANSWER_SYSTEM_TEMPLATE: &str = "Bạn là Trợ lý Luật Giao thông AI.
Sử dụng thông tin sau để trả lời câu hỏi.
- Trích dẫn chính xác (Nghị định, Điều, Khoản).
- Nếu không có thông tin, hãy nói không biết.

CONTEXT:
{context}
";

/// Returned verbatim when retrieval and reranking leave nothing to cite.
pub const NO_RESULT_MESSAGE: &str = "Xin lỗi, không tìm thấy tài liệu liên quan.";

/// User turn for the rewrite call.
pub fn rewrite_user_message(question: &str) -> String {
    format!("Câu hỏi: {}", question)
}

/// System instruction for the answer call, with the context embedded.
pub fn answer_system(context: &str) -> String {
    ANSWER_SYSTEM_TEMPLATE.replace("{context}", context)
}

/// Render ranked units as numbered context blocks:
/// `[1] <citation>: <content on one line>`, each followed by a blank line.
pub fn format_context(sources: &[ScoredUnit]) -> String {
    let mut out = String::new();
    for (i, scored) in sources.iter().enumerate() {
        let content = scored.unit.content.replace('\n', " ");
        out.push_str(&format!("[{}] {}: {}\n\n", i + 1, scored.unit.citation(), content));
    }
    out
}
