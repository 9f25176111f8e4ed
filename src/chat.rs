//! Interactive question loop.

use anyhow::Result;
use std::io::{BufRead, Write};
use tracing::error;

use crate::engine::{Answer, Engine};

const EXIT_WORDS: &[&str] = &["exit", "quit", "thoát"];

pub fn is_exit(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    EXIT_WORDS.contains(&input.as_str())
}

/// Render an answer followed by up to `max_sources` numbered citations.
pub fn render_answer(answer: &Answer, max_sources: usize) -> String {
    let mut out = format!("\n{}\n", answer.text);
    if !answer.sources.is_empty() && max_sources > 0 {
        out.push_str("\nNguồn tham khảo:\n");
        for (i, source) in answer.sources.iter().take(max_sources).enumerate() {
            out.push_str(&format!(
                "  {}. {} (score: {:.4})\n",
                i + 1,
                source.unit.citation(),
                source.rerank_score
            ));
        }
    }
    out
}

/// Read questions from `input` until EOF or an exit word, answering each.
///
/// A failed question is reported and the loop keeps going.
pub async fn run_chat<R: BufRead, W: Write>(
    engine: &Engine,
    mut input: R,
    mut output: W,
    max_sources: usize,
) -> Result<()> {
    writeln!(output, "Hỏi đáp luật giao thông. Gõ 'exit' để thoát.")?;

    loop {
        write!(output, "\n> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        if is_exit(&line) {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        match engine.ask(question).await {
            Ok(answer) => write!(output, "{}", render_answer(&answer, max_sources))?,
            Err(e) => {
                error!(error = %e, "question failed");
                writeln!(output, "Lỗi: {:#}", e)?;
            }
        }
    }

    Ok(())
}
