// src/llm/parse.rs

//! Turning free-form model output into typed values.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    llm::LlmError,
    models::question::{Difficulty, QuestionDraft},
    utils::html::clean_html,
};

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*\n?(.*?)```").expect("code fence pattern is valid")
});

static DIFFICULTY_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(easy|medium|hard)\b").expect("difficulty pattern is valid"));

/// Models like to wrap JSON in markdown fences or a sentence of preamble.
/// Returns the fenced body if there is one, else the span from the first
/// `[` or `{` to the matching last bracket.
pub fn extract_json(text: &str) -> &str {
    if let Some(body) = CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        return body.as_str().trim();
    }

    let start = text.find(['[', '{']);
    let end = text.rfind([']', '}']);
    match (start, end) {
        (Some(s), Some(e)) if e > s => &text[s..=e],
        _ => text.trim(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DraftEnvelope {
    List(Vec<Value>),
    Wrapped { questions: Vec<Value> },
}

/// Drafts read from model output plus the number of entries that did not
/// deserialize as a question.
#[derive(Debug)]
pub struct ParsedDrafts {
    pub drafts: Vec<QuestionDraft>,
    pub rejected: usize,
}

/// Parses question drafts from model output. Each entry is read on its own,
/// so one malformed draft does not sink the batch. Free-text fields are
/// sanitized; answer-key consistency is left to `QuestionDraft::check`.
pub fn parse_drafts(text: &str) -> Result<ParsedDrafts, LlmError> {
    let json = extract_json(text);
    let envelope: DraftEnvelope = serde_json::from_str(json)
        .map_err(|e| LlmError::Malformed(format!("expected a JSON array of questions: {}", e)))?;

    let entries = match envelope {
        DraftEnvelope::List(list) => list,
        DraftEnvelope::Wrapped { questions } => questions,
    };

    let total = entries.len();
    let drafts: Vec<QuestionDraft> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<QuestionDraft>(entry) {
            Ok(draft) => Some(draft.sanitized()),
            Err(e) => {
                tracing::debug!(error = %e, "dropping unreadable question draft");
                None
            }
        })
        .collect();

    Ok(ParsedDrafts {
        rejected: total - drafts.len(),
        drafts,
    })
}

/// First difficulty word in the output.
pub fn parse_difficulty(text: &str) -> Result<Difficulty, LlmError> {
    DIFFICULTY_WORD
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| LlmError::Malformed(format!("no difficulty level in '{}'", text.trim())))
}

/// Plain-text replies: drop fences and surrounding quotes, then sanitize.
pub fn clean_text(text: &str) -> String {
    let body = CODE_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str());
    let trimmed = body.trim();
    // Only a quote pair wrapping the whole reply is dropped.
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    clean_html(unquoted.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Answer, QuestionType};

    #[test]
    fn extracts_fenced_json() {
        let text = "Here you go:\n```json\n[{\"a\": 1}]\n```\nEnjoy!";
        assert_eq!(extract_json(text), "[{\"a\": 1}]");
    }

    #[test]
    fn extracts_bare_json_with_preamble() {
        let text = "Sure! [1, 2, 3] Hope that helps.";
        assert_eq!(extract_json(text), "[1, 2, 3]");
    }

    #[test]
    fn parses_drafts_from_array() {
        let text = r#"```json
[
  {"question_text": "2 + 2 = ?", "question_type": "mcq", "options": ["3", "4"],
   "correct_answer": "4", "difficulty": "Easy"},
  {"question_text": "g in m/s^2", "question_type": "NAT", "correct_answer": 9.81,
   "marks": 2, "negative_marks": 0}
]
```"#;
        let parsed = parse_drafts(text).unwrap();
        assert_eq!(parsed.rejected, 0);
        let drafts = parsed.drafts;
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].question_type, QuestionType::Mcq);
        assert_eq!(drafts[0].difficulty, Difficulty::Easy);
        assert_eq!(drafts[0].marks, 1.0);
        assert_eq!(drafts[1].correct_answer, Answer::Numeric(9.81));
        assert!(drafts[1].options.is_empty());
        assert!(drafts.iter().all(|d| d.check().is_ok()));
    }

    #[test]
    fn parses_wrapped_drafts() {
        let text = r#"{"questions": [{"question_text": "Pick", "question_type": "MSQ",
            "options": ["a", "b", "c"], "correct_answer": ["a", "c"]}]}"#;
        let drafts = parse_drafts(text).unwrap().drafts;
        assert_eq!(drafts.len(), 1);
        assert_eq!(
            drafts[0].correct_answer,
            Answer::Multiple(vec!["a".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn unreadable_draft_does_not_sink_the_batch() {
        let text = r#"[
            {"question_text": "1 + 1?", "question_type": "NAT", "correct_answer": 2},
            {"question_text": "Odd one", "question_type": "NAT", "correct_answer": 3,
             "difficulty": "moderate"},
            {"question_text": "True?", "question_type": "TF", "correct_answer": "T"}
        ]"#;
        let parsed = parse_drafts(text).unwrap();
        assert_eq!(parsed.drafts.len(), 1);
        assert_eq!(parsed.drafts[0].question_text, "1 + 1?");
        assert_eq!(parsed.rejected, 2);
    }

    #[test]
    fn rejects_prose() {
        assert!(matches!(
            parse_drafts("I cannot help with that."),
            Err(LlmError::Malformed(_))
        ));
    }

    #[test]
    fn difficulty_from_reply() {
        assert_eq!(parse_difficulty("Hard.").unwrap(), Difficulty::Hard);
        assert_eq!(
            parse_difficulty("I would rate this as medium difficulty").unwrap(),
            Difficulty::Medium
        );
        assert!(parse_difficulty("unclear").is_err());
    }

    #[test]
    fn clean_text_strips_wrapping() {
        assert_eq!(clean_text("\"What is the SI unit of force?\"\n"), "What is the SI unit of force?");
        assert_eq!(clean_text("```\nBonjour\n```"), "Bonjour");
    }

    #[test]
    fn clean_text_keeps_inner_quotes() {
        assert_eq!(
            clean_text("Il a dit \"bonjour\""),
            "Il a dit \"bonjour\""
        );
        assert_eq!(clean_text("\"Define \"work\"\""), "Define \"work\"");
    }
}
