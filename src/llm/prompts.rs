// src/llm/prompts.rs

use crate::{
    llm::Prompt,
    models::question::{Answer, Difficulty, QuestionType},
};

const AUTHOR_ROLE: &str = "You are an experienced exam setter for competitive entrance \
    examinations. You write precise, unambiguous questions.";

/// JSON layout the model is asked to emit for question drafts.
const DRAFT_SCHEMA: &str = r#"Respond with a JSON array only, no prose. Each element:
{"question_text": string, "question_type": "MCQ" | "MSQ" | "NAT", "options": [string],
 "correct_answer": string for MCQ | [string] for MSQ | number for NAT,
 "marks": number, "negative_marks": number, "difficulty": "easy" | "medium" | "hard",
 "explanation": string}
NAT questions have an empty "options" array. Correct answers must repeat option text exactly."#;

fn describe(question_type: Option<QuestionType>, options: &[String]) -> String {
    let mut out = String::new();
    if let Some(t) = question_type {
        out.push_str(&format!("Question type: {}\n", t.as_str()));
    }
    if !options.is_empty() {
        out.push_str("Options:\n");
        for (i, opt) in options.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, opt));
        }
    }
    out
}

fn format_answer(answer: &Answer) -> String {
    match answer {
        Answer::Numeric(n) => n.to_string(),
        Answer::Single(s) => s.clone(),
        Answer::Multiple(v) => v.join(", "),
    }
}

pub fn enhance(question_text: &str, question_type: Option<QuestionType>, options: &[String]) -> Prompt {
    Prompt {
        system: format!(
            "{} Improve the wording of the question you are given: fix grammar, remove \
             ambiguity, keep the meaning and difficulty unchanged. Reply with the improved \
             question text only.",
            AUTHOR_ROLE
        ),
        user: format!("Question:\n{}\n{}", question_text, describe(question_type, options)),
        temperature: 0.4,
    }
}

pub fn explain(
    question_text: &str,
    question_type: Option<QuestionType>,
    options: &[String],
    correct_answer: &Answer,
) -> Prompt {
    Prompt {
        system: format!(
            "{} Write a step-by-step explanation of why the given answer is correct, suitable \
             for a student reviewing a mock test. Use plain text.",
            AUTHOR_ROLE
        ),
        user: format!(
            "Question:\n{}\n{}Correct answer: {}",
            question_text,
            describe(question_type, options),
            format_answer(correct_answer)
        ),
        temperature: 0.3,
    }
}

pub fn translate(text: &str, target_language: &str) -> Prompt {
    Prompt {
        system: format!(
            "You are a translator for exam material. Translate the text into {}. Keep numbers, \
             formulas, units and option labels unchanged. Reply with the translation only.",
            target_language
        ),
        user: text.to_string(),
        temperature: 0.2,
    }
}

pub fn parse(raw_text: &str) -> Prompt {
    Prompt {
        system: format!(
            "{} Extract every question from the pasted exam text and convert it into structured \
             data. When the source gives no answer key, infer the correct answer.\n{}",
            AUTHOR_ROLE, DRAFT_SCHEMA
        ),
        user: raw_text.to_string(),
        temperature: 0.1,
    }
}

pub fn assess_difficulty(question_text: &str, options: &[String]) -> Prompt {
    Prompt {
        system: "You grade exam questions by difficulty for a typical well-prepared candidate. \
                 Reply with exactly one word: easy, medium or hard."
            .to_string(),
        user: format!("Question:\n{}\n{}", question_text, describe(None, options)),
        temperature: 0.0,
    }
}

pub fn generate(
    topic: &str,
    count: u32,
    difficulty: Option<Difficulty>,
    question_type: Option<QuestionType>,
) -> Prompt {
    let mut user = format!("Write {} practice questions on: {}.", count, topic);
    if let Some(d) = difficulty {
        user.push_str(&format!(" Difficulty: {}.", d.as_str()));
    }
    if let Some(t) = question_type {
        user.push_str(&format!(" Use only {} questions.", t.as_str()));
    }

    Prompt {
        system: format!("{}\n{}", AUTHOR_ROLE, DRAFT_SCHEMA),
        user,
        temperature: 0.7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explain_lists_options_and_answer() {
        let p = explain(
            "Which are primes?",
            Some(QuestionType::Msq),
            &["2".to_string(), "4".to_string(), "5".to_string()],
            &Answer::Multiple(vec!["2".to_string(), "5".to_string()]),
        );
        assert!(p.user.contains("Question type: MSQ"));
        assert!(p.user.contains("3. 5"));
        assert!(p.user.ends_with("Correct answer: 2, 5"));
    }

    #[test]
    fn generate_mentions_constraints() {
        let p = generate("kinematics", 3, Some(Difficulty::Hard), Some(QuestionType::Nat));
        assert_eq!(
            p.user,
            "Write 3 practice questions on: kinematics. Difficulty: hard. Use only NAT questions."
        );
        assert!(p.system.contains("JSON array"));
    }
}
