//! Feasibility-question extraction from free-form model output.
//!
//! The model is asked to answer with lines such as
//! `Q1: Who are the customers? (age, income),`. Each marker becomes a
//! [`Question`]; everything between markers that does not fit the shape is
//! ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Hint used when a question carries no annotation.
pub const NO_HINT: &str = "No hint provided";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static DECIMAL_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d$").unwrap());

static QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bQ(\d+)[.:!]\s*([^?!.]+[?!.])\s*(?:\(([^)]+)\)|- Example: ([^,]+),|Example: ([^,]+),)?",
    )
    .unwrap()
});

/// One extracted question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: u64,
    pub question: String,
    pub hint: String,
}

/// Collapse whitespace runs and turn square and curly brackets into
/// parentheses so every annotation style looks like `(...)`.
fn normalize(text: &str) -> String {
    WHITESPACE
        .replace_all(text, " ")
        .chars()
        .map(|c| match c {
            '[' | '{' => '(',
            ']' | '}' => ')',
            other => other,
        })
        .collect()
}

fn is_decimal_digit(c: char) -> bool {
    let mut buf = [0u8; 4];
    DECIMAL_DIGIT.is_match(c.encode_utf8(&mut buf))
}

/// Numeric value of any Unicode decimal digit (`\d`), not only ASCII.
///
/// Decimal digits are encoded in contiguous runs of ten starting at zero, so
/// the value is the distance from the start of the run, modulo ten.
fn digit_value(c: char) -> Option<u32> {
    if let Some(d) = c.to_digit(10) {
        return Some(d);
    }
    if !is_decimal_digit(c) {
        return None;
    }
    let mut start = c as u32;
    while let Some(prev) = start.checked_sub(1).and_then(char::from_u32) {
        if !is_decimal_digit(prev) {
            break;
        }
        start -= 1;
    }
    Some((c as u32 - start) % 10)
}

/// Parse a run of decimal digits from any script. Values past `u64::MAX`
/// saturate so the question is still kept.
fn parse_id(digits: &str) -> u64 {
    let mut id: u64 = 0;
    for d in digits.chars().filter_map(digit_value) {
        match id.checked_mul(10).and_then(|n| n.checked_add(u64::from(d))) {
            Some(next) => id = next,
            None => {
                warn!("Question id Q{} exceeds u64, saturating", digits);
                return u64::MAX;
            }
        }
    }
    id
}

/// Extract every `Q<n>` question from `text`, in order of appearance.
///
/// Never fails: text without markers yields an empty list. Ids are kept as
/// written, so duplicates and gaps pass through unchanged. Digits from any
/// script count, so `Q١` is question 1.
pub fn extract_questions(text: &str) -> Vec<Question> {
    let normalized = normalize(text);

    let questions: Vec<Question> = QUESTION
        .captures_iter(&normalized)
        .filter_map(|caps| {
            let id = parse_id(caps.get(1)?.as_str());
            let question = caps.get(2)?.as_str().trim().to_string();
            let hint = (3..=5)
                .filter_map(|i| caps.get(i))
                .map(|m| m.as_str())
                .find(|h| !h.is_empty())
                .map(|h| h.trim().to_string())
                .unwrap_or_else(|| NO_HINT.to_string());
            Some(Question { id, question, hint })
        })
        .collect();

    debug!("Extracted {} questions", questions.len());
    questions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(id: u64, question: &str, hint: &str) -> Question {
        Question {
            id,
            question: question.into(),
            hint: hint.into(),
        }
    }

    #[test]
    fn test_parenthesized_hint() {
        assert_eq!(
            extract_questions("Q1: What is the target market? (covers demographics),"),
            vec![q(1, "What is the target market?", "covers demographics")]
        );
    }

    #[test]
    fn test_example_hint() {
        assert_eq!(
            extract_questions("Q2. Define scope! Example: scope of phase one,"),
            vec![q(2, "Define scope!", "scope of phase one")]
        );
    }

    #[test]
    fn test_dash_example_hint() {
        assert_eq!(
            extract_questions("Q6: Why now? - Example: new regulation,"),
            vec![q(6, "Why now?", "new regulation")]
        );
    }

    #[test]
    fn test_no_markers() {
        assert!(extract_questions("").is_empty());
        assert!(extract_questions("Here are some thoughts about your project.").is_empty());
    }

    #[test]
    fn test_square_and_curly_brackets_become_parentheses() {
        let expected = vec![q(3, "Is it viable?", "budget")];
        assert_eq!(extract_questions("Q3: Is it viable? [budget]"), expected);
        assert_eq!(extract_questions("Q3: Is it viable? {budget}"), expected);
        assert_eq!(extract_questions("Q3: Is it viable? (budget)"), expected);
    }

    #[test]
    fn test_default_hint() {
        assert_eq!(
            extract_questions("Q4: Who pays?"),
            vec![q(4, "Who pays?", NO_HINT)]
        );
    }

    #[test]
    fn test_textual_order_and_ids_kept() {
        let text = "Intro text.\n**Q3:** Third? (c)\n- Q1: First. \n- Q3! Again?";
        let got = extract_questions(text);
        let ids: Vec<u64> = got.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![3, 1, 3]);
        assert_eq!(got[0].hint, "c");
        assert_eq!(got[1].question, "First.");
        assert_eq!(got[2].question, "Again?");
    }

    #[test]
    fn test_case_insensitive_marker() {
        assert_eq!(
            extract_questions("q5: lower case works?"),
            vec![q(5, "lower case works?", NO_HINT)]
        );
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        assert_eq!(
            extract_questions("Q7:\n\n  What\tis the\n  plan?   (  spaced   out  )"),
            vec![q(7, "What is the plan?", "spaced out")]
        );
    }

    #[test]
    fn test_marker_inside_word_is_ignored() {
        assert!(extract_questions("FAQ1: not a question?").is_empty());
    }

    #[test]
    fn test_overflowing_id_is_kept() {
        let got = extract_questions("Q99999999999999999999999: Too big? Q2: Fine?");
        assert_eq!(got, vec![q(u64::MAX, "Too big?", NO_HINT), q(2, "Fine?", NO_HINT)]);
    }

    #[test]
    fn test_arabic_indic_digits() {
        assert_eq!(
            extract_questions("Q١: ما هو السوق المستهدف؟ وما حجمه?"),
            vec![q(1, "ما هو السوق المستهدف؟ وما حجمه?", NO_HINT)]
        );
        let got = extract_questions("Q١٢: كم التكلفة? (رأس المال) Q۷: متى?");
        let ids: Vec<u64> = got.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![12, 7]);
        assert_eq!(got[0].hint, "رأس المال");
    }

    #[test]
    fn test_digit_value_across_scripts() {
        assert_eq!(digit_value('7'), Some(7));
        assert_eq!(digit_value('٠'), Some(0));
        assert_eq!(digit_value('٩'), Some(9));
        assert_eq!(digit_value('۴'), Some(4));
        assert_eq!(digit_value('５'), Some(5));
        assert_eq!(digit_value('𝟗'), Some(9));
        assert_eq!(digit_value('x'), None);
        assert_eq!(parse_id("１٠3"), 103);
    }

    #[test]
    fn test_serializes_as_records() {
        let json = serde_json::to_value(q(1, "Who?", "x")).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "question": "Who?", "hint": "x"}));
    }
}
