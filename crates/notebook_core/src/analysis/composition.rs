//! Text composition statistics and input validation.

use super::cjk::is_chinese_char;
use serde::Serialize;

/// Per-category character counts for one text.
///
/// Categories are checked in order: Chinese, letter, number, punctuation,
/// whitespace. `other_characters` is everything that is not Chinese,
/// letter or number, so punctuation and whitespace are part of it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextComposition {
    pub total_characters: usize,
    pub chinese_characters: usize,
    pub english_characters: usize,
    pub number_characters: usize,
    pub punctuation_characters: usize,
    pub whitespace_characters: usize,
    pub other_characters: usize,
    pub chinese_ratio: f64,
    pub english_ratio: f64,
    pub word_count: usize,
}

/// Counts characters per category in one pass.
///
/// Letters other than Han count as `english_characters`; only decimal
/// digits count as numbers, so `Ⅻ` and `½` fall into other. Ratios are
/// `category / total`, or 0 for empty text. `word_count` counts each
/// Chinese character plus each run of other letters and digits.
pub fn analyze_composition(text: &str) -> TextComposition {
    let mut stats = TextComposition::default();
    let mut in_word = false;

    for ch in text.chars() {
        stats.total_characters += 1;
        if is_chinese_char(ch) {
            if ch.is_alphanumeric() {
                stats.word_count += 1;
            }
            stats.chinese_characters += 1;
            in_word = false;
            continue;
        }

        let word_char = ch.is_alphanumeric();
        if word_char && !in_word {
            stats.word_count += 1;
        }
        in_word = word_char;

        if ch.is_alphabetic() && !ch.is_numeric() {
            stats.english_characters += 1;
        } else if is_decimal_digit(ch) {
            stats.number_characters += 1;
        } else if is_punctuation(ch) {
            stats.punctuation_characters += 1;
        } else if ch.is_whitespace() {
            stats.whitespace_characters += 1;
        }
    }

    stats.other_characters = stats.total_characters
        - stats.chinese_characters
        - stats.english_characters
        - stats.number_characters;
    if stats.total_characters > 0 {
        let total = stats.total_characters as f64;
        stats.chinese_ratio = stats.chinese_characters as f64 / total;
        stats.english_ratio = stats.english_characters as f64 / total;
    }
    stats
}

pub fn count_chinese(text: &str) -> usize {
    text.chars().filter(|ch| is_chinese_char(*ch)).count()
}

/// ASCII and fullwidth decimal digits.
fn is_decimal_digit(ch: char) -> bool {
    ch.is_ascii_digit() || ('\u{FF10}'..='\u{FF19}').contains(&ch)
}

fn is_punctuation(ch: char) -> bool {
    ch.is_ascii_punctuation()
        || matches!(ch as u32, 0x2010..=0x2027 | 0x2030..=0x205E | 0xFE30..=0xFE4F | 0xFF01..=0xFF0F | 0xFF1A..=0xFF20 | 0xFF3B..=0xFF40 | 0xFF5B..=0xFF65)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputIssueKind {
    Empty,
    ControlCharacter,
    BidiControl,
    PrivateUse,
}

/// One reported problem; `position` is a char index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputIssue {
    pub kind: InputIssueKind,
    pub position: Option<usize>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputValidation {
    /// Always `true`; issues are advisory.
    pub is_valid: bool,
    pub issues: Vec<InputIssue>,
}

/// Reports suspicious characters in user input without rejecting it.
pub fn validate_chinese_input(text: &str) -> InputValidation {
    let mut issues = Vec::new();
    if text.is_empty() {
        issues.push(InputIssue {
            kind: InputIssueKind::Empty,
            position: None,
            message: "input is empty".to_string(),
        });
    }

    for (position, ch) in text.chars().enumerate() {
        let kind = if is_bidi_control(ch) {
            InputIssueKind::BidiControl
        } else if ch.is_control() && !matches!(ch, '\n' | '\r' | '\t') {
            InputIssueKind::ControlCharacter
        } else if is_private_use(ch) {
            InputIssueKind::PrivateUse
        } else {
            continue;
        };
        issues.push(InputIssue {
            kind,
            position: Some(position),
            message: format!("U+{:04X} at position {position}", ch as u32),
        });
    }

    InputValidation {
        is_valid: true,
        issues,
    }
}

fn is_bidi_control(ch: char) -> bool {
    matches!(ch as u32, 0x200E | 0x200F | 0x061C | 0x202A..=0x202E | 0x2066..=0x2069)
}

fn is_private_use(ch: char) -> bool {
    matches!(ch as u32, 0xE000..=0xF8FF | 0xF0000..=0xFFFFD | 0x100000..=0x10FFFD)
}
