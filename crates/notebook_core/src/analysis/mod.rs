//! CJK-aware text analysis.
//!
//! # Responsibility
//! - Classify characters and report text composition statistics.
//! - Locate word boundaries and trailing Zhuyin compositions.
//! - Serve candidate and completion lookups from sorted lexicons.
//!
//! # Invariants
//! - Every function is pure; lexicon lookups never mutate shared state.
//! - Positions are Unicode scalar (char) indices, never byte offsets.

pub mod cjk;
pub mod composition;
pub mod lexicon;

pub use cjk::{
    contains_chinese, current_word_prefix, extract_zhuyin_composition, find_word_boundary,
    is_chinese_char, is_zhuyin_symbol,
};
pub use composition::{
    analyze_composition, count_chinese, validate_chinese_input, InputIssue, InputIssueKind,
    InputValidation, TextComposition,
};
pub use lexicon::{
    get_common_completions, get_zhuyin_candidates, InputDictionary, Lexicon, LexiconError,
};
