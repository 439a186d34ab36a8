//! Markdown editing helpers.
//!
//! # Responsibility
//! - Provide the pure string transformations behind formatting commands.
//! - Produce context-aware auto-complete suggestions.
//!
//! # Invariants
//! - Every offset and line number in this module counts chars, not bytes.
//! - Out-of-range selections clamp; out-of-range lines leave content as is.

use crate::analysis::cjk::{current_word_prefix, extract_zhuyin_composition};
use crate::analysis::lexicon::InputDictionary;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

const SUPPORTED_CODE_LANGUAGES: [&str; 15] = [
    "go",
    "javascript",
    "typescript",
    "python",
    "java",
    "c",
    "cpp",
    "html",
    "css",
    "json",
    "xml",
    "yaml",
    "markdown",
    "bash",
    "sql",
];
const DEFAULT_CODE_LANGUAGE: &str = "text";
const MIN_TABLE_CELL_WIDTH: usize = 3;

static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]\([^)]*\)").expect("valid link regex"));
static IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid image regex"));
static ORDERED_LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.").expect("valid ordered list regex"));

/// Content and selection after a wrap edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrapEdit {
    pub content: String,
    pub selection_start: usize,
    pub selection_end: usize,
}

/// Wraps `[start, end)` in `prefix`/`suffix`.
///
/// An empty selection inserts `prefix + placeholder + suffix` and selects
/// the placeholder; otherwise the original text stays selected.
pub fn apply_wrap(
    content: &str,
    start: usize,
    end: usize,
    prefix: &str,
    suffix: &str,
    placeholder: &str,
) -> WrapEdit {
    let len = content.chars().count();
    let (start, end) = (start.min(len), end.min(len));
    let (start, end) = if start <= end { (start, end) } else { (end, start) };

    let start_byte = byte_offset(content, start);
    let end_byte = byte_offset(content, end);
    let selected = if start == end {
        placeholder
    } else {
        &content[start_byte..end_byte]
    };

    let mut edited = String::with_capacity(content.len() + prefix.len() + suffix.len() + selected.len());
    edited.push_str(&content[..start_byte]);
    edited.push_str(prefix);
    edited.push_str(selected);
    edited.push_str(suffix);
    edited.push_str(&content[end_byte..]);

    let selection_start = start + prefix.chars().count();
    WrapEdit {
        content: edited,
        selection_start,
        selection_end: selection_start + selected.chars().count(),
    }
}

/// Inserts `prefix` at the start of 0-based `line`. Not idempotent.
pub fn apply_line_prefix(content: &str, line: usize, prefix: &str) -> String {
    edit_line(content, line, |text| format!("{prefix}{text}"))
}

/// Removes `prefix` from `line` when present, otherwise inserts it.
pub fn toggle_line_prefix(content: &str, line: usize, prefix: &str) -> String {
    edit_line(content, line, |text| match text.strip_prefix(prefix) {
        Some(rest) if !prefix.is_empty() => rest.to_string(),
        _ => format!("{prefix}{text}"),
    })
}

/// `[text](url)`; empty text falls back to the url.
pub fn format_link(text: &str, url: &str) -> String {
    let url = url.trim();
    let text = match text.trim() {
        "" => url,
        trimmed => trimmed,
    };
    format!("[{text}]({url})")
}

pub fn format_image(alt: &str, src: &str) -> String {
    format!("![{}]({})", alt.trim(), src.trim())
}

/// Fenced block tagged with `lang` (default `text`); inner fences are
/// stripped so the block cannot terminate early.
pub fn format_code_block(code: &str, lang: &str) -> String {
    let lang = match lang.trim() {
        "" => DEFAULT_CODE_LANGUAGE,
        trimmed => trimmed,
    };
    let code = code.trim().replace("```", "");
    format!("```{lang}\n{code}\n```")
}

/// `$expr$` inline, `$$expr$$` display. Existing `$` delimiters are
/// stripped first.
pub fn format_math(expression: &str, inline: bool) -> String {
    let expression = expression.trim().trim_matches('$').trim();
    if inline {
        format!("${expression}$")
    } else {
        format!("$${expression}$$")
    }
}

/// GFM table skeleton. `rows` counts the header row; `rows < 2` or
/// `cols < 1` yields the 3x3 default.
pub fn generate_table_template(rows: usize, cols: usize) -> String {
    let (rows, cols) = if rows < 2 || cols < 1 { (3, 3) } else { (rows, cols) };
    let mut table = String::new();

    table.push('|');
    for col in 1..=cols {
        table.push_str(&format!(" Column {col} |"));
    }
    table.push_str("\n|");
    for _ in 0..cols {
        table.push_str("----------|");
    }
    table.push('\n');
    for row in 1..rows {
        table.push('|');
        for col in 1..=cols {
            table.push_str(&format!(" Cell {row}-{col} |"));
        }
        table.push('\n');
    }
    table
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkdownError {
    TableTooShort,
}

impl Display for MarkdownError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TableTooShort => write!(f, "a table needs a header row and a separator row"),
        }
    }
}

impl Error for MarkdownError {}

/// Re-aligns a pipe table so every column has one width.
///
/// The second row is treated as the separator; alignment colons survive.
pub fn format_table(table: &str) -> Result<String, MarkdownError> {
    let rows: Vec<Vec<String>> = table
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.trim_matches('|')
                .split('|')
                .map(|cell| cell.trim().to_string())
                .collect()
        })
        .collect();
    if rows.len() < 2 {
        return Err(MarkdownError::TableTooShort);
    }

    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![MIN_TABLE_CELL_WIDTH; columns];
    for (index, row) in rows.iter().enumerate() {
        if index == 1 {
            continue;
        }
        for (col, cell) in row.iter().enumerate() {
            widths[col] = widths[col].max(cell.chars().count());
        }
    }

    let mut formatted = String::new();
    for (index, row) in rows.iter().enumerate() {
        formatted.push('|');
        for (col, width) in widths.iter().enumerate() {
            let cell = row.get(col).map(String::as_str).unwrap_or("");
            if index == 1 {
                formatted.push_str(&format!(" {} |", separator_cell(cell, *width)));
            } else {
                let padding = width - cell.chars().count();
                formatted.push_str(&format!(" {cell}{} |", " ".repeat(padding)));
            }
        }
        formatted.push('\n');
    }
    Ok(formatted)
}

fn separator_cell(cell: &str, width: usize) -> String {
    let left = cell.starts_with(':');
    let right = cell.len() > 1 && cell.ends_with(':');
    let dashes = width - usize::from(left) - usize::from(right);
    format!(
        "{}{}{}",
        if left { ":" } else { "" },
        "-".repeat(dashes),
        if right { ":" } else { "" }
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkdownIssueKind {
    UnbalancedBrackets,
    IncompleteImage,
    MalformedTableRow,
    UnclosedCodeFence,
}

/// One syntax problem; `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkdownIssue {
    pub line: usize,
    pub kind: MarkdownIssueKind,
}

/// Lightweight syntax checks. Lines inside code fences are skipped.
pub fn validate_markdown(content: &str) -> Vec<MarkdownIssue> {
    let mut issues = Vec::new();
    let mut open_fence: Option<usize> = None;

    for (index, line) in content.split('\n').enumerate() {
        let number = index + 1;
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            open_fence = match open_fence {
                Some(_) => None,
                None => Some(number),
            };
            continue;
        }
        if open_fence.is_some() {
            continue;
        }

        if (line.contains('[') || line.contains(']'))
            && (line.matches('[').count() != line.matches(']').count()
                || line.matches('(').count() != line.matches(')').count())
        {
            issues.push(MarkdownIssue {
                line: number,
                kind: MarkdownIssueKind::UnbalancedBrackets,
            });
        }
        if line.contains("![") && !IMAGE_RE.is_match(line) {
            issues.push(MarkdownIssue {
                line: number,
                kind: MarkdownIssueKind::IncompleteImage,
            });
        }
        if line.contains('|')
            && !(trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() >= 2)
        {
            issues.push(MarkdownIssue {
                line: number,
                kind: MarkdownIssueKind::MalformedTableRow,
            });
        }
    }

    if let Some(line) = open_fence {
        issues.push(MarkdownIssue {
            line,
            kind: MarkdownIssueKind::UnclosedCodeFence,
        });
    }
    issues
}

pub fn supported_code_languages() -> &'static [&'static str] {
    &SUPPORTED_CODE_LANGUAGES
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Header,
    List,
    CodeBlock,
    Link,
    Table,
    Math,
    Completion,
    Zhuyin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoCompleteSuggestion {
    pub text: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub insert_text: String,
}

impl AutoCompleteSuggestion {
    fn new(kind: SuggestionKind, text: &str, description: &str, insert_text: &str) -> Self {
        Self {
            text: text.to_string(),
            description: description.to_string(),
            kind,
            insert_text: insert_text.to_string(),
        }
    }
}

/// Suggestions for the line ending at char offset `cursor`.
///
/// Markdown syntax suggestions come first, then CJK word completions, then
/// Zhuyin candidates for a trailing composition. A cursor past the end of
/// `content` yields nothing.
pub fn auto_complete_suggestions(
    content: &str,
    cursor: usize,
    dictionary: &InputDictionary,
) -> Vec<AutoCompleteSuggestion> {
    if cursor > content.chars().count() {
        return Vec::new();
    }
    let before = &content[..byte_offset(content, cursor)];
    let line = before.rsplit('\n').next().unwrap_or("");
    let trimmed = line.trim();
    let mut suggestions = Vec::new();

    if trimmed.starts_with('#') {
        suggestions.extend([
            AutoCompleteSuggestion::new(SuggestionKind::Header, "# Heading", "Level 1 heading", "# "),
            AutoCompleteSuggestion::new(SuggestionKind::Header, "## Heading", "Level 2 heading", "## "),
            AutoCompleteSuggestion::new(SuggestionKind::Header, "### Heading", "Level 3 heading", "### "),
        ]);
    }
    if trimmed.starts_with(['-', '*', '+']) {
        suggestions.extend([
            AutoCompleteSuggestion::new(SuggestionKind::List, "- Item", "Bullet list item", "- "),
            AutoCompleteSuggestion::new(SuggestionKind::List, "  - Item", "Nested bullet item", "  - "),
        ]);
    }
    if ORDERED_LIST_RE.is_match(trimmed) {
        suggestions.push(AutoCompleteSuggestion::new(
            SuggestionKind::List,
            "1. Item",
            "Ordered list item",
            "1. ",
        ));
    }
    if trimmed.starts_with("```") {
        for language in SUPPORTED_CODE_LANGUAGES {
            suggestions.push(AutoCompleteSuggestion {
                text: format!("```{language}"),
                description: format!("{} code block", language.to_uppercase()),
                kind: SuggestionKind::CodeBlock,
                insert_text: format!("```{language}\n\n```"),
            });
        }
    }
    if line.contains('[') && !LINK_RE.is_match(line) {
        suggestions.extend([
            AutoCompleteSuggestion::new(SuggestionKind::Link, "[text](url)", "Insert link", "[]()"),
            AutoCompleteSuggestion::new(
                SuggestionKind::Link,
                "[text](url \"title\")",
                "Insert link with title",
                "[](\"\")",
            ),
        ]);
    }
    if line.contains('|') {
        suggestions.extend([
            AutoCompleteSuggestion::new(
                SuggestionKind::Table,
                "| Column 1 | Column 2 |",
                "Table header",
                "| Column 1 | Column 2 |\n|----------|----------|\n| Cell 1-1 | Cell 1-2 |",
            ),
            AutoCompleteSuggestion::new(
                SuggestionKind::Table,
                "|----------|----------|",
                "Table separator",
                "|----------|----------|",
            ),
        ]);
    }
    if line.contains('$') {
        suggestions.extend([
            AutoCompleteSuggestion::new(SuggestionKind::Math, "$x$", "Inline math", "$  $"),
            AutoCompleteSuggestion::new(SuggestionKind::Math, "$$x$$", "Display math", "$$\n  \n$$"),
        ]);
    }

    let prefix = current_word_prefix(line);
    for word in dictionary.common_completions(&prefix) {
        suggestions.push(AutoCompleteSuggestion {
            description: format!("Complete \"{prefix}\""),
            insert_text: word.chars().skip(prefix.chars().count()).collect(),
            text: word,
            kind: SuggestionKind::Completion,
        });
    }

    let composition = extract_zhuyin_composition(line);
    for candidate in dictionary.zhuyin_candidates(&composition) {
        suggestions.push(AutoCompleteSuggestion {
            description: format!("Zhuyin {composition}"),
            insert_text: candidate.clone(),
            text: candidate,
            kind: SuggestionKind::Zhuyin,
        });
    }

    suggestions
}

fn byte_offset(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map_or(text.len(), |(offset, _)| offset)
}

fn edit_line(content: &str, line: usize, edit: impl FnOnce(&str) -> String) -> String {
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
    match lines.get_mut(line) {
        Some(target) => {
            *target = edit(target);
            lines.join("\n")
        }
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        apply_line_prefix, apply_wrap, auto_complete_suggestions, format_code_block, format_link,
        format_math, format_table, generate_table_template, toggle_line_prefix,
        validate_markdown, MarkdownIssueKind, SuggestionKind,
    };
    use crate::analysis::lexicon::InputDictionary;

    #[test]
    fn wrap_keeps_selection_on_original_text() {
        let edit = apply_wrap("make 重要 bold", 5, 7, "**", "**", "text");
        assert_eq!(edit.content, "make **重要** bold");
        assert_eq!((edit.selection_start, edit.selection_end), (7, 9));
    }

    #[test]
    fn empty_wrap_inserts_and_selects_placeholder() {
        let edit = apply_wrap("ab", 1, 1, "_", "_", "emphasis");
        assert_eq!(edit.content, "a_emphasis_b");
        assert_eq!((edit.selection_start, edit.selection_end), (2, 10));
    }

    #[test]
    fn reversed_and_oversized_selections_clamp() {
        let edit = apply_wrap("abc", 99, 1, "[", "]", "");
        assert_eq!(edit.content, "a[bc]");
        assert_eq!((edit.selection_start, edit.selection_end), (2, 4));
    }

    #[test]
    fn line_prefix_is_not_idempotent_but_toggle_is_reversible() {
        let once = apply_line_prefix("a\nb", 1, "> ");
        assert_eq!(once, "a\n> b");
        assert_eq!(apply_line_prefix(&once, 1, "> "), "a\n> > b");
        assert_eq!(apply_line_prefix("a", 5, "> "), "a");

        let toggled = toggle_line_prefix("- item", 0, "- ");
        assert_eq!(toggled, "item");
        assert_eq!(toggle_line_prefix(&toggled, 0, "- "), "- item");
    }

    #[test]
    fn formatting_helpers_produce_markdown() {
        assert_eq!(format_link("Rust", "https://rust-lang.org"), "[Rust](https://rust-lang.org)");
        assert_eq!(format_link(" ", "https://x.io"), "[https://x.io](https://x.io)");
        assert_eq!(format_code_block("fn main() {}", ""), "```text\nfn main() {}\n```");
        assert_eq!(format_code_block("a```b", "rust"), "```rust\nab\n```");
        assert_eq!(format_math("x^2", true), "$x^2$");
        assert_eq!(format_math("$$e=mc^2$$", false), "$$e=mc^2$$");
    }

    #[test]
    fn table_template_counts_header_row() {
        let table = generate_table_template(2, 2);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "| Column 1 | Column 2 |");
        assert_eq!(lines[2], "| Cell 1-1 | Cell 1-2 |");
        assert_eq!(generate_table_template(0, 0).lines().count(), 4);
    }

    #[test]
    fn tables_are_aligned_and_keep_colons() {
        let formatted = format_table("|a|bbbb|\n|:-|-:|\n|ccccc|d|").expect("table should format");
        assert_eq!(
            formatted,
            "| a     | bbbb |\n| :---- | ---: |\n| ccccc | d    |\n"
        );
        assert!(format_table("| only |").is_err());
    }

    #[test]
    fn validation_reports_line_numbers() {
        let issues = validate_markdown("ok\n[broken(link\n![img](\n```\n[ignored\n");
        let kinds: Vec<_> = issues.iter().map(|issue| (issue.line, issue.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (2, MarkdownIssueKind::UnbalancedBrackets),
                (3, MarkdownIssueKind::UnbalancedBrackets),
                (3, MarkdownIssueKind::IncompleteImage),
                (4, MarkdownIssueKind::UnclosedCodeFence),
            ]
        );
        assert!(validate_markdown("| a | b |\n[x](y)").is_empty());
    }

    #[test]
    fn suggestions_follow_the_current_line() {
        let dictionary = InputDictionary::embedded();
        let header = auto_complete_suggestions("intro\n#", 7, &dictionary);
        assert_eq!(header.len(), 3);
        assert!(header.iter().all(|item| item.kind == SuggestionKind::Header));

        let fences = auto_complete_suggestions("```", 3, &dictionary);
        assert_eq!(fences.len(), 15);
        assert_eq!(fences[0].insert_text, "```go\n\n```");

        assert!(auto_complete_suggestions("abc", 10, &dictionary).is_empty());
    }

    #[test]
    fn chinese_prefix_and_zhuyin_produce_candidates() {
        let dictionary = InputDictionary::embedded();
        let completions = auto_complete_suggestions("說 你", 3, &dictionary);
        let first = completions.first().expect("completion expected");
        assert_eq!(first.kind, SuggestionKind::Completion);
        assert_eq!(first.text, "你好");
        assert_eq!(first.insert_text, "好");

        let zhuyin = auto_complete_suggestions("打字ㄋㄧˇ", 5, &dictionary);
        let words: Vec<_> = zhuyin
            .iter()
            .filter(|item| item.kind == SuggestionKind::Zhuyin)
            .map(|item| item.text.as_str())
            .collect();
        assert_eq!(words, vec!["你", "妳", "尼", "泥"]);
    }
}
