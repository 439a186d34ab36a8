//! Character classification and boundary helpers.

const ZHUYIN_TONE_MARKS: [char; 5] = ['ˉ', 'ˊ', 'ˇ', 'ˋ', '˙'];

/// Han ideographs (basic, extension A, extension B, compatibility) and CJK
/// symbols and punctuation.
pub fn is_chinese_char(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x20000..=0x2A6DF | 0xF900..=0xFAFF | 0x3000..=0x303F
    )
}

pub fn contains_chinese(text: &str) -> bool {
    text.chars().any(is_chinese_char)
}

/// Bopomofo letters and the five tone marks.
pub fn is_zhuyin_symbol(ch: char) -> bool {
    matches!(ch as u32, 0x3105..=0x312F) || ZHUYIN_TONE_MARKS.contains(&ch)
}

/// Returns the `[start, end)` char range of the Chinese run touching the
/// cursor.
///
/// `cursor` sits between characters. The range grows left over Chinese
/// characters before the cursor and right over those after it, so a cursor
/// with no Chinese neighbour yields an empty range. Cursors past the end
/// clamp to the text length.
pub fn find_word_boundary(text: &str, cursor: usize) -> (usize, usize) {
    let chars: Vec<char> = text.chars().collect();
    let cursor = cursor.min(chars.len());

    let start = chars[..cursor]
        .iter()
        .rposition(|ch| !is_chinese_char(*ch))
        .map_or(0, |index| index + 1);
    let end = chars[cursor..]
        .iter()
        .position(|ch| !is_chinese_char(*ch))
        .map_or(chars.len(), |offset| cursor + offset);
    (start, end)
}

/// Trailing run of Zhuyin symbols, or an empty string.
pub fn extract_zhuyin_composition(text: &str) -> String {
    trailing_run(text, is_zhuyin_symbol)
}

/// Trailing run of Chinese characters and ASCII letters, used as the
/// completion prefix before the cursor.
pub fn current_word_prefix(text: &str) -> String {
    trailing_run(text, |ch| is_chinese_char(ch) || ch.is_ascii_alphabetic())
}

fn trailing_run(text: &str, keep: impl Fn(char) -> bool) -> String {
    let start = text
        .char_indices()
        .rev()
        .take_while(|(_, ch)| keep(*ch))
        .last()
        .map_or(text.len(), |(index, _)| index);
    text[start..].to_string()
}
