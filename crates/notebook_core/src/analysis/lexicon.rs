//! Sorted candidate lexicons for Zhuyin input and completions.
//!
//! # Responsibility
//! - Map phonetic keys or prefixes to weighted candidate words.
//! - Ship a small embedded dictionary and accept host-supplied tables.
//!
//! # Invariants
//! - Entries stay sorted by key, so lookups are binary searches.
//! - Results are ordered by frequency descending; ties keep table order.
//! - No candidate appears twice in one result.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const MAX_CANDIDATES: usize = 10;
const FALLBACK_PREFIX_CHARS: usize = 2;
const CUSTOM_WORD_MAX_CHARS: usize = 20;

const EMBEDDED_ZHUYIN: &[(&str, &[&str])] = &[
    ("ㄋㄧˇ", &["你", "妳", "尼", "泥"]),
    ("ㄏㄠˇ", &["好", "號", "豪", "毫"]),
    ("ㄕˋ", &["是", "事", "世", "勢"]),
    ("ㄐㄧㄝˋ", &["界", "借", "戒", "介"]),
    ("ㄓㄨㄥ", &["中", "鐘", "忠", "終"]),
    ("ㄨㄣˊ", &["文", "聞", "溫", "紋"]),
    ("ㄧㄡˇ", &["有", "友", "又", "右"]),
    ("ㄧˊ", &["一", "以", "已", "意"]),
    ("ㄍㄜˋ", &["個", "各", "格", "隔"]),
];

const EMBEDDED_COMPLETIONS: &[(&str, &[&str])] = &[
    ("你", &["你好", "你們", "你的"]),
    ("我", &["我們", "我的", "我是"]),
    ("這", &["這個", "這些", "這樣"]),
    ("那", &["那個", "那些", "那樣"]),
    ("什", &["什麼", "什麼時候"]),
    ("怎", &["怎麼", "怎樣", "怎麼辦"]),
    ("為", &["為什麼", "為了", "為何"]),
    ("可", &["可以", "可能", "可是"]),
    ("應", &["應該", "應當", "應用"]),
    ("需", &["需要", "需求"]),
];

const COMMON_CHARS: &[&str] = &[
    "的", "一", "是", "在", "不", "了", "有", "和", "人", "這", "中", "大", "為", "上", "個",
    "國", "我", "以", "要", "他", "時", "來", "用", "們", "生", "到", "作", "地", "於", "出",
    "就", "分", "對", "成", "會", "可", "主", "發", "年", "動", "同", "工", "也", "能", "下",
    "過", "子", "說", "產", "種", "面", "而", "方", "後", "多", "定", "行", "學", "法", "所",
];

const COMMON_WORDS: &[&str] = &[
    "你好", "謝謝", "對不起", "沒關係", "再見", "早安", "晚安", "請問", "不好意思", "麻煩你",
    "辛苦了", "加油", "恭喜", "生日快樂", "新年快樂", "聖誕快樂", "身體健康", "工作順利",
    "學習進步", "一路順風", "祝你好運", "保重身體", "注意安全", "台灣", "中華民國", "繁體中文",
    "注音符號", "輸入法", "電腦", "手機", "網路", "軟體", "程式", "系統", "資料", "檔案",
    "資料夾", "下載", "上傳", "安裝", "設定", "功能",
];

static EMBEDDED: Lazy<InputDictionary> = Lazy::new(InputDictionary::embedded);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    word: String,
    frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: String,
    candidates: Vec<Candidate>,
}

/// Key → weighted candidates table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lexicon {
    entries: Vec<Entry>,
}

impl Lexicon {
    /// Builds a lexicon where earlier candidates rank higher.
    pub fn from_ranked<K, W>(table: impl IntoIterator<Item = (K, Vec<W>)>) -> Self
    where
        K: Into<String>,
        W: Into<String>,
    {
        let mut lexicon = Self::default();
        for (key, words) in table {
            let key = key.into();
            let count = words.len() as u32;
            for (rank, word) in words.into_iter().enumerate() {
                lexicon.insert(&key, word.into(), count - rank as u32);
            }
        }
        lexicon
    }

    /// Parses `{ "key": ["candidate", ...], ... }`.
    pub fn from_json_str(raw: &str) -> Result<Self, LexiconError> {
        let table: BTreeMap<String, Vec<String>> =
            serde_json::from_str(raw).map_err(LexiconError::Parse)?;
        Ok(Self::from_ranked(table))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds `word` under `key`, keeping the higher frequency on duplicates.
    pub fn insert(&mut self, key: &str, word: String, frequency: u32) {
        let index = match self.search(key) {
            Ok(index) => index,
            Err(index) => {
                self.entries.insert(
                    index,
                    Entry {
                        key: key.to_string(),
                        candidates: Vec::new(),
                    },
                );
                index
            }
        };
        let candidates = &mut self.entries[index].candidates;
        match candidates.iter_mut().find(|candidate| candidate.word == word) {
            Some(existing) => existing.frequency = existing.frequency.max(frequency),
            None => candidates.push(Candidate { word, frequency }),
        }
    }

    /// Removes `word` from `key`; drops the key when it becomes empty.
    pub fn remove(&mut self, key: &str, word: &str) -> bool {
        let Ok(index) = self.search(key) else {
            return false;
        };
        let candidates = &mut self.entries[index].candidates;
        let before = candidates.len();
        candidates.retain(|candidate| candidate.word != word);
        let removed = candidates.len() != before;
        if candidates.is_empty() {
            self.entries.remove(index);
        }
        removed
    }

    /// Exact-key lookup, falling back to keys that extend `query`, then to
    /// keys sharing its first two symbols.
    pub fn lookup(&self, query: &str) -> Vec<String> {
        if query.is_empty() {
            return Vec::new();
        }
        if let Ok(index) = self.search(query) {
            return rank(self.entries[index..=index].iter());
        }

        let extending = self.with_prefix(query);
        if !extending.is_empty() {
            return rank(extending.iter());
        }

        let leading: String = query.chars().take(FALLBACK_PREFIX_CHARS).collect();
        if leading.chars().count() < FALLBACK_PREFIX_CHARS || leading == query {
            return Vec::new();
        }
        rank(self.with_prefix(&leading).iter())
    }

    fn search(&self, key: &str) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|entry| entry.key.as_str().cmp(key))
    }

    fn with_prefix(&self, prefix: &str) -> &[Entry] {
        let start = self
            .entries
            .partition_point(|entry| entry.key.as_str() < prefix);
        let len = self.entries[start..]
            .iter()
            .take_while(|entry| entry.key.starts_with(prefix))
            .count();
        &self.entries[start..start + len]
    }
}

fn rank<'a>(entries: impl Iterator<Item = &'a Entry>) -> Vec<String> {
    let mut merged: Vec<&Candidate> = Vec::new();
    for candidate in entries.flat_map(|entry| entry.candidates.iter()) {
        if !merged.iter().any(|seen| seen.word == candidate.word) {
            merged.push(candidate);
        }
    }
    merged.sort_by(|left, right| right.frequency.cmp(&left.frequency));
    merged
        .into_iter()
        .take(MAX_CANDIDATES)
        .map(|candidate| candidate.word.clone())
        .collect()
}

/// Sorted word list with frequencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct WordList {
    words: Vec<Candidate>,
}

impl WordList {
    fn from_ranked(words: &[&str]) -> Self {
        let mut list = Self::default();
        let count = words.len() as u32;
        for (rank, word) in words.iter().enumerate() {
            list.upsert(word, count - rank as u32);
        }
        list
    }

    fn position(&self, word: &str) -> Result<usize, usize> {
        self.words
            .binary_search_by(|candidate| candidate.word.as_str().cmp(word))
    }

    fn frequency(&self, word: &str) -> Option<u32> {
        self.position(word)
            .ok()
            .map(|index| self.words[index].frequency)
    }

    fn upsert(&mut self, word: &str, frequency: u32) {
        match self.position(word) {
            Ok(index) => self.words[index].frequency = frequency,
            Err(index) => self.words.insert(
                index,
                Candidate {
                    word: word.to_string(),
                    frequency,
                },
            ),
        }
    }

    fn remove(&mut self, word: &str) -> bool {
        match self.position(word) {
            Ok(index) => {
                self.words.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    fn starting_with<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Candidate> + 'a {
        let start = self
            .words
            .partition_point(|candidate| candidate.word.as_str() < prefix);
        self.words[start..]
            .iter()
            .take_while(move |candidate| candidate.word.starts_with(prefix))
    }
}

/// Errors from lexicon loading and custom-word edits.
#[derive(Debug)]
pub enum LexiconError {
    Parse(serde_json::Error),
    InvalidWord(String),
}

impl Display for LexiconError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid lexicon json: {err}"),
            Self::InvalidWord(reason) => write!(f, "invalid custom word: {reason}"),
        }
    }
}

impl Error for LexiconError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::InvalidWord(_) => None,
        }
    }
}

/// Zhuyin candidates, completion table, common words and user words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputDictionary {
    zhuyin: Lexicon,
    completions: Lexicon,
    common: WordList,
    custom: WordList,
}

impl InputDictionary {
    /// Dictionary built from the embedded tables.
    pub fn embedded() -> Self {
        let mut common = WordList::from_ranked(COMMON_CHARS);
        let words = WordList::from_ranked(COMMON_WORDS);
        for candidate in words.words {
            common.upsert(&candidate.word, candidate.frequency);
        }
        Self {
            zhuyin: Lexicon::from_ranked(
                EMBEDDED_ZHUYIN
                    .iter()
                    .map(|(key, words)| (*key, words.to_vec())),
            ),
            completions: Lexicon::from_ranked(
                EMBEDDED_COMPLETIONS
                    .iter()
                    .map(|(key, words)| (*key, words.to_vec())),
            ),
            common,
            custom: WordList::default(),
        }
    }

    /// Replaces the Zhuyin table.
    pub fn with_zhuyin(mut self, lexicon: Lexicon) -> Self {
        self.zhuyin = lexicon;
        self
    }

    pub fn zhuyin_candidates(&self, composition: &str) -> Vec<String> {
        self.zhuyin.lookup(composition)
    }

    /// Completions for `prefix`: the completion table first, then longer
    /// common and custom words starting with it by frequency.
    pub fn common_completions(&self, prefix: &str) -> Vec<String> {
        if prefix.is_empty() {
            return Vec::new();
        }
        let mut results = self.completions.lookup(prefix);
        for word in self.ranked_words(prefix, false) {
            if results.len() >= MAX_CANDIDATES {
                break;
            }
            if !results.contains(&word) {
                results.push(word);
            }
        }
        results
    }

    /// Common and custom words starting with `input`, including `input`
    /// itself, by frequency.
    pub fn candidate_words(&self, input: &str) -> Vec<String> {
        if input.is_empty() {
            return Vec::new();
        }
        self.ranked_words(input, true)
    }

    pub fn word_frequency(&self, word: &str) -> u32 {
        self.common
            .frequency(word)
            .or_else(|| self.custom.frequency(word))
            .unwrap_or(0)
    }

    /// Adds a user word; repeated adds raise its frequency.
    pub fn add_custom_word(&mut self, word: &str) -> Result<(), LexiconError> {
        let trimmed = word.trim();
        if trimmed.is_empty() {
            return Err(LexiconError::InvalidWord("word cannot be empty".to_string()));
        }
        if trimmed.chars().count() > CUSTOM_WORD_MAX_CHARS {
            return Err(LexiconError::InvalidWord(format!(
                "word is longer than {CUSTOM_WORD_MAX_CHARS} characters"
            )));
        }
        let frequency = self.custom.frequency(trimmed).map_or(1, |value| value + 1);
        self.custom.upsert(trimmed, frequency);
        Ok(())
    }

    pub fn remove_custom_word(&mut self, word: &str) -> bool {
        self.custom.remove(word.trim())
    }

    fn ranked_words(&self, prefix: &str, include_exact: bool) -> Vec<String> {
        let mut words: Vec<&Candidate> = self
            .common
            .starting_with(prefix)
            .chain(self.custom.starting_with(prefix))
            .filter(|candidate| include_exact || candidate.word != prefix)
            .collect();
        words.sort_by(|left, right| right.frequency.cmp(&left.frequency));
        let mut out: Vec<String> = Vec::new();
        for candidate in words {
            if out.len() >= MAX_CANDIDATES {
                break;
            }
            if !out.contains(&candidate.word) {
                out.push(candidate.word.clone());
            }
        }
        out
    }
}

/// Zhuyin lookup against the embedded dictionary.
pub fn get_zhuyin_candidates(composition: &str) -> Vec<String> {
    EMBEDDED.zhuyin_candidates(composition)
}

/// Completion lookup against the embedded dictionary.
pub fn get_common_completions(prefix: &str) -> Vec<String> {
    EMBEDDED.common_completions(prefix)
}

#[cfg(test)]
mod tests {
    use super::{get_common_completions, get_zhuyin_candidates, InputDictionary, Lexicon};

    #[test]
    fn exact_zhuyin_lookup_keeps_table_order() {
        assert_eq!(get_zhuyin_candidates("ㄋㄧˇ"), vec!["你", "妳", "尼", "泥"]);
    }

    #[test]
    fn partial_composition_matches_extending_keys() {
        let candidates = get_zhuyin_candidates("ㄐㄧ");
        assert_eq!(candidates.first().map(String::as_str), Some("界"));
    }

    #[test]
    fn unknown_composition_falls_back_to_leading_symbols() {
        let candidates = get_zhuyin_candidates("ㄋㄧˋ");
        assert_eq!(candidates, vec!["你", "妳", "尼", "泥"]);
        assert!(get_zhuyin_candidates("ㄅ").is_empty());
        assert!(get_zhuyin_candidates("").is_empty());
    }

    #[test]
    fn completions_start_with_the_table_then_common_words() {
        let completions = get_common_completions("你");
        assert_eq!(&completions[..3], &["你好", "你們", "你的"]);
        assert!(get_common_completions("").is_empty());

        let words = get_common_completions("資料");
        assert_eq!(words, vec!["資料夾"]);
    }

    #[test]
    fn ties_are_stable_and_frequency_wins() {
        let mut lexicon = Lexicon::from_ranked(vec![("ab", vec!["x", "y"]), ("ac", vec!["z"])]);
        lexicon.insert("ac", "w".to_string(), 5);
        assert_eq!(lexicon.lookup("a"), vec!["w", "x", "y", "z"]);
        assert!(lexicon.remove("ac", "w"));
        assert!(!lexicon.remove("ac", "w"));
    }

    #[test]
    fn json_tables_replace_the_embedded_zhuyin() {
        let lexicon = Lexicon::from_json_str(r#"{"ㄇㄚ": ["媽", "麻"]}"#)
            .expect("lexicon json should parse");
        let dictionary = InputDictionary::embedded().with_zhuyin(lexicon);
        assert_eq!(dictionary.zhuyin_candidates("ㄇㄚ"), vec!["媽", "麻"]);
        assert!(dictionary.zhuyin_candidates("ㄋㄧˇ").is_empty());
        assert!(Lexicon::from_json_str("[1,2]").is_err());
    }

    #[test]
    fn custom_words_join_candidates_and_can_be_removed() {
        let mut dictionary = InputDictionary::embedded();
        dictionary
            .add_custom_word("資料庫")
            .expect("custom word should be accepted");
        dictionary
            .add_custom_word("資料庫")
            .expect("custom word should be accepted");
        assert_eq!(dictionary.word_frequency("資料庫"), 2);
        assert!(dictionary
            .candidate_words("資料")
            .contains(&"資料庫".to_string()));

        assert!(dictionary.remove_custom_word("資料庫"));
        assert_eq!(dictionary.word_frequency("資料庫"), 0);
        assert!(dictionary.add_custom_word("   ").is_err());
    }
}
