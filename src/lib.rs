use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub mod cache;
pub mod error;
pub mod lexicon;
pub mod responses;
pub mod summary;

pub use error::{Error, Result};
pub use lexicon::Lexicon;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// Why a comment is considered low quality.
///
/// Variant order is the canonical order: reason sets and count maps iterate
/// in it, and it breaks ties when picking the most common reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultReason {
    NoContent,
    TooShort,
    Generic,
    AllCaps,
    Repeated,
    Profanity,
    LowSignal,
}

impl FaultReason {
    pub const ALL: [FaultReason; 7] = [
        FaultReason::NoContent,
        FaultReason::TooShort,
        FaultReason::Generic,
        FaultReason::AllCaps,
        FaultReason::Repeated,
        FaultReason::Profanity,
        FaultReason::LowSignal,
    ];

    /// Human-readable text shown next to a flagged comment.
    pub fn label(self) -> &'static str {
        match self {
            FaultReason::NoContent => "No content / empty",
            FaultReason::TooShort => "Comment too short",
            FaultReason::Generic => "Generic / unhelpful",
            FaultReason::AllCaps => "All caps",
            FaultReason::Repeated => "Repeated comment",
            FaultReason::Profanity => "Contains profanity",
            FaultReason::LowSignal => "Low signal (not specific)",
        }
    }
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlaggedComment {
    /// Normalized comment text
    pub text: String,
    pub reasons: BTreeSet<FaultReason>,
}

/// Per-reason counters. Always holds every [`FaultReason`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReasonCounts(BTreeMap<FaultReason, usize>);

impl Default for ReasonCounts {
    fn default() -> Self {
        Self(FaultReason::ALL.iter().map(|r| (*r, 0)).collect())
    }
}

impl ReasonCounts {
    pub fn get(&self, reason: FaultReason) -> usize {
        self.0.get(&reason).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, reason: FaultReason) {
        *self.0.entry(reason).or_insert(0) += 1;
    }

    /// Entries in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (FaultReason, usize)> + '_ {
        self.0.iter().map(|(r, c)| (*r, *c))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> usize {
        self.0.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    /// Flagged comments in input order
    pub flagged: Vec<FlaggedComment>,
    pub total: usize,
    pub reason_counts: ReasonCounts,
}

// ---------------------------------------------------------------------------
// Hyperparameters
// ---------------------------------------------------------------------------

struct Hyperparameters {
    too_short_max_words: usize,
    all_caps_min_letters: usize,
    repeated_char_run: usize,
    repeated_word_run: usize,
    batch_repeat_min_count: usize,
    detail_min_words: usize,
}

static HP: Hyperparameters = Hyperparameters {
    too_short_max_words: 3,
    all_caps_min_letters: 10,
    repeated_char_run: 6,
    repeated_word_run: 4,
    batch_repeat_min_count: 3,
    detail_min_words: 12,
};

// ---------------------------------------------------------------------------
// Compiled patterns
// ---------------------------------------------------------------------------

// U+FEFF counts as whitespace so a byte-order mark never sticks to a comment.
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\x{FEFF}]+").unwrap());

static DEFAULT_ANALYZER: Lazy<CommentAnalyzer> = Lazy::new(CommentAnalyzer::default);

/// Whole-word alternation over `words`, matched against lowercased text.
/// Word boundaries are ASCII, so "shité" still contains "shit". `None` for
/// an empty list, which must never match.
fn word_boundary_pattern(words: &[String]) -> Result<Option<Regex>> {
    if words.is_empty() {
        return Ok(None);
    }
    let alt = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Ok(Some(Regex::new(&format!(r"(?-u:\b)(?:{alt})(?-u:\b)"))?))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn is_space(c: char) -> bool {
    c.is_whitespace() || c == '\u{FEFF}'
}

/// Trim, collapse whitespace runs to one space, straighten curly quotes.
pub fn normalize(text: &str) -> String {
    WHITESPACE_RE
        .replace_all(text.trim_matches(is_space), " ")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2019}', "'")
}

/// Key used to spot the same comment submitted several times, ignoring case
/// and punctuation.
pub fn duplicate_key(text: &str) -> String {
    normalize(text)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect()
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn ascii_letters(text: &str) -> String {
    text.chars().filter(char::is_ascii_alphabetic).collect()
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Same character `min_run` or more times in a row ("goooooood", "!!!!!!").
fn has_repeated_char_run(text: &str, min_run: usize) -> bool {
    let mut prev = None;
    let mut run = 0;
    for c in text.chars() {
        if prev == Some(c) {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }
        if run >= min_run {
            return true;
        }
    }
    false
}

/// The word-character run a token ends with, e.g. "good" for "(good".
fn trailing_word(token: &str) -> &str {
    let start = token
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_word_char(*c))
        .last()
        .map(|(i, _)| i);
    match start {
        Some(i) => &token[i..],
        None => "",
    }
}

/// `token` begins with `word` and the word ends there ("good." for "good").
fn starts_with_word(token: &str, word: &str) -> bool {
    match token.get(..word.len()) {
        Some(head) if head.eq_ignore_ascii_case(word) => {
            !token[word.len()..].starts_with(is_word_char)
        }
        _ => false,
    }
}

/// One word said `min_run` or more times back to back, case-insensitively
/// ("good good good good"). Only whitespace may separate the repetitions;
/// trailing punctuation is allowed on the last one.
fn has_repeated_word_run(text: &str, min_run: usize) -> bool {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        let word = trailing_word(token);
        if word.is_empty() {
            continue;
        }
        let mut run = 1;
        for next in &tokens[i + 1..] {
            if next.eq_ignore_ascii_case(word) {
                run += 1;
                continue;
            }
            if starts_with_word(next, word) {
                run += 1;
            }
            break;
        }
        if run >= min_run {
            return true;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Comment classifier bound to one [`Lexicon`]. Immutable once built, so a
/// single instance can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct CommentAnalyzer {
    lexicon: Lexicon,
    generic_exact: HashSet<String>,
    profanity_re: Option<Regex>,
    detail_re: Option<Regex>,
}

impl Default for CommentAnalyzer {
    fn default() -> Self {
        // The built-in lists are plain words; escaping makes them valid patterns.
        Self::new(Lexicon::default()).unwrap()
    }
}

impl CommentAnalyzer {
    pub fn new(lexicon: Lexicon) -> Result<Self> {
        let lexicon = lexicon.canonicalized()?;
        Ok(Self {
            generic_exact: lexicon.generic_exact.iter().cloned().collect(),
            profanity_re: word_boundary_pattern(&lexicon.profanity)?,
            detail_re: word_boundary_pattern(&lexicon.detail_signals)?,
            lexicon,
        })
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn detect_fault_reasons(&self, raw: &str) -> BTreeSet<FaultReason> {
        let text = normalize(raw);
        let lower = text.to_lowercase();
        let wc = word_count(&text);
        let letters = ascii_letters(&text);

        let mut reasons = BTreeSet::new();

        if letters.is_empty() {
            reasons.insert(FaultReason::NoContent);
        }

        if wc > 0 && wc <= HP.too_short_max_words {
            reasons.insert(FaultReason::TooShort);
        }

        if letters.len() >= HP.all_caps_min_letters && letters == letters.to_uppercase() {
            reasons.insert(FaultReason::AllCaps);
        }

        if self.generic_exact.contains(&lower)
            || self
                .lexicon
                .generic_contains
                .iter()
                .any(|p| lower.contains(p.as_str()))
        {
            reasons.insert(FaultReason::Generic);
        }

        if self.profanity_re.as_ref().is_some_and(|re| re.is_match(&lower)) {
            reasons.insert(FaultReason::Profanity);
        }

        if has_repeated_char_run(&text, HP.repeated_char_run)
            || has_repeated_word_run(&text, HP.repeated_word_run)
        {
            reasons.insert(FaultReason::Repeated);
        }

        let has_praise = self
            .lexicon
            .praise
            .iter()
            .any(|w| lower.contains(w.as_str()));
        let has_detail = self.detail_re.as_ref().is_some_and(|re| re.is_match(&lower))
            || wc >= HP.detail_min_words;
        if has_praise && !has_detail {
            reasons.insert(FaultReason::LowSignal);
        }

        reasons
    }

    /// Classify a batch of comments for one EPA. Comments whose duplicate
    /// key occurs three or more times in the batch are also REPEATED.
    pub fn analyze<S: AsRef<str>>(&self, comments: &[S]) -> QualityReport {
        let mut key_counts: HashMap<String, usize> = HashMap::new();
        for c in comments {
            *key_counts.entry(duplicate_key(c.as_ref())).or_insert(0) += 1;
        }
        let repeated_keys: HashSet<String> = key_counts
            .into_iter()
            .filter(|(_, count)| *count >= HP.batch_repeat_min_count)
            .map(|(key, _)| key)
            .collect();

        let mut flagged = Vec::new();
        let mut reason_counts = ReasonCounts::default();

        for raw in comments {
            let text = normalize(raw.as_ref());
            let mut reasons = self.detect_fault_reasons(&text);
            if repeated_keys.contains(&duplicate_key(&text)) {
                reasons.insert(FaultReason::Repeated);
            }
            if reasons.is_empty() {
                continue;
            }
            for r in &reasons {
                reason_counts.increment(*r);
            }
            trace!(text = %text, reasons = ?reasons, "flagged comment");
            flagged.push(FlaggedComment { text, reasons });
        }

        debug!(
            total = comments.len(),
            flagged = flagged.len(),
            repeated_keys = repeated_keys.len(),
            "analyzed comment batch"
        );

        QualityReport {
            flagged,
            total: comments.len(),
            reason_counts,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Classify one comment with the built-in lexicon.
pub fn detect_fault_reasons(raw: &str) -> BTreeSet<FaultReason> {
    DEFAULT_ANALYZER.detect_fault_reasons(raw)
}

/// Classify a batch of comments with the built-in lexicon.
pub fn analyze_comments_quality<S: AsRef<str>>(comments: &[S]) -> QualityReport {
    DEFAULT_ANALYZER.analyze(comments)
}
