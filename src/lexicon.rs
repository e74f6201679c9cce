//! Word lists driving the GENERIC, PROFANITY and LOW_SIGNAL checks.
//!
//! The defaults are the hand-curated English lists used by the report page.
//! A TOML file may replace any of them; omitted lists keep their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Default lists
// ---------------------------------------------------------------------------

const GENERIC_EXACT: &[&str] = &[
    "good",
    "nice",
    "ok",
    "okay",
    "great",
    "excellent",
    "well done",
    "n/a",
    "na",
    "none",
    "no comment",
    "nothing",
    "all good",
    "looks good",
    "fine",
];

const GENERIC_CONTAINS: &[&str] = &[
    "good job",
    "keep it up",
    "keep up the good work",
    "great work",
    "nice work",
    "doing well",
    "no issues",
    "nothing to add",
];

const PROFANITY: &[&str] = &["fuck", "shit", "bitch", "asshole", "bastard", "dick", "cunt"];

const PRAISE: &[&str] = &["good", "great", "nice", "excellent", "well done", "amazing"];

const DETAIL_SIGNALS: &[&str] = &[
    "because",
    "so that",
    "however",
    "but",
    "improve",
    "suggest",
    "recommend",
    "next time",
    "specific",
    "example",
    "when",
];

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

fn default_generic_exact() -> Vec<String> {
    owned(GENERIC_EXACT)
}

fn default_generic_contains() -> Vec<String> {
    owned(GENERIC_CONTAINS)
}

fn default_profanity() -> Vec<String> {
    owned(PROFANITY)
}

fn default_praise() -> Vec<String> {
    owned(PRAISE)
}

fn default_detail_signals() -> Vec<String> {
    owned(DETAIL_SIGNALS)
}

// ---------------------------------------------------------------------------
// Lexicon
// ---------------------------------------------------------------------------

/// Lists are matched against the lowercased, normalized comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lexicon {
    /// Whole-comment matches
    #[serde(default = "default_generic_exact")]
    pub generic_exact: Vec<String>,
    /// Substring matches
    #[serde(default = "default_generic_contains")]
    pub generic_contains: Vec<String>,
    /// Whole-word matches
    #[serde(default = "default_profanity")]
    pub profanity: Vec<String>,
    /// Substring matches
    #[serde(default = "default_praise")]
    pub praise: Vec<String>,
    /// Whole-word matches
    #[serde(default = "default_detail_signals")]
    pub detail_signals: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            generic_exact: default_generic_exact(),
            generic_contains: default_generic_contains(),
            profanity: default_profanity(),
            praise: default_praise(),
            detail_signals: default_detail_signals(),
        }
    }
}

impl Lexicon {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let lexicon: Lexicon = toml::from_str(input)?;
        lexicon.canonicalized()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)?;
        let lexicon = Self::from_toml_str(&input)?;
        info!(
            path = %path.display(),
            generic = lexicon.generic_exact.len() + lexicon.generic_contains.len(),
            profanity = lexicon.profanity.len(),
            praise = lexicon.praise.len(),
            "loaded lexicon"
        );
        Ok(lexicon)
    }

    /// Lowercase and trim every entry. Empty entries would match every
    /// comment, so they are rejected.
    pub fn canonicalized(self) -> Result<Self> {
        Ok(Self {
            generic_exact: canonical_list("generic_exact", self.generic_exact)?,
            generic_contains: canonical_list("generic_contains", self.generic_contains)?,
            profanity: canonical_list("profanity", self.profanity)?,
            praise: canonical_list("praise", self.praise)?,
            detail_signals: canonical_list("detail_signals", self.detail_signals)?,
        })
    }
}

fn canonical_list(name: &str, words: Vec<String>) -> Result<Vec<String>> {
    words
        .into_iter()
        .enumerate()
        .map(|(i, w)| {
            let w = w.trim().to_lowercase();
            if w.is_empty() {
                Err(Error::InvalidLexicon(format!("{name}[{i}] is empty")))
            } else {
                Ok(w)
            }
        })
        .collect()
}
