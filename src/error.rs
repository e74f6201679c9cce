//! Error types for the fallible edges of the crate.
//!
//! Classification itself never fails; only lexicon loading, pattern
//! compilation and decoding of stored form responses can.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A lexicon list contained an unusable entry
    #[error("Invalid lexicon: {0}")]
    InvalidLexicon(String),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
