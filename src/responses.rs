//! Typed decoding of stored evaluation responses.
//!
//! A form response document looks like
//! `{"response": {"<epa>": {"<kf>": {"text": ["..."], "<option>": true}}}}`.
//! Rows exported from the results table wrap it together with the request
//! that produced it. Decoding is lenient about the parts the product never
//! validated: odd key-function entries and non-string texts are skipped.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyFunctionResponse {
    #[serde(default, deserialize_with = "string_items")]
    pub text: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeyFunctionEntry {
    Response(KeyFunctionResponse),
    Other(#[allow(dead_code)] IgnoredAny),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EpaEntry {
    Block(BTreeMap<String, KeyFunctionEntry>),
    Other(#[allow(dead_code)] IgnoredAny),
}

/// The `response` document of one submitted evaluation form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormResponse {
    #[serde(default)]
    response: Option<BTreeMap<String, EpaEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormRequest {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub clinical_settings: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormResponseRow {
    #[serde(default)]
    pub response: Option<FormResponse>,
    #[serde(default)]
    pub form_requests: Option<FormRequest>,
}

/// One exported form result row.
#[derive(Debug, Clone, Deserialize)]
pub struct FormRecord {
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub form_responses: Option<FormResponseRow>,
}

fn string_items<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Numeric keys first in numeric order, then the rest lexically.
fn key_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

impl FormResponse {
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Every non-blank comment written for `epa`, in key-function order.
    pub fn comments_for_epa(&self, epa: u32) -> Vec<String> {
        let block = self.response.as_ref().and_then(|r| r.get(&epa.to_string()));
        let Some(EpaEntry::Block(block)) = block else {
            return Vec::new();
        };
        let mut kfs: Vec<(&String, &KeyFunctionEntry)> = block.iter().collect();
        kfs.sort_by(|a, b| key_order(a.0, b.0));
        kfs.into_iter()
            .filter_map(|(_, entry)| match entry {
                KeyFunctionEntry::Response(kf) => Some(kf),
                KeyFunctionEntry::Other(_) => None,
            })
            .flat_map(|kf| kf.text.iter())
            .filter(|t| !t.trim_matches(crate::is_space).is_empty())
            .cloned()
            .collect()
    }
}

impl FormRecord {
    pub fn student_id(&self) -> Option<&str> {
        self.form_responses
            .as_ref()?
            .form_requests
            .as_ref()?
            .student_id
            .as_deref()
    }

    pub fn response(&self) -> Option<&FormResponse> {
        self.form_responses.as_ref()?.response.as_ref()
    }
}

/// Decode an exported array of rows. Rows that do not decode are logged and
/// skipped; only a malformed document is an error.
pub fn parse_records(input: &str) -> Result<Vec<FormRecord>> {
    let rows: Vec<Value> = serde_json::from_str(input)?;
    Ok(rows
        .into_iter()
        .enumerate()
        .filter_map(|(i, row)| match serde_json::from_value(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(row = i, error = %e, "skipping undecodable form record");
                None
            }
        })
        .collect())
}

/// Gather one student's comments for each of `epas`. Every requested EPA
/// gets an entry, empty when nothing was written.
pub fn collect_epa_comments(
    records: &[FormRecord],
    student_id: &str,
    epas: impl IntoIterator<Item = u32>,
) -> BTreeMap<u32, Vec<String>> {
    let mut per_epa: BTreeMap<u32, Vec<String>> =
        epas.into_iter().map(|epa| (epa, Vec::new())).collect();

    for record in records {
        if record.student_id() != Some(student_id) {
            continue;
        }
        let Some(response) = record.response() else {
            continue;
        };
        for (epa, comments) in per_epa.iter_mut() {
            comments.extend(response.comments_for_epa(*epa));
        }
    }
    per_epa
}
