//! Citation records before and after normalization.

use serde::de::{self, Deserializer, Unexpected};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::doi::clean_doi;
use super::patterns::find_arxiv_id;
use super::Provenance;
use crate::common::truncate_chars;

/// A raw field value: extraction backends return either a single string or a list
/// (typically authors); JSON input may also carry bare numbers for years and volumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Empty,
    Text(String),
    List(Vec<String>),
    Number(serde_json::Number),
}

impl FieldValue {
    /// Canonical string form: trimmed text, list items space-joined
    pub fn flatten(&self) -> String {
        match self {
            FieldValue::Empty => String::new(),
            FieldValue::Text(s) => s.trim().to_string(),
            FieldValue::List(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
            FieldValue::Number(n) => n.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.flatten().is_empty()
    }
}

/// Null, booleans and nested values inside a list are skipped; numbers are kept as text
fn list_item(item: Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(FieldValue::Empty),
            Value::String(s) => Ok(FieldValue::Text(s)),
            Value::Number(n) => Ok(FieldValue::Number(n)),
            Value::Array(items) => Ok(FieldValue::List(
                items.into_iter().filter_map(list_item).collect(),
            )),
            Value::Bool(b) => Err(de::Error::invalid_type(
                Unexpected::Bool(b),
                &"a string, number or list",
            )),
            Value::Object(_) => Err(de::Error::invalid_type(
                Unexpected::Map,
                &"a string, number or list",
            )),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        FieldValue::List(items)
    }
}

/// One detected citation as a backend produced it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCitationRecord {
    pub title: FieldValue,
    pub author: FieldValue,
    pub journal: FieldValue,
    pub year: FieldValue,
    pub doi: FieldValue,
    pub volume: FieldValue,
    pub page: FieldValue,
    /// Free-text citation string
    #[serde(alias = "raw")]
    pub raw_reference: FieldValue,
    /// Unclassified text that may carry identifiers
    pub misc: FieldValue,
    pub arxiv_id: FieldValue,
    pub provenance: Provenance,
}

/// Canonical citation fields used by the resolution stage.
///
/// `doi` is either empty or matches `10.<digits>/...`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationInfo {
    pub title: String,
    pub author: String,
    pub journal: String,
    pub year: String,
    pub doi: String,
    pub volume: String,
    pub page: String,
    pub raw_reference: String,
    pub arxiv_id: String,
    pub provenance: Provenance,
}

impl CitationInfo {
    /// Short label for logs and status lines
    pub fn label(&self) -> &str {
        let text = if self.title.is_empty() {
            &self.raw_reference
        } else {
            &self.title
        };
        truncate_chars(text, 60)
    }
}

/// Normalize a raw record: flatten lists, validate the DOI, recover a preprint id
/// from free text, and synthesize a citation string when none was extracted.
pub fn normalize(record: &RawCitationRecord) -> CitationInfo {
    let title = record.title.flatten();
    let author = record.author.flatten();
    let journal = record.journal.flatten();
    let year = record.year.flatten();
    let mut raw_reference = record.raw_reference.flatten();

    let explicit_arxiv = record.arxiv_id.flatten();
    let arxiv_id = if explicit_arxiv.is_empty() {
        let misc_text = format!("{} {}", record.misc.flatten(), raw_reference);
        find_arxiv_id(&misc_text).unwrap_or_default()
    } else {
        find_arxiv_id(&format!("arXiv:{}", explicit_arxiv.trim_start_matches("arXiv:")))
            .unwrap_or(explicit_arxiv)
    };

    if raw_reference.is_empty() && !title.is_empty() {
        raw_reference = synthesize_reference(&title, &author, &journal, &year);
    }

    CitationInfo {
        doi: clean_doi(&record.doi.flatten()),
        volume: record.volume.flatten(),
        page: record.page.flatten(),
        title,
        author,
        journal,
        year,
        raw_reference,
        arxiv_id,
        provenance: record.provenance,
    }
}

fn synthesize_reference(title: &str, author: &str, journal: &str, year: &str) -> String {
    let mut parts = vec![title.to_string()];
    if !author.is_empty() {
        parts.push(format!("by {}", author));
    }
    if !journal.is_empty() {
        parts.push(journal.to_string());
    }
    if !year.is_empty() {
        parts.push(format!("({})", year));
    }
    parts.join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_list_fields() {
        let value = FieldValue::List(vec![
            "Ada Lovelace".to_string(),
            " ".to_string(),
            "Charles Babbage".to_string(),
        ]);
        assert_eq!(value.flatten(), "Ada Lovelace Charles Babbage");
        assert_eq!(FieldValue::Empty.flatten(), "");
        assert_eq!(FieldValue::from("  padded ").flatten(), "padded");
    }

    #[test]
    fn test_deserialize_mixed_field_shapes() {
        let json = r#"{
            "title": ["Deep", "Residual Learning"],
            "author": "He, K.",
            "year": 2016,
            "doi": null,
            "raw": "He K. Deep Residual Learning. CVPR 2016."
        }"#;
        let record: RawCitationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.title.flatten(), "Deep Residual Learning");
        assert_eq!(record.year.flatten(), "2016");
        assert!(record.doi.is_empty());
        assert_eq!(record.provenance, Provenance::Heuristic);
        assert!(!record.raw_reference.is_empty());
    }

    #[test]
    fn test_list_with_null_and_number_items() {
        let json = r#"{"title": "A survey of sparse attention", "author": ["A. Smith", null, 42, "", "B. Jones"]}"#;
        let record: RawCitationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(
            record.author,
            FieldValue::List(vec![
                "A. Smith".to_string(),
                "42".to_string(),
                String::new(),
                "B. Jones".to_string()
            ])
        );
        assert_eq!(record.author.flatten(), "A. Smith 42 B. Jones");
    }

    #[test]
    fn test_object_field_rejected() {
        let json = r#"{"title": {"main": "nested"}}"#;
        assert!(serde_json::from_str::<RawCitationRecord>(json).is_err());
    }

    #[test]
    fn test_normalize_cleans_doi() {
        let record = RawCitationRecord {
            title: "A title of reasonable length".into(),
            doi: "https://doi.org/10.1000/xyz.".into(),
            ..Default::default()
        };
        assert_eq!(normalize(&record).doi, "10.1000/xyz");

        let bogus = RawCitationRecord {
            doi: "pending".into(),
            ..Default::default()
        };
        assert_eq!(normalize(&bogus).doi, "");
    }

    #[test]
    fn test_normalize_mines_arxiv_from_misc_and_raw() {
        let from_misc = RawCitationRecord {
            misc: "preprint arXiv:2301.01234v2".into(),
            ..Default::default()
        };
        assert_eq!(normalize(&from_misc).arxiv_id, "2301.01234v2");

        let from_raw = RawCitationRecord {
            raw_reference: "Doe J. Scaling laws. arXiv:2001.08361 (2020)".into(),
            ..Default::default()
        };
        assert_eq!(normalize(&from_raw).arxiv_id, "2001.08361");
    }

    #[test]
    fn test_normalize_keeps_explicit_arxiv() {
        let record = RawCitationRecord {
            arxiv_id: "arXiv:1706.03762".into(),
            raw_reference: "arXiv:2001.08361".into(),
            ..Default::default()
        };
        assert_eq!(normalize(&record).arxiv_id, "1706.03762");
    }

    #[test]
    fn test_normalize_synthesizes_raw_reference() {
        let record = RawCitationRecord {
            title: "Attention is all you need".into(),
            author: FieldValue::List(vec!["Vaswani".to_string(), "Shazeer".to_string()]),
            journal: "NeurIPS".into(),
            year: "2017".into(),
            ..Default::default()
        };
        let info = normalize(&record);
        assert_eq!(
            info.raw_reference,
            "Attention is all you need. by Vaswani Shazeer. NeurIPS. (2017)"
        );
    }

    #[test]
    fn test_label_falls_back_to_raw() {
        let info = CitationInfo {
            raw_reference: "Unparsed citation text".to_string(),
            ..Default::default()
        };
        assert_eq!(info.label(), "Unparsed citation text");
    }
}
