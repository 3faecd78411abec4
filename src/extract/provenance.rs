use serde::{Deserialize, Serialize};

/// Provenance of a citation record - which extraction path produced it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Split and mined from plain PDF text (lowest quality)
    #[default]
    Heuristic = 0,
    /// Free-text citation string returned by the structured service
    Loose = 1,
    /// Field-level citation parsed by the structured service (highest quality)
    Structured = 2,
}

impl Provenance {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Structured => "structured",
            Provenance::Loose => "loose",
            Provenance::Heuristic => "heuristic",
        }
    }

    /// Check if the record came back from the structured extraction service
    pub fn is_structured_backend(&self) -> bool {
        matches!(self, Provenance::Structured | Provenance::Loose)
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
