use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Modern arXiv ID after an "arXiv" label: YYMM.NNNN(N) with optional version
    // Examples: arXiv:2301.01234, arXiv2301.01234v2
    pub static ref ARXIV_ID_PATTERN: Regex = Regex::new(
        r"(?i)arXiv:?(\d{4}\.\d{4,5}(?:v\d+)?)"
    ).unwrap();

    // arXiv URL format: arxiv.org/abs/YYMM.NNNNN or arxiv.org/pdf/YYMM.NNNNN
    pub static ref ARXIV_URL_PATTERN: Regex = Regex::new(
        r"(?i)arxiv\.org/(?:abs|pdf)/(\d{4}\.\d{4,5}(?:v\d+)?)"
    ).unwrap();

    // Plausible publication year inside free text
    pub static ref YEAR_PATTERN: Regex = Regex::new(r"\b(?:19|20)\d{2}\b").unwrap();

    // Leading citation markers: "[12] " and "12. "
    pub static ref BRACKET_MARKER: Regex = Regex::new(r"^\s*\[\d+\]\s*").unwrap();
    pub static ref NUMBER_MARKER: Regex = Regex::new(r"^\s*\d+\.\s*").unwrap();

    // Titles that are extraction noise rather than citations
    pub static ref FALSE_POSITIVE_TITLES: Vec<Regex> = vec![
        // Section headers
        Regex::new(r"(?i)^(acknowledgments?|acknowledgements?|references?|bibliography)$").unwrap(),
        // Figure and table captions
        Regex::new(r"(?i)^(table|figure|fig\.)\s*\d+").unwrap(),
        // Just numbers
        Regex::new(r"^\d+$").unwrap(),
        // Single letters
        Regex::new(r"(?i)^[a-z]$").unwrap(),
    ];
}

/// Find a preprint identifier in free text, preferring the labelled form over URLs
pub fn find_arxiv_id(text: &str) -> Option<String> {
    ARXIV_ID_PATTERN
        .captures(text)
        .or_else(|| ARXIV_URL_PATTERN.captures(text))
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// Find a plausible publication year in free text
pub fn find_year(text: &str) -> Option<String> {
    YEAR_PATTERN.find(text).map(|m| m.as_str().to_string())
}

/// Collapse whitespace and strip leading citation markers
pub fn clean_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let without_number = NUMBER_MARKER.replace(&collapsed, "");
    BRACKET_MARKER.replace(&without_number, "").into_owned()
}

pub fn is_false_positive_title(title: &str) -> bool {
    let title = title.trim();
    FALSE_POSITIVE_TITLES.iter().any(|re| re.is_match(title))
}
