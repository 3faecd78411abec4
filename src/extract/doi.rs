use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// DOI pattern - captures DOI from various formats
    /// Matches: bare DOI, doi:prefix, URL forms
    pub static ref DOI_PATTERN: Regex = Regex::new(
        r#"(?i)(?:doi[:\s]*|(?:https?://)?(?:dx\.)?doi\.org/)?(10\.\d{4,}/[^\s\]\)>,;"']+)"#
    ).unwrap();

    /// Resolver URL or `doi:` label in front of a DOI field
    static ref DOI_PREFIX: Regex = Regex::new(
        r"(?i)^(?:https?://(?:dx\.)?doi\.org/|doi:\s*)"
    ).unwrap();

    /// Shape every stored DOI must have
    pub static ref VALID_DOI: Regex = Regex::new(r"^10\.\d+/\S").unwrap();
}

/// Strip trailing punctuation and URL-encoded separators picked up from running text
fn strip_doi_noise(doi: &str) -> String {
    let mut result = doi
        .replace("%2F", "/")
        .replace("%2f", "/")
        .replace("%3A", ":")
        .replace("%3a", ":");

    let trailing_chars: &[char] = &['.', ',', ';', ':', ')', ']', '>', '"', '\'', ' '];
    while result.ends_with(trailing_chars) {
        result.pop();
    }
    result
}

/// Clean a DOI field: drop any resolver URL prefix, trim, validate.
/// Returns an empty string when the value is not a DOI.
pub fn clean_doi(doi: &str) -> String {
    let trimmed = doi.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let without_prefix = DOI_PREFIX.replace(trimmed, "");
    let cleaned = strip_doi_noise(without_prefix.trim());

    if is_valid_doi(&cleaned) {
        cleaned
    } else {
        String::new()
    }
}

pub fn is_valid_doi(doi: &str) -> bool {
    VALID_DOI.is_match(doi)
}

/// First DOI found in free text, cleaned
pub fn mine_doi(text: &str) -> Option<String> {
    DOI_PATTERN
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|m| clean_doi(m.as_str()))
        .find(|doi| !doi.is_empty())
}
