use super::patterns::is_false_positive_title;
use super::CitationInfo;

/// Free-text citations shorter than this carry too little to resolve
pub const MIN_RAW_REFERENCE_LENGTH: usize = 20;

/// Check whether a normalized citation is worth resolving.
///
/// Accepted when it has an adequate title, a usable free-text string, or a DOI,
/// and its title is not extraction noise such as a section header or caption.
pub fn is_valid_citation(info: &CitationInfo, min_title_length: usize) -> bool {
    let has_title = info.title.chars().count() >= min_title_length;
    let has_raw = info.raw_reference.chars().count() >= MIN_RAW_REFERENCE_LENGTH;
    let has_doi = !info.doi.is_empty();

    (has_title || has_raw || has_doi) && !is_false_positive_title(&info.title)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(title: &str, raw: &str, doi: &str) -> CitationInfo {
        CitationInfo {
            title: title.to_string(),
            raw_reference: raw.to_string(),
            doi: doi.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_section_header_title() {
        let info = citation(
            "References",
            "References and further reading for the chapter",
            "",
        );
        assert!(!is_valid_citation(&info, 10));
    }

    #[test]
    fn test_accepts_doi_only() {
        assert!(is_valid_citation(&citation("", "", "10.1000/xyz"), 10));
    }

    #[test]
    fn test_rejects_short_title_without_other_fields() {
        assert!(!is_valid_citation(&citation("Short", "", ""), 10));
    }

    #[test]
    fn test_accepts_raw_reference_only() {
        let info = citation("", "Doe J. An unparsed but usable citation, 2019.", "");
        assert!(is_valid_citation(&info, 10));
    }

    #[test]
    fn test_rejects_caption_even_with_doi() {
        let info = citation("Table 2", "", "10.1000/xyz");
        assert!(!is_valid_citation(&info, 10));
    }

    #[test]
    fn test_title_length_counts_characters() {
        // ten characters, more than ten bytes
        let info = citation("Ünïcödé Ok", "", "");
        assert!(is_valid_citation(&info, 10));
    }
}
