//! Deterministic, index-qualified output filenames.

use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::common::truncate_chars;
use crate::extract::CitationInfo;

/// Characters kept from the title segment
const MAX_TITLE_CHARS: usize = 60;

/// The title segment is never shortened below this when fitting the length limit
const MIN_TITLE_CHARS: usize = 10;

const HASH_CHARS: usize = 8;

lazy_static! {
    static ref ILLEGAL_CHARS: Regex = Regex::new(r#"[<>:"/\\|?*\x00-\x1f\x7f]"#).unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

fn sanitize(text: &str) -> String {
    let stripped = ILLEGAL_CHARS.replace_all(text, "");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), "_");
    truncate_chars(collapsed.trim_matches(['_', '.']), MAX_TITLE_CHARS).to_string()
}

/// Filesystem-safe title segment: the title, else the free-text citation, else `reference_{index}`
pub fn sanitize_title(info: &CitationInfo, index: usize) -> String {
    [info.title.as_str(), info.raw_reference.as_str()]
        .into_iter()
        .map(sanitize)
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| format!("reference_{}", index))
}

/// First 8 hex chars of SHA-256 over `title|doi|arxiv_id|index`
pub fn content_hash(info: &CitationInfo, index: usize) -> String {
    let key = format!("{}|{}|{}|{}", info.title, info.doi, info.arxiv_id, index);
    let digest = Sha256::digest(key.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_CHARS);
    hash
}

/// `ref_{index:03}_{title}_{hash}.pdf`, shortening only the title segment to fit `max_len`
pub fn generate_filename(info: &CitationInfo, index: usize, max_len: usize) -> String {
    let title = sanitize_title(info, index);
    let hash = content_hash(info, index);
    let prefix = format!("ref_{:03}_", index);
    let suffix = format!("_{}.pdf", hash);

    let fixed = prefix.chars().count() + suffix.chars().count();
    let budget = max_len.saturating_sub(fixed).max(MIN_TITLE_CHARS);
    let title = truncate_chars(&title, budget).trim_end_matches(['_', '.']);

    format!("{}{}{}", prefix, title, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(title: &str, doi: &str) -> CitationInfo {
        CitationInfo {
            title: title.to_string(),
            doi: doi.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_sanitize_strips_illegal_and_collapses_whitespace() {
        let info = citation("What/is: a \"good\"   title? <yes>", "");
        assert_eq!(sanitize_title(&info, 1), "Whatis_a_good_title_yes");
    }

    #[test]
    fn test_sanitize_falls_back_to_raw_then_index() {
        let info = CitationInfo {
            raw_reference: "Smith J. Deep learning. 2020".to_string(),
            ..Default::default()
        };
        assert_eq!(sanitize_title(&info, 4), "Smith_J._Deep_learning._2020");

        let info = citation("???", "");
        assert_eq!(sanitize_title(&info, 7), "reference_7");
    }

    #[test]
    fn test_sanitize_truncates_to_sixty_chars() {
        let info = citation(&"word ".repeat(40), "");
        assert!(sanitize_title(&info, 1).chars().count() <= MAX_TITLE_CHARS);
    }

    #[test]
    fn test_filename_shape() {
        let info = citation("Attention Is All You Need", "10.5555/3295222");
        let name = generate_filename(&info, 3, 150);
        let hash = content_hash(&info, 3);
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(name, format!("ref_003_Attention_Is_All_You_Need_{}.pdf", hash));
    }

    #[test]
    fn test_filename_determinism() {
        let info = citation("Deterministic naming", "10.1000/xyz");
        assert_eq!(generate_filename(&info, 5, 150), generate_filename(&info, 5, 150));
        assert_ne!(generate_filename(&info, 5, 150), generate_filename(&info, 6, 150));
    }

    #[test]
    fn test_same_title_different_doi_differs() {
        let a = citation("Shared title", "10.1000/a");
        let b = citation("Shared title", "10.1000/b");
        assert_ne!(generate_filename(&a, 1, 150), generate_filename(&b, 1, 150));
    }

    #[test]
    fn test_length_limit_shortens_title_only() {
        let info = citation("An extremely long title about many different interesting things", "");
        let name = generate_filename(&info, 12, 40);
        assert!(name.chars().count() <= 40);
        assert!(name.starts_with("ref_012_An_extre"));
        assert!(name.ends_with(&format!("_{}.pdf", content_hash(&info, 12))));
    }
}
