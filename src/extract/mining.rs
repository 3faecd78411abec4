//! Field mining from free-text citation strings.
//!
//! Used for loose citations the structured service could not parse and for every entry the
//! heuristic backend splits out of plain PDF text. Results are best-effort: a field is only
//! filled when a pattern matches with reasonable confidence.

use lazy_static::lazy_static;
use regex::Regex;

use super::doi::mine_doi;
use super::patterns::{clean_text, find_arxiv_id, find_year};
use super::{Provenance, RawCitationRecord};

/// Mined titles at or below this many characters are discarded
const MIN_MINED_TITLE_LENGTH: usize = 10;

lazy_static! {
    static ref QUOTED_TITLE: Regex =
        Regex::new(r#"["“]([^"“”]{10,})["”]"#).unwrap();

    // Title followed by a venue marker: "Some title. In Proc..." / "... Journal of"
    static ref TITLE_BEFORE_VENUE: Regex = Regex::new(
        r"(?i)^([^.]+(?:\.[^.]+)*?)\.\s*(?:In\s|Proc|Conference|Journal)"
    ).unwrap();

    // "Smith, J" - surname, comma, initial
    static ref SURNAME_FIRST: Regex = Regex::new(r"^[A-Z][A-Za-z'\-]+,\s*[A-Z]").unwrap();

    // "Smith JK" / "Smith JK, Doe A" - Vancouver style
    static ref SURNAME_INITIALS: Regex = Regex::new(r"^[A-Z][A-Za-z'\-]+\s[A-Z]{1,3}(?:,|$)").unwrap();

    // "J. Smith" / "J. K. Smith"
    static ref INITIALS_FIRST: Regex = Regex::new(r"^(?:[A-Z]\.\s*)+[A-Z][a-z]").unwrap();

    // Lone initials left behind by splitting on ". "
    static ref INITIALS_ONLY: Regex = Regex::new(r"^(?:[A-Z]\.?\s*){1,3}$").unwrap();
}

/// Mine a raw citation record out of a free-text citation string
pub fn mine_loose_citation(text: &str, provenance: Provenance) -> RawCitationRecord {
    let cleaned = clean_text(text);

    let (author, title) = match quoted_title(&cleaned) {
        Some(title) => (leading_authors(&cleaned), Some(title)),
        None => match split_authors_and_title(&cleaned) {
            (author, Some(title)) => (author, Some(title)),
            (author, None) => (author, title_before_venue(&cleaned)),
        },
    };

    RawCitationRecord {
        title: title.unwrap_or_default().into(),
        author: author.unwrap_or_default().into(),
        year: find_year(&cleaned).unwrap_or_default().into(),
        doi: mine_doi(&cleaned).unwrap_or_default().into(),
        arxiv_id: find_arxiv_id(&cleaned).unwrap_or_default().into(),
        raw_reference: cleaned.into(),
        provenance,
        ..Default::default()
    }
}

fn trim_title(candidate: &str) -> Option<String> {
    let title = candidate
        .trim()
        .trim_end_matches(|c: char| matches!(c, ',' | '.' | ';' | ':'))
        .trim();
    (title.chars().count() > MIN_MINED_TITLE_LENGTH).then(|| title.to_string())
}

fn quoted_title(text: &str) -> Option<String> {
    QUOTED_TITLE
        .captures(text)
        .and_then(|cap| cap.get(1))
        .and_then(|m| trim_title(m.as_str()))
}

fn title_before_venue(text: &str) -> Option<String> {
    let candidate = TITLE_BEFORE_VENUE.captures(text)?.get(1)?.as_str().trim();
    if SURNAME_FIRST.is_match(candidate) {
        return None;
    }
    trim_title(candidate)
}

fn looks_like_author_lead(segment: &str) -> bool {
    SURNAME_FIRST.is_match(segment)
        || SURNAME_INITIALS.is_match(segment)
        || INITIALS_FIRST.is_match(segment)
}

fn is_author_fragment(segment: &str) -> bool {
    let segment = segment.trim();
    INITIALS_ONLY.is_match(segment)
        || segment.starts_with("and ")
        || segment.starts_with("& ")
        || segment.contains("et al")
        || looks_like_author_lead(segment)
}

/// Split "Authors. Title. Venue..." into its author block and the segment after it.
/// Initials break the text into many short segments, so every leading segment that still
/// looks like author material is folded into the author block.
fn split_authors_and_title(text: &str) -> (Option<String>, Option<String>) {
    let segments: Vec<&str> = text.split(". ").collect();
    if segments.len() < 2 || !looks_like_author_lead(segments[0]) {
        return (None, None);
    }

    let mut end = 1;
    while end < segments.len() && is_author_fragment(segments[end]) {
        end += 1;
    }

    let authors = segments[..end].join(". ");
    let title = segments.get(end).and_then(|s| trim_title(s));
    (Some(authors), title)
}

fn leading_authors(text: &str) -> Option<String> {
    split_authors_and_title(text).0
}
