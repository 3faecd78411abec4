//! Heuristic backend: plain PDF text, reference section detection, entry splitting.

use lazy_static::lazy_static;
use log::debug;
use lopdf::Document;
use regex::Regex;
use std::path::Path;

use super::mining::mine_loose_citation;
use super::{Provenance, RawCitationRecord};
use crate::error::ExtractionError;

/// Split entries at or below this many characters are dropped
const MIN_ENTRY_LENGTH: usize = 20;

lazy_static! {
    static ref SECTION_HEADING: Regex = Regex::new(
        r"(?i)^\s*(?:\d+\.?\s*|[IVX]+\.\s*)?(?:references|bibliography|works cited|literature cited)\s*:?\s*$"
    ).unwrap();

    static ref SECTION_END: Regex = Regex::new(
        r"(?i)^\s*(?:[A-Z]\.?\s+)?(?:appendix|appendices|supplementary)\b"
    ).unwrap();

    static ref BRACKET_ENTRY: Regex = Regex::new(r"^\s*\[\d+\]").unwrap();
    static ref NUMBERED_ENTRY: Regex = Regex::new(r"^\s*\d+\.\s+\S").unwrap();
}

/// Extract the plain text of every page
pub fn extract_pdf_text(path: &Path) -> Result<String, ExtractionError> {
    let document = Document::load(path).map_err(|err| {
        ExtractionError::PdfText(format!("failed to open {}: {}", path.display(), err))
    })?;

    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Ok(String::new());
    }

    document.extract_text(&pages).map_err(|err| {
        ExtractionError::PdfText(format!(
            "failed to extract text from {}: {}",
            path.display(),
            err
        ))
    })
}

/// Find the reference section in document text and split it into citation strings
pub fn parse_reference_section(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();

    let heading = lines.iter().rposition(|line| SECTION_HEADING.is_match(line));
    let body: Vec<&str> = match heading {
        Some(idx) => lines[idx + 1..]
            .iter()
            .take_while(|line| !SECTION_END.is_match(line))
            .copied()
            .collect(),
        None => lines,
    };

    let entries = if count_matches(&body, &BRACKET_ENTRY) >= 2 {
        group_by_marker(&body, &BRACKET_ENTRY)
    } else if count_matches(&body, &NUMBERED_ENTRY) >= 2 {
        group_by_marker(&body, &NUMBERED_ENTRY)
    } else if heading.is_some() {
        group_by_blank_lines(&body)
    } else {
        Vec::new()
    };

    entries
        .iter()
        .map(|entry| join_entry_lines(entry))
        .filter(|entry| entry.chars().count() > MIN_ENTRY_LENGTH)
        .collect()
}

fn count_matches(lines: &[&str], marker: &Regex) -> usize {
    lines.iter().filter(|line| marker.is_match(line)).count()
}

/// Start a new entry at every marker line; text before the first marker is dropped
fn group_by_marker<'a>(lines: &[&'a str], marker: &Regex) -> Vec<Vec<&'a str>> {
    let mut entries: Vec<Vec<&'a str>> = Vec::new();
    for line in lines {
        if marker.is_match(line) {
            entries.push(vec![line]);
        } else if let Some(current) = entries.last_mut() {
            current.push(line);
        }
    }
    entries
}

fn group_by_blank_lines<'a>(lines: &[&'a str]) -> Vec<Vec<&'a str>> {
    lines
        .split(|line| line.trim().is_empty())
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Join wrapped lines, undoing end-of-line hyphenation
fn join_entry_lines(lines: &[&str]) -> String {
    let mut joined = String::new();
    for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        let continues_word = joined.ends_with('-')
            && line.chars().next().is_some_and(|c| c.is_lowercase());
        if continues_word {
            joined.pop();
        } else if !joined.is_empty() {
            joined.push(' ');
        }
        joined.push_str(line);
    }
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run the heuristic backend over a PDF
pub fn extract_references(path: &Path) -> Result<Vec<RawCitationRecord>, ExtractionError> {
    let text = extract_pdf_text(path)?;
    let entries = parse_reference_section(&text);
    debug!(
        "Heuristic backend split {} reference entries from {}",
        entries.len(),
        path.display()
    );

    Ok(entries
        .iter()
        .map(|entry| mine_loose_citation(entry, Provenance::Heuristic))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracketed_entries_after_last_heading() {
        let text = "\
1 Introduction
We cite prior work [1] and [2]. See references below.
References
[1] Smith, J. and Doe, A. Deep learning for citation
parsing. In Proc. ACL, 2019.
[2] Vaswani, A. Attention is all you need. In NeurIPS,
2017.
Appendix A
[3] Not a reference: appendix table of results here.
";
        let entries = parse_reference_section(text);
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0],
            "[1] Smith, J. and Doe, A. Deep learning for citation parsing. In Proc. ACL, 2019."
        );
        assert!(entries[1].ends_with("In NeurIPS, 2017."));
    }

    #[test]
    fn test_numbered_entries_and_hyphenation() {
        let text = "\
BIBLIOGRAPHY
1. Doe J, Roe RK. Outcomes of a random-
ized trial in adults. Lancet. 2018.
2. Poe E. A second entry that is long enough. BMJ. 2020.
";
        let entries = parse_reference_section(text);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].contains("randomized trial"));
    }

    #[test]
    fn test_blank_line_split_requires_heading() {
        let with_heading = "\
References

Smith J. An unnumbered reference entry of some length. 2001.

Doe A. Another unnumbered reference entry here. 2003.
";
        assert_eq!(parse_reference_section(with_heading).len(), 2);

        let without_heading = "\
Just a paragraph of body text that is long enough.

Another paragraph of body text that is long enough.
";
        assert!(parse_reference_section(without_heading).is_empty());
    }

    #[test]
    fn test_short_entries_dropped() {
        let text = "References\n[1] Too short.\n[2] Long enough entry for a citation string.\n";
        let entries = parse_reference_section(text);
        assert_eq!(entries, vec!["[2] Long enough entry for a citation string.".to_string()]);
    }

    #[test]
    fn test_extract_pdf_text_rejects_non_pdf() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"not a pdf at all").unwrap();
        assert!(matches!(
            extract_pdf_text(file.path()),
            Err(ExtractionError::PdfText(_))
        ));
    }
}
