//! TEI citation markup returned by the structured extraction service.
//!
//! Walks the event stream once. `<biblStruct>` elements become field-level records;
//! `<bibl>` elements carry free-text citations that are mined heuristically and only used to
//! fill the gap when the service parsed noticeably fewer structured citations than it saw.

use lazy_static::lazy_static;
use log::{debug, info};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use regex::Regex;

use super::mining::mine_loose_citation;
use super::patterns::clean_text;
use super::{FieldValue, Provenance, RawCitationRecord};
use crate::error::ExtractionError;

/// Loose citation text must be longer than this to be considered at all
const MIN_LOOSE_TEXT_LENGTH: usize = 20;
/// Loose citations without a mined title are kept only above this length
const MIN_UNTITLED_LOOSE_LENGTH: usize = 30;

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"^(\d{4})(?:-\d{2}(?:-\d{2})?)?").unwrap();
    static ref FOUR_DIGITS: Regex = Regex::new(r"\d{4}").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TitleLevel {
    Article,
    Monograph,
    Journal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Scope {
    Volume,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum IdKind {
    Doi,
    Arxiv,
    Pmid,
}

/// Where text inside the current element goes
#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Ignore,
    Title(TitleLevel),
    FirstName,
    MiddleName,
    Surname,
    Date(usize),
    Scope(Scope),
    Idno(IdKind),
    RawNote,
}

#[derive(Debug, Default)]
struct AuthorAccum {
    first: String,
    middle: String,
    surname: String,
}

impl AuthorAccum {
    fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.first, &self.middle, &self.surname]
            .into_iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

#[derive(Debug, Default)]
struct DateAccum {
    published: bool,
    when: Option<String>,
    text: String,
}

#[derive(Debug, Default)]
struct StructAccum {
    article_title: String,
    monograph_title: String,
    journal_title: String,
    authors: Vec<String>,
    author: Option<AuthorAccum>,
    dates: Vec<DateAccum>,
    volume: String,
    page: String,
    doi: String,
    arxiv_id: String,
    pmid: String,
    raw: String,
}

impl StructAccum {
    fn push_text(&mut self, slot: Slot, text: &str) {
        let target = match slot {
            Slot::Ignore => return,
            Slot::Title(TitleLevel::Article) => &mut self.article_title,
            Slot::Title(TitleLevel::Monograph) => &mut self.monograph_title,
            Slot::Title(TitleLevel::Journal) => &mut self.journal_title,
            Slot::FirstName | Slot::MiddleName | Slot::Surname => {
                let Some(author) = self.author.as_mut() else {
                    return;
                };
                match slot {
                    Slot::FirstName => &mut author.first,
                    Slot::MiddleName => &mut author.middle,
                    _ => &mut author.surname,
                }
            }
            Slot::Date(idx) => match self.dates.get_mut(idx) {
                Some(date) => &mut date.text,
                None => return,
            },
            Slot::Scope(Scope::Volume) => &mut self.volume,
            Slot::Scope(Scope::Page) => &mut self.page,
            Slot::Idno(IdKind::Doi) => &mut self.doi,
            Slot::Idno(IdKind::Arxiv) => &mut self.arxiv_id,
            Slot::Idno(IdKind::Pmid) => &mut self.pmid,
            Slot::RawNote => &mut self.raw,
        };
        append_text(target, text);
    }

    /// Publication year: ISO `when` of the published date, else any four digits in the date
    fn year(&self) -> String {
        let date = self
            .dates
            .iter()
            .find(|d| d.published)
            .or_else(|| self.dates.first());
        let Some(date) = date else {
            return String::new();
        };

        let when = date.when.as_deref().unwrap_or("").trim();
        if let Some(cap) = ISO_DATE.captures(when) {
            return cap[1].to_string();
        }
        FOUR_DIGITS
            .find(when)
            .or_else(|| FOUR_DIGITS.find(&date.text))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }

    fn into_record(self) -> Option<RawCitationRecord> {
        let year = self.year();
        let article_title = clean_text(&self.article_title);
        let monograph_title = clean_text(&self.monograph_title);
        let journal_title = clean_text(&self.journal_title);

        let (title, venue) = if !article_title.is_empty() {
            let venue = if journal_title.is_empty() {
                monograph_title
            } else {
                journal_title
            };
            (article_title, venue)
        } else {
            (monograph_title, journal_title)
        };

        if title.is_empty() && self.authors.is_empty() && self.doi.trim().is_empty() {
            return None;
        }

        let misc = if self.pmid.trim().is_empty() {
            FieldValue::Empty
        } else {
            format!("PMID:{}", self.pmid.trim()).into()
        };

        Some(RawCitationRecord {
            title: title.into(),
            author: FieldValue::List(self.authors),
            journal: venue.into(),
            year: year.into(),
            doi: self.doi.into(),
            volume: self.volume.into(),
            page: self.page.into(),
            raw_reference: clean_text(&self.raw).into(),
            misc,
            arxiv_id: self.arxiv_id.into(),
            provenance: Provenance::Structured,
        })
    }
}

fn append_text(target: &mut String, text: &str) {
    if !target.is_empty() && !target.ends_with(' ') {
        target.push(' ');
    }
    target.push_str(text);
}

fn attr(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned())
        })
}

/// TEI state machine
#[derive(Default)]
struct TeiParser {
    structured: Vec<RawCitationRecord>,
    loose_texts: Vec<String>,
    current: Option<StructAccum>,
    /// Slot per open element inside the current `<biblStruct>`
    slots: Vec<Slot>,
    /// Slot stack depth at which the open `<author>` started
    author_depth: Option<usize>,
    bibl_depth: usize,
    bibl_text: String,
}

impl TeiParser {
    fn parent_slot(&self) -> Slot {
        self.slots.last().copied().unwrap_or(Slot::Ignore)
    }

    /// Decide the slot for an element opening inside a `<biblStruct>`, applying the
    /// attribute-only effects of the element (dates, page ranges, author boundaries)
    fn open_in_struct(&mut self, e: &BytesStart<'_>, tag: &[u8], is_empty: bool) -> Slot {
        let parent = self.parent_slot();
        let Some(current) = self.current.as_mut() else {
            return Slot::Ignore;
        };

        match tag {
            b"title" => match attr(e, "level").as_deref() {
                Some("a") => Slot::Title(TitleLevel::Article),
                Some("m") => Slot::Title(TitleLevel::Monograph),
                Some("j") => Slot::Title(TitleLevel::Journal),
                _ => Slot::Ignore,
            },
            b"author" => {
                if !is_empty {
                    current.author = Some(AuthorAccum::default());
                    self.author_depth = Some(self.slots.len());
                }
                Slot::Ignore
            }
            b"forename" if current.author.is_some() => match attr(e, "type").as_deref() {
                Some("middle") => Slot::MiddleName,
                _ => Slot::FirstName,
            },
            b"surname" if current.author.is_some() => Slot::Surname,
            b"date" => {
                current.dates.push(DateAccum {
                    published: attr(e, "type").as_deref() == Some("published"),
                    when: attr(e, "when"),
                    text: String::new(),
                });
                Slot::Date(current.dates.len() - 1)
            }
            b"biblScope" => match attr(e, "unit").as_deref() {
                Some("volume") => Slot::Scope(Scope::Volume),
                Some("page") => {
                    let range = match (attr(e, "from"), attr(e, "to")) {
                        (Some(from), Some(to)) => format!("{}-{}", from, to),
                        (Some(from), None) => from,
                        _ => String::new(),
                    };
                    if !range.is_empty() {
                        current.page = range;
                    }
                    Slot::Scope(Scope::Page)
                }
                _ => Slot::Ignore,
            },
            b"idno" => match attr(e, "type").as_deref() {
                Some(t) if t.eq_ignore_ascii_case("doi") => Slot::Idno(IdKind::Doi),
                Some(t) if t.eq_ignore_ascii_case("arxiv") => Slot::Idno(IdKind::Arxiv),
                Some(t) if t.eq_ignore_ascii_case("pmid") => Slot::Idno(IdKind::Pmid),
                _ => Slot::Ignore,
            },
            b"note" if attr(e, "type").as_deref() == Some("raw_reference") => Slot::RawNote,
            b"editor" => Slot::Ignore,
            _ => parent,
        }
    }

    fn handle_start(&mut self, e: &BytesStart<'_>) {
        if self.bibl_depth > 0 {
            self.bibl_depth += 1;
            return;
        }

        let name = e.local_name();
        let tag = name.as_ref();

        if self.current.is_some() {
            let slot = self.open_in_struct(e, tag, false);
            self.slots.push(slot);
            return;
        }

        match tag {
            b"biblStruct" => {
                self.current = Some(StructAccum::default());
                self.slots.clear();
                self.author_depth = None;
            }
            b"bibl" => {
                self.bibl_depth = 1;
                self.bibl_text.clear();
            }
            _ => {}
        }
    }

    fn handle_empty(&mut self, e: &BytesStart<'_>) {
        if self.current.is_some() && self.bibl_depth == 0 {
            let name = e.local_name();
            self.open_in_struct(e, name.as_ref(), true);
        }
    }

    fn handle_text(&mut self, e: &BytesText<'_>) -> Result<(), ExtractionError> {
        let text = e.unescape()?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        if self.bibl_depth > 0 {
            append_text(&mut self.bibl_text, text);
        } else if let Some(current) = self.current.as_mut() {
            let slot = self.slots.last().copied().unwrap_or(Slot::Ignore);
            current.push_text(slot, text);
        }
        Ok(())
    }

    fn handle_end(&mut self) {
        if self.bibl_depth > 0 {
            self.bibl_depth -= 1;
            if self.bibl_depth == 0 {
                let text = std::mem::take(&mut self.bibl_text);
                self.loose_texts.push(text);
            }
            return;
        }

        if self.current.is_none() {
            return;
        }

        if self.slots.pop().is_none() {
            // </biblStruct>
            if let Some(finished) = self.current.take() {
                if let Some(record) = finished.into_record() {
                    self.structured.push(record);
                }
            }
            return;
        }

        if self.author_depth == Some(self.slots.len()) {
            self.author_depth = None;
            if let Some(current) = self.current.as_mut() {
                if let Some(name) = current.author.take().and_then(|a| a.full_name()) {
                    current.authors.push(name);
                }
            }
        }
    }

    /// Loose citations worth keeping, mined into low-confidence records
    fn loose_records(&self) -> Vec<RawCitationRecord> {
        self.loose_texts
            .iter()
            .filter(|text| text.trim().chars().count() > MIN_LOOSE_TEXT_LENGTH)
            .map(|text| mine_loose_citation(text, Provenance::Loose))
            .filter(|record| {
                !record.title.is_empty()
                    || record.raw_reference.flatten().chars().count() > MIN_UNTITLED_LOOSE_LENGTH
            })
            .collect()
    }
}

/// Parse the service's TEI response into raw citation records.
///
/// When fewer than `supplement_ratio` x (loose citation count) structured citations were
/// found, the loose citations past the structured count are appended.
pub fn parse_tei(xml: &str, supplement_ratio: f64) -> Result<Vec<RawCitationRecord>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut parser = TeiParser::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => parser.handle_start(e),
            Ok(Event::Empty(ref e)) => parser.handle_empty(e),
            Ok(Event::Text(ref e)) => parser.handle_text(e)?,
            Ok(Event::End(_)) => parser.handle_end(),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractionError::Markup(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    let loose = parser.loose_records();
    let mut records = parser.structured;
    debug!(
        "Parsed {} structured and {} loose citations",
        records.len(),
        loose.len()
    );

    if (records.len() as f64) < loose.len() as f64 * supplement_ratio {
        info!(
            "Supplementing {} structured citations with loose citation parsing",
            records.len()
        );
        let skip = records.len();
        records.extend(loose.into_iter().skip(skip));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_LOOSE_SUPPLEMENT_RATIO;

    const TEI_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0"><text><back><div><listBibl>"#;
    const TEI_FOOTER: &str = "</listBibl></div></back></text></TEI>";

    fn tei(body: &str) -> String {
        format!("{}{}{}", TEI_HEADER, body, TEI_FOOTER)
    }

    const ARTICLE: &str = r#"
<biblStruct xml:id="b0">
  <analytic>
    <title level="a" type="main">Deep   residual learning for image recognition</title>
    <author><persName><forename type="first">Kaiming</forename><surname>He</surname></persName></author>
    <author><persName><forename type="first">Xiangyu</forename><forename type="middle">Q</forename><surname>Zhang</surname></persName></author>
    <idno type="DOI">https://doi.org/10.1109/CVPR.2016.90</idno>
    <idno type="arXiv">arXiv:1512.03385</idno>
  </analytic>
  <monogr>
    <title level="j">IEEE Transactions</title>
    <title level="m">Proceedings of CVPR</title>
    <editor><persName><surname>Editorname</surname></persName></editor>
    <imprint>
      <biblScope unit="volume">12</biblScope>
      <biblScope unit="page" from="770" to="778"/>
      <date type="published" when="2016-06-27">June 2016</date>
    </imprint>
  </monogr>
  <note type="raw_reference">[1] K. He and X. Zhang, Deep residual learning, CVPR 2016.</note>
</biblStruct>"#;

    #[test]
    fn test_parse_structured_fields() {
        let records = parse_tei(&tei(ARTICLE), DEFAULT_LOOSE_SUPPLEMENT_RATIO).unwrap();
        assert_eq!(records.len(), 1);

        let r = &records[0];
        assert_eq!(r.title.flatten(), "Deep residual learning for image recognition");
        assert_eq!(
            r.author,
            FieldValue::List(vec!["Kaiming He".to_string(), "Xiangyu Q Zhang".to_string()])
        );
        assert_eq!(r.journal.flatten(), "IEEE Transactions");
        assert_eq!(r.year.flatten(), "2016");
        assert_eq!(r.volume.flatten(), "12");
        assert_eq!(r.page.flatten(), "770-778");
        assert_eq!(r.doi.flatten(), "https://doi.org/10.1109/CVPR.2016.90");
        assert_eq!(r.arxiv_id.flatten(), "arXiv:1512.03385");
        assert_eq!(
            r.raw_reference.flatten(),
            "K. He and X. Zhang, Deep residual learning, CVPR 2016."
        );
        assert_eq!(r.provenance, Provenance::Structured);
    }

    #[test]
    fn test_monograph_title_and_meeting_venue() {
        let book = r#"
<biblStruct>
  <monogr>
    <title level="m">Pattern Recognition and Machine Learning</title>
    <author><persName><surname>Bishop</surname></persName></author>
    <imprint><date when="c. 2006">2006</date></imprint>
  </monogr>
</biblStruct>
<biblStruct>
  <analytic><title level="a">A workshop paper on retrieval</title></analytic>
  <monogr><title level="m">Workshop on Retrieval</title>
    <imprint><date type="published">circa 1999</date></imprint></monogr>
</biblStruct>"#;
        let records = parse_tei(&tei(book), DEFAULT_LOOSE_SUPPLEMENT_RATIO).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title.flatten(), "Pattern Recognition and Machine Learning");
        assert!(records[0].journal.is_empty());
        assert_eq!(records[0].year.flatten(), "2006");

        assert_eq!(records[1].title.flatten(), "A workshop paper on retrieval");
        assert_eq!(records[1].journal.flatten(), "Workshop on Retrieval");
        assert_eq!(records[1].year.flatten(), "1999");
    }

    #[test]
    fn test_skips_empty_struct() {
        let body = r#"<biblStruct><monogr><imprint><date when="2001"/></imprint></monogr></biblStruct>"#;
        let records = parse_tei(&tei(body), DEFAULT_LOOSE_SUPPLEMENT_RATIO).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_supplements_with_loose_citations() {
        let body = format!(
            "{}{}",
            ARTICLE,
            r#"
<bibl>He, K. and Zhang, X. Deep residual learning for image recognition. In Proc. CVPR, 2016.</bibl>
<bibl>Vaswani, A. and Shazeer, N. Attention is all you need. In NeurIPS, 2017.</bibl>
<bibl>Devlin, J. BERT: pre-training of deep bidirectional transformers. In NAACL, 2019.</bibl>"#
        );
        let records = parse_tei(&tei(&body), DEFAULT_LOOSE_SUPPLEMENT_RATIO).unwrap();
        // 1 structured < 0.7 * 3 loose: loose citations 2 and 3 are appended
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].provenance, Provenance::Structured);
        assert_eq!(records[1].provenance, Provenance::Loose);
        assert_eq!(records[1].title.flatten(), "Attention is all you need");
        assert_eq!(records[2].year.flatten(), "2019");
    }

    #[test]
    fn test_no_supplement_when_structured_sufficient() {
        let body = format!(
            "{}{}",
            ARTICLE,
            "<bibl>He, K. and Zhang, X. Deep residual learning for image recognition. In CVPR, 2016.</bibl>"
        );
        let records = parse_tei(&tei(&body), DEFAULT_LOOSE_SUPPLEMENT_RATIO).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_short_loose_text_ignored() {
        let records = parse_tei(&tei("<bibl>too short</bibl>"), DEFAULT_LOOSE_SUPPLEMENT_RATIO).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_malformed_markup_is_error() {
        let broken = r#"<TEI><listBibl><biblStruct><title level="a">x</monogr></listBibl></TEI>"#;
        assert!(matches!(
            parse_tei(broken, DEFAULT_LOOSE_SUPPLEMENT_RATIO),
            Err(ExtractionError::Markup(_))
        ));
    }

    #[test]
    fn test_bad_entity_is_markup_error() {
        let body = "<bibl>Smith, J. A study of &bogus; entities in citation text, 2004.</bibl>";
        assert!(matches!(
            parse_tei(&tei(body), DEFAULT_LOOSE_SUPPLEMENT_RATIO),
            Err(ExtractionError::Markup(_))
        ));
    }
}
