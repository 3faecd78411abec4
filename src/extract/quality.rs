//! Per-citation quality scores and aggregate extraction quality reports.

use serde::Serialize;

use super::CitationInfo;

/// Score a single citation by which fields it carries, clipped to `[0, 1]`.
///
/// Each present field only ever adds weight, so the score is monotone in the field set.
pub fn citation_quality_score(info: &CitationInfo) -> f64 {
    let mut score = 0.0;

    if !info.title.is_empty() {
        score += 0.4;
        if info.title.chars().count() > 20 {
            score += 0.1;
        }
    }
    if !info.author.is_empty() {
        score += 0.2;
    }
    if !info.journal.is_empty() {
        score += 0.1;
    }
    if !info.year.is_empty() && info.year.chars().all(|c| c.is_ascii_digit()) {
        score += 0.1;
    }
    if !info.doi.is_empty() {
        score += 0.2;
    }
    if !info.arxiv_id.is_empty() {
        score += 0.15;
    }

    f64::min(score, 1.0)
}

/// Quality recommendation bands over the aggregate score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityBand {
    Excellent,
    Good,
    Moderate,
    Poor,
    VeryPoor,
}

impl QualityBand {
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 {
            QualityBand::Excellent
        } else if score > 0.6 {
            QualityBand::Good
        } else if score > 0.4 {
            QualityBand::Moderate
        } else if score > 0.2 {
            QualityBand::Poor
        } else {
            QualityBand::VeryPoor
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            QualityBand::Excellent => "Excellent extraction quality",
            QualityBand::Good => "Good extraction quality",
            QualityBand::Moderate => {
                "Moderate quality - consider enabling the structured extraction service for better results"
            }
            QualityBand::Poor => "Poor quality - the PDF may have unusual formatting",
            QualityBand::VeryPoor => "Very poor quality - manual review recommended",
        }
    }
}

/// Share of citations (0-100) carrying each field
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldPercentages {
    pub has_title: f64,
    pub title_length_ok: f64,
    pub has_authors: f64,
    pub has_year: f64,
    pub has_doi: f64,
    pub has_journal: f64,
    pub has_structured_data: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub total_count: usize,
    pub quality_score: f64,
    pub percentages: FieldPercentages,
    pub issues: Vec<String>,
    pub recommendation: String,
}

/// Aggregate extraction quality over a set of citations
pub fn analyze_quality(citations: &[CitationInfo], min_title_length: usize) -> QualityReport {
    if citations.is_empty() {
        return QualityReport {
            total_count: 0,
            quality_score: 0.0,
            percentages: FieldPercentages::default(),
            issues: vec!["No references found".to_string()],
            recommendation: QualityBand::VeryPoor.message().to_string(),
        };
    }

    let total = citations.len();
    let share = |pred: fn(&CitationInfo, usize) -> bool| {
        let hits = citations.iter().filter(|c| pred(c, min_title_length)).count();
        hits as f64 / total as f64 * 100.0
    };

    let percentages = FieldPercentages {
        has_title: share(|c, _| !c.title.is_empty()),
        title_length_ok: share(|c, min| c.title.chars().count() >= min),
        has_authors: share(|c, _| !c.author.is_empty()),
        has_year: share(|c, _| !c.year.is_empty()),
        has_doi: share(|c, _| !c.doi.is_empty()),
        has_journal: share(|c, _| !c.journal.is_empty()),
        has_structured_data: share(|c, _| {
            !c.title.is_empty() && (!c.author.is_empty() || !c.year.is_empty())
        }),
    };

    let quality_score = (percentages.has_title * 0.3
        + percentages.title_length_ok * 0.2
        + percentages.has_authors * 0.15
        + percentages.has_doi * 0.15
        + percentages.has_year * 0.1
        + percentages.has_structured_data * 0.1)
        / 100.0;

    let mut issues = Vec::new();
    if percentages.has_title < 50.0 {
        issues.push("Low title extraction rate".to_string());
    }
    if percentages.has_doi < 10.0 {
        issues.push("Very few DOIs found".to_string());
    }
    if percentages.has_structured_data < 70.0 {
        issues.push("Limited structured data extraction".to_string());
    }

    QualityReport {
        total_count: total,
        quality_score,
        percentages,
        issues,
        recommendation: QualityBand::from_score(quality_score).message().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_citation() -> CitationInfo {
        CitationInfo {
            title: "Attention is all you need in sequence models".to_string(),
            author: "Vaswani Shazeer".to_string(),
            journal: "NeurIPS".to_string(),
            year: "2017".to_string(),
            doi: "10.5555/3295222.3295349".to_string(),
            arxiv_id: "1706.03762".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_score_clipped_to_one() {
        assert_eq!(citation_quality_score(&full_citation()), 1.0);
        assert_eq!(citation_quality_score(&CitationInfo::default()), 0.0);
    }

    #[test]
    fn test_score_components() {
        let title_only = CitationInfo {
            title: "Short title".to_string(),
            ..Default::default()
        };
        assert!((citation_quality_score(&title_only) - 0.4).abs() < 1e-9);

        let non_numeric_year = CitationInfo {
            year: "n.d.".to_string(),
            ..Default::default()
        };
        assert_eq!(citation_quality_score(&non_numeric_year), 0.0);
    }

    #[test]
    fn test_score_monotone_in_fields() {
        type Setter = fn(&mut CitationInfo);
        let setters: [Setter; 6] = [
            |c: &mut CitationInfo| c.title = "A sufficiently long descriptive title".to_string(),
            |c: &mut CitationInfo| c.author = "Doe".to_string(),
            |c: &mut CitationInfo| c.journal = "Nature".to_string(),
            |c: &mut CitationInfo| c.year = "2020".to_string(),
            |c: &mut CitationInfo| c.doi = "10.1000/xyz".to_string(),
            |c: &mut CitationInfo| c.arxiv_id = "2301.01234".to_string(),
        ];

        for mask in 0u32..(1 << setters.len()) {
            let mut base = CitationInfo::default();
            for (i, set) in setters.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    set(&mut base);
                }
            }
            let before = citation_quality_score(&base);
            assert!((0.0..=1.0).contains(&before));

            for set in &setters {
                let mut more = base.clone();
                set(&mut more);
                assert!(citation_quality_score(&more) >= before);
            }
        }
    }

    #[test]
    fn test_analyze_empty() {
        let report = analyze_quality(&[], 10);
        assert_eq!(report.total_count, 0);
        assert_eq!(report.issues, vec!["No references found".to_string()]);
    }

    #[test]
    fn test_analyze_complete_citations() {
        let citations = vec![full_citation(), full_citation()];
        let report = analyze_quality(&citations, 10);
        assert_eq!(report.total_count, 2);
        assert!((report.quality_score - 1.0).abs() < 1e-9);
        assert!(report.issues.is_empty());
        assert_eq!(report.recommendation, QualityBand::Excellent.message());
    }

    #[test]
    fn test_analyze_raw_only_reports_issues() {
        let citations = vec![CitationInfo {
            raw_reference: "Some unparsed citation text of decent length".to_string(),
            ..Default::default()
        }];
        let report = analyze_quality(&citations, 10);
        assert_eq!(report.quality_score, 0.0);
        assert_eq!(report.issues.len(), 3);
        assert_eq!(report.recommendation, QualityBand::VeryPoor.message());
    }

    #[test]
    fn test_band_edges() {
        assert_eq!(QualityBand::from_score(0.81), QualityBand::Excellent);
        assert_eq!(QualityBand::from_score(0.8), QualityBand::Good);
        assert_eq!(QualityBand::from_score(0.5), QualityBand::Moderate);
        assert_eq!(QualityBand::from_score(0.3), QualityBand::Poor);
        assert_eq!(QualityBand::from_score(0.2), QualityBand::VeryPoor);
    }
}
