//! Citation extraction: PDF in, normalized and filtered citations out.

pub mod doi;
pub mod filter;
pub mod grobid;
pub mod heuristic;
pub mod mining;
pub mod patterns;
mod provenance;
pub mod quality;
pub mod record;
pub mod tei;

pub use doi::{clean_doi, is_valid_doi, mine_doi};
pub use filter::is_valid_citation;
pub use grobid::GrobidClient;
pub use patterns::{clean_text, find_arxiv_id};
pub use provenance::Provenance;
pub use quality::{analyze_quality, citation_quality_score, QualityBand, QualityReport};
pub use record::{normalize, CitationInfo, FieldValue, RawCitationRecord};

use log::{debug, info, warn};
use reqwest::Client;
use std::path::Path;

use crate::config::Config;
use crate::error::ExtractionError;

/// Which extraction backend to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ExtractionMethod {
    /// Structured service when enabled, heuristic otherwise or on failure
    #[default]
    Auto,
    /// Force the structured service (still falls back on failure)
    Structured,
    /// Plain-text heuristics only
    Heuristic,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Auto => "auto",
            ExtractionMethod::Structured => "structured",
            ExtractionMethod::Heuristic => "heuristic",
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Drop structured-backend citations scoring below `threshold`
pub fn drop_low_quality(citations: Vec<CitationInfo>, threshold: f64) -> Vec<CitationInfo> {
    let total = citations.len();
    let kept: Vec<CitationInfo> = citations
        .into_iter()
        .filter(|info| {
            if !info.provenance.is_structured_backend() {
                return true;
            }
            let score = citation_quality_score(info);
            if score < threshold {
                debug!("Filtered low-quality citation: {} (score: {:.2})", info.label(), score);
                return false;
            }
            true
        })
        .collect();

    if kept.len() < total {
        info!(
            "Dropped {} of {} citations below quality threshold {:.2}",
            total - kept.len(),
            total,
            threshold
        );
    }
    kept
}

/// Normalize raw records, drop low-scoring structured-backend records, apply the validity filter
pub fn post_process(records: Vec<RawCitationRecord>, config: &Config) -> Vec<CitationInfo> {
    let citations = records.iter().map(normalize).collect();
    retain_valid(drop_low_quality(citations, config.min_reference_quality_score), config)
}

fn retain_valid(citations: Vec<CitationInfo>, config: &Config) -> Vec<CitationInfo> {
    let total = citations.len();
    let kept: Vec<CitationInfo> = citations
        .into_iter()
        .filter(|info| is_valid_citation(info, config.min_title_length))
        .collect();
    info!("Kept {} of {} extracted citations", kept.len(), total);
    kept
}

pub struct Extractor<'a> {
    config: &'a Config,
    grobid: GrobidClient,
}

impl<'a> Extractor<'a> {
    pub fn new(config: &'a Config, client: Client) -> Self {
        Self {
            grobid: GrobidClient::new(client, &config.grobid),
            config,
        }
    }

    pub fn grobid(&self) -> &GrobidClient {
        &self.grobid
    }

    /// Extract citations from a PDF.
    ///
    /// The structured backend is tried first unless the method or configuration rules it out;
    /// an error or empty result from it falls through to the heuristic backend.
    pub async fn extract(
        &self,
        pdf_path: &Path,
        method: ExtractionMethod,
    ) -> Result<Vec<CitationInfo>, ExtractionError> {
        let is_pdf = pdf_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf || !pdf_path.is_file() {
            return Err(ExtractionError::InvalidPdf(pdf_path.to_path_buf()));
        }

        let use_structured = match method {
            ExtractionMethod::Structured => true,
            ExtractionMethod::Heuristic => false,
            ExtractionMethod::Auto => self.config.grobid.enabled,
        };

        let citations = if use_structured {
            match self.structured_citations(pdf_path).await {
                Ok(citations) if !citations.is_empty() => {
                    info!("Structured service extracted {} citations", citations.len());
                    citations
                }
                Ok(_) => {
                    warn!("Structured service returned no usable citations, trying heuristic extraction");
                    self.heuristic_citations(pdf_path).await?
                }
                Err(e) => {
                    warn!("Structured extraction failed ({}), falling back to heuristic extraction", e);
                    self.heuristic_citations(pdf_path).await?
                }
            }
        } else {
            self.heuristic_citations(pdf_path).await?
        };

        if citations.is_empty() {
            warn!("No citations found in {}", pdf_path.display());
        }
        Ok(retain_valid(citations, self.config))
    }

    /// Structured-service citations, normalized and already quality-filtered
    async fn structured_citations(&self, pdf_path: &Path) -> Result<Vec<CitationInfo>, ExtractionError> {
        let records = self
            .grobid
            .extract(pdf_path, self.config.loose_supplement_ratio)
            .await?;
        let citations = records.iter().map(normalize).collect();
        Ok(drop_low_quality(citations, self.config.min_reference_quality_score))
    }

    async fn heuristic_citations(&self, pdf_path: &Path) -> Result<Vec<CitationInfo>, ExtractionError> {
        let records = self.extract_heuristic(pdf_path).await?;
        Ok(records.iter().map(normalize).collect())
    }

    async fn extract_heuristic(&self, pdf_path: &Path) -> Result<Vec<RawCitationRecord>, ExtractionError> {
        info!("Using heuristic extraction for {}", pdf_path.display());
        let path = pdf_path.to_path_buf();
        tokio::task::spawn_blocking(move || heuristic::extract_references(&path))
            .await
            .map_err(|e| ExtractionError::PdfText(format!("text extraction task failed: {}", e)))?
    }
}
