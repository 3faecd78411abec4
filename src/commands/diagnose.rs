use anyhow::{Context, Result};
use log::{info, warn};
use std::time::Instant;

use reference_retriever::common::{format_elapsed, setup_logging};
use reference_retriever::extract::{analyze_quality, ExtractionMethod, Extractor, QualityReport};
use reference_retriever::sources::create_client;

use super::fetch::load_config;
use crate::cli::DiagnoseArgs;

pub(crate) fn log_quality_report(report: &QualityReport) {
    let p = &report.percentages;
    info!("Extraction quality:");
    info!("  Citations: {}", report.total_count);
    info!("  Quality score: {:.2}", report.quality_score);
    info!("  With title: {:.1}%", p.has_title);
    info!("  Title long enough: {:.1}%", p.title_length_ok);
    info!("  With authors: {:.1}%", p.has_authors);
    info!("  With year: {:.1}%", p.has_year);
    info!("  With DOI: {:.1}%", p.has_doi);
    info!("  With venue: {:.1}%", p.has_journal);
    info!("  Structured: {:.1}%", p.has_structured_data);
    for issue in &report.issues {
        warn!("  Issue: {}", issue);
    }
    info!("  {}", report.recommendation);
}

async fn run_diagnose_async(args: DiagnoseArgs) -> Result<()> {
    setup_logging(&args.log_level)?;
    let start_time = Instant::now();

    let config = load_config(args.config.as_deref(), args.email.clone(), None)?;
    let client = create_client(&config).context("Failed to build HTTP client")?;
    let extractor = Extractor::new(&config, client);

    let mut methods = vec![ExtractionMethod::Auto];
    if config.grobid.enabled {
        methods.push(ExtractionMethod::Structured);
        methods.push(ExtractionMethod::Heuristic);
    }

    for method in methods {
        info!("-------------------- method: {} --------------------", method);
        let citations = match extractor.extract(&args.pdf, method).await {
            Ok(citations) => citations,
            Err(e) => {
                warn!("Extraction with {} failed: {}", method, e);
                continue;
            }
        };

        log_quality_report(&analyze_quality(&citations, config.min_title_length));
        for (i, citation) in citations.iter().take(3).enumerate() {
            info!("  [{}] {}", i + 1, citation.label());
            if !citation.author.is_empty() {
                info!("      authors: {}", citation.author);
            }
            if !citation.year.is_empty() {
                info!("      year: {}", citation.year);
            }
            if !citation.doi.is_empty() {
                info!("      doi: {}", citation.doi);
            }
            if !citation.arxiv_id.is_empty() {
                info!("      arXiv: {}", citation.arxiv_id);
            }
        }
    }

    info!("Diagnosis finished in {}", format_elapsed(start_time.elapsed()));
    Ok(())
}

pub fn run_diagnose(args: DiagnoseArgs) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_diagnose_async(args))
}
