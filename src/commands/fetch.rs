use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use reference_retriever::common::{
    create_count_progress_bar, create_spinner, format_elapsed, output_dir_for, setup_logging,
};
use reference_retriever::config::Config;
use reference_retriever::download::Downloader;
use reference_retriever::extract::{
    analyze_quality, post_process, CitationInfo, Extractor, RawCitationRecord,
};
use reference_retriever::ratelimit::RateLimiters;
use reference_retriever::report::SessionSummary;
use reference_retriever::sources::{create_client, SourceRegistry};

use super::diagnose::log_quality_report;
use crate::cli::FetchArgs;

/// Load configuration and apply CLI overrides; fatal on invalid settings
pub(crate) fn load_config(
    path: Option<&Path>,
    email: Option<String>,
    threads: Option<usize>,
) -> Result<Config> {
    let mut config = Config::load(path).context("Failed to load configuration")?;
    if let Some(email) = email {
        config.contact_email = email;
    }
    if let Some(threads) = threads {
        config.max_threads = if threads == 0 { num_cpus::get() } else { threads };
    }

    for warning in config.validate().context("Invalid configuration")? {
        warn!("{}", warning);
    }
    Ok(config)
}

fn load_references(path: &Path, config: &Config) -> Result<Vec<CitationInfo>> {
    info!("Loading citation records from: {}", path.display());
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read references file: {}", path.display()))?;
    let records: Vec<RawCitationRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse references file: {}", path.display()))?;
    Ok(post_process(records, config))
}

async fn run_fetch_async(args: FetchArgs) -> Result<SessionSummary> {
    setup_logging(&args.log_level)?;
    let start_time = Instant::now();

    let config = load_config(args.config.as_deref(), args.email.clone(), args.threads)?;
    let client = create_client(&config).context("Failed to build HTTP client")?;

    let citations = match &args.references {
        Some(path) => load_references(path, &config)?,
        None => {
            info!("Extracting citations from: {} (method: {})", args.pdf.display(), args.method);
            let spinner = create_spinner("Extracting citations...");
            spinner.enable_steady_tick(Duration::from_millis(100));
            let extractor = Extractor::new(&config, client.clone());
            let result = extractor.extract(&args.pdf, args.method).await;
            spinner.finish_and_clear();
            result.with_context(|| format!("Failed to extract citations from {}", args.pdf.display()))?
        }
    };

    log_quality_report(&analyze_quality(&citations, config.min_title_length));
    if citations.is_empty() {
        warn!("No usable citations; nothing to download");
    }

    let output_dir = output_dir_for(&args.pdf, &config.output_dir_suffix);
    info!("Output directory: {}", output_dir.display());

    let limiters = RateLimiters::from_config(&config);
    let registry = SourceRegistry::from_config(&config, &client, &limiters);
    let downloader = Downloader::new(registry, client, &config);

    let stop = downloader.stop_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Stop requested: finishing citations in flight, skipping the rest");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let progress = create_count_progress_bar(citations.len() as u64);
    let report = downloader
        .download_all(citations, &output_dir, Some(&progress))
        .await
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    progress.finish_with_message("done");

    let summary = report.summary;
    if let Some(path) = &args.summary_json {
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write summary: {}", path.display()))?;
        info!("Summary written to: {}", path.display());
    }

    info!("==================== FINAL SUMMARY ====================");
    info!("Total execution time: {}", format_elapsed(start_time.elapsed()));
    for line in summary.lines() {
        info!("{}", line);
    }
    info!("Files in: {}", output_dir.display());
    info!("========================================================");

    Ok(summary)
}

pub fn run_fetch(args: FetchArgs) -> Result<SessionSummary> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_fetch_async(args))
}
