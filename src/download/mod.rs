//! Per-citation resolution and download, run across a bounded worker pool.

pub mod naming;
pub mod transfer;

pub use naming::{content_hash, generate_filename, sanitize_title};
pub use transfer::fetch_to_file;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::sync::Semaphore;

use crate::common::format_elapsed;
use crate::config::Config;
use crate::error::CitationError;
use crate::extract::CitationInfo;
use crate::report::{SessionAggregator, SessionSummary};
use crate::sources::{Resolve, Source, SourceAttempt, SourceRegistry};

/// Multiplier for buffer_unordered capacity relative to concurrency
const BUFFER_CAPACITY_MULTIPLIER: usize = 2;

pub const NO_SOURCE_FOUND: &str = "no open access source found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStatus {
    Pending,
    Success,
    Exists,
    Failed,
    Error,
    /// Never started because the run was stopped
    Cancelled,
}

impl CitationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CitationStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CitationStatus::Pending => "pending",
            CitationStatus::Success => "success",
            CitationStatus::Exists => "exists",
            CitationStatus::Failed => "failed",
            CitationStatus::Error => "error",
            CitationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for CitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything known about one citation's resolution.
///
/// Status only moves from `Pending` to a terminal value, once; later transitions are ignored.
#[derive(Debug, Clone)]
pub struct CitationOutcome {
    pub index: usize,
    pub filename: String,
    status: CitationStatus,
    service: Option<String>,
    url: Option<String>,
    message: Option<String>,
    attempts: Vec<SourceAttempt>,
    pub citation: CitationInfo,
}

impl CitationOutcome {
    pub fn new(index: usize, filename: String, citation: CitationInfo) -> Self {
        Self {
            index,
            filename,
            status: CitationStatus::Pending,
            service: None,
            url: None,
            message: None,
            attempts: Vec::new(),
            citation,
        }
    }

    pub fn status(&self) -> CitationStatus {
        self.status
    }

    /// Name of the service whose URL was downloaded
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Attempts in the order the handlers were consulted
    pub fn attempts(&self) -> &[SourceAttempt] {
        &self.attempts
    }

    /// Attach an attempt that did not end the search; ignored once the outcome is terminal
    pub fn record_attempt(&mut self, attempt: SourceAttempt) {
        if !self.status.is_terminal() {
            self.attempts.push(attempt);
        }
    }

    fn finish(&mut self, status: CitationStatus, message: Option<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.message = message;
        true
    }

    pub fn mark_exists(&mut self) {
        self.finish(CitationStatus::Exists, None);
    }

    pub fn mark_success(&mut self, attempt: SourceAttempt) {
        let service = attempt.source.clone();
        let url = attempt.url.clone();
        self.record_attempt(attempt);
        if self.finish(CitationStatus::Success, None) {
            self.service = Some(service);
            self.url = url;
        }
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.finish(CitationStatus::Failed, Some(message.into()));
    }

    pub fn mark_error(&mut self, error: &CitationError) {
        self.finish(CitationStatus::Error, Some(error.to_string()));
    }

    pub fn mark_cancelled(&mut self) {
        self.finish(CitationStatus::Cancelled, Some("run stopped".to_string()));
    }

    /// One line for the per-citation report
    pub fn status_line(&self) -> String {
        match self.status {
            CitationStatus::Success => format!(
                "[OK] {} (from {})",
                self.filename,
                self.service.as_deref().unwrap_or("unknown")
            ),
            CitationStatus::Exists => format!("[EXISTS] {} (already exists)", self.filename),
            CitationStatus::Error => format!(
                "[ERROR] {} (error: {})",
                self.filename,
                self.message.as_deref().unwrap_or("unknown")
            ),
            CitationStatus::Cancelled => format!("[SKIPPED] {} (run stopped)", self.filename),
            CitationStatus::Failed | CitationStatus::Pending => format!(
                "[FAILED] {} ({})",
                self.filename,
                self.message.as_deref().unwrap_or(NO_SOURCE_FOUND)
            ),
        }
    }
}

/// Outcomes ordered by citation index, plus the aggregated summary
pub struct DownloadReport {
    pub outcomes: Vec<CitationOutcome>,
    pub summary: SessionSummary,
}

/// Resolves citations against a [`SourceRegistry`] and writes the winning PDFs.
///
/// Workers share the HTTP client, the registry (and through it the rate limiters) and the
/// stop flag. Output paths are index-qualified so no two workers write the same file.
pub struct Downloader<S = Source> {
    registry: SourceRegistry<S>,
    client: Client,
    concurrency: usize,
    min_pdf_size: u64,
    max_filename_length: usize,
    download_timeout: Duration,
    log_api_calls: bool,
    stop: Arc<AtomicBool>,
}

impl<S: Resolve> Downloader<S> {
    pub fn new(registry: SourceRegistry<S>, client: Client, config: &Config) -> Self {
        Self {
            registry,
            client,
            concurrency: config.max_threads.max(1),
            min_pdf_size: config.min_pdf_size,
            max_filename_length: config.max_filename_length,
            download_timeout: config.download_timeout(),
            log_api_calls: config.log_api_calls,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag; once set, citations not yet started are skipped
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn registry(&self) -> &SourceRegistry<S> {
        &self.registry
    }

    /// Resolve one citation into `output_dir`. Never fails: problems end up in the outcome.
    pub async fn process_citation(
        &self,
        citation: CitationInfo,
        output_dir: &Path,
        index: usize,
    ) -> CitationOutcome {
        let filename = generate_filename(&citation, index, self.max_filename_length);
        let path = output_dir.join(&filename);
        let mut outcome = CitationOutcome::new(index, filename, citation);

        let result = AssertUnwindSafe(self.resolve_into(&mut outcome, &path))
            .catch_unwind()
            .await;

        let error = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(payload) => Some(CitationError::Panicked(panic_message(payload))),
        };
        if let Some(e) = error {
            warn!("Reference {} failed unexpectedly: {}", index, e);
            outcome.mark_error(&e);
        }
        outcome
    }

    async fn resolve_into(
        &self,
        outcome: &mut CitationOutcome,
        path: &Path,
    ) -> Result<(), CitationError> {
        if fs::try_exists(path).await? {
            outcome.mark_exists();
            return Ok(());
        }

        for handler in self.registry.iter() {
            let attempt = handler.resolve(&outcome.citation).await;
            if self.log_api_calls {
                debug!(
                    "  {}: {} ({:.2}s)",
                    attempt.source,
                    attempt.success,
                    attempt.elapsed.as_secs_f64()
                );
            }

            let Some(url) = attempt.url.clone().filter(|_| attempt.success) else {
                outcome.record_attempt(attempt);
                continue;
            };

            match fetch_to_file(
                &self.client,
                &url,
                path,
                self.min_pdf_size,
                self.download_timeout,
            )
            .await
            {
                Ok(size) => {
                    debug!("Saved {} ({} bytes) from {}", outcome.filename, size, url);
                    outcome.mark_success(attempt);
                    return Ok(());
                }
                Err(e) => {
                    debug!("{} URL {} rejected: {}", attempt.source, url, e);
                    outcome.record_attempt(attempt.into_failed(e));
                }
            }
        }

        outcome.mark_failed(NO_SOURCE_FOUND);
        Ok(())
    }

    /// Resolve every citation into `output_dir`, at most `max_threads` at a time.
    ///
    /// Citations are numbered from 1 in input order; outcomes complete in any order and are
    /// returned sorted by that index.
    pub async fn download_all(
        &self,
        citations: Vec<CitationInfo>,
        output_dir: &Path,
        progress: Option<&ProgressBar>,
    ) -> std::io::Result<DownloadReport> {
        let start = Instant::now();
        fs::create_dir_all(output_dir).await?;

        let total = citations.len();
        info!(
            "Resolving {} references with {} workers across {} sources: {}",
            total,
            self.concurrency,
            self.registry.len(),
            self.registry.names().join(", ")
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let results = stream::iter(citations.into_iter().enumerate())
            .map(|(i, citation)| {
                let semaphore = semaphore.clone();
                let index = i + 1;

                async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .expect("semaphore should never be closed");
                    if self.stop.load(Ordering::SeqCst) {
                        let filename =
                            generate_filename(&citation, index, self.max_filename_length);
                        let mut outcome = CitationOutcome::new(index, filename, citation);
                        outcome.mark_cancelled();
                        return outcome;
                    }
                    self.process_citation(citation, output_dir, index).await
                }
            })
            .buffer_unordered(self.concurrency * BUFFER_CAPACITY_MULTIPLIER);
        let mut results = std::pin::pin!(results);

        let mut aggregator = SessionAggregator::new();
        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = results.next().await {
            aggregator.record(&outcome);
            let line = outcome.status_line();
            match progress {
                Some(pb) => {
                    pb.println(&line);
                    pb.inc(1);
                }
                None => info!("Completed {}/{}: {}", outcome.index, total, line),
            }
            outcomes.push(outcome);
        }

        outcomes.sort_by_key(|o| o.index);
        info!("Resolution finished in {}", format_elapsed(start.elapsed()));

        Ok(DownloadReport {
            outcomes,
            summary: aggregator.finish(),
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
