//! Session-level aggregation of citation outcomes.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::download::{CitationOutcome, CitationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Every citation was already on disk; nothing new was attempted
    UpToDate,
    /// Nothing was retrieved
    Troubleshoot,
    /// Under 30% retrieved
    Improve,
    /// Between 30% and 70%
    Acceptable,
    /// Over 70% retrieved
    Excellent,
}

impl Recommendation {
    pub fn from_success_rate(rate: f64) -> Self {
        if rate <= 0.0 {
            Recommendation::Troubleshoot
        } else if rate < 30.0 {
            Recommendation::Improve
        } else if rate > 70.0 {
            Recommendation::Excellent
        } else {
            Recommendation::Acceptable
        }
    }

    pub fn tips(&self) -> &'static [&'static str] {
        match self {
            Recommendation::UpToDate => &[
                "All citations were already downloaded by an earlier run; nothing new was attempted.",
            ],
            Recommendation::Troubleshoot => &[
                "Troubleshooting suggestions:",
                "  - Check that the PDF actually contains a reference list",
                "  - Verify the structured extraction service is running",
                "  - Try papers from major publishers or preprint servers",
                "  - Check network connectivity to the metadata services",
            ],
            Recommendation::Improve => &[
                "To improve the success rate:",
                "  - Enable the structured extraction service for better citations",
                "  - Check whether the references carry DOIs or clear titles",
                "  - Recent papers tend to have better open-access coverage",
            ],
            Recommendation::Acceptable => &[],
            Recommendation::Excellent => {
                &["Excellent success rate: the multi-source fallback is working well."]
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceShare {
    pub service: String,
    pub count: usize,
    /// Share of successful downloads, in percent
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub total: usize,
    pub success: usize,
    pub exists: usize,
    pub failed: usize,
    pub error: usize,
    pub cancelled: usize,
    /// Percent of citations downloaded in this run
    pub success_rate: f64,
    /// Most-used service first
    pub services: Vec<ServiceShare>,
    pub attempts: usize,
    pub total_attempt_secs: f64,
    pub average_response_secs: f64,
    pub recommendation: Recommendation,
}

impl SessionSummary {
    /// Human readable report, one line per entry
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Download summary: {}/{} PDFs ({:.1}% success rate)",
            self.success, self.total, self.success_rate
        )];
        lines.push(format!(
            "  exists: {}, failed: {}, errors: {}, cancelled: {}",
            self.exists, self.failed, self.error, self.cancelled
        ));

        if !self.services.is_empty() {
            lines.push("Sources breakdown:".to_string());
            for share in &self.services {
                lines.push(format!(
                    "  - {}: {} ({:.1}%)",
                    share.service, share.count, share.percentage
                ));
            }
        }

        if self.attempts > 0 {
            lines.push(format!(
                "Average API response time: {:.2}s over {} attempts",
                self.average_response_secs, self.attempts
            ));
        }

        lines.extend(self.recommendation.tips().iter().map(|s| s.to_string()));
        lines
    }
}

/// Accumulates outcomes as they complete, in any order
#[derive(Debug, Default)]
pub struct SessionAggregator {
    total: usize,
    success: usize,
    exists: usize,
    failed: usize,
    error: usize,
    cancelled: usize,
    services: BTreeMap<String, usize>,
    attempts: usize,
    attempt_time: Duration,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &CitationOutcome) {
        self.total += 1;
        match outcome.status() {
            CitationStatus::Success => {
                self.success += 1;
                let service = outcome.service().unwrap_or("unknown");
                *self.services.entry(service.to_string()).or_insert(0) += 1;
            }
            CitationStatus::Exists => self.exists += 1,
            CitationStatus::Error => self.error += 1,
            CitationStatus::Cancelled => self.cancelled += 1,
            CitationStatus::Failed | CitationStatus::Pending => self.failed += 1,
        }

        // Every attempt counts, not just the winning one
        for attempt in outcome.attempts() {
            self.attempts += 1;
            self.attempt_time += attempt.elapsed;
        }
    }

    pub fn finish(self) -> SessionSummary {
        let success_rate = if self.total > 0 {
            self.success as f64 / self.total as f64 * 100.0
        } else {
            0.0
        };

        let mut services: Vec<ServiceShare> = self
            .services
            .into_iter()
            .map(|(service, count)| ServiceShare {
                percentage: count as f64 / self.success.max(1) as f64 * 100.0,
                service,
                count,
            })
            .collect();
        // Stable sort keeps names alphabetical within equal counts
        services.sort_by(|a, b| b.count.cmp(&a.count));

        let total_attempt_secs = self.attempt_time.as_secs_f64();
        let average_response_secs = if self.attempts > 0 {
            total_attempt_secs / self.attempts as f64
        } else {
            0.0
        };

        SessionSummary {
            total: self.total,
            success: self.success,
            exists: self.exists,
            failed: self.failed,
            error: self.error,
            cancelled: self.cancelled,
            success_rate,
            services,
            attempts: self.attempts,
            total_attempt_secs,
            average_response_secs,
            recommendation: if self.exists > 0 && self.exists + self.cancelled == self.total {
                Recommendation::UpToDate
            } else {
                Recommendation::from_success_rate(success_rate)
            },
        }
    }
}
