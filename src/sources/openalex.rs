//! Scholarly graph lookup by DOI, falling back to a title search.

use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::http::get_json;
use super::{HandlerContext, Hit, Resolve, SourceAttempt};
use crate::common::truncate_chars;
use crate::config::ServiceName;
use crate::error::SourceError;
use crate::extract::CitationInfo;
use crate::ratelimit::RateLimiter;

const MIN_SEARCH_TITLE_LENGTH: usize = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Work {
    pub id: Option<String>,
    pub open_access: Option<OpenAccess>,
    pub locations: Vec<Location>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OpenAccess {
    pub is_oa: bool,
    pub oa_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Location {
    pub is_oa: bool,
    pub pdf_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    results: Vec<Work>,
}

impl Work {
    /// Top-level open-access URL, else the first open-access location's PDF
    pub fn pdf_url(&self) -> Option<&str> {
        if let Some(oa) = &self.open_access {
            if oa.is_oa {
                if let Some(url) = oa.oa_url.as_deref().filter(|u| !u.is_empty()) {
                    return Some(url);
                }
            }
        }
        self.locations
            .iter()
            .filter(|loc| loc.is_oa)
            .find_map(|loc| loc.pdf_url.as_deref().filter(|u| !u.is_empty()))
    }

    fn into_hit(self, method: &str) -> Option<Hit> {
        let url = self.pdf_url()?.to_string();
        let mut hit = Hit::new(url).with("method", method);
        if let Some(id) = self.id {
            hit = hit.with("openalex_id", id);
        }
        Some(hit)
    }
}

pub struct OpenalexHandler {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    base: String,
    email: String,
    timeout: Duration,
}

impl OpenalexHandler {
    pub fn new(ctx: &HandlerContext<'_>) -> Self {
        Self {
            client: ctx.client.clone(),
            limiter: ctx.limiters.get_or_default(ServiceName::Openalex),
            base: ctx.config.endpoints.openalex.trim_end_matches('/').to_string(),
            email: ctx.config.contact_email.clone(),
            timeout: ctx.timeout(ServiceName::Openalex),
        }
    }

    async fn by_doi(&self, doi: &str) -> Result<Hit, SourceError> {
        self.limiter.acquire().await;
        let url = format!("{}/doi:{}", self.base, doi);
        let request = self
            .client
            .get(&url)
            .query(&[("mailto", self.email.as_str())])
            .timeout(self.timeout);
        let work: Work = get_json(request).await?;
        work.into_hit("doi").ok_or(SourceError::NoPdfLink)
    }

    async fn by_title(&self, title: &str) -> Result<Hit, SourceError> {
        self.limiter.acquire().await;
        let request = self
            .client
            .get(&self.base)
            .query(&[
                ("search", truncate_chars(title, 200)),
                ("per-page", "1"),
                ("mailto", self.email.as_str()),
            ])
            .timeout(self.timeout);
        let data: SearchResponse = get_json(request).await?;
        data.results
            .into_iter()
            .next()
            .and_then(|work| work.into_hit("title"))
            .ok_or(SourceError::NoPdfLink)
    }

    async fn lookup(&self, citation: &CitationInfo) -> Result<Hit, SourceError> {
        let mut doi_error = None;
        if !citation.doi.is_empty() {
            match self.by_doi(&citation.doi).await {
                Ok(hit) => return Ok(hit),
                Err(e) => {
                    debug!("openalex DOI lookup failed for {}: {}", citation.doi, e);
                    doi_error = Some(e);
                }
            }
        }

        if citation.title.chars().count() > MIN_SEARCH_TITLE_LENGTH {
            return self.by_title(&citation.title).await;
        }
        Err(doi_error.unwrap_or(SourceError::MissingInput("DOI or title")))
    }
}

impl Resolve for OpenalexHandler {
    fn name(&self) -> &str {
        ServiceName::Openalex.as_str()
    }

    async fn resolve(&self, citation: &CitationInfo) -> SourceAttempt {
        let started = Instant::now();
        let result = self.lookup(citation).await;
        SourceAttempt::from_lookup(self.name(), started, result)
    }
}
