//! Open-access location registry, queried by DOI.

use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::http::get_json;
use super::{HandlerContext, Hit, Resolve, SourceAttempt};
use crate::config::ServiceName;
use crate::error::SourceError;
use crate::extract::CitationInfo;
use crate::ratelimit::RateLimiter;

#[derive(Debug, Deserialize)]
pub struct UnpaywallResponse {
    #[serde(default)]
    pub is_oa: bool,
    #[serde(default)]
    pub oa_locations: Vec<OaLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OaLocation {
    pub url_for_pdf: Option<String>,
    pub host_type: Option<String>,
}

/// Preference score for a candidate location
fn location_score(location: &OaLocation, pdf_url: &str) -> u32 {
    let mut score = 0;
    if location
        .host_type
        .as_deref()
        .is_some_and(|h| h.contains("repository"))
    {
        score += 2;
    }
    if pdf_url.to_lowercase().contains("arxiv") {
        score += 3;
    }
    if pdf_url.ends_with(".pdf") {
        score += 1;
    }
    score
}

/// Highest-scoring location with a PDF link; the earliest wins ties
pub fn best_location(locations: &[OaLocation]) -> Option<(&OaLocation, &str)> {
    let mut best: Option<(&OaLocation, &str, u32)> = None;
    for location in locations {
        let Some(url) = location.url_for_pdf.as_deref().filter(|u| !u.is_empty()) else {
            continue;
        };
        let score = location_score(location, url);
        if best.map_or(true, |(_, _, best_score)| score > best_score) {
            best = Some((location, url, score));
        }
    }
    best.map(|(location, url, _)| (location, url))
}

#[derive(Clone)]
pub struct UnpaywallHandler {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    base: String,
    email: String,
    timeout: Duration,
}

impl UnpaywallHandler {
    pub fn new(ctx: &HandlerContext<'_>) -> Self {
        Self {
            client: ctx.client.clone(),
            limiter: ctx.limiters.get_or_default(ServiceName::Unpaywall),
            base: ctx.config.endpoints.unpaywall.trim_end_matches('/').to_string(),
            email: ctx.config.contact_email.clone(),
            timeout: ctx.timeout(ServiceName::Unpaywall),
        }
    }

    /// Find the preferred open-access PDF for a DOI
    pub async fn lookup_doi(&self, doi: &str) -> Result<Hit, SourceError> {
        if doi.is_empty() {
            return Err(SourceError::MissingInput("DOI"));
        }
        self.limiter.acquire().await;

        let url = format!("{}/{}", self.base, doi);
        let request = self
            .client
            .get(&url)
            .query(&[("email", self.email.as_str())])
            .timeout(self.timeout);
        let data: UnpaywallResponse = get_json(request).await?;

        if !data.is_oa {
            return Err(SourceError::NotOpenAccess);
        }
        let (location, pdf_url) =
            best_location(&data.oa_locations).ok_or(SourceError::NoPdfLink)?;

        let mut hit = Hit::new(pdf_url).with("doi", doi);
        if let Some(host_type) = &location.host_type {
            hit = hit.with("host_type", host_type.as_str());
        }
        Ok(hit)
    }
}

impl Resolve for UnpaywallHandler {
    fn name(&self) -> &str {
        ServiceName::Unpaywall.as_str()
    }

    async fn resolve(&self, citation: &CitationInfo) -> SourceAttempt {
        let started = Instant::now();
        let result = self.lookup_doi(&citation.doi).await;
        SourceAttempt::from_lookup(self.name(), started, result)
    }
}
