//! DOI discovery through bibliographic search, resolved via the open-access registry.

use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::http::get_json;
use super::unpaywall::UnpaywallHandler;
use super::{HandlerContext, Hit, Resolve, SourceAttempt};
use crate::common::truncate_chars;
use crate::config::ServiceName;
use crate::error::SourceError;
use crate::extract::{clean_doi, CitationInfo};
use crate::ratelimit::RateLimiter;

const MIN_SEARCH_TITLE_LENGTH: usize = 5;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WorksResponse {
    pub message: WorksMessage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WorksMessage {
    pub items: Vec<WorkItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WorkItem {
    #[serde(rename = "DOI")]
    pub doi: Option<String>,
}

impl WorksResponse {
    /// Candidate DOIs in relevance order
    pub fn dois(&self) -> Vec<String> {
        self.message
            .items
            .iter()
            .filter_map(|item| item.doi.as_deref())
            .map(clean_doi)
            .filter(|doi| !doi.is_empty())
            .collect()
    }
}

pub struct CrossrefHandler {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    base: String,
    email: String,
    timeout: Duration,
    unpaywall: UnpaywallHandler,
}

impl CrossrefHandler {
    pub fn new(ctx: &HandlerContext<'_>) -> Self {
        Self {
            client: ctx.client.clone(),
            limiter: ctx.limiters.get_or_default(ServiceName::Crossref),
            base: ctx.config.endpoints.crossref.trim_end_matches('/').to_string(),
            email: ctx.config.contact_email.clone(),
            timeout: ctx.timeout(ServiceName::Crossref),
            unpaywall: UnpaywallHandler::new(ctx),
        }
    }

    async fn search(&self, citation: &CitationInfo) -> Result<Vec<String>, SourceError> {
        self.limiter.acquire().await;
        let mut params = vec![
            ("query.bibliographic", truncate_chars(&citation.title, 200)),
            ("rows", "3"),
            ("select", "DOI,title,published"),
            ("mailto", self.email.as_str()),
        ];
        if !citation.author.is_empty() {
            params.push(("query.author", truncate_chars(&citation.author, 100)));
        }
        let request = self.client.get(&self.base).query(&params).timeout(self.timeout);
        let data: WorksResponse = get_json(request).await?;
        Ok(data.dois())
    }

    async fn lookup(&self, citation: &CitationInfo) -> Result<Hit, SourceError> {
        if !citation.doi.is_empty() {
            self.limiter.acquire().await;
            let hit = self.unpaywall.lookup_doi(&citation.doi).await?;
            return Ok(hit.with("existing_doi", citation.doi.as_str()));
        }

        if citation.title.chars().count() <= MIN_SEARCH_TITLE_LENGTH {
            return Err(SourceError::MissingInput("DOI or title"));
        }

        let mut last_error = SourceError::NoPdfLink;
        for doi in self.search(citation).await? {
            match self.unpaywall.lookup_doi(&doi).await {
                Ok(hit) => return Ok(hit.with("crossref_doi", doi)),
                Err(e) => {
                    debug!("crossref candidate {} not retrievable: {}", doi, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

impl Resolve for CrossrefHandler {
    fn name(&self) -> &str {
        ServiceName::Crossref.as_str()
    }

    async fn resolve(&self, citation: &CitationInfo) -> SourceAttempt {
        let started = Instant::now();
        let result = self.lookup(citation).await;
        SourceAttempt::from_lookup(self.name(), started, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dois_in_order() {
        let json = r#"{"status":"ok","message":{"items":[
            {"DOI":"10.1000/First","title":["A"]},
            {"title":["no doi"]},
            {"DOI":"https://doi.org/10.1000/second"}
        ]}}"#;
        let data: WorksResponse = serde_json::from_str(json).unwrap();
        assert_eq!(data.dois(), vec!["10.1000/First", "10.1000/second"]);
    }

    #[test]
    fn test_empty_message() {
        let data: WorksResponse = serde_json::from_str(r#"{"message":{}}"#).unwrap();
        assert!(data.dois().is_empty());
    }
}
