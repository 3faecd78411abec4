//! Open-access aggregator search. Needs an API key; disabled by default.

use serde::Deserialize;
use serde_json::Value;
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
pub struct SearchResponse {
    pub results: Vec<CoreWork>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoreWork {
    pub id: Value,
    pub download_url: Option<String>,
    pub fulltext_urls: Vec<String>,
    pub source_fulltext_urls: Vec<String>,
}

impl CoreWork {
    pub fn pdf_url(&self) -> Option<&str> {
        self.fulltext_urls
            .iter()
            .chain(self.source_fulltext_urls.iter())
            .chain(self.download_url.iter())
            .map(String::as_str)
            .find(|url| url.to_lowercase().ends_with(".pdf"))
    }

    fn id_string(&self) -> Option<String> {
        match &self.id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

pub struct CoreHandler {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    base: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl CoreHandler {
    pub fn new(ctx: &HandlerContext<'_>) -> Self {
        Self {
            client: ctx.client.clone(),
            limiter: ctx.limiters.get_or_default(ServiceName::Core),
            base: ctx.config.endpoints.core.trim_end_matches('/').to_string(),
            api_key: ctx.config.core_api_key.clone().filter(|k| !k.trim().is_empty()),
            timeout: ctx.timeout(ServiceName::Core),
        }
    }

    async fn lookup(&self, citation: &CitationInfo) -> Result<Hit, SourceError> {
        if citation.title.chars().count() < MIN_SEARCH_TITLE_LENGTH {
            return Err(SourceError::MissingInput("title"));
        }
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SourceError::MissingInput("CORE API key"))?;

        self.limiter.acquire().await;
        let request = self
            .client
            .get(&self.base)
            .bearer_auth(api_key)
            .query(&[("q", truncate_chars(&citation.title, 200)), ("limit", "3")])
            .timeout(self.timeout);
        let data: SearchResponse = get_json(request).await?;

        data.results
            .iter()
            .find_map(|work| {
                let url = work.pdf_url()?;
                let mut hit = Hit::new(url);
                if let Some(id) = work.id_string() {
                    hit = hit.with("core_id", id);
                }
                Some(hit)
            })
            .ok_or(SourceError::NoPdfLink)
    }
}

impl Resolve for CoreHandler {
    fn name(&self) -> &str {
        ServiceName::Core.as_str()
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
    fn test_first_pdf_link_across_fields() {
        let work: CoreWork = serde_json::from_str(
            r#"{"id":12345,
                "fulltextUrls":["https://core.example/display/12345"],
                "sourceFulltextUrls":["https://repo.example/paper.PDF"],
                "downloadUrl":"https://core.example/download/12345.pdf"}"#,
        )
        .unwrap();
        assert_eq!(work.pdf_url(), Some("https://repo.example/paper.PDF"));
        assert_eq!(work.id_string().as_deref(), Some("12345"));
    }

    #[test]
    fn test_no_pdf_links() {
        let work: CoreWork =
            serde_json::from_str(r#"{"id":"abc","downloadUrl":"https://core.example/landing"}"#)
                .unwrap();
        assert!(work.pdf_url().is_none());
    }
}
