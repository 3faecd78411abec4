//! Citation graph client: paper by DOI, else title search.

use log::debug;
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

const FIELDS: &str = "openAccessPdf,externalIds";
const MIN_SEARCH_TITLE_LENGTH: usize = 5;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Paper {
    pub paper_id: Option<String>,
    /// Object with a `url` field in the current API; older payloads carry a bare string
    pub open_access_pdf: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    data: Vec<Paper>,
}

impl Paper {
    pub fn pdf_url(&self) -> Option<&str> {
        let url = match self.open_access_pdf.as_ref()? {
            Value::Object(map) => map.get("url")?.as_str(),
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }?;
        (!url.is_empty()).then_some(url)
    }
}

pub struct SemanticScholarHandler {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    base: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl SemanticScholarHandler {
    pub fn new(ctx: &HandlerContext<'_>) -> Self {
        Self {
            client: ctx.client.clone(),
            limiter: ctx.limiters.get_or_default(ServiceName::SemanticScholar),
            base: ctx
                .config
                .endpoints
                .semantic_scholar
                .trim_end_matches('/')
                .to_string(),
            api_key: ctx
                .config
                .semantic_scholar_api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
            timeout: ctx.timeout(ServiceName::SemanticScholar),
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url).timeout(self.timeout);
        match &self.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    async fn by_doi(&self, doi: &str) -> Result<Paper, SourceError> {
        self.limiter.acquire().await;
        let url = format!("{}/paper/DOI:{}", self.base, doi);
        get_json(self.get(&url).query(&[("fields", FIELDS)])).await
    }

    async fn by_title(&self, title: &str) -> Result<Paper, SourceError> {
        self.limiter.acquire().await;
        let url = format!("{}/paper/search", self.base);
        let request = self.get(&url).query(&[
            ("query", truncate_chars(title, 200)),
            ("limit", "1"),
            ("fields", FIELDS),
        ]);
        let data: SearchResponse = get_json(request).await?;
        data.data.into_iter().next().ok_or(SourceError::NoPdfLink)
    }

    async fn lookup(&self, citation: &CitationInfo) -> Result<Hit, SourceError> {
        let mut paper = None;
        let mut last_error = None;

        if !citation.doi.is_empty() {
            match self.by_doi(&citation.doi).await {
                Ok(p) => paper = Some(p),
                Err(e) => {
                    debug!("semantic_scholar DOI lookup failed for {}: {}", citation.doi, e);
                    last_error = Some(e);
                }
            }
        }

        if paper.is_none() && citation.title.chars().count() > MIN_SEARCH_TITLE_LENGTH {
            match self.by_title(&citation.title).await {
                Ok(p) => paper = Some(p),
                Err(e) => last_error = Some(e),
            }
        }

        let Some(paper) = paper else {
            return Err(last_error.unwrap_or(SourceError::MissingInput("DOI or title")));
        };
        let url = paper.pdf_url().ok_or(SourceError::NoPdfLink)?;
        let mut hit = Hit::new(url);
        if let Some(id) = &paper.paper_id {
            hit = hit.with("paper_id", id.as_str());
        }
        Ok(hit)
    }
}

impl Resolve for SemanticScholarHandler {
    fn name(&self) -> &str {
        ServiceName::SemanticScholar.as_str()
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
    fn test_pdf_url_object_shape() {
        let paper: Paper = serde_json::from_str(
            r#"{"paperId":"abc","openAccessPdf":{"url":"https://pdfs.example/abc.pdf","status":"GREEN"}}"#,
        )
        .unwrap();
        assert_eq!(paper.pdf_url(), Some("https://pdfs.example/abc.pdf"));
        assert_eq!(paper.paper_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_pdf_url_string_shape() {
        let paper: Paper =
            serde_json::from_str(r#"{"openAccessPdf":"https://pdfs.example/x.pdf"}"#).unwrap();
        assert_eq!(paper.pdf_url(), Some("https://pdfs.example/x.pdf"));
    }

    #[test]
    fn test_pdf_url_absent() {
        let paper: Paper = serde_json::from_str(r#"{"openAccessPdf":null}"#).unwrap();
        assert!(paper.pdf_url().is_none());
        let empty: Paper = serde_json::from_str(r#"{"openAccessPdf":{"url":""}}"#).unwrap();
        assert!(empty.pdf_url().is_none());
    }
}
