//! Biomedical literature: search the index for a PMID, then link it to a full-text archive id.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::http::get_json;
use super::{HandlerContext, Hit, Resolve, SourceAttempt};
use crate::config::ServiceName;
use crate::error::SourceError;
use crate::extract::CitationInfo;
use crate::ratelimit::RateLimiter;

const TOOL_NAME: &str = "reference-retriever";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchResponse {
    pub esearchresult: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchResult {
    pub idlist: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LinkResponse {
    pub linksets: Vec<LinkSet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LinkSet {
    pub linksetdbs: Vec<LinkSetDb>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LinkSetDb {
    pub dbto: String,
    /// Ids arrive as strings or bare numbers depending on the endpoint version
    pub links: Vec<Value>,
}

impl LinkResponse {
    /// First full-text archive id linked to the searched record
    pub fn pmc_id(&self) -> Option<String> {
        self.linksets
            .iter()
            .flat_map(|set| set.linksetdbs.iter())
            .filter(|db| db.dbto == "pmc")
            .find_map(|db| db.links.first())
            .and_then(|link| match link {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }
}

/// Search term: the DOI when known, else an exact title match
pub fn search_term(citation: &CitationInfo) -> Option<String> {
    if !citation.doi.is_empty() {
        Some(citation.doi.clone())
    } else if !citation.title.is_empty() {
        Some(format!("\"{}\"[Title]", citation.title))
    } else {
        None
    }
}

pub struct PubmedHandler {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    eutils: String,
    articles: String,
    email: String,
    timeout: Duration,
}

impl PubmedHandler {
    pub fn new(ctx: &HandlerContext<'_>) -> Self {
        Self {
            client: ctx.client.clone(),
            limiter: ctx.limiters.get_or_default(ServiceName::Pubmed),
            eutils: ctx
                .config
                .endpoints
                .pubmed_eutils
                .trim_end_matches('/')
                .to_string(),
            articles: ctx
                .config
                .endpoints
                .pmc_articles
                .trim_end_matches('/')
                .to_string(),
            email: ctx.config.contact_email.clone(),
            timeout: ctx.timeout(ServiceName::Pubmed),
        }
    }

    async fn find_pmid(&self, term: &str) -> Result<String, SourceError> {
        self.limiter.acquire().await;
        let url = format!("{}/esearch.fcgi", self.eutils);
        let request = self
            .client
            .get(&url)
            .query(&[
                ("db", "pubmed"),
                ("term", term),
                ("retmax", "1"),
                ("retmode", "json"),
                ("email", self.email.as_str()),
                ("tool", TOOL_NAME),
            ])
            .timeout(self.timeout);
        let data: SearchResponse = get_json(request).await?;
        data.esearchresult
            .idlist
            .into_iter()
            .next()
            .ok_or(SourceError::NoPdfLink)
    }

    async fn find_pmc_id(&self, pmid: &str) -> Result<String, SourceError> {
        self.limiter.acquire().await;
        let url = format!("{}/elink.fcgi", self.eutils);
        let request = self
            .client
            .get(&url)
            .query(&[
                ("dbfrom", "pubmed"),
                ("db", "pmc"),
                ("id", pmid),
                ("retmode", "json"),
                ("email", self.email.as_str()),
                ("tool", TOOL_NAME),
            ])
            .timeout(self.timeout);
        let data: LinkResponse = get_json(request).await?;
        data.pmc_id().ok_or(SourceError::NotOpenAccess)
    }

    async fn lookup(&self, citation: &CitationInfo) -> Result<Hit, SourceError> {
        let term = search_term(citation).ok_or(SourceError::MissingInput("DOI or title"))?;
        let pmid = self.find_pmid(&term).await?;
        let pmc_id = self.find_pmc_id(&pmid).await?;

        let url = format!("{}/PMC{}/pdf/", self.articles, pmc_id);
        Ok(Hit::new(url)
            .with("pmid", pmid)
            .with("pmcid", format!("PMC{}", pmc_id)))
    }
}

impl Resolve for PubmedHandler {
    fn name(&self) -> &str {
        ServiceName::Pubmed.as_str()
    }

    async fn resolve(&self, citation: &CitationInfo) -> SourceAttempt {
        let started = Instant::now();
        let result = self.lookup(citation).await;
        SourceAttempt::from_lookup(self.name(), started, result)
    }
}
