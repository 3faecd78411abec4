//! Source handlers: one resolver per external bibliographic service.
//!
//! Every handler turns a citation into a [`SourceAttempt`] and never fails outright; network
//! and parse errors end up in the attempt's `error` field. Handlers are held in a
//! [`SourceRegistry`] ordered by configured priority.

pub mod arxiv;
pub mod core_api;
pub mod crossref;
pub mod http;
pub mod openalex;
pub mod pubmed;
pub mod semantic_scholar;
pub mod unpaywall;

pub use self::arxiv::ArxivHandler;
pub use self::core_api::CoreHandler;
pub use self::crossref::CrossrefHandler;
pub use self::http::create_client;
pub use self::openalex::OpenalexHandler;
pub use self::pubmed::PubmedHandler;
pub use self::semantic_scholar::SemanticScholarHandler;
pub use self::unpaywall::UnpaywallHandler;

use log::debug;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::config::{Config, ServiceName};
use crate::error::SourceError;
use crate::extract::CitationInfo;
use crate::ratelimit::RateLimiters;

/// A candidate PDF location found by a handler
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub url: String,
    pub metadata: BTreeMap<String, String>,
}

impl Hit {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Result of consulting one service for one citation
#[derive(Debug, Clone, PartialEq)]
pub struct SourceAttempt {
    pub source: String,
    pub success: bool,
    pub url: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl SourceAttempt {
    pub fn succeeded(source: &str, hit: Hit, elapsed: Duration) -> Self {
        Self {
            source: source.to_string(),
            success: true,
            url: Some(hit.url),
            metadata: hit.metadata,
            error: None,
            elapsed,
        }
    }

    pub fn failed(source: &str, error: impl std::fmt::Display, elapsed: Duration) -> Self {
        Self {
            source: source.to_string(),
            success: false,
            url: None,
            metadata: BTreeMap::new(),
            error: Some(error.to_string()),
            elapsed,
        }
    }

    /// Record a handler lookup started at `started`
    pub fn from_lookup(source: &str, started: Instant, result: Result<Hit, SourceError>) -> Self {
        let elapsed = started.elapsed();
        match result {
            Ok(hit) => {
                debug!("{} found {} in {:.3}s", source, hit.url, elapsed.as_secs_f64());
                Self::succeeded(source, hit, elapsed)
            }
            Err(e) => {
                debug!("{} failed in {:.3}s: {}", source, elapsed.as_secs_f64(), e);
                Self::failed(source, e, elapsed)
            }
        }
    }

    /// Mark a successful lookup as failed because its URL did not yield a valid download.
    /// The candidate URL is kept for diagnostics.
    pub fn into_failed(mut self, error: impl std::fmt::Display) -> Self {
        self.success = false;
        self.error = Some(error.to_string());
        self
    }
}

/// Uniform resolution contract shared by every handler
#[allow(async_fn_in_trait)]
pub trait Resolve {
    fn name(&self) -> &str;

    async fn resolve(&self, citation: &CitationInfo) -> SourceAttempt;
}

/// The fixed set of source handlers
pub enum Source {
    Arxiv(ArxivHandler),
    Unpaywall(UnpaywallHandler),
    Openalex(OpenalexHandler),
    SemanticScholar(SemanticScholarHandler),
    Crossref(CrossrefHandler),
    Pubmed(PubmedHandler),
    Core(CoreHandler),
}

impl Source {
    pub fn build(name: ServiceName, ctx: &HandlerContext<'_>) -> Self {
        match name {
            ServiceName::Arxiv => Source::Arxiv(ArxivHandler::new(ctx)),
            ServiceName::Unpaywall => Source::Unpaywall(UnpaywallHandler::new(ctx)),
            ServiceName::Openalex => Source::Openalex(OpenalexHandler::new(ctx)),
            ServiceName::SemanticScholar => {
                Source::SemanticScholar(SemanticScholarHandler::new(ctx))
            }
            ServiceName::Crossref => Source::Crossref(CrossrefHandler::new(ctx)),
            ServiceName::Pubmed => Source::Pubmed(PubmedHandler::new(ctx)),
            ServiceName::Core => Source::Core(CoreHandler::new(ctx)),
        }
    }
}

impl Resolve for Source {
    fn name(&self) -> &str {
        match self {
            Source::Arxiv(h) => h.name(),
            Source::Unpaywall(h) => h.name(),
            Source::Openalex(h) => h.name(),
            Source::SemanticScholar(h) => h.name(),
            Source::Crossref(h) => h.name(),
            Source::Pubmed(h) => h.name(),
            Source::Core(h) => h.name(),
        }
    }

    async fn resolve(&self, citation: &CitationInfo) -> SourceAttempt {
        match self {
            Source::Arxiv(h) => h.resolve(citation).await,
            Source::Unpaywall(h) => h.resolve(citation).await,
            Source::Openalex(h) => h.resolve(citation).await,
            Source::SemanticScholar(h) => h.resolve(citation).await,
            Source::Crossref(h) => h.resolve(citation).await,
            Source::Pubmed(h) => h.resolve(citation).await,
            Source::Core(h) => h.resolve(citation).await,
        }
    }
}

/// Everything a handler needs at construction time
pub struct HandlerContext<'a> {
    pub config: &'a Config,
    pub client: &'a Client,
    pub limiters: &'a RateLimiters,
}

impl HandlerContext<'_> {
    pub fn timeout(&self, name: ServiceName) -> Duration {
        self.config
            .service(name)
            .map(|svc| svc.timeout())
            .unwrap_or(Duration::from_secs(15))
    }
}

/// Handlers in the order they are consulted for each citation
pub struct SourceRegistry<S = Source> {
    handlers: Vec<S>,
}

impl SourceRegistry<Source> {
    /// Build a handler for every enabled service, in ascending priority order
    pub fn from_config(config: &Config, client: &Client, limiters: &RateLimiters) -> Self {
        let ctx = HandlerContext {
            config,
            client,
            limiters,
        };
        let handlers = config
            .enabled_services()
            .into_iter()
            .map(|(name, _)| Source::build(name, &ctx))
            .collect();
        Self { handlers }
    }
}

impl<S: Resolve> SourceRegistry<S> {
    /// Registry over handlers already in priority order
    pub fn new(handlers: Vec<S>) -> Self {
        Self { handlers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }
}
