use std::time::Instant;

use super::{HandlerContext, Hit, Resolve, SourceAttempt};
use crate::config::ServiceName;
use crate::error::SourceError;
use crate::extract::{find_arxiv_id, CitationInfo};

/// Direct-identifier handler: builds the preprint server's PDF URL from an arXiv id.
/// No network call is made.
pub struct ArxivHandler {
    pdf_base: String,
}

impl ArxivHandler {
    pub fn new(ctx: &HandlerContext<'_>) -> Self {
        Self::with_base(&ctx.config.endpoints.arxiv_pdf)
    }

    pub fn with_base(pdf_base: &str) -> Self {
        Self {
            pdf_base: pdf_base.trim_end_matches('/').to_string(),
        }
    }

    fn lookup(&self, citation: &CitationInfo) -> Result<Hit, SourceError> {
        let arxiv_id = if citation.arxiv_id.is_empty() {
            find_arxiv_id(&format!("{} {}", citation.title, citation.raw_reference))
                .ok_or(SourceError::MissingInput("arXiv id"))?
        } else {
            citation.arxiv_id.clone()
        };

        let url = format!("{}/{}.pdf", self.pdf_base, arxiv_id);
        Ok(Hit::new(url).with("arxiv_id", arxiv_id))
    }
}

impl Resolve for ArxivHandler {
    fn name(&self) -> &str {
        ServiceName::Arxiv.as_str()
    }

    async fn resolve(&self, citation: &CitationInfo) -> SourceAttempt {
        let started = Instant::now();
        SourceAttempt::from_lookup(self.name(), started, self.lookup(citation))
    }
}
