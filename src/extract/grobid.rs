use log::{debug, info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

use super::tei::parse_tei;
use super::RawCitationRecord;
use crate::config::GrobidConfig;
use crate::error::ExtractionError;

const ALIVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the structured citation extraction service
#[derive(Clone)]
pub struct GrobidClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl GrobidClient {
    pub fn new(client: Client, config: &GrobidConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the liveness endpoint
    pub async fn is_alive(&self) -> bool {
        let url = format!("{}/api/isalive", self.base_url);
        match self.client.get(&url).timeout(ALIVE_TIMEOUT).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("Structured extraction service is alive at {}", self.base_url);
                true
            }
            Ok(resp) => {
                warn!(
                    "Structured extraction service returned status {}",
                    resp.status()
                );
                false
            }
            Err(e) => {
                warn!("Cannot reach structured extraction service at {}: {}", self.base_url, e);
                false
            }
        }
    }

    /// Submit a PDF and return the TEI markup for its reference list
    pub async fn process_references(&self, pdf_path: &Path) -> Result<String, ExtractionError> {
        if !self.is_alive().await {
            return Err(ExtractionError::ServiceUnavailable(self.base_url.clone()));
        }

        let bytes = tokio::fs::read(pdf_path).await?;
        let file_name = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = Form::new()
            .part("input", part)
            .text("consolidateHeader", "1")
            .text("consolidateCitations", "1")
            .text("includeRawCitations", "1");

        let url = format!("{}/api/processReferences", self.base_url);
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ExtractionError::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    }

    /// Extract raw citation records from a PDF
    pub async fn extract(
        &self,
        pdf_path: &Path,
        supplement_ratio: f64,
    ) -> Result<Vec<RawCitationRecord>, ExtractionError> {
        info!(
            "Extracting references from {} with the structured service",
            pdf_path.display()
        );
        let xml = self.process_references(pdf_path).await?;
        parse_tei(&xml, supplement_ratio)
    }
}
