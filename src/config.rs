//! Run configuration.
//!
//! A [`Config`] is built once at startup (defaults, optionally overlaid by a JSON file and
//! CLI flags), validated, and then passed by reference into every component.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Structured citations below this share of loose citations get supplemented with the loose ones
pub const DEFAULT_LOOSE_SUPPLEMENT_RATIO: f64 = 0.7;

const PLACEHOLDER_EMAIL: &str = "YOUR_EMAIL_HERE";

/// Shortest `max_filename_length` that still fits `ref_NNN_` + title + `_` + 8-char hash + `.pdf`
pub const MIN_FILENAME_LENGTH: usize = 40;

/// Slowest accepted request rate (requests per second)
pub const MIN_RATE_LIMIT: f64 = 0.001;

/// External bibliographic services, one source handler each
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceName {
    Arxiv,
    Unpaywall,
    Openalex,
    SemanticScholar,
    Crossref,
    Pubmed,
    Core,
}

impl ServiceName {
    pub const ALL: [ServiceName; 7] = [
        ServiceName::Arxiv,
        ServiceName::Unpaywall,
        ServiceName::Openalex,
        ServiceName::SemanticScholar,
        ServiceName::Crossref,
        ServiceName::Pubmed,
        ServiceName::Core,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Arxiv => "arxiv",
            ServiceName::Unpaywall => "unpaywall",
            ServiceName::Openalex => "openalex",
            ServiceName::SemanticScholar => "semantic_scholar",
            ServiceName::Crossref => "crossref",
            ServiceName::Pubmed => "pubmed",
            ServiceName::Core => "core",
        }
    }
}

impl std::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub enabled: bool,
    /// Requests per second
    pub rate_limit: f64,
    /// Token bucket capacity; derived from the rate when absent
    pub burst: Option<u32>,
    /// Lower is tried first
    pub priority: u32,
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit: 1.0,
            burst: None,
            priority: 5,
            timeout_secs: 15,
        }
    }
}

impl ServiceConfig {
    fn new(enabled: bool, rate_limit: f64, priority: u32) -> Self {
        Self {
            enabled,
            rate_limit,
            priority,
            ..Self::default()
        }
    }

    /// Bucket capacity: explicit burst, else twice the rate with a floor of 2
    pub fn burst_size(&self) -> u32 {
        self.burst
            .unwrap_or_else(|| ((self.rate_limit * 2.0).floor() as u32).max(2))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Structured extraction service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrobidConfig {
    pub url: String,
    pub enabled: bool,
    pub timeout_secs: u64,
}

impl Default for GrobidConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8070".to_string(),
            enabled: true,
            timeout_secs: 120,
        }
    }
}

/// Base URLs of the external services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub arxiv_pdf: String,
    pub unpaywall: String,
    pub openalex: String,
    pub semantic_scholar: String,
    pub crossref: String,
    pub pubmed_eutils: String,
    pub pmc_articles: String,
    pub core: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            arxiv_pdf: "https://arxiv.org/pdf".to_string(),
            unpaywall: "https://api.unpaywall.org/v2".to_string(),
            openalex: "https://api.openalex.org/works".to_string(),
            semantic_scholar: "https://api.semanticscholar.org/graph/v1".to_string(),
            crossref: "https://api.crossref.org/works".to_string(),
            pubmed_eutils: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            pmc_articles: "https://www.ncbi.nlm.nih.gov/pmc/articles".to_string(),
            core: "https://api.core.ac.uk/v3/search/works".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_threads: usize,
    pub output_dir_suffix: String,
    /// Bytes; smaller downloads are discarded
    pub min_pdf_size: u64,
    pub contact_email: String,
    pub semantic_scholar_api_key: Option<String>,
    pub core_api_key: Option<String>,
    pub grobid: GrobidConfig,
    pub services: BTreeMap<ServiceName, ServiceConfig>,
    pub min_title_length: usize,
    pub min_reference_quality_score: f64,
    pub max_filename_length: usize,
    pub loose_supplement_ratio: f64,
    pub download_timeout_secs: u64,
    pub log_api_calls: bool,
    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        let services = BTreeMap::from([
            (ServiceName::Arxiv, ServiceConfig::new(true, 10.0, 1)),
            (ServiceName::Unpaywall, ServiceConfig::new(true, 5.0, 2)),
            (ServiceName::Openalex, ServiceConfig::new(true, 10.0, 3)),
            (ServiceName::SemanticScholar, ServiceConfig::new(true, 0.8, 4)),
            (ServiceName::Crossref, ServiceConfig::new(true, 2.0, 5)),
            (ServiceName::Pubmed, ServiceConfig::new(true, 3.0, 6)),
            (ServiceName::Core, ServiceConfig::new(false, 1.0, 7)),
        ]);

        Self {
            max_threads: 4,
            output_dir_suffix: "_refs".to_string(),
            min_pdf_size: 1000,
            contact_email: PLACEHOLDER_EMAIL.to_string(),
            semantic_scholar_api_key: None,
            core_api_key: None,
            grobid: GrobidConfig::default(),
            services,
            min_title_length: 10,
            min_reference_quality_score: 0.3,
            max_filename_length: 150,
            loose_supplement_ratio: DEFAULT_LOOSE_SUPPLEMENT_RATIO,
            download_timeout_secs: 30,
            log_api_calls: false,
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        // A partial "services" map replaces the default one wholesale; restore the missing entries.
        let defaults = Config::default();
        for (name, service) in defaults.services {
            config.services.entry(name).or_insert(service);
        }
        Ok(config)
    }

    /// Load from an optional file, falling back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn service(&self, name: ServiceName) -> Option<&ServiceConfig> {
        self.services.get(&name)
    }

    /// Enabled services in ascending priority order
    pub fn enabled_services(&self) -> Vec<(ServiceName, &ServiceConfig)> {
        let mut enabled: Vec<(ServiceName, &ServiceConfig)> = self
            .services
            .iter()
            .filter(|(_, svc)| svc.enabled)
            .map(|(name, svc)| (*name, svc))
            .collect();
        // Stable sort keeps declaration order for equal priorities
        enabled.sort_by_key(|(_, svc)| svc.priority);
        enabled
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn user_agent(&self) -> String {
        format!(
            "ReferenceRetriever/{} (mailto:{})",
            env!("CARGO_PKG_VERSION"),
            self.contact_email
        )
    }

    /// Check the configuration, returning non-fatal warnings on success
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        let email = self.contact_email.trim();
        if email.is_empty() || !email.contains('@') || email == PLACEHOLDER_EMAIL {
            return Err(ConfigError::InvalidContactEmail(self.contact_email.clone()));
        }

        if self.max_threads == 0 || self.max_threads > 100 {
            return Err(invalid(
                "max_threads",
                format!("must be between 1 and 100, got {}", self.max_threads),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_reference_quality_score) {
            return Err(invalid(
                "min_reference_quality_score",
                format!("must be within [0, 1], got {}", self.min_reference_quality_score),
            ));
        }
        if !(0.0..=1.0).contains(&self.loose_supplement_ratio) {
            return Err(invalid(
                "loose_supplement_ratio",
                format!("must be within [0, 1], got {}", self.loose_supplement_ratio),
            ));
        }
        if self.min_pdf_size == 0 {
            return Err(invalid("min_pdf_size", "must be greater than zero".to_string()));
        }
        if self.max_filename_length < MIN_FILENAME_LENGTH {
            return Err(invalid(
                "max_filename_length",
                format!(
                    "must be at least {}, got {}",
                    MIN_FILENAME_LENGTH, self.max_filename_length
                ),
            ));
        }
        for (name, svc) in self.enabled_services() {
            if !svc.rate_limit.is_finite() || svc.rate_limit < MIN_RATE_LIMIT {
                return Err(invalid(
                    &format!("services.{}.rate_limit", name),
                    format!("must be at least {}, got {}", MIN_RATE_LIMIT, svc.rate_limit),
                ));
            }
            if svc.burst == Some(0) {
                return Err(invalid(
                    &format!("services.{}.burst", name),
                    "must be at least 1".to_string(),
                ));
            }
        }

        let mut warnings = Vec::new();
        let has_s2_key = self
            .semantic_scholar_api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        if !has_s2_key {
            warnings.push("No Semantic Scholar API key configured".to_string());
        }
        let core_enabled = self.service(ServiceName::Core).is_some_and(|s| s.enabled);
        if core_enabled && self.core_api_key.is_none() {
            warnings.push("CORE is enabled without an API key".to_string());
        }
        let enabled = self.enabled_services().len();
        if enabled < 3 {
            warnings.push(format!(
                "Only {} services enabled - may reduce success rate",
                enabled
            ));
        }
        Ok(warnings)
    }
}

fn invalid(name: &str, reason: String) -> ConfigError {
    ConfigError::InvalidThreshold {
        name: name.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> Config {
        Config {
            contact_email: "researcher@example.org".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_priority_order() {
        let config = Config::default();
        let names: Vec<ServiceName> = config.enabled_services().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec![
                ServiceName::Arxiv,
                ServiceName::Unpaywall,
                ServiceName::Openalex,
                ServiceName::SemanticScholar,
                ServiceName::Crossref,
                ServiceName::Pubmed,
            ]
        );
    }

    #[test]
    fn test_priority_override_reorders() {
        let mut config = valid_config();
        config.services.get_mut(&ServiceName::Pubmed).unwrap().priority = 0;
        assert_eq!(config.enabled_services()[0].0, ServiceName::Pubmed);
    }

    #[test]
    fn test_burst_size_derivation() {
        assert_eq!(ServiceConfig::new(true, 10.0, 1).burst_size(), 20);
        assert_eq!(ServiceConfig::new(true, 0.8, 1).burst_size(), 2);
        let explicit = ServiceConfig {
            burst: Some(1),
            ..ServiceConfig::default()
        };
        assert_eq!(explicit.burst_size(), 1);
    }

    #[test]
    fn test_placeholder_email_rejected() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidContactEmail(_))
        ));
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let mut config = valid_config();
        config.min_reference_quality_score = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold { .. })
        ));

        let mut config = valid_config();
        config.max_threads = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.max_filename_length = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_degenerate_rate_limits_rejected() {
        for rate in [0.0, -1.0, 1e-320, f64::NAN, f64::INFINITY] {
            let mut config = valid_config();
            config.services.get_mut(&ServiceName::Arxiv).unwrap().rate_limit = rate;
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidThreshold { .. })),
                "rate {} accepted",
                rate
            );
        }

        let mut config = valid_config();
        config.services.get_mut(&ServiceName::Arxiv).unwrap().rate_limit = MIN_RATE_LIMIT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_warnings() {
        let warnings = valid_config().validate().unwrap();
        assert!(warnings.iter().any(|w| w.contains("Semantic Scholar")));

        let mut config = valid_config();
        config.semantic_scholar_api_key = Some("key".to_string());
        assert!(config.validate().unwrap().is_empty());
    }

    #[test]
    fn test_from_file_partial_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "contact_email": "me@example.org",
                "max_threads": 8,
                "services": {{ "core": {{ "enabled": true, "rate_limit": 0.5, "priority": 0 }} }}
            }}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.max_threads, 8);
        assert_eq!(config.min_pdf_size, 1000);
        assert_eq!(config.services.len(), ServiceName::ALL.len());
        assert_eq!(config.enabled_services()[0].0, ServiceName::Core);
    }

    #[test]
    fn test_from_file_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_service_name_serialization() {
        assert_eq!(
            serde_json::to_string(&ServiceName::SemanticScholar).unwrap(),
            "\"semantic_scholar\""
        );
        assert_eq!(ServiceName::Openalex.to_string(), "openalex");
    }
}
