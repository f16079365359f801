use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

const ENV_CONFIG_PATH: &str = "ARCADIA_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const ENV_ORACLE_TIMEOUT: &str = "ORACLE_TIMEOUT_SECS";
const ENV_LINK_THRESHOLD: &str = "TRACE_LINK_THRESHOLD";
const ENV_RETRIEVER_URL: &str = "RETRIEVER_URL";

/// Configuration errors are fatal at startup
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            message: format!("{} is outside [0, 1]", value),
        })
    }
}

fn check_positive(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            message: "must be greater than zero".to_string(),
        })
    }
}

/// Prompt construction and oracle call policy for phase extraction
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Sampling temperature for extraction calls
    pub temperature: f64,
    pub max_tokens: Option<u64>,
    /// Number of leading context chunks placed in a prompt
    pub max_context_chunks: usize,
    /// Characters kept from each context chunk
    pub chunk_char_limit: usize,
    /// Characters kept from the proposal text
    pub proposal_char_limit: usize,
    /// Entities summarized per prior phase
    pub summary_limit: usize,
    /// Earlier-category names listed as known entities
    pub max_known_names: usize,
    /// Oracle calls per category, including the first
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    /// Accepted/parsed item ratio below which a category is retried
    pub min_acceptance_ratio: f64,
    /// Item count at which the volume part of category confidence saturates
    pub expected_entities_per_category: usize,
    /// Extract interfaces and scenarios of a phase concurrently
    pub parallel_late_categories: bool,
    /// Chunks requested from the retriever per phase
    pub retrieval_top_k: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: Some(2048),
            max_context_chunks: 5,
            chunk_char_limit: 400,
            proposal_char_limit: 1500,
            summary_limit: 5,
            max_known_names: 10,
            max_attempts: 2,
            retry_base_delay_ms: 500,
            min_acceptance_ratio: 0.5,
            expected_entities_per_category: 5,
            parallel_late_categories: false,
            retrieval_top_k: 5,
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid {
                field: "extraction.temperature",
                message: format!("{} is outside [0, 2]", self.temperature),
            });
        }
        check_positive("extraction.max_context_chunks", self.max_context_chunks)?;
        check_positive("extraction.chunk_char_limit", self.chunk_char_limit)?;
        check_positive("extraction.proposal_char_limit", self.proposal_char_limit)?;
        check_positive("extraction.max_attempts", self.max_attempts as usize)?;
        check_positive(
            "extraction.expected_entities_per_category",
            self.expected_entities_per_category,
        )?;
        check_unit("extraction.min_acceptance_ratio", self.min_acceptance_ratio)?;
        Ok(())
    }
}

/// Minimum similarity for a link between each pair of phases
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkThresholds {
    pub operational_to_system: f64,
    pub system_to_logical: f64,
    pub logical_to_physical: f64,
    pub operational_to_physical: f64,
    /// Minimum similarity for resolving a declared name reference
    pub declared_reference: f64,
}

impl Default for LinkThresholds {
    fn default() -> Self {
        Self {
            operational_to_system: 0.5,
            system_to_logical: 0.5,
            logical_to_physical: 0.5,
            operational_to_physical: 0.6,
            declared_reference: 0.6,
        }
    }
}

/// Weight of each phase-pair coverage in the completeness score
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoverageWeights {
    pub operational_to_system: f64,
    pub system_to_logical: f64,
    pub logical_to_physical: f64,
    pub operational_to_physical: f64,
}

impl Default for CoverageWeights {
    fn default() -> Self {
        Self {
            operational_to_system: 0.3,
            system_to_logical: 0.3,
            logical_to_physical: 0.3,
            operational_to_physical: 0.1,
        }
    }
}

/// Similarity thresholds and weights for cross-phase linking
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TraceabilityConfig {
    pub thresholds: LinkThresholds,
    pub name_weight: f64,
    pub description_weight: f64,
    pub coverage_weights: CoverageWeights,
}

impl Default for TraceabilityConfig {
    fn default() -> Self {
        Self {
            thresholds: LinkThresholds::default(),
            name_weight: 0.6,
            description_weight: 0.4,
            coverage_weights: CoverageWeights::default(),
        }
    }
}

impl TraceabilityConfig {
    /// Use one threshold for every phase pair and for declared references
    pub fn with_link_threshold(mut self, threshold: f64) -> Self {
        self.thresholds = LinkThresholds {
            operational_to_system: threshold,
            system_to_logical: threshold,
            logical_to_physical: threshold,
            operational_to_physical: threshold,
            declared_reference: threshold,
        };
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        check_unit("traceability.thresholds.operational_to_system", t.operational_to_system)?;
        check_unit("traceability.thresholds.system_to_logical", t.system_to_logical)?;
        check_unit("traceability.thresholds.logical_to_physical", t.logical_to_physical)?;
        check_unit(
            "traceability.thresholds.operational_to_physical",
            t.operational_to_physical,
        )?;
        check_unit("traceability.thresholds.declared_reference", t.declared_reference)?;
        check_unit("traceability.name_weight", self.name_weight)?;
        check_unit("traceability.description_weight", self.description_weight)?;
        if self.name_weight + self.description_weight <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "traceability.name_weight",
                message: "name and description weights must not both be zero".to_string(),
            });
        }

        let w = &self.coverage_weights;
        for (field, value) in [
            ("traceability.coverage_weights.operational_to_system", w.operational_to_system),
            ("traceability.coverage_weights.system_to_logical", w.system_to_logical),
            ("traceability.coverage_weights.logical_to_physical", w.logical_to_physical),
            (
                "traceability.coverage_weights.operational_to_physical",
                w.operational_to_physical,
            ),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!("{} must be a non-negative number", value),
                });
            }
        }
        Ok(())
    }
}

/// Everything the analysis pipeline needs besides its oracles
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub extraction: ExtractionConfig,
    pub traceability: TraceabilityConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.extraction.validate()?;
        self.traceability.validate()
    }
}

/// HTTP server limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Analysis runs allowed in flight at once
    pub max_concurrent_runs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 4,
        }
    }
}

/// Generative oracle settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub request_timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
        }
    }
}

impl OracleConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Chunk retrieval endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct RetrieverConfig {
    pub url: Url,
    #[serde(default = "RetrieverConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RetrieverConfig {
    fn default_timeout_secs() -> u64 {
        30
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub retriever: Option<RetrieverConfig>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
    pub oracle: OracleConfig,
    pub retriever: Option<RetrieverConfig>,
    pub port: u16,
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            server: ServerConfig::default(),
            oracle: OracleConfig::default(),
            retriever: None,
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let file = Self::load_config_file(&config_path)?.unwrap_or_default();

        let mut config = Self {
            pipeline: file.pipeline,
            server: file.server,
            oracle: file.oracle,
            retriever: file.retriever,
            port,
            host,
        };

        if let Ok(raw) = std::env::var(ENV_LINK_THRESHOLD) {
            let threshold: f64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                field: ENV_LINK_THRESHOLD,
                message: format!("'{}' is not a number", raw),
            })?;
            config.pipeline.traceability = config
                .pipeline
                .traceability
                .clone()
                .with_link_threshold(threshold);
        }

        if let Ok(raw) = std::env::var(ENV_ORACLE_TIMEOUT) {
            config.oracle.request_timeout_secs =
                raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    field: ENV_ORACLE_TIMEOUT,
                    message: format!("'{}' is not a number of seconds", raw),
                })?;
        }

        if let Ok(raw) = std::env::var(ENV_RETRIEVER_URL) {
            let url = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
                field: ENV_RETRIEVER_URL,
                message: e.to_string(),
            })?;
            let timeout_secs = config
                .retriever
                .as_ref()
                .map(|r| r.timeout_secs)
                .unwrap_or_else(RetrieverConfig::default_timeout_secs);
            config.retriever = Some(RetrieverConfig { url, timeout_secs });
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        check_positive("server.max_concurrent_runs", self.server.max_concurrent_runs)?;
        if self.oracle.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "oracle.request_timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Load configuration from YAML file
    ///
    /// A missing or empty file means defaults; anything unreadable is an error.
    fn load_config_file(path: &str) -> Result<Option<ConfigFile>, ConfigError> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(None);
        }

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Self::parse_config(&contents, &path.display().to_string()).map(Some)
    }

    fn parse_config(contents: &str, origin: &str) -> Result<ConfigFile, ConfigError> {
        let contents = contents.trim();
        if contents.is_empty() {
            tracing::debug!(path = %origin, "Config file is empty, using defaults");
            return Ok(ConfigFile::default());
        }

        let config = serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        tracing::info!(path = %origin, "Loaded configuration from file");
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let file = Config::parse_config("   \n", "inline").unwrap();
        assert_eq!(file.pipeline.extraction.max_context_chunks, 5);
        assert!(file.retriever.is_none());
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let yaml = r#"
pipeline:
  extraction:
    max_attempts: 4
    parallel_late_categories: true
  traceability:
    thresholds:
      operational_to_physical: 0.75
retriever:
  url: http://localhost:9000/search
"#;
        let file = Config::parse_config(yaml, "inline").unwrap();
        assert_eq!(file.pipeline.extraction.max_attempts, 4);
        assert!(file.pipeline.extraction.parallel_late_categories);
        assert_eq!(file.pipeline.extraction.chunk_char_limit, 400);
        assert_eq!(
            file.pipeline.traceability.thresholds.operational_to_physical,
            0.75
        );
        assert_eq!(file.pipeline.traceability.thresholds.system_to_logical, 0.5);
        let retriever = file.retriever.unwrap();
        assert_eq!(retriever.url.path(), "/search");
        assert_eq!(retriever.timeout_secs, 30);
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let result = Config::parse_config("pipeline: [unclosed", "inline");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let config = PipelineConfig {
            traceability: TraceabilityConfig::default().with_link_threshold(1.5),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = PipelineConfig::default();
        config.extraction.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
