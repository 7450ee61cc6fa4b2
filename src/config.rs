//! Experiment configuration and tuning constants for the sweep engine

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// Retrieval defaults (Scopus Search API limits)
pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SCOPUS_URL: &str = "https://api.elsevier.com/content/search/scopus";

// Sentinel result count for strings rejected as malformed
pub const INVALID_QUERY_RESULTS: i64 = -1;

// Topic extraction needs a minimum corpus; smaller QGS are doubled
pub const MIN_DOCUMENTS: usize = 10;

// Near-duplicate filter thresholds (Levenshtein on stems)
pub const SOURCE_MAX_DISTANCE: usize = 4; // reject when distance <= this
pub const DUPLICATE_DISTANCE: usize = 4; // reject when distance < this

// Front cache shard count (power of 2)
pub const DASHMAP_SHARD_COUNT: usize = 32;

// Latency window for page fetch P99
pub const LATENCY_WINDOW_SIZE: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TopicStrategy {
    Lda,      // Term-frequency topics (min document frequency x topic count)
    Bertopic, // Embedding clusters (k-means clusters x UMAP neighbours)
}

impl TopicStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicStrategy::Lda => "lda",
            TopicStrategy::Bertopic => "bertopic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "lda" => Some(TopicStrategy::Lda),
            "bertopic" => Some(TopicStrategy::Bertopic),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentStrategy {
    Thesaurus, // WordNet synonyms
    Bert,      // Masked language model (external command)
    Ollama,    // Local generative model
}

impl EnrichmentStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentStrategy::Thesaurus => "thesaurus",
            EnrichmentStrategy::Bert => "bert",
            EnrichmentStrategy::Ollama => "ollama",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "thesaurus" => Some(EnrichmentStrategy::Thesaurus),
            "bert" => Some(EnrichmentStrategy::Bert),
            "ollama" => Some(EnrichmentStrategy::Ollama),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormulationRanges {
    pub n_words_per_topic: Vec<u32>,
    pub n_enrichments_per_word: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LdaRanges {
    pub min_document_frequency: Vec<f64>,
    pub n_topics: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BertopicRanges {
    pub kmeans_n_clusters: Vec<u32>,
    pub umap_n_neighbors: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_scopus_url")]
    pub base_url: String,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}

fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_scopus_url() -> String {
    DEFAULT_SCOPUS_URL.to_string()
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            base_url: DEFAULT_SCOPUS_URL.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSettings {
    /// Citation hops followed when snowballing. Unset means transitive closure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snowball_max_hops: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Attempts per strategy pair when a model call fails transiently.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// External model commands keyed by strategy name (`bert`, `bertopic`, ...).
    #[serde(default)]
    pub commands: BTreeMap<String, Vec<String>>,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "mistral".to_string()
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            ollama_model: default_ollama_model(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            commands: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub scopus_api_keys: Vec<String>,
    pub formulation_params: FormulationRanges,
    pub lda_params: LdaRanges,
    pub bertopic_params: BertopicRanges,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub evaluation: EvaluationSettings,
    #[serde(default)]
    pub models: ModelSettings,
}

impl ExperimentConfig {
    pub fn from_toml(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {:?}: {}", path, e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ExperimentConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn create_default() -> Self {
        Self {
            scopus_api_keys: vec!["key1".to_string(), "key2".to_string(), "key3".to_string()],
            formulation_params: FormulationRanges {
                n_words_per_topic: vec![5, 6, 7, 8, 9, 10],
                n_enrichments_per_word: vec![0, 1, 2, 3],
            },
            lda_params: LdaRanges {
                min_document_frequency: vec![0.1, 0.2, 0.3, 0.4],
                n_topics: vec![1, 2, 3, 4, 5],
            },
            bertopic_params: BertopicRanges {
                kmeans_n_clusters: vec![1, 2, 3, 4, 5],
                umap_n_neighbors: vec![3, 5, 7],
            },
            retrieval: RetrievalSettings::default(),
            evaluation: EvaluationSettings::default(),
            models: ModelSettings::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        fn non_empty<T>(name: &str, values: &[T]) -> Result<()> {
            if values.is_empty() {
                return Err(Error::Config(format!("'{}' must list at least one value", name)));
            }
            Ok(())
        }

        fn positive(name: &str, values: &[u32]) -> Result<()> {
            non_empty(name, values)?;
            if values.iter().any(|v| *v == 0) {
                return Err(Error::Config(format!("'{}' values must be positive", name)));
            }
            Ok(())
        }

        positive("formulation_params.n_words_per_topic", &self.formulation_params.n_words_per_topic)?;
        non_empty(
            "formulation_params.n_enrichments_per_word",
            &self.formulation_params.n_enrichments_per_word,
        )?;
        positive("lda_params.n_topics", &self.lda_params.n_topics)?;
        non_empty("lda_params.min_document_frequency", &self.lda_params.min_document_frequency)?;
        if self
            .lda_params
            .min_document_frequency
            .iter()
            .any(|f| !f.is_finite() || *f <= 0.0 || *f > 1.0)
        {
            return Err(Error::Config(
                "'lda_params.min_document_frequency' values must be in (0, 1]".to_string(),
            ));
        }
        positive("bertopic_params.kmeans_n_clusters", &self.bertopic_params.kmeans_n_clusters)?;
        positive("bertopic_params.umap_n_neighbors", &self.bertopic_params.umap_n_neighbors)?;

        if self.retrieval.page_size == 0 {
            return Err(Error::Config("'retrieval.page_size' must be positive".to_string()));
        }
        if self.retrieval.retry_attempts == 0 {
            return Err(Error::Config("'retrieval.retry_attempts' must be positive".to_string()));
        }
        if self.models.retry_attempts == 0 {
            return Err(Error::Config("'models.retry_attempts' must be positive".to_string()));
        }
        Ok(())
    }
}

/// Publication year boundaries of a review.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

impl YearRange {
    pub fn new(min: Option<i32>, max: Option<i32>) -> Result<Self> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min >= max {
                return Err(Error::Config(format!(
                    "Max year must be greater than min year (got {} >= {})",
                    min, max
                )));
            }
        }
        Ok(())
    }
}
