//! Pluggable model capabilities consumed by the sweep.
//!
//! The sweep only depends on the three traits below. `BuiltinModels` selects
//! an implementation per strategy:
//!
//!   frequency  - term-frequency topics for `lda`
//!   thesaurus  - WordNet synonyms for `thesaurus`
//!   ollama     - local generative model for `ollama`
//!   command    - any strategy backed by an external process (`[models.commands]`)

use crate::config::{EnrichmentStrategy, ModelSettings};
use crate::error::{Error, Result};
use crate::params::TopicParams;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod command;
pub mod frequency;
pub mod ollama;
pub mod thesaurus;

pub use command::{CommandTopicExtractor, CommandWordEnricher};
pub use frequency::FrequencyTopicExtractor;
pub use ollama::OllamaWordEnricher;
pub use thesaurus::ThesaurusWordEnricher;

#[async_trait]
pub trait TopicExtractor: Send + Sync {
    async fn extract(&self, documents: &[String]) -> Result<Vec<Vec<String>>>;
}

#[async_trait]
pub trait WordEnricher: Send + Sync {
    async fn enrich(&self, word: &str) -> Result<Vec<String>>;
}

pub trait StringFormulator: Send + Sync {
    fn formulate(&self, topics: &[EnrichedTopic]) -> Result<String>;
}

/// A topic word with the enrichments kept for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichedWord {
    pub word: String,
    pub enrichments: Vec<String>,
}

pub type EnrichedTopic = Vec<EnrichedWord>;

/// Builds model instances for a strategy and its parameters.
pub trait ModelProvider: Send + Sync {
    fn topic_extractor(&self, params: &TopicParams) -> Result<Box<dyn TopicExtractor>>;

    /// `context` is the enrichment passage built from the experiment's QGS.
    fn word_enricher(&self, strategy: EnrichmentStrategy, context: &str) -> Result<Box<dyn WordEnricher>>;
}

/// Default provider: built-in models where they exist, external commands
/// for everything configured under `[models.commands]`.
pub struct BuiltinModels {
    settings: ModelSettings,
    client: reqwest::Client,
}

impl BuiltinModels {
    pub fn new(settings: ModelSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self { settings, client })
    }

    fn command(&self, strategy: &str) -> Option<Vec<String>> {
        self.settings
            .commands
            .get(strategy)
            .filter(|c| !c.is_empty())
            .cloned()
    }
}

impl ModelProvider for BuiltinModels {
    fn topic_extractor(&self, params: &TopicParams) -> Result<Box<dyn TopicExtractor>> {
        let strategy = params.strategy().as_str();
        if let Some(cmd) = self.command(strategy) {
            return Ok(Box::new(CommandTopicExtractor::new(
                cmd,
                *params,
                Duration::from_secs(self.settings.request_timeout_secs),
            )));
        }

        match params {
            TopicParams::Lda(lda) => Ok(Box::new(FrequencyTopicExtractor::new(*lda))),
            TopicParams::Bertopic(_) => Err(Error::Config(format!(
                "no model command configured for '{}' (set [models.commands].{})",
                strategy, strategy
            ))),
        }
    }

    fn word_enricher(&self, strategy: EnrichmentStrategy, context: &str) -> Result<Box<dyn WordEnricher>> {
        if let Some(cmd) = self.command(strategy.as_str()) {
            return Ok(Box::new(CommandWordEnricher::new(
                cmd,
                strategy,
                context.to_string(),
                Duration::from_secs(self.settings.request_timeout_secs),
            )));
        }

        match strategy {
            EnrichmentStrategy::Thesaurus => Ok(Box::new(ThesaurusWordEnricher::new())),
            EnrichmentStrategy::Ollama => Ok(Box::new(OllamaWordEnricher::new(
                self.client.clone(),
                &self.settings.ollama_url,
                &self.settings.ollama_model,
                context,
            ))),
            EnrichmentStrategy::Bert => Err(Error::Config(
                "no model command configured for 'bert' (set [models.commands].bert)".to_string(),
            )),
        }
    }
}
