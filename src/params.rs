//! Parameter space: expands configured ranges into concrete tuples and
//! resolves each tuple to its durable identity.

use crate::config::{ExperimentConfig, TopicStrategy};
use crate::error::{Error, Result};
use crate::store::Store;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormulationParams {
    pub n_words_per_topic: u32,
    pub n_enrichments_per_word: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LdaParams {
    pub min_document_frequency: f64,
    pub n_topics: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BertopicParams {
    pub kmeans_n_clusters: u32,
    pub umap_n_neighbors: u32,
}

/// Topic-model parameters, one variant per topic strategy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TopicParams {
    Lda(LdaParams),
    Bertopic(BertopicParams),
}

impl TopicParams {
    pub fn strategy(&self) -> TopicStrategy {
        match self {
            TopicParams::Lda(_) => TopicStrategy::Lda,
            TopicParams::Bertopic(_) => TopicStrategy::Bertopic,
        }
    }

    /// Canonical JSON of the strategy-specific fields.
    pub fn payload(&self) -> Result<String> {
        Ok(match self {
            TopicParams::Lda(p) => serde_json::to_string(p)?,
            TopicParams::Bertopic(p) => serde_json::to_string(p)?,
        })
    }

    pub fn from_payload(kind: &str, payload: &str) -> Result<Self> {
        match TopicStrategy::parse(kind) {
            Some(TopicStrategy::Lda) => Ok(TopicParams::Lda(serde_json::from_str(payload)?)),
            Some(TopicStrategy::Bertopic) => Ok(TopicParams::Bertopic(serde_json::from_str(payload)?)),
            None => Err(Error::Invariant(format!("unknown topic params kind '{}'", kind))),
        }
    }

    /// Natural-key text: `kind:payload`.
    pub fn signature(&self) -> Result<String> {
        Ok(format!("{}:{}", self.strategy().as_str(), self.payload()?))
    }

    pub fn expect_lda(&self) -> Result<&LdaParams> {
        match self {
            TopicParams::Lda(p) => Ok(p),
            other => Err(Error::Invariant(format!("expected lda params, got {:?}", other))),
        }
    }

    pub fn expect_bertopic(&self) -> Result<&BertopicParams> {
        match self {
            TopicParams::Bertopic(p) => Ok(p),
            other => Err(Error::Invariant(format!("expected bertopic params, got {:?}", other))),
        }
    }
}

/// One point of the sweep: resolved topic and formulation parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepTuple {
    pub topic_params_id: i64,
    pub topic: TopicParams,
    pub formulation_params_id: i64,
    pub formulation: FormulationParams,
}

/// Cartesian product of a strategy's topic ranges, deduplicated, first occurrence wins.
pub fn topic_params_for(config: &ExperimentConfig, strategy: TopicStrategy) -> Result<Vec<TopicParams>> {
    let mut unique: IndexMap<String, TopicParams> = IndexMap::new();

    match strategy {
        TopicStrategy::Lda => {
            for &min_document_frequency in &config.lda_params.min_document_frequency {
                for &n_topics in &config.lda_params.n_topics {
                    let p = TopicParams::Lda(LdaParams { min_document_frequency, n_topics });
                    unique.entry(p.signature()?).or_insert(p);
                }
            }
        }
        TopicStrategy::Bertopic => {
            for &kmeans_n_clusters in &config.bertopic_params.kmeans_n_clusters {
                for &umap_n_neighbors in &config.bertopic_params.umap_n_neighbors {
                    let p = TopicParams::Bertopic(BertopicParams { kmeans_n_clusters, umap_n_neighbors });
                    unique.entry(p.signature()?).or_insert(p);
                }
            }
        }
    }

    Ok(unique.into_values().collect())
}

pub fn formulation_params_for(config: &ExperimentConfig) -> Vec<FormulationParams> {
    let mut unique: IndexSet<FormulationParams> = IndexSet::new();
    for &n_words_per_topic in &config.formulation_params.n_words_per_topic {
        for &n_enrichments_per_word in &config.formulation_params.n_enrichments_per_word {
            unique.insert(FormulationParams { n_words_per_topic, n_enrichments_per_word });
        }
    }
    unique.into_iter().collect()
}

pub struct ParameterSpace<'a> {
    store: &'a Store,
}

impl<'a> ParameterSpace<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn resolve_topic(&self, params: &TopicParams) -> Result<i64> {
        self.store.resolve_topic_params(params)
    }

    pub fn resolve_formulation(&self, params: &FormulationParams) -> Result<i64> {
        self.store.resolve_formulation_params(params)
    }

    /// Resolved tuples for one topic strategy: topic params outer, formulation inner.
    pub fn expand(&self, config: &ExperimentConfig, strategy: TopicStrategy) -> Result<Vec<SweepTuple>> {
        let topics = topic_params_for(config, strategy)?;
        let formulations = formulation_params_for(config);

        let mut resolved_formulations = Vec::with_capacity(formulations.len());
        for f in formulations {
            resolved_formulations.push((self.resolve_formulation(&f)?, f));
        }

        let mut tuples = Vec::with_capacity(topics.len() * resolved_formulations.len());
        for topic in topics {
            if topic.strategy() != strategy {
                return Err(Error::Invariant(format!(
                    "{:?} params produced for strategy {}",
                    topic,
                    strategy.as_str()
                )));
            }
            let topic_params_id = self.resolve_topic(&topic)?;
            for (formulation_params_id, formulation) in &resolved_formulations {
                tuples.push(SweepTuple {
                    topic_params_id,
                    topic,
                    formulation_params_id: *formulation_params_id,
                    formulation: *formulation,
                });
            }
        }

        debug!("Expanded {} tuples for {}", tuples.len(), strategy.as_str());
        Ok(tuples)
    }
}
