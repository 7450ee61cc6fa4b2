use super::TopicExtractor;
use crate::error::Result;
use crate::nl::tokenize_terms;
use crate::params::LdaParams;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

// Words emitted per topic before truncation
const WORDS_PER_TOPIC: usize = 10;

/// Term-frequency topics: documents are dealt round-robin into `n_topics`
/// groups and each group is described by its most frequent terms among those
/// reaching `min_document_frequency` over the whole corpus.
pub struct FrequencyTopicExtractor {
    params: LdaParams,
}

impl FrequencyTopicExtractor {
    pub fn new(params: LdaParams) -> Self {
        Self { params }
    }
}

#[async_trait]
impl TopicExtractor for FrequencyTopicExtractor {
    async fn extract(&self, documents: &[String]) -> Result<Vec<Vec<String>>> {
        if documents.is_empty() || self.params.n_topics == 0 {
            return Ok(Vec::new());
        }

        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize_terms(d)).collect();

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for terms in &tokenized {
            let unique: HashSet<&str> = terms.iter().map(|t| t.as_str()).collect();
            for t in unique {
                *doc_freq.entry(t).or_insert(0) += 1;
            }
        }
        let min_docs = (self.params.min_document_frequency * documents.len() as f64).ceil() as usize;
        let eligible: HashSet<&str> = doc_freq
            .into_iter()
            .filter(|(_, n)| *n >= min_docs.max(1))
            .map(|(t, _)| t)
            .collect();

        let n_topics = self.params.n_topics as usize;
        let mut topics = Vec::with_capacity(n_topics);
        for topic_idx in 0..n_topics {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for terms in tokenized.iter().skip(topic_idx).step_by(n_topics) {
                for t in terms {
                    if eligible.contains(t.as_str()) {
                        *counts.entry(t.as_str()).or_insert(0) += 1;
                    }
                }
            }

            let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            let words: Vec<String> = ranked
                .into_iter()
                .take(WORDS_PER_TOPIC)
                .map(|(t, _)| t.to_string())
                .collect();

            if !words.is_empty() {
                topics.push(words);
            }
        }
        Ok(topics)
    }
}
