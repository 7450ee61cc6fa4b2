use super::WordEnricher;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use thesaurus::synonyms;

/// WordNet synonyms, lowercased and deduplicated in lookup order.
#[derive(Default)]
pub struct ThesaurusWordEnricher;

impl ThesaurusWordEnricher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WordEnricher for ThesaurusWordEnricher {
    async fn enrich(&self, word: &str) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let lower = word.to_lowercase();
        Ok(synonyms(&lower)
            .into_iter()
            .map(|s| s.replace('_', " ").to_lowercase())
            .filter(|s| *s != lower && seen.insert(s.clone()))
            .collect())
    }
}
