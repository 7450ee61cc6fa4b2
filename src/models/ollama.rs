use super::WordEnricher;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

// Characters of context passed to the model
const MAX_CONTEXT_CHARS: usize = 4000;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Asks a local Ollama model for related terms, one per line.
pub struct OllamaWordEnricher {
    client: Client,
    url: String,
    model: String,
    context: String,
}

impl OllamaWordEnricher {
    pub fn new(client: Client, base_url: &str, model: &str, context: &str) -> Self {
        Self {
            client,
            url: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: model.to_string(),
            context: context.chars().take(MAX_CONTEXT_CHARS).collect(),
        }
    }

    fn prompt(&self, word: &str) -> String {
        format!(
            "Context:\n{}\n\nList up to 10 terms that researchers in this field use with the same \
             meaning as \"{}\". Answer with one term per line and nothing else.",
            self.context, word
        )
    }
}

/// Model output lines, stripped of list markers.
pub(crate) fn parse_term_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| {
            l.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == '-' || c == '*' || c == ')')
                .trim()
                .trim_matches('"')
                .to_lowercase()
        })
        .filter(|l| !l.is_empty())
        .collect()
}

#[async_trait]
impl WordEnricher for OllamaWordEnricher {
    async fn enrich(&self, word: &str) -> Result<Vec<String>> {
        let request = GenerateRequest { model: &self.model, prompt: self.prompt(word), stream: false };

        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::model("ollama", format!("HTTP {} for '{}'", status, word)));
        }

        let body: GenerateResponse = response.json().await?;
        let terms = parse_term_lines(&body.response);
        debug!("ollama enriched '{}' with {} terms", word, terms.len());
        Ok(terms)
    }
}
