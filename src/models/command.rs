//! Adapter for models that live outside the process.
//!
//! Each call spawns the configured command, writes one JSON request to its
//! stdin and reads one JSON response from its stdout:
//!
//!   {"task": "extract_topics", "strategy": "bertopic", "params": {...}, "documents": [...]}
//!     -> {"topics": [["word", ...], ...]}
//!   {"task": "enrich", "strategy": "bert", "context": "...", "word": "..."}
//!     -> {"words": ["...", ...]}

use super::{TopicExtractor, WordEnricher};
use crate::config::EnrichmentStrategy;
use crate::error::{Error, Result};
use crate::params::TopicParams;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
enum Request<'a> {
    ExtractTopics {
        strategy: &'a str,
        params: serde_json::Value,
        documents: &'a [String],
    },
    Enrich {
        strategy: &'a str,
        context: &'a str,
        word: &'a str,
    },
}

#[derive(Deserialize)]
struct TopicsResponse {
    topics: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct WordsResponse {
    words: Vec<String>,
}

async fn call<T: DeserializeOwned>(argv: &[String], strategy: &str, request: &Request<'_>, timeout: Duration) -> Result<T> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| Error::Config(format!("empty model command for '{}'", strategy)))?;
    let payload = serde_json::to_vec(request)?;

    let run = async {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }
        let output = child.wait_with_output().await?;
        Ok::<_, std::io::Error>(output)
    };

    let output = tokio::time::timeout(timeout, run)
        .await
        .map_err(|_| Error::model(strategy, format!("timed out after {:?}", timeout)))??;

    if !output.status.success() {
        return Err(Error::model(strategy, format!("command exited with {}", output.status)));
    }

    debug!("{} model returned {} bytes", strategy, output.stdout.len());
    serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::model(strategy, format!("malformed response: {}", e)))
}

pub struct CommandTopicExtractor {
    argv: Vec<String>,
    params: TopicParams,
    timeout: Duration,
}

impl CommandTopicExtractor {
    pub fn new(argv: Vec<String>, params: TopicParams, timeout: Duration) -> Self {
        Self { argv, params, timeout }
    }
}

#[async_trait]
impl TopicExtractor for CommandTopicExtractor {
    async fn extract(&self, documents: &[String]) -> Result<Vec<Vec<String>>> {
        let strategy = self.params.strategy().as_str();
        let params: serde_json::Value = serde_json::from_str(&self.params.payload()?)?;
        let request = Request::ExtractTopics { strategy, params, documents };
        let response: TopicsResponse = call(&self.argv, strategy, &request, self.timeout).await?;
        Ok(response.topics)
    }
}

pub struct CommandWordEnricher {
    argv: Vec<String>,
    strategy: EnrichmentStrategy,
    context: String,
    timeout: Duration,
}

impl CommandWordEnricher {
    pub fn new(argv: Vec<String>, strategy: EnrichmentStrategy, context: String, timeout: Duration) -> Self {
        Self { argv, strategy, context, timeout }
    }
}

#[async_trait]
impl WordEnricher for CommandWordEnricher {
    async fn enrich(&self, word: &str) -> Result<Vec<String>> {
        let strategy = self.strategy.as_str();
        let request = Request::Enrich { strategy, context: &self.context, word };
        let response: WordsResponse = call(&self.argv, strategy, &request, self.timeout).await?;
        Ok(response.words)
    }
}
