//! Scopus Search API client.

use super::{SearchEndpoint, SearchPage, SearchRecord};
use crate::config::RetrievalSettings;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

// The standard view refuses `start + count` beyond this
const MAX_RETRIEVABLE_RESULTS: usize = 5000;

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "search-results")]
    results: Results,
}

#[derive(Deserialize)]
struct Results {
    #[serde(rename = "opensearch:totalResults", default)]
    total_results: Option<String>,
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Deserialize)]
struct Entry {
    #[serde(rename = "dc:title")]
    title: Option<String>,
    // Present on the placeholder entry of an empty result set
    error: Option<String>,
}

pub struct ScopusClient {
    client: Client,
    base_url: String,
    api_keys: Vec<String>,
    key_index: AtomicUsize,
    page_size: usize,
}

impl ScopusClient {
    pub fn new(api_keys: Vec<String>, settings: &RetrievalSettings) -> Result<Self> {
        if api_keys.is_empty() {
            return Err(Error::Config("at least one Scopus API key is required".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_keys,
            key_index: AtomicUsize::new(0),
            page_size: settings.page_size,
        })
    }

    fn current_key(&self) -> (usize, &str) {
        let idx = self.key_index.load(Ordering::Relaxed) % self.api_keys.len();
        (idx, &self.api_keys[idx])
    }

    fn rotate_key(&self, from: usize) {
        let next = (from + 1) % self.api_keys.len();
        // Only the first caller to see `from` moves the index.
        let _ = self
            .key_index
            .compare_exchange(from, next, Ordering::Relaxed, Ordering::Relaxed);
    }

    fn n_pages(&self, total_results: usize) -> usize {
        total_results.min(MAX_RETRIEVABLE_RESULTS).div_ceil(self.page_size)
    }
}

#[async_trait]
impl SearchEndpoint for ScopusClient {
    async fn fetch_page(&self, query: &str, page_index: usize) -> Result<SearchPage> {
        let start = (page_index * self.page_size).to_string();
        let count = self.page_size.to_string();

        for _ in 0..self.api_keys.len() {
            let (key_idx, key) = self.current_key();
            let response = self
                .client
                .get(&self.base_url)
                .header("X-ELS-APIKey", key)
                .header("Accept", "application/json")
                .query(&[("query", query), ("start", start.as_str()), ("count", count.as_str())])
                .send()
                .await?;

            let status = response.status();
            match status {
                StatusCode::OK => {
                    let envelope: Envelope = response.json().await?;
                    let total = envelope
                        .results
                        .total_results
                        .as_deref()
                        .and_then(|t| t.parse::<usize>().ok())
                        .unwrap_or(0);
                    let entries: Vec<SearchRecord> = envelope
                        .results
                        .entry
                        .into_iter()
                        .filter(|e| e.error.is_none())
                        .map(|e| SearchRecord { title: e.title })
                        .collect();
                    debug!("Scopus page {} -> {} entries of {}", page_index, entries.len(), total);
                    return Ok(SearchPage { n_pages: self.n_pages(total), entries });
                }
                StatusCode::BAD_REQUEST => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::InvalidQuery(body.chars().take(200).collect()));
                }
                StatusCode::TOO_MANY_REQUESTS | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    warn!("Scopus API key #{} refused ({}), rotating", key_idx, status);
                    self.rotate_key(key_idx);
                }
                s if s.is_server_error() => {
                    return Err(Error::Transient(format!("Scopus returned {}", s)));
                }
                s => {
                    return Err(Error::Transient(format!("unexpected Scopus status {}", s)));
                }
            }
        }

        Err(Error::Transient("every Scopus API key was refused".to_string()))
    }
}
