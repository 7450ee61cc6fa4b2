//! Paginated retrieval and scoring of search strings.
//!
//! Each string lacking a performance record is paginated to the end and
//! scored, or recorded with the malformed-query sentinel. One string's record
//! is one transaction, so a killed run resumes at the first unscored string.
//! The whole batch is retried a bounded number of times on retryable errors.

use crate::error::{Error, Result};
use crate::evaluation::{Evaluator, SearchPerformance};
use crate::metrics::MetricsCollector;
use crate::notify::{checkpoint_percentage, log_failure, Notifier};
use crate::retry::with_retry;
use crate::store::{Experiment, SearchString, Store};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub mod scopus;
pub mod timer;

pub use crate::retry::RetryPolicy;
pub use scopus::ScopusClient;
pub use timer::ElapsedTimer;

#[derive(Clone, Debug, PartialEq)]
pub struct SearchRecord {
    pub title: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchPage {
    /// Running estimate of the total page count.
    pub n_pages: usize,
    pub entries: Vec<SearchRecord>,
}

#[async_trait]
pub trait SearchEndpoint: Send + Sync {
    /// Fetch one 0-based page. A malformed query is `Error::InvalidQuery`.
    async fn fetch_page(&self, query: &str, page_index: usize) -> Result<SearchPage>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetrievalReport {
    pub scored: usize,
    pub invalid: usize,
    /// Strings another run scored while this one was paginating.
    pub raced: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StringOutcome {
    Scored,
    Invalid,
    Raced,
}

/// Evaluator for an experiment: its review's gold set, the experiment's QGS
/// and the citation graph between gold studies.
pub fn load_evaluator(store: &Store, experiment: &Experiment, max_hops: Option<usize>) -> Result<Evaluator> {
    let gs = store.studies_for_slr(experiment.slr_id)?;
    let qgs = store.qgs_for_experiment(experiment.id)?;
    let citations = store.citations_for_slr(experiment.slr_id)?;
    info!("📚 GS {} studies, QGS {} studies, {} citation edges", gs.len(), qgs.len(), citations.len());
    Ok(Evaluator::new(&gs, &qgs, &citations, max_hops))
}

pub struct Retriever {
    store: Arc<Store>,
    endpoint: Arc<dyn SearchEndpoint>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<MetricsCollector>,
    policy: RetryPolicy,
}

impl Retriever {
    pub fn new(
        store: Arc<Store>,
        endpoint: Arc<dyn SearchEndpoint>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<MetricsCollector>,
        policy: RetryPolicy,
    ) -> Self {
        Self { store, endpoint, notifier, metrics, policy }
    }

    /// `run_once` under the retry policy. Every attempt re-reads which
    /// strings still lack a record.
    pub async fn run(&self, experiment_id: i64, evaluator: &Evaluator) -> Result<RetrievalReport> {
        self.retried("search", || self.run_once(experiment_id, evaluator)).await
    }

    /// Score every string of the experiment that lacks a performance record,
    /// in ascending id order.
    pub async fn run_once(&self, experiment_id: i64, evaluator: &Evaluator) -> Result<RetrievalReport> {
        let started = Instant::now();
        let pending = self.store.strings_without_performance(Some(experiment_id))?;
        let total = pending.len();
        info!("🔎 {} search strings without performance", total);
        log_failure(self.notifier.started("Scopus search", total).await);

        let mut report = RetrievalReport::default();
        for (i, search_string) in pending.iter().enumerate() {
            match self.retrieve_one(search_string, evaluator).await? {
                StringOutcome::Scored => report.scored += 1,
                StringOutcome::Invalid => report.invalid += 1,
                StringOutcome::Raced => report.raced += 1,
            }

            if let Some(pct) = checkpoint_percentage(i + 1, total) {
                log_failure(self.notifier.progress(i + 1, total, pct, started.elapsed()).await);
            }
        }

        log_failure(self.notifier.finished(started.elapsed()).await);
        Ok(report)
    }

    async fn retrieve_one(&self, search_string: &SearchString, evaluator: &Evaluator) -> Result<StringOutcome> {
        let id = search_string.id;
        let mut timer = ElapsedTimer::new(move |secs| debug!("⏱ string #{}: {}s on current page", id, secs));
        let paginated = self.paginate(search_string, &mut timer).await;
        timer.stop();

        let (performance, outcome) = match paginated {
            Ok((n_results, titles)) => {
                let evaluation = evaluator.evaluate(n_results, &titles);
                info!(
                    "✅ string #{}: {} results, recall {:.2}, bsb {:.2}, sb {:.2}",
                    id, n_results, evaluation.start_set_recall, evaluation.bsb_recall, evaluation.sb_recall
                );
                let performance = SearchPerformance { search_string_id: id, n_results: n_results as i64, evaluation };
                (performance, StringOutcome::Scored)
            }
            Err(Error::InvalidQuery(reason)) => {
                warn!("⚠️ string #{} rejected as invalid: {}", id, reason);
                debug!("{}", search_string.string);
                (SearchPerformance::invalid(id), StringOutcome::Invalid)
            }
            Err(e) => return Err(e),
        };

        if !self.store.insert_performance(&performance)? {
            warn!("string #{} was scored by another run", id);
            return Ok(StringOutcome::Raced);
        }
        match outcome {
            StringOutcome::Invalid => self.metrics.record_string_invalid(),
            _ => self.metrics.record_string_scored(),
        }
        Ok(outcome)
    }

    /// All pages of one string: result count and the titles present.
    async fn paginate(&self, search_string: &SearchString, timer: &mut ElapsedTimer) -> Result<(usize, Vec<String>)> {
        let mut n_results = 0;
        let mut titles = Vec::new();
        let mut page_index = 0;

        loop {
            timer.restart();
            let t0 = Instant::now();
            let page = self.endpoint.fetch_page(&search_string.string, page_index).await?;
            self.metrics.record_page(t0.elapsed().as_secs_f64() * 1000.0);

            n_results += page.entries.len();
            titles.extend(page.entries.into_iter().filter_map(|e| e.title));
            page_index += 1;
            debug!("string #{}: page {} of {}", search_string.id, page_index, page.n_pages);

            if page_index >= page.n_pages {
                break;
            }
        }
        Ok((n_results, titles))
    }

    /// Fetch the first page of every zero-result string again and rewrite the
    /// record as the sentinel when the endpoint now reports the query as
    /// malformed. Returns how many records were rewritten.
    pub async fn recheck_zero_results(&self) -> Result<usize> {
        self.retried("recheck", || self.recheck_once()).await
    }

    async fn recheck_once(&self) -> Result<usize> {
        let strings = self.store.zero_result_strings()?;
        info!("🔁 Rechecking {} zero-result strings", strings.len());

        let mut fixed = 0;
        for s in &strings {
            match self.endpoint.fetch_page(&s.string, 0).await {
                Ok(_) => {}
                Err(Error::InvalidQuery(_)) => {
                    warn!("String with ID {} is invalid", s.id);
                    self.store.mark_performance_invalid(s.id)?;
                    fixed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(fixed)
    }

    async fn retried<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let result = with_retry(self.policy, label, op).await;
        if let Err(e) = &result {
            log_failure(self.notifier.error(&format!("{} failed: {}", label, e)).await);
        }
        result
    }
}
