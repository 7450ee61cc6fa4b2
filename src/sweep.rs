//! Resumable sweep over (enrichment strategy x topic strategy x parameter tuple).
//!
//! Whether a unit is skipped or computed is derived only from the store:
//! a unit whose key is already recorded is never recomputed, and a unit is
//! recorded together with its search string in one transaction. A crash
//! therefore leaves either a complete unit or nothing, and re-running the
//! same command picks up exactly the missing units.

use crate::cache::{CacheKey, CacheNamespace, MemoCache};
use crate::config::{EnrichmentStrategy, ExperimentConfig, TopicStrategy, YearRange};
use crate::error::{Error, Result};
use crate::filter::filter_candidates;
use crate::formulation::ScopusFormulator;
use crate::metrics::MetricsCollector;
use crate::models::{EnrichedWord, ModelProvider, StringFormulator, WordEnricher};
use crate::nl::{build_documents, enrichment_text, StudyText};
use crate::notify::{checkpoint_percentage, log_failure, Notifier};
use crate::params::{ParameterSpace, SweepTuple, TopicParams};
use crate::retry::RetryPolicy;
use crate::store::{Experiment, Store, SweepKey, UnitOutcome};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPhase {
    PendingParams, // Expanding and resolving parameter tuples
    Tuples,        // Skipping or computing units
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitDecision {
    Skip,
    Compute,
}

/// Inputs shared by every unit of one experiment.
pub struct SweepContext {
    pub experiment: Experiment,
    pub years: YearRange,
    pub documents: Vec<String>,
    pub enrichment_text: String,
}

impl SweepContext {
    pub fn load(store: &Store, experiment: Experiment) -> Result<Self> {
        let slr = store.slr_by_id(experiment.slr_id)?;
        let qgs = store.qgs_for_experiment(experiment.id)?;
        if qgs.is_empty() {
            warn!("Experiment '{}' has an empty QGS; topic extraction will see no documents", experiment.name);
        }

        let texts: Vec<StudyText<'_>> = qgs
            .iter()
            .map(|s| StudyText { title: &s.title, abstract_text: &s.abstract_text, keywords: &s.keywords })
            .collect();

        Ok(Self {
            documents: build_documents(&texts),
            enrichment_text: enrichment_text(&texts),
            years: slr.years,
            experiment,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPair {
    pub topic_strategy: TopicStrategy,
    pub enrichment_strategy: EnrichmentStrategy,
    pub message: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub computed: usize,
    pub skipped: usize,
    pub failed_pairs: Vec<FailedPair>,
}

struct PlannedPair {
    enrichment_strategy: EnrichmentStrategy,
    topic_strategy: TopicStrategy,
    tuples: Vec<SweepTuple>,
}

/// Errors that leave the store or the caller in a state a retry cannot fix.
fn is_fatal(err: &Error) -> bool {
    matches!(
        err,
        Error::Invariant(_) | Error::Database(_) | Error::Serialization(_) | Error::Io(_) | Error::Conflict { .. }
    )
}

pub struct SweepController {
    store: Arc<Store>,
    provider: Arc<dyn ModelProvider>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<MetricsCollector>,
    policy: RetryPolicy,
    topics_cache: MemoCache<Vec<Vec<String>>>,
    enrichment_cache: MemoCache<Vec<String>>,
}

impl SweepController {
    pub fn new(
        store: Arc<Store>,
        provider: Arc<dyn ModelProvider>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<MetricsCollector>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            policy,
            topics_cache: MemoCache::new(store.clone(), CacheNamespace::Topics, metrics.clone()),
            enrichment_cache: MemoCache::new(store.clone(), CacheNamespace::Enrichment, metrics.clone()),
            store,
            provider,
            notifier,
            metrics,
        }
    }

    pub async fn run(
        &self,
        ctx: &SweepContext,
        config: &ExperimentConfig,
        topic_strategies: &[TopicStrategy],
        enrichment_strategies: &[EnrichmentStrategy],
    ) -> Result<SweepReport> {
        let started = Instant::now();
        let mut phase = SweepPhase::PendingParams;
        debug!("Sweep phase {:?}", phase);

        let space = ParameterSpace::new(&self.store);
        let mut plan = Vec::new();
        for &enrichment_strategy in enrichment_strategies {
            for &topic_strategy in topic_strategies {
                let tuples = space.expand(config, topic_strategy)?;
                info!(
                    "🔢 {} parameter variations for {} with {}",
                    tuples.len(),
                    topic_strategy.as_str(),
                    enrichment_strategy.as_str()
                );
                plan.push(PlannedPair { enrichment_strategy, topic_strategy, tuples });
            }
        }
        let total: usize = plan.iter().map(|p| p.tuples.len()).sum();

        phase = SweepPhase::Tuples;
        debug!("Sweep phase {:?}", phase);
        log_failure(
            self.notifier
                .started(&format!("Sweep for experiment '{}'", ctx.experiment.name), total)
                .await,
        );

        let formulator = ScopusFormulator::new(ctx.years)?;
        let mut report = SweepReport::default();
        let mut committed = HashSet::new();
        let mut index = 0;

        for pair in &plan {
            let base = index;
            let mut attempt = 1;
            // Each attempt re-derives skip/compute from the store, so units
            // committed before a transient failure are not recomputed.
            let outcome = loop {
                index = base;
                let result = self
                    .run_pair(ctx, pair, &formulator, &mut report, &mut committed, &mut index, total, started)
                    .await;
                match result {
                    Err(e) if self.policy.allows_retry(&e, attempt) => {
                        warn!(
                            "{} with {} attempt {}/{} failed: {}; retrying in {:?}",
                            pair.topic_strategy.as_str(),
                            pair.enrichment_strategy.as_str(),
                            attempt,
                            self.policy.attempts,
                            e,
                            self.policy.delay
                        );
                        attempt += 1;
                        tokio::time::sleep(self.policy.delay).await;
                    }
                    other => break other,
                }
            };

            if let Err(e) = outcome {
                log_failure(self.notifier.error(&e.to_string()).await);
                if is_fatal(&e) {
                    return Err(e);
                }
                error!(
                    "❌ {} with {} stopped: {}",
                    pair.topic_strategy.as_str(),
                    pair.enrichment_strategy.as_str(),
                    e
                );
                report.failed_pairs.push(FailedPair {
                    topic_strategy: pair.topic_strategy,
                    enrichment_strategy: pair.enrichment_strategy,
                    message: e.to_string(),
                });
                // Count the pair's remaining tuples so later checkpoints stay aligned.
                index = base + pair.tuples.len();
            }
        }

        phase = SweepPhase::Done;
        debug!("Sweep phase {:?}", phase);
        log_failure(self.notifier.finished(started.elapsed()).await);
        info!(
            "✅ Sweep finished: {} computed, {} skipped, {} failed pairs",
            report.computed,
            report.skipped,
            report.failed_pairs.len()
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_pair(
        &self,
        ctx: &SweepContext,
        pair: &PlannedPair,
        formulator: &dyn StringFormulator,
        report: &mut SweepReport,
        committed: &mut HashSet<SweepKey>,
        index: &mut usize,
        total: usize,
        started: Instant,
    ) -> Result<()> {
        let n = pair.tuples.len();
        let mut enricher: Option<Box<dyn WordEnricher>> = None;

        for (i, tuple) in pair.tuples.iter().enumerate() {
            *index += 1;
            let key = SweepKey {
                experiment_id: ctx.experiment.id,
                formulation_params_id: tuple.formulation_params_id,
                topic_params_id: tuple.topic_params_id,
                enrichment_strategy: pair.enrichment_strategy,
            };

            let decision = if self.store.sweep_unit_exists(&key)? {
                UnitDecision::Skip
            } else {
                UnitDecision::Compute
            };

            match decision {
                UnitDecision::Skip => {
                    debug!(
                        "{} - {}: skipped parameter variation {} of {}",
                        pair.topic_strategy.as_str(),
                        pair.enrichment_strategy.as_str(),
                        i + 1,
                        n
                    );
                    // Units committed by an earlier attempt of this run were already counted.
                    if !committed.contains(&key) {
                        report.skipped += 1;
                        self.metrics.record_unit_skipped();
                    }
                }
                UnitDecision::Compute => {
                    info!(
                        "{} - {}: using parameter variation {} of {}",
                        pair.topic_strategy.as_str(),
                        pair.enrichment_strategy.as_str(),
                        i + 1,
                        n
                    );
                    let string = self
                        .compute_unit(ctx, tuple, pair.enrichment_strategy, &mut enricher, formulator)
                        .await?;

                    match self.store.commit_sweep_unit(&key, pair.topic_strategy, &string)? {
                        UnitOutcome::Inserted { search_string_id } => {
                            debug!("Unit {:?} -> string #{}", key, search_string_id);
                            committed.insert(key);
                            report.computed += 1;
                            self.metrics.record_unit_computed();
                        }
                        UnitOutcome::AlreadyPresent => {
                            warn!("Unit {:?} was committed by another run", key);
                            report.skipped += 1;
                            self.metrics.record_unit_skipped();
                        }
                    }
                }
            }

            if let Some(pct) = checkpoint_percentage(*index, total) {
                log_failure(self.notifier.progress(*index, total, pct, started.elapsed()).await);
            }
        }
        Ok(())
    }

    /// Build the search string for one tuple.
    async fn compute_unit(
        &self,
        ctx: &SweepContext,
        tuple: &SweepTuple,
        enrichment_strategy: EnrichmentStrategy,
        enricher: &mut Option<Box<dyn WordEnricher>>,
        formulator: &dyn StringFormulator,
    ) -> Result<String> {
        let topics = self.topics_for(ctx, &tuple.topic).await?;
        let n_words = tuple.formulation.n_words_per_topic as usize;
        let n_enrichments = tuple.formulation.n_enrichments_per_word as usize;

        let mut enriched_topics = Vec::with_capacity(topics.len());
        for topic in &topics {
            let mut words = Vec::with_capacity(n_words.min(topic.len()));
            for word in topic.iter().take(n_words) {
                let enrichments = if n_enrichments == 0 {
                    Vec::new()
                } else {
                    let model = self.ensure_enricher(ctx, enrichment_strategy, enricher)?;
                    let mut all = self.enrichments_for(ctx, enrichment_strategy, model, word).await?;
                    all.truncate(n_enrichments);
                    all
                };
                words.push(EnrichedWord { word: word.clone(), enrichments });
            }
            enriched_topics.push(words);
        }

        formulator.formulate(&enriched_topics)
    }

    fn ensure_enricher<'s>(
        &self,
        ctx: &SweepContext,
        strategy: EnrichmentStrategy,
        slot: &'s mut Option<Box<dyn WordEnricher>>,
    ) -> Result<&'s dyn WordEnricher> {
        if slot.is_none() {
            info!("🧠 Loading {} enrichment model", strategy.as_str());
            *slot = Some(self.provider.word_enricher(strategy, &ctx.enrichment_text)?);
        }
        slot.as_deref()
            .ok_or_else(|| Error::Invariant("enricher slot empty after load".to_string()))
    }

    /// Topics for a parameter tuple, untruncated, through the topics cache.
    async fn topics_for(&self, ctx: &SweepContext, params: &TopicParams) -> Result<Vec<Vec<String>>> {
        let key = CacheKey::new(ctx.experiment.id, params.strategy().as_str(), params.signature()?);
        self.topics_cache
            .get_or_compute(&key, || async move {
                let extractor = self.provider.topic_extractor(params)?;
                extractor.extract(&ctx.documents).await
            })
            .await
    }

    /// Filtered enrichments of a word, untruncated, through the enrichment cache.
    async fn enrichments_for(
        &self,
        ctx: &SweepContext,
        strategy: EnrichmentStrategy,
        enricher: &dyn WordEnricher,
        word: &str,
    ) -> Result<Vec<String>> {
        let key = CacheKey::new(ctx.experiment.id, strategy.as_str(), word);
        self.enrichment_cache
            .get_or_compute(&key, || async move {
                let raw = enricher.enrich(word).await?;
                Ok(filter_candidates(word, &raw))
            })
            .await
    }
}
