#[path = "../common/mod.rs"]
mod common;

use common::FakeProvider;
use rand::rngs::StdRng;
use rand::SeedableRng;
use slr_sweep::config::{EnrichmentStrategy, FormulationRanges, TopicStrategy};
use slr_sweep::metrics::MetricsCollector;
use slr_sweep::notify::NoopNotifier;
use slr_sweep::retry::RetryPolicy;
use slr_sweep::store::{Experiment, Store};
use slr_sweep::sweep::*;
use std::sync::Arc;
use std::time::Duration;

fn controller(store: &Arc<Store>, provider: Arc<FakeProvider>) -> SweepController {
    SweepController::new(
        store.clone(),
        provider,
        Arc::new(NoopNotifier),
        Arc::new(MetricsCollector::new()),
        RetryPolicy { attempts: 3, delay: Duration::ZERO },
    )
}

fn context(store: &Store, experiment: &Experiment) -> SweepContext {
    SweepContext::load(store, experiment.clone()).unwrap()
}

#[tokio::test]
async fn test_rerun_skips_every_recorded_unit() {
    let (store, experiment) = common::seeded_store();
    let config = common::scenario_config();
    let ctx = context(&store, &experiment);

    let provider = Arc::new(FakeProvider::new());
    let first = controller(&store, provider.clone())
        .run(&ctx, &config, &[TopicStrategy::Bertopic], &[EnrichmentStrategy::Thesaurus])
        .await
        .unwrap();
    assert_eq!(first.computed, 4);
    assert_eq!(first.skipped, 0);
    assert!(first.failed_pairs.is_empty());
    assert_eq!(store.count_sweep_units(experiment.id).unwrap(), 4);

    let strings_before = store.search_strings_for_experiment(experiment.id).unwrap();
    let extract_before = provider.extract_count();
    let enrich_before = provider.enrich_count();

    let second = controller(&store, provider.clone())
        .run(&ctx, &config, &[TopicStrategy::Bertopic], &[EnrichmentStrategy::Thesaurus])
        .await
        .unwrap();
    assert_eq!(second.computed, 0);
    assert_eq!(second.skipped, 4);
    assert_eq!(store.count_sweep_units(experiment.id).unwrap(), 4);
    assert_eq!(store.search_strings_for_experiment(experiment.id).unwrap(), strings_before);

    // Skipped units never reach the models.
    assert_eq!(provider.extract_count(), extract_before);
    assert_eq!(provider.enrich_count(), enrich_before);
}

#[tokio::test]
async fn test_models_called_once_per_cache_key() {
    let (store, experiment) = common::seeded_store();
    let ctx = context(&store, &experiment);
    let provider = Arc::new(FakeProvider::new());

    controller(&store, provider.clone())
        .run(&ctx, &common::scenario_config(), &[TopicStrategy::Bertopic], &[EnrichmentStrategy::Thesaurus])
        .await
        .unwrap();

    // Two topic parameter tuples; six distinct topic words across them.
    assert_eq!(provider.extract_count(), 2);
    assert_eq!(provider.enrich_count(), 6);
}

#[tokio::test]
async fn test_enrichments_are_filtered_and_truncated() {
    let (store, experiment) = common::seeded_store();
    let ctx = context(&store, &experiment);

    controller(&store, Arc::new(FakeProvider::new()))
        .run(&ctx, &common::scenario_config(), &[TopicStrategy::Bertopic], &[EnrichmentStrategy::Thesaurus])
        .await
        .unwrap();

    let strings: Vec<String> = store
        .search_strings_for_experiment(experiment.id)
        .unwrap()
        .into_iter()
        .map(|s| s.string)
        .collect();

    assert!(strings.iter().any(|s| s.contains(r#"("machine" OR "computer")"#)));
    assert!(strings.iter().all(|s| !s.contains("mchine") && !s.contains("machines")));
    assert!(strings.iter().all(|s| !s.contains("device")));
    assert!(strings.iter().all(|s| s.starts_with("TITLE-ABS-KEY(") && s.ends_with("AND PUBYEAR < 2024")));
}

#[tokio::test]
async fn test_zero_enrichments_never_loads_enricher() {
    let (store, experiment) = common::seeded_store();
    let ctx = context(&store, &experiment);
    let mut config = common::scenario_config();
    config.formulation_params = FormulationRanges { n_words_per_topic: vec![5], n_enrichments_per_word: vec![0] };
    let provider = Arc::new(FakeProvider::new());

    let report = controller(&store, provider.clone())
        .run(&ctx, &config, &[TopicStrategy::Bertopic], &[EnrichmentStrategy::Ollama])
        .await
        .unwrap();

    assert_eq!(report.computed, 2);
    assert_eq!(provider.enrich_count(), 0);
}

#[tokio::test]
async fn test_failed_pair_records_nothing_and_resumes() {
    let (store, experiment) = common::seeded_store();
    let config = common::scenario_config();
    let ctx = context(&store, &experiment);

    let report = controller(&store, Arc::new(FakeProvider::failing()))
        .run(&ctx, &config, &[TopicStrategy::Bertopic], &[EnrichmentStrategy::Thesaurus])
        .await
        .unwrap();
    assert_eq!(report.computed, 0);
    assert_eq!(report.failed_pairs.len(), 1);
    assert_eq!(report.failed_pairs[0].topic_strategy, TopicStrategy::Bertopic);
    assert_eq!(store.count_sweep_units(experiment.id).unwrap(), 0);
    assert!(store.search_strings_for_experiment(experiment.id).unwrap().is_empty());

    let retry = controller(&store, Arc::new(FakeProvider::new()))
        .run(&ctx, &config, &[TopicStrategy::Bertopic], &[EnrichmentStrategy::Thesaurus])
        .await
        .unwrap();
    assert_eq!(retry.computed, 4);
}

#[tokio::test]
async fn test_transient_model_failure_is_retried() {
    let (store, experiment) = common::seeded_store();
    let ctx = context(&store, &experiment);
    let provider = Arc::new(FakeProvider::flaky(&[1]));

    let report = controller(&store, provider.clone())
        .run(&ctx, &common::scenario_config(), &[TopicStrategy::Bertopic], &[EnrichmentStrategy::Thesaurus])
        .await
        .unwrap();

    assert_eq!(report.computed, 4);
    assert_eq!(report.skipped, 0);
    assert!(report.failed_pairs.is_empty());
    assert_eq!(store.count_sweep_units(experiment.id).unwrap(), 4);
    // One failed call, then one call per topic parameter tuple.
    assert_eq!(provider.extract_count(), 3);
}

#[tokio::test]
async fn test_retry_after_partial_pair_keeps_committed_units() {
    let (store, experiment) = common::seeded_store();
    let ctx = context(&store, &experiment);
    // The second topic tuple times out once, after the first tuple's units are committed.
    let provider = Arc::new(FakeProvider::flaky(&[2]));

    let report = controller(&store, provider.clone())
        .run(&ctx, &common::scenario_config(), &[TopicStrategy::Bertopic], &[EnrichmentStrategy::Thesaurus])
        .await
        .unwrap();

    assert_eq!(report.computed, 4);
    assert_eq!(report.skipped, 0);
    assert!(report.failed_pairs.is_empty());
    assert_eq!(provider.extract_count(), 3);
    assert_eq!(store.count_sweep_units(experiment.id).unwrap(), 4);
}

#[tokio::test]
async fn test_persistent_model_failure_gives_up_after_policy() {
    let (store, experiment) = common::seeded_store();
    let ctx = context(&store, &experiment);
    let provider = Arc::new(FakeProvider::failing());

    let report = controller(&store, provider.clone())
        .run(&ctx, &common::scenario_config(), &[TopicStrategy::Bertopic], &[EnrichmentStrategy::Thesaurus])
        .await
        .unwrap();

    assert_eq!(report.failed_pairs.len(), 1);
    assert_eq!(provider.extract_count(), 3);
}

#[tokio::test]
async fn test_failed_pair_does_not_stop_other_pairs() {
    let (store, experiment) = common::seeded_store();
    let mut config = common::scenario_config();
    config.formulation_params = FormulationRanges { n_words_per_topic: vec![5], n_enrichments_per_word: vec![0] };
    let ctx = context(&store, &experiment);

    let report = controller(&store, Arc::new(FakeProvider::failing()))
        .run(
            &ctx,
            &config,
            &[TopicStrategy::Bertopic],
            &[EnrichmentStrategy::Thesaurus, EnrichmentStrategy::Ollama],
        )
        .await
        .unwrap();

    assert_eq!(report.failed_pairs.len(), 2);
    let strategies: Vec<EnrichmentStrategy> = report.failed_pairs.iter().map(|p| p.enrichment_strategy).collect();
    assert_eq!(strategies, vec![EnrichmentStrategy::Thesaurus, EnrichmentStrategy::Ollama]);
}

#[tokio::test]
async fn test_enrichment_strategies_are_separate_units() {
    let (store, experiment) = common::seeded_store();
    let ctx = context(&store, &experiment);

    let report = controller(&store, Arc::new(FakeProvider::new()))
        .run(
            &ctx,
            &common::scenario_config(),
            &[TopicStrategy::Bertopic],
            &[EnrichmentStrategy::Thesaurus, EnrichmentStrategy::Ollama],
        )
        .await
        .unwrap();

    assert_eq!(report.computed, 8);
    assert_eq!(store.count_sweep_units(experiment.id).unwrap(), 8);
}

#[test]
fn test_experiment_qgs_is_sampled_once() {
    let (store, experiment) = common::seeded_store();
    let qgs = store.qgs_for_experiment(experiment.id).unwrap();
    assert_eq!(qgs.len(), 3);

    let mut other_rng = StdRng::seed_from_u64(99);
    let (again, created) = store.get_or_create_experiment("exp-1", experiment.slr_id, &mut other_rng).unwrap();
    assert!(!created);
    assert_eq!(again, experiment);
    assert_eq!(store.qgs_for_experiment(experiment.id).unwrap(), qgs);
}

#[test]
fn test_context_documents_come_from_qgs() {
    let (store, experiment) = common::seeded_store();
    let ctx = context(&store, &experiment);

    assert_eq!(ctx.experiment, experiment);
    assert_eq!(ctx.years.min, Some(2005));
    assert_eq!(ctx.enrichment_text.lines().count(), 3);
    assert!(!ctx.documents.is_empty());
}
