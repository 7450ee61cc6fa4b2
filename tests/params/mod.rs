#[path = "../common/mod.rs"]
mod common;

use slr_sweep::config::{BertopicRanges, FormulationRanges, TopicStrategy};
use slr_sweep::error::Error;
use slr_sweep::params::*;
use slr_sweep::store::Store;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_expand_yields_every_combination() {
    let store = Store::open_in_memory().unwrap();
    let space = ParameterSpace::new(&store);

    let tuples = space.expand(&common::scenario_config(), TopicStrategy::Bertopic).unwrap();
    assert_eq!(tuples.len(), 4);

    let shapes: Vec<(u32, u32)> = tuples
        .iter()
        .map(|t| (t.topic.expect_bertopic().unwrap().kmeans_n_clusters, t.formulation.n_enrichments_per_word))
        .collect();
    assert_eq!(shapes, vec![(2, 0), (2, 1), (3, 0), (3, 1)]);

    let ids: HashSet<(i64, i64)> = tuples.iter().map(|t| (t.topic_params_id, t.formulation_params_id)).collect();
    assert_eq!(ids.len(), 4);
}

#[test]
fn test_expand_twice_resolves_same_ids() {
    let store = Store::open_in_memory().unwrap();
    let space = ParameterSpace::new(&store);
    let config = common::scenario_config();

    let first = space.expand(&config, TopicStrategy::Bertopic).unwrap();
    let second = space.expand(&config, TopicStrategy::Bertopic).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_duplicate_range_values_collapse() {
    let mut config = common::scenario_config();
    config.bertopic_params = BertopicRanges { kmeans_n_clusters: vec![2, 2, 3], umap_n_neighbors: vec![5, 5] };
    config.formulation_params = FormulationRanges { n_words_per_topic: vec![5, 5], n_enrichments_per_word: vec![1] };

    assert_eq!(topic_params_for(&config, TopicStrategy::Bertopic).unwrap().len(), 2);
    assert_eq!(formulation_params_for(&config).len(), 1);
}

#[test]
fn test_lda_expansion_uses_lda_ranges() {
    let store = Store::open_in_memory().unwrap();
    let config = common::scenario_config();
    let tuples = ParameterSpace::new(&store).expand(&config, TopicStrategy::Lda).unwrap();

    let expected = config.lda_params.min_document_frequency.len()
        * config.lda_params.n_topics.len()
        * formulation_params_for(&config).len();
    assert_eq!(tuples.len(), expected);
    assert!(tuples.iter().all(|t| t.topic.strategy() == TopicStrategy::Lda));
}

#[test]
fn test_resolved_params_read_back() {
    let store = Store::open_in_memory().unwrap();
    let lda = TopicParams::Lda(LdaParams { min_document_frequency: 0.2, n_topics: 3 });
    let formulation = FormulationParams { n_words_per_topic: 7, n_enrichments_per_word: 2 };

    let topic_id = store.resolve_topic_params(&lda).unwrap();
    let formulation_id = store.resolve_formulation_params(&formulation).unwrap();

    assert_eq!(store.topic_params_by_id(topic_id).unwrap(), lda);
    assert_eq!(store.formulation_params_by_id(formulation_id).unwrap(), formulation);
}

#[test]
fn test_same_fields_different_strategy_are_distinct() {
    let store = Store::open_in_memory().unwrap();
    let a = store
        .resolve_topic_params(&TopicParams::Bertopic(BertopicParams { kmeans_n_clusters: 2, umap_n_neighbors: 5 }))
        .unwrap();
    let b = store
        .resolve_topic_params(&TopicParams::Lda(LdaParams { min_document_frequency: 0.1, n_topics: 2 }))
        .unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_signature_format() {
    let p = TopicParams::Bertopic(BertopicParams { kmeans_n_clusters: 2, umap_n_neighbors: 5 });
    assert_eq!(p.signature().unwrap(), r#"bertopic:{"kmeans_n_clusters":2,"umap_n_neighbors":5}"#);
    assert_eq!(TopicParams::from_payload("bertopic", &p.payload().unwrap()).unwrap(), p);
}

#[test]
fn test_variant_mismatch_is_invariant_error() {
    let p = TopicParams::Lda(LdaParams { min_document_frequency: 0.1, n_topics: 2 });
    assert!(matches!(p.expect_bertopic(), Err(Error::Invariant(_))));
    assert!(matches!(TopicParams::from_payload("nmf", "{}"), Err(Error::Invariant(_))));
}

#[test]
fn test_concurrent_resolvers_agree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sweep.db");
    // Create the schema before the racers start.
    drop(Store::open(&path).unwrap());

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let store = Store::open(&path).unwrap();
                barrier.wait();
                (1..=20u32)
                    .map(|n| {
                        store
                            .resolve_topic_params(&TopicParams::Bertopic(BertopicParams {
                                kmeans_n_clusters: n,
                                umap_n_neighbors: 5,
                            }))
                            .unwrap()
                    })
                    .collect::<Vec<i64>>()
            })
        })
        .collect();

    let results: Vec<Vec<i64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results[0], results[1]);

    let unique: HashSet<i64> = results[0].iter().copied().collect();
    assert_eq!(unique.len(), 20);
}
