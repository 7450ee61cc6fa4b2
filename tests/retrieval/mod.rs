#[path = "../common/mod.rs"]
mod common;

use common::{FakeEndpoint, Script};
use parking_lot::Mutex;
use slr_sweep::error::Error;
use slr_sweep::evaluation::Evaluator;
use slr_sweep::metrics::MetricsCollector;
use slr_sweep::notify::NoopNotifier;
use slr_sweep::retrieval::*;
use slr_sweep::store::{Experiment, Store};
use std::sync::Arc;
use std::time::Duration;

fn retriever(store: &Arc<Store>, endpoint: &Arc<FakeEndpoint>, attempts: u32) -> Retriever {
    Retriever::new(
        store.clone(),
        endpoint.clone(),
        Arc::new(NoopNotifier),
        Arc::new(MetricsCollector::new()),
        RetryPolicy { attempts, delay: Duration::ZERO },
    )
}

fn evaluator(store: &Store, experiment: &Experiment) -> Evaluator {
    load_evaluator(store, experiment, None).unwrap()
}

fn study_id(store: &Store, experiment: &Experiment, title: &str) -> i64 {
    store
        .studies_for_slr(experiment.slr_id)
        .unwrap()
        .into_iter()
        .find(|s| s.title == title)
        .map(|s| s.id)
        .unwrap()
}

fn string_id(store: &Store, experiment: &Experiment, string: &str) -> i64 {
    store
        .search_strings_for_experiment(experiment.id)
        .unwrap()
        .into_iter()
        .find(|s| s.string == string)
        .map(|s| s.id)
        .unwrap()
}

#[tokio::test]
async fn test_invalid_query_is_distinct_from_zero_results() {
    let (store, experiment) = common::seeded_store();
    common::insert_strings(&store, &experiment, 2);
    let endpoint = Arc::new(FakeEndpoint::new());
    endpoint.script("Q1", Script::Invalid);
    endpoint.script("Q2", Script::Pages(vec![]));

    let report = retriever(&store, &endpoint, 1)
        .run(experiment.id, &evaluator(&store, &experiment))
        .await
        .unwrap();
    assert_eq!(report.scored, 1);
    assert_eq!(report.invalid, 1);

    let invalid = store.performance_for_string(string_id(&store, &experiment, "Q1")).unwrap().unwrap();
    assert_eq!(invalid.n_results, -1);
    assert!(invalid.is_invalid());
    assert!(invalid.evaluation.gs_in_results.is_empty());

    let empty = store.performance_for_string(string_id(&store, &experiment, "Q2")).unwrap().unwrap();
    assert_eq!(empty.n_results, 0);
    assert!(!empty.is_invalid());
    assert_eq!(empty.evaluation.start_set_recall, 0.0);
}

#[tokio::test]
async fn test_pages_are_scored_against_gold_set() {
    let (store, experiment) = common::seeded_store();
    common::insert_strings(&store, &experiment, 1);
    let endpoint = Arc::new(FakeEndpoint::new());
    endpoint.script(
        "Q1",
        Script::Pages(vec![
            vec![Some("Detecting code smells with machine learning"), Some("Unrelated work"), None],
            vec![Some("STATIC ANALYSIS of smelly code!")],
        ]),
    );

    retriever(&store, &endpoint, 1)
        .run(experiment.id, &evaluator(&store, &experiment))
        .await
        .unwrap();

    assert_eq!(endpoint.calls.lock().clone(), vec![("Q1".to_string(), 0), ("Q1".to_string(), 1)]);

    let first = study_id(&store, &experiment, "Detecting code smells with machine learning");
    let seventh = study_id(&store, &experiment, "Static analysis of smelly code");
    let performance = store.performance_for_string(string_id(&store, &experiment, "Q1")).unwrap().unwrap();
    let e = &performance.evaluation;

    assert_eq!(performance.n_results, 4);
    assert_eq!(e.gs_in_results, vec![first, seventh]);

    let qgs: Vec<i64> = store.qgs_for_experiment(experiment.id).unwrap().iter().map(|s| s.id).collect();
    let expected_qgs: Vec<i64> = e.gs_in_results.iter().copied().filter(|id| qgs.contains(id)).collect();
    assert_eq!(e.qgs_in_results, expected_qgs);
    assert_eq!(e.start_set_precision, expected_qgs.len() as f64 / 4.0);
    assert_eq!(e.start_set_recall, expected_qgs.len() as f64 / qgs.len() as f64);

    // Every study cites the next one, so backward snowballing from study 1 reaches all nine.
    assert_eq!(e.gs_in_bsb.len(), 9);
    assert_eq!(e.bsb_recall, 1.0);
    assert_eq!(e.sb_recall, 1.0);
}

#[tokio::test]
async fn test_killed_run_resumes_at_first_unscored_string() {
    let (store, experiment) = common::seeded_store();
    common::insert_strings(&store, &experiment, 10);
    let endpoint = Arc::new(FakeEndpoint::new());
    endpoint.fail("Q7", usize::MAX);

    let err = retriever(&store, &endpoint, 1)
        .run(experiment.id, &evaluator(&store, &experiment))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transient(_)));

    let pending: Vec<String> = store
        .strings_without_performance(Some(experiment.id))
        .unwrap()
        .into_iter()
        .map(|s| s.string)
        .collect();
    assert_eq!(pending, vec!["Q7", "Q8", "Q9", "Q10"]);

    endpoint.clear_failures();
    endpoint.calls.lock().clear();

    let report = retriever(&store, &endpoint, 1)
        .run(experiment.id, &evaluator(&store, &experiment))
        .await
        .unwrap();
    assert_eq!(report.scored, 4);
    assert_eq!(endpoint.queries(), vec!["Q7", "Q8", "Q9", "Q10"]);
    assert!(store.strings_without_performance(Some(experiment.id)).unwrap().is_empty());
    assert_eq!(store.experiment_status(experiment.id).unwrap().scored, 10);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let (store, experiment) = common::seeded_store();
    common::insert_strings(&store, &experiment, 5);
    let endpoint = Arc::new(FakeEndpoint::new());
    endpoint.fail("Q3", 1);

    let report = retriever(&store, &endpoint, 3)
        .run(experiment.id, &evaluator(&store, &experiment))
        .await
        .unwrap();

    // The retry only revisits strings the failed attempt left unscored.
    assert_eq!(report.scored, 3);
    assert_eq!(endpoint.queries(), vec!["Q1", "Q2", "Q3", "Q3", "Q4", "Q5"]);
    assert!(store.strings_without_performance(Some(experiment.id)).unwrap().is_empty());
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let (store, experiment) = common::seeded_store();
    common::insert_strings(&store, &experiment, 1);
    let endpoint = Arc::new(FakeEndpoint::new());
    endpoint.fail("Q1", usize::MAX);

    let result = retriever(&store, &endpoint, 3)
        .run(experiment.id, &evaluator(&store, &experiment))
        .await;

    assert!(result.is_err());
    assert_eq!(endpoint.queries().len(), 3);
    assert_eq!(store.strings_without_performance(Some(experiment.id)).unwrap().len(), 1);
}

#[tokio::test]
async fn test_recheck_rewrites_zero_result_strings() {
    let (store, experiment) = common::seeded_store();
    common::insert_strings(&store, &experiment, 2);
    let endpoint = Arc::new(FakeEndpoint::new());
    let retriever = retriever(&store, &endpoint, 1);

    retriever.run(experiment.id, &evaluator(&store, &experiment)).await.unwrap();
    assert_eq!(store.zero_result_strings().unwrap().len(), 2);

    endpoint.script("Q1", Script::Invalid);
    assert_eq!(retriever.recheck_zero_results().await.unwrap(), 1);

    let q1 = store.performance_for_string(string_id(&store, &experiment, "Q1")).unwrap().unwrap();
    assert!(q1.is_invalid());
    let remaining: Vec<String> = store.zero_result_strings().unwrap().into_iter().map(|s| s.string).collect();
    assert_eq!(remaining, vec!["Q2"]);
}

#[tokio::test(start_paused = true)]
async fn test_timer_ticks_from_zero_and_restarts() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let mut timer = ElapsedTimer::new(move |secs| sink.lock().push(secs));
    assert!(!timer.is_running());

    timer.restart();
    assert!(timer.is_running());
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(*seen.lock(), vec![0, 1, 2]);

    timer.restart();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(*seen.lock(), vec![0, 1, 2, 0, 1]);

    timer.stop();
    assert!(!timer.is_running());
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(*seen.lock(), vec![0, 1, 2, 0, 1]);
}
