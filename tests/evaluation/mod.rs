use slr_sweep::evaluation::*;
use slr_sweep::store::Study;

fn study(id: i64, title: &str) -> Study {
    Study {
        id,
        slr_id: 1,
        node_id: id,
        title: title.to_string(),
        abstract_text: String::new(),
        keywords: String::new(),
    }
}

/// A -> B -> C, D -> A, F -> E (citing -> cited); QGS = {A, E}.
fn fixture(max_hops: Option<usize>) -> Evaluator {
    let gs: Vec<Study> = ["Alpha", "Beta", "Gamma", "Delta", "Epsilon", "Zeta"]
        .iter()
        .enumerate()
        .map(|(i, t)| study(i as i64 + 1, t))
        .collect();
    let qgs = vec![gs[0].clone(), gs[4].clone()];
    let citations = [(1, 2), (2, 3), (4, 1), (6, 5)];
    Evaluator::new(&gs, &qgs, &citations, max_hops)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_start_set_metrics() {
    let e = fixture(None).evaluate(3, &["Alpha", "epsilon", "Unrelated"]);
    assert_eq!(e.gs_in_results, vec![1, 5]);
    assert_eq!(e.qgs_in_results, vec![1, 5]);
    assert!(close(e.start_set_precision, 2.0 / 3.0));
    assert!(close(e.start_set_recall, 1.0));
    assert!(close(e.start_set_f1, 0.8));
}

#[test]
fn test_transitive_snowballing() {
    let e = fixture(None).evaluate(3, &["Alpha", "Epsilon", "Unrelated"]);
    assert_eq!(e.gs_in_bsb, vec![1, 2, 3, 5]);
    assert_eq!(e.gs_in_sb, vec![1, 2, 3, 4, 5, 6]);
    assert!(close(e.bsb_recall, 4.0 / 6.0));
    assert!(close(e.sb_recall, 1.0));
}

#[test]
fn test_single_hop_snowballing() {
    let e = fixture(Some(1)).evaluate(3, &["Alpha", "Epsilon", "Unrelated"]);
    assert_eq!(e.gs_in_bsb, vec![1, 2, 5]);
    assert_eq!(e.gs_in_sb, vec![1, 2, 4, 5, 6]);
    assert!(close(e.bsb_recall, 0.5));
    assert!(close(e.sb_recall, 5.0 / 6.0));
}

#[test]
fn test_gs_hit_outside_qgs() {
    let e = fixture(None).evaluate(1, &["Gamma"]);
    assert_eq!(e.gs_in_results, vec![3]);
    assert!(e.qgs_in_results.is_empty());
    assert_eq!(e.start_set_precision, 0.0);
    assert_eq!(e.start_set_f1, 0.0);
    // Gamma cites nothing; Beta cites it.
    assert_eq!(e.gs_in_bsb, vec![3]);
    assert_eq!(e.gs_in_sb, vec![1, 2, 3, 4]);
}

#[test]
fn test_titles_match_after_normalization() {
    let e = fixture(None).evaluate(2, &["  ALPHA!! ", "beta."]);
    assert_eq!(e.gs_in_results, vec![1, 2]);
}

#[test]
fn test_no_results() {
    let e = fixture(None).evaluate::<&str>(0, &[]);
    assert_eq!(e, Evaluation::default());
}

#[test]
fn test_membership_kind_names() {
    for kind in MembershipKind::ALL {
        assert_eq!(MembershipKind::parse(kind.as_str()), Some(kind));
    }
    assert_eq!(MembershipKind::parse("gs_in_everything"), None);
}

#[test]
fn test_sentinel_record() {
    let p = SearchPerformance::invalid(42);
    assert!(p.is_invalid());
    assert_eq!(p.n_results, -1);
    assert_eq!(p.evaluation, Evaluation::default());
}
