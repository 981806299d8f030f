//! End-to-end tests for the evaluation engine: fixture-driven metric
//! computation, hierarchical aggregation, determinism, and concurrency.

use assay_core::{Decimal, EvaluationError, EvaluationTree, Judgments, MemberId, SearchHit};
use std::collections::BTreeMap;
use std::thread;

const VERSION: &str = "v1.0";

/// Ten-document ranking fixture, ids `doc1` ... `doc10`.
fn ten_hits() -> Vec<SearchHit> {
    (1..=10)
        .map(|i| SearchHit::with_id(format!("doc{i}")))
        .collect()
}

fn judged(ids: &[&str]) -> Judgments {
    ids.iter().map(|id| (id.to_string(), 3)).collect()
}

fn query_under(tree: &EvaluationTree, group: &str, name: &str) -> MemberId {
    let corpus = tree.find_or_create(tree.root(), "electronics").unwrap();
    let topic = tree.find_or_create(corpus, "cables").unwrap();
    let group = tree.find_or_create(topic, group).unwrap();
    tree.find_or_create(group, name).unwrap()
}

fn stream(tree: &EvaluationTree, query: MemberId, hits: &[SearchHit], version: &str) {
    for (index, hit) in hits.iter().enumerate() {
        tree.collect(query, hit.clone(), index as u64 + 1, version)
            .unwrap();
    }
}

/// Runs one query end-to-end: judgments, totals, stream, notify.
fn evaluate_query(tree: &EvaluationTree, query: MemberId, judgments: Judgments) {
    tree.set_judgments(query, judgments).unwrap();
    let hits = ten_hits();
    tree.set_total_hits(query, VERSION, hits.len() as u64)
        .unwrap();
    stream(tree, query, &hits, VERSION);
    tree.notify_collected_metrics(query).unwrap();
}

fn assert_close(value: Decimal, expected: f64) {
    assert!(
        (value.to_f64() - expected).abs() < 0.001,
        "expected {expected}, got {value}"
    );
}

#[test]
fn perfect_top_k_gives_full_precision_at_every_shipped_k() {
    // The top-10 ids are exactly the judged-relevant set, so P@1, P@3 and
    // P@10 are all 1.0.
    let tree = EvaluationTree::new("nightly");
    let query = query_under(&tree, "hdmi", "4k hdmi cable");
    let all_ids: Vec<String> = (1..=10).map(|i| format!("doc{i}")).collect();
    let ids: Vec<&str> = all_ids.iter().map(String::as_str).collect();
    evaluate_query(&tree, query, judged(&ids));

    for metric in ["P@1", "P@3", "P@10"] {
        assert_eq!(
            tree.value(query, metric, VERSION).unwrap(),
            Some(Decimal::ONE),
            "{metric} should be maximal"
        );
    }
}

#[test]
fn precision_at_three_fixture_grid() {
    // Judgment subsets {1}, {2}, {1,2}, {3}, {2,3} of a fixed ten-hit
    // ranking give 1/3, 1/3, 2/3, 1/3, 2/3.
    let cases: &[(&[&str], f64)] = &[
        (&["doc1"], 1.0 / 3.0),
        (&["doc2"], 1.0 / 3.0),
        (&["doc1", "doc2"], 2.0 / 3.0),
        (&["doc3"], 1.0 / 3.0),
        (&["doc2", "doc3"], 2.0 / 3.0),
    ];
    for (ids, expected) in cases {
        let tree = EvaluationTree::new("nightly");
        let query = query_under(&tree, "hdmi", "4k hdmi cable");
        evaluate_query(&tree, query, judged(ids));
        assert_close(tree.value(query, "P@3", VERSION).unwrap().unwrap(), *expected);
    }
}

#[test]
fn drifted_identifiers_never_match_and_score_zero() {
    // Judgment keys carry a suffix the collected ids never have, as after
    // an index rebuild changed the id scheme: precision is exactly zero.
    let tree = EvaluationTree::new("nightly");
    let query = query_under(&tree, "hdmi", "4k hdmi cable");
    let drifted: Vec<String> = (1..=10).map(|i| format!("doc{i}_SUFFIX")).collect();
    let ids: Vec<&str> = drifted.iter().map(String::as_str).collect();
    evaluate_query(&tree, query, judged(&ids));

    assert_eq!(
        tree.value(query, "P@1", VERSION).unwrap(),
        Some(Decimal::ZERO)
    );
    assert_eq!(
        tree.value(query, "P@10", VERSION).unwrap(),
        Some(Decimal::ZERO)
    );
}

#[test]
fn group_mean_matches_arithmetic_mean_of_queries() {
    // Five queries with P@3 of 1/3, 1/3, 2/3, 1/3, 2/3: the group mean is
    // the plain arithmetic mean 7/15.
    let subsets: &[&[&str]] = &[
        &["doc1"],
        &["doc2"],
        &["doc1", "doc2"],
        &["doc3"],
        &["doc2", "doc3"],
    ];
    let tree = EvaluationTree::new("nightly");
    let mut group = None;
    for (index, ids) in subsets.iter().enumerate() {
        let query = query_under(&tree, "hdmi", &format!("query-{index}"));
        group = tree.parent(query).unwrap();
        evaluate_query(&tree, query, judged(ids));
    }
    let mean = tree.value(group.unwrap(), "P@3", VERSION).unwrap().unwrap();
    assert_close(mean, 7.0 / 15.0);
}

#[test]
fn aggregation_is_independent_of_propagation_order() {
    let subsets: &[&[&str]] = &[&["doc1"], &["doc1", "doc2"], &["doc2", "doc3"]];

    let run = |order: &[usize]| -> BTreeMap<String, BTreeMap<String, Decimal>> {
        let tree = EvaluationTree::new("nightly");
        let queries: Vec<MemberId> = subsets
            .iter()
            .enumerate()
            .map(|(index, ids)| {
                let query = query_under(&tree, "hdmi", &format!("query-{index}"));
                tree.set_judgments(query, judged(ids)).unwrap();
                stream(&tree, query, &ten_hits(), VERSION);
                query
            })
            .collect();
        for &index in order {
            tree.notify_collected_metrics(queries[index]).unwrap();
        }
        tree.metrics_snapshot(tree.root()).unwrap()
    };

    assert_eq!(run(&[0, 1, 2]), run(&[2, 0, 1]));
    assert_eq!(run(&[0, 1, 2]), run(&[1, 2, 0]));
}

#[test]
fn repeated_runs_on_identical_input_are_bit_exact() {
    let build = || {
        let tree = EvaluationTree::new("nightly");
        for (index, ids) in [&["doc1"][..], &["doc1", "doc3"][..], &["doc7"][..]]
            .iter()
            .enumerate()
        {
            let query = query_under(&tree, "hdmi", &format!("query-{index}"));
            evaluate_query(&tree, query, judged(ids));
        }
        let mut snapshots = Vec::new();
        let mut stack = vec![tree.root()];
        while let Some(id) = stack.pop() {
            snapshots.push((tree.name(id).unwrap(), tree.metrics_snapshot(id).unwrap()));
            stack.extend(tree.children(id).unwrap());
        }
        snapshots
    };
    assert_eq!(build(), build());
}

#[test]
fn concurrent_propagation_loses_no_updates() {
    // M queries propagate into the same ancestors from M threads; the
    // aggregate must count M contributions and match the sequential mean.
    const M: usize = 16;
    let tree = EvaluationTree::new("nightly");
    let queries: Vec<MemberId> = (0..M)
        .map(|index| query_under(&tree, "hdmi", &format!("query-{index}")))
        .collect();

    // Alternate P@1 between 1.0 (doc1 first) and 0.0 (no judged id seen).
    thread::scope(|scope| {
        for (index, &query) in queries.iter().enumerate() {
            let tree = &tree;
            scope.spawn(move || {
                let ids: &[&str] = if index % 2 == 0 { &["doc1"] } else { &["doc99"] };
                tree.set_judgments(query, judged(ids)).unwrap();
                stream(tree, query, &ten_hits(), VERSION);
                tree.notify_collected_metrics(query).unwrap();
            });
        }
    });

    let factory = tree
        .value_factory(tree.root(), "P@1", VERSION)
        .unwrap()
        .unwrap();
    assert_eq!(factory.contributions(), Some(M as u64));
    assert_close(factory.value(), 0.5);
}

#[test]
fn concurrent_find_or_create_yields_a_single_instance() {
    const THREADS: usize = 8;
    let tree = EvaluationTree::new("nightly");
    let ids: Vec<MemberId> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let tree = &tree;
                scope.spawn(move || tree.find_or_create(tree.root(), "electronics").unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(tree.children(tree.root()).unwrap().len(), 1);
}

#[test]
fn concurrent_versions_of_one_query_do_not_interfere() {
    let tree = EvaluationTree::new("nightly");
    let query = query_under(&tree, "hdmi", "4k hdmi cable");
    tree.set_judgments(query, judged(&["doc1"])).unwrap();

    thread::scope(|scope| {
        for version in ["v1.0", "v2.0", "v3.0"] {
            let tree = &tree;
            scope.spawn(move || {
                let hits = if version == "v1.0" {
                    ten_hits()
                } else {
                    // Other versions rank the judged document out of sight.
                    (11..=20)
                        .map(|i| SearchHit::with_id(format!("doc{i}")))
                        .collect()
                };
                stream(tree, query, &hits, version);
            });
        }
    });
    tree.notify_collected_metrics(query).unwrap();

    assert_eq!(
        tree.value(query, "P@1", "v1.0").unwrap(),
        Some(Decimal::ONE)
    );
    assert_eq!(
        tree.value(query, "P@1", "v2.0").unwrap(),
        Some(Decimal::ZERO)
    );
    assert_eq!(
        tree.value(tree.root(), "P@1", "v3.0").unwrap(),
        Some(Decimal::ZERO)
    );
}

#[test]
fn static_replay_rebuilds_the_same_aggregates() {
    // Compute a small evaluation from hits, then rebuild a second tree by
    // replaying the leaf values as static metrics: the ancestor aggregates
    // must agree.
    let subsets: &[&[&str]] = &[&["doc1"], &["doc1", "doc2"], &["doc4"]];
    let live = EvaluationTree::new("nightly");
    let mut leaf_values = Vec::new();
    for (index, ids) in subsets.iter().enumerate() {
        let query = query_under(&live, "hdmi", &format!("query-{index}"));
        evaluate_query(&live, query, judged(ids));
        let value = live.value(query, "P@3", VERSION).unwrap().unwrap();
        leaf_values.push((format!("query-{index}"), value));
    }

    let replayed = EvaluationTree::with_metrics("nightly", Vec::new());
    for (name, value) in &leaf_values {
        let query = query_under(&replayed, "hdmi", name);
        replayed
            .collect_static(query, "P@3", VERSION, *value)
            .unwrap();
        replayed.notify_collected_metrics(query).unwrap();
    }

    assert_eq!(
        live.value(live.root(), "P@3", VERSION).unwrap(),
        replayed.value(replayed.root(), "P@3", VERSION).unwrap()
    );
}

#[test]
fn abandoned_queries_leave_no_trace_in_ancestors() {
    let tree = EvaluationTree::new("nightly");
    let finished = query_under(&tree, "hdmi", "finished");
    let abandoned = query_under(&tree, "hdmi", "abandoned");

    evaluate_query(&tree, finished, judged(&["doc1"]));
    // The abandoned query streams a few hits but never notifies.
    tree.set_judgments(abandoned, judged(&["doc1"])).unwrap();
    stream(&tree, abandoned, &ten_hits()[..4], VERSION);

    let group = tree.parent(finished).unwrap().unwrap();
    let factory = tree.value_factory(group, "P@1", VERSION).unwrap().unwrap();
    assert_eq!(factory.contributions(), Some(1));
}

#[test]
fn errors_surface_instead_of_corrupting_state() {
    let tree = EvaluationTree::new("nightly");
    let query = query_under(&tree, "hdmi", "4k hdmi cable");
    tree.set_judgments(query, judged(&["doc1"])).unwrap();
    stream(&tree, query, &ten_hits()[..3], VERSION);

    let err = tree
        .collect(query, SearchHit::with_id("doc4"), 2, VERSION)
        .unwrap_err();
    assert!(matches!(err, EvaluationError::InvalidInput(_)));

    tree.notify_collected_metrics(query).unwrap();
    assert_eq!(
        tree.value(tree.root(), "P@1", VERSION).unwrap(),
        Some(Decimal::ONE)
    );
}
