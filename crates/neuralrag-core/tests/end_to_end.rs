//! End-to-end scenarios over a real store
//!
//! Each test gets an isolated temporary project root; the database is
//! deleted when the `TempDir` drops.

use chrono::{Duration, Utc};
use neuralrag_core::{
    Brain, BrainError, NeuronInput, QueryConfig, Synapse, SynapseInput, SynapseKind,
};
use tempfile::TempDir;

fn temp_brain() -> (TempDir, Brain) {
    let dir = TempDir::new().unwrap();
    let brain = Brain::open(dir.path()).unwrap();
    (dir, brain)
}

fn chunk(file: &str, name: &str, start: u32, embedding: Vec<f32>) -> NeuronInput {
    NeuronInput {
        content: format!("fn {name}() {{ /* ... */ }}"),
        summary: format!("{name} in {file}"),
        embedding,
        file_path: file.to_string(),
        start_line: start,
        end_line: start + 4,
        kind: "function".to_string(),
        name: name.to_string(),
        language: "rust".to_string(),
    }
}

/// The three-neuron fixture shared by the first scenarios: two chunks in
/// file A, one in file B, and a structural import edge N1 -> N3.
fn two_file_graph(brain: &Brain) -> (String, String, String) {
    let ids = brain
        .add_neurons(&[
            chunk("a.rs", "n1", 1, vec![1.0, 0.0, 0.0]),
            chunk("a.rs", "n2", 10, vec![0.0, 1.0, 0.0]),
            chunk("b.rs", "n3", 1, vec![0.9, 0.1, 0.0]),
        ])
        .unwrap();
    let (n1, n2, n3) = (ids[0].clone(), ids[1].clone(), ids[2].clone());
    brain
        .add_synapses(&[SynapseInput::new(&n1, &n3, SynapseKind::Imports, 0.8)])
        .unwrap();
    (n1, n2, n3)
}

#[test]
fn scenario_two_file_graph_spreads_across_the_import() {
    let (_dir, brain) = temp_brain();
    let (n1, n2, n3) = two_file_graph(&brain);

    let config = QueryConfig {
        entry_count: 1,
        ..QueryConfig::default()
    };
    let outcome = brain.query("n1 territory", &[1.0, 0.0, 0.0], &config).unwrap();

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[0].neuron.id, n1);
    assert!((outcome.results[0].score - 1.0).abs() < 1e-6);
    assert_eq!(outcome.results[0].depth, 0);

    assert_eq!(outcome.results[1].neuron.id, n3);
    assert!((outcome.results[1].score - 0.56).abs() < 1e-6);
    assert_eq!(outcome.results[1].depth, 1);
    assert_eq!(outcome.results[1].path, vec![n1.clone(), n3.clone()]);

    assert!(!outcome.results.iter().any(|r| r.neuron.id == n2));
}

#[test]
fn scenario_high_cutoff_stops_at_the_entry() {
    let (_dir, brain) = temp_brain();
    let (n1, _n2, _n3) = two_file_graph(&brain);

    let config = QueryConfig {
        entry_count: 1,
        min_activation: 0.6,
        ..QueryConfig::default()
    };
    let outcome = brain.query("n1 only", &[1.0, 0.0, 0.0], &config).unwrap();

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].neuron.id, n1);
}

#[test]
fn scenario_co_activation_synthesis_saturates() {
    let (_dir, brain) = temp_brain();
    let (n1, _n2, n3) = two_file_graph(&brain);

    let config = QueryConfig {
        entry_count: 1,
        ..QueryConfig::default()
    };
    brain.query("first", &[1.0, 0.0, 0.0], &config).unwrap();

    let store = brain.store();
    for (source, target) in [(&n1, &n3), (&n3, &n1)] {
        let edge = store
            .get_synapse_between(source, target, SynapseKind::CoActivation)
            .unwrap()
            .unwrap();
        assert!((edge.weight - 0.3).abs() < 1e-12);
    }

    for i in 1..15 {
        brain
            .query(&format!("repeat {i}"), &[1.0, 0.0, 0.0], &config)
            .unwrap();
    }
    for (source, target) in [(&n1, &n3), (&n3, &n1)] {
        let edge = store
            .get_synapse_between(source, target, SynapseKind::CoActivation)
            .unwrap()
            .unwrap();
        assert_eq!(edge.weight, 1.0);
    }
}

#[test]
fn scenario_reindex_cascade_cleans_up_synapses() {
    let (_dir, brain) = temp_brain();
    let (n1, n2, n3) = two_file_graph(&brain);
    let store = brain.store();

    assert_eq!(store.delete_neurons_by_file("a.rs").unwrap(), 2);
    let replacement = brain
        .add_neurons(&[chunk("a.rs", "n1-v2", 1, vec![0.5, 0.5, 0.0])])
        .unwrap();

    // No synapse references any former A-neuron
    for old in [&n1, &n2] {
        assert!(store.get_neuron(old).unwrap().is_none());
        assert!(store.get_connected(old).unwrap().is_empty());
    }
    assert!(store.get_incoming(&n3).unwrap().is_empty());

    let stats = brain.stats().unwrap();
    assert_eq!(stats.store.neurons, 2);
    assert_eq!(stats.store.synapses, 0);
    assert_eq!(replacement.len(), 1);
}

#[test]
fn scenario_duplicate_synapse_is_idempotent() {
    let (_dir, brain) = temp_brain();
    let (n1, _n2, n3) = two_file_graph(&brain);
    let store = brain.store();

    // The fixture already created (n1, n3, imports) at 0.8
    let again = store
        .create_synapse(&SynapseInput::new(&n1, &n3, SynapseKind::Imports, 0.5))
        .unwrap();
    assert_eq!(again.weight, 0.8);
    assert_eq!(store.count_synapses_by_kind(SynapseKind::Imports).unwrap(), 1);
}

#[test]
fn scenario_decay_then_prune_removes_the_stale_edge() {
    let (_dir, brain) = temp_brain();
    let ids = brain
        .add_neurons(&[
            chunk("a.rs", "n1", 1, vec![]),
            chunk("b.rs", "n3", 1, vec![]),
        ])
        .unwrap();
    let then = Utc::now() - Duration::days(10);
    brain
        .store()
        .put_synapse(&Synapse {
            id: "edge-stale".to_string(),
            source_id: ids[0].clone(),
            target_id: ids[1].clone(),
            weight: 0.05,
            kind: SynapseKind::CoActivation.as_str().to_string(),
            metadata: None,
            fire_count: 3,
            last_fired: Some(then),
            created_at: then,
        })
        .unwrap();

    let learner = brain.learner();
    assert_eq!(learner.decay(7, 0.05, None).unwrap(), 1);
    let edge = brain
        .store()
        .get_synapse_between(&ids[0], &ids[1], SynapseKind::CoActivation)
        .unwrap()
        .unwrap();
    assert_eq!(edge.weight, 0.0);

    assert_eq!(learner.prune(0.0).unwrap(), 1);
    assert!(brain
        .store()
        .get_synapse_between(&ids[0], &ids[1], SynapseKind::CoActivation)
        .unwrap()
        .is_none());
}

#[test]
fn reindexing_identical_content_keeps_the_neuron_count() {
    let (_dir, brain) = temp_brain();
    let chunks = vec![
        chunk("a.rs", "one", 1, vec![]),
        chunk("a.rs", "two", 10, vec![]),
    ];
    brain.reindex_file("a.rs", "rust", "h1", &chunks).unwrap();

    // Unchanged hash: skipped outright
    assert!(brain.reindex_file("a.rs", "rust", "h1", &chunks).unwrap().is_none());

    // Same chunks under a new hash: same count, fresh ids
    let before: Vec<String> = brain
        .store()
        .get_neurons_by_file("a.rs")
        .unwrap()
        .iter()
        .map(|n| n.id.clone())
        .collect();
    let after = brain
        .reindex_file("a.rs", "rust", "h2", &chunks)
        .unwrap()
        .unwrap();
    assert_eq!(after.len(), before.len());
    assert!(after.iter().all(|id| !before.contains(id)));
}

#[test]
fn used_report_closes_the_loop() {
    let (_dir, brain) = temp_brain();
    let (n1, _n2, n3) = two_file_graph(&brain);

    let config = QueryConfig {
        entry_count: 1,
        ..QueryConfig::default()
    };
    let outcome = brain.query("imports", &[1.0, 0.0, 0.0], &config).unwrap();
    let used = vec![n1.clone(), n3.clone()];
    brain.report_used(outcome.query_id, &used).unwrap();

    let entry = brain.store().get_query(outcome.query_id).unwrap().unwrap();
    assert_eq!(entry.used_neuron_ids.unwrap(), used);

    // Synthesized at 0.3, then reinforced once
    let edge = brain
        .store()
        .get_synapse_between(&n1, &n3, SynapseKind::CoActivation)
        .unwrap()
        .unwrap();
    assert!((edge.weight - 0.35).abs() < 1e-12);
}

#[test]
fn independent_stores_do_not_interfere() {
    let (_dir_a, brain_a) = temp_brain();
    let (_dir_b, brain_b) = temp_brain();

    brain_a
        .add_neurons(&[chunk("a.rs", "only-in-a", 1, vec![1.0, 0.0])])
        .unwrap();

    assert_eq!(brain_a.stats().unwrap().store.neurons, 1);
    assert_eq!(brain_b.stats().unwrap().store.neurons, 0);
}

#[test]
fn walker_invariants_hold_on_a_dense_graph() {
    let (_dir, brain) = temp_brain();
    let mut inputs = Vec::new();
    for i in 0..12 {
        // Embeddings fan out around the first axis so similarity ranks them
        inputs.push(chunk(
            "web.rs",
            &format!("node{i:02}"),
            (i as u32) * 10 + 1,
            vec![1.0, i as f32 * 0.1, 0.0],
        ));
    }
    let ids = brain.add_neurons(&inputs).unwrap();

    let mut edges = Vec::new();
    for i in 0..ids.len() {
        for j in 0..ids.len() {
            if i != j && (i + j) % 3 == 0 {
                edges.push(SynapseInput::new(
                    &ids[i],
                    &ids[j],
                    SynapseKind::Calls,
                    0.5 + ((i * j) % 5) as f64 * 0.1,
                ));
            }
        }
    }
    brain.add_synapses(&edges).unwrap();

    let config = QueryConfig {
        max_neurons: 8,
        ..QueryConfig::default()
    };
    let outcome = brain.query("dense", &[1.0, 0.0, 0.0], &config).unwrap();

    assert!(outcome.results.len() <= 8);
    for window in outcome.results.windows(2) {
        assert!(window[0].score >= window[1].score);
    }
    for result in &outcome.results {
        assert!(result.score > 0.0 && result.score <= 1.0);
        assert_eq!(result.path.last().unwrap(), &result.neuron.id);
        assert_eq!(result.path.len() as u32, result.depth + 1);
    }

    // The query itself wired co-activation edges among the accepted set
    let accepted = outcome.results.len() as i64;
    let co_edges = brain
        .store()
        .count_synapses_by_kind(SynapseKind::CoActivation)
        .unwrap();
    assert_eq!(co_edges, accepted * (accepted - 1));

    // A rerun over the mutated graph still satisfies every invariant
    let rerun = brain.query("dense again", &[1.0, 0.0, 0.0], &config).unwrap();
    assert!(rerun.results.len() <= 8);
    for result in &rerun.results {
        assert!(result.score > 0.0 && result.score <= 1.0);
        assert_eq!(result.path.last().unwrap(), &result.neuron.id);
    }
}

#[test]
fn opening_a_newer_store_fails() {
    let dir = TempDir::new().unwrap();
    let db_path = {
        let brain = Brain::open(dir.path()).unwrap();
        brain.store().db_path().to_path_buf()
    };

    let conn = rusqlite_open(&db_path);
    conn.execute(
        "INSERT OR REPLACE INTO _meta (key, value) VALUES ('schema_version', '42')",
        [],
    )
    .unwrap();
    drop(conn);

    assert!(matches!(
        Brain::open(dir.path()),
        Err(BrainError::SchemaTooNew { found: 42, .. })
    ));
}

fn rusqlite_open(path: &std::path::Path) -> rusqlite::Connection {
    rusqlite::Connection::open(path).unwrap()
}
