// tests/scheduling.rs

use std::collections::{HashMap, HashSet};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use flowdag::config::ClusterConfig;
use flowdag::data::DataContext;
use flowdag::engine::{ExecuteOptions, GraphManager, RunSummary};
use flowdag::exec::Job;
use flowdag::types::{Outcome, VertexCode};
use flowdag_test_utils::builders::{ClusterConfigBuilder, GraphConfigBuilder, VertexBuilder};
use flowdag_test_utils::fake_executor::{QueuedExecutor, SingleSlotExecutor};
use flowdag_test_utils::processors::{test_registry, ExecLog};
use flowdag_test_utils::{init_tracing, run_and_wait};
use proptest::prelude::*;

fn manager(cfg: &ClusterConfig) -> (GraphManager, ExecLog) {
    init_tracing();
    let log = ExecLog::new();
    let manager = GraphManager::new(test_registry(&log));
    manager.load_cluster(cfg).expect("cluster builds");
    (manager, log)
}

/// Start a run on `executor`; the returned slot is filled by `done`.
fn start(
    manager: &GraphManager,
    executor: &QueuedExecutor,
    graph: &str,
) -> Arc<Mutex<Option<RunSummary>>> {
    let slot = Arc::new(Mutex::new(None));
    let out = Arc::clone(&slot);
    manager
        .execute(
            ExecuteOptions::new(Arc::new(executor.clone())),
            Arc::new(DataContext::new()),
            "test",
            graph,
            move |report| {
                *out.lock().unwrap() = Some(report.summary());
            },
        )
        .unwrap();
    slot
}

/// A -> {B, C} -> D
fn diamond() -> ClusterConfig {
    ClusterConfigBuilder::new("test")
        .graph(
            GraphConfigBuilder::new("main")
                .vertex(VertexBuilder::new("A", "probe").build())
                .vertex(VertexBuilder::new("B", "probe").dep("A").build())
                .vertex(VertexBuilder::new("C", "probe").dep("A").build())
                .vertex(VertexBuilder::new("D", "probe").dep("B").dep("C").build())
                .build(),
        )
        .build()
}

#[test]
fn roots_are_submitted_before_anything_runs() {
    let (manager, log) = manager(&diamond());
    let executor = QueuedExecutor::new();

    let slot = start(&manager, &executor, "main");

    assert_eq!(executor.pending(), 1);
    assert!(log.records().is_empty());
    assert!(slot.lock().unwrap().is_none());
}

#[test]
fn fan_out_is_submitted_and_join_runs_once() {
    let (manager, log) = manager(&diamond());
    let executor = QueuedExecutor::new();
    let slot = start(&manager, &executor, "main");

    assert!(executor.run_next());
    assert_eq!(log.vertices(), vec!["A"]);
    assert_eq!(executor.pending(), 2);

    // C first, then B; whichever finishes last runs D inline.
    assert_eq!(executor.run_all_reversed(), 2);
    assert_eq!(log.vertices(), vec!["A", "C", "B", "D"]);
    assert_eq!(executor.submitted(), 3);

    let summary = slot.lock().unwrap().take().expect("run finished");
    assert!(summary.is_success());
    assert_eq!(summary.outcome_of("D"), Some(Outcome::Ok));
}

#[test]
fn single_successor_runs_on_the_same_job() {
    let cfg = ClusterConfigBuilder::new("test")
        .graph(
            GraphConfigBuilder::new("main")
                .vertex(VertexBuilder::new("A", "probe").build())
                .vertex(VertexBuilder::new("B", "probe").dep("A").build())
                .vertex(VertexBuilder::new("C", "probe").dep("B").build())
                .vertex(VertexBuilder::new("D", "probe").dep("C").build())
                .build(),
        )
        .build();
    let (manager, log) = manager(&cfg);
    let executor = QueuedExecutor::new();
    let slot = start(&manager, &executor, "main");

    assert!(executor.run_next());

    assert_eq!(log.vertices(), vec!["A", "B", "C", "D"]);
    assert_eq!(executor.submitted(), 1);
    assert!(slot.lock().unwrap().is_some());
}

#[test]
fn several_roots_each_get_a_job() {
    let cfg = ClusterConfigBuilder::new("test")
        .graph(
            GraphConfigBuilder::new("main")
                .vertex(VertexBuilder::new("A", "probe").build())
                .vertex(VertexBuilder::new("B", "probe").build())
                .vertex(VertexBuilder::new("C", "probe").build())
                .vertex(VertexBuilder::control("join").dep("A").dep("B").dep("C").build())
                .build(),
        )
        .build();
    let (manager, log) = manager(&cfg);
    let executor = QueuedExecutor::new();
    let slot = start(&manager, &executor, "main");

    assert_eq!(executor.pending(), 3);
    executor.run_all();

    assert_eq!(log.vertices(), vec!["A", "B", "C"]);
    let summary = slot.lock().unwrap().take().expect("run finished");
    assert_eq!(summary.code_of("join"), Some(VertexCode::Skip));
}

#[test]
fn skipped_vertices_still_release_successors() {
    let cfg = ClusterConfigBuilder::new("test")
        .graph(
            GraphConfigBuilder::new("main")
                .vertex(VertexBuilder::new("A", "probe").arg("code", 1).build())
                .vertex(VertexBuilder::new("B", "probe").dep_on_ok("A").build())
                .vertex(VertexBuilder::new("C", "probe").dep_on_ok("B").build())
                .vertex(VertexBuilder::new("D", "probe").dep_on_err("C").build())
                .build(),
        )
        .build();
    let (manager, log) = manager(&cfg);
    let executor = QueuedExecutor::new();
    let slot = start(&manager, &executor, "main");

    executor.run_all();

    assert_eq!(log.vertices(), vec!["A", "D"]);
    let summary = slot.lock().unwrap().take().expect("run finished");
    assert_eq!(summary.code_of("B"), Some(VertexCode::Skip));
    assert_eq!(summary.code_of("C"), Some(VertexCode::Skip));
    assert_eq!(summary.code_of("D"), Some(VertexCode::Ok));
}

#[test]
fn concurrent_runs_of_one_graph_use_separate_contexts() {
    let cfg = ClusterConfigBuilder::new("test")
        .pool_size(1)
        .graph(
            GraphConfigBuilder::new("main")
                .vertex(VertexBuilder::new("A", "probe").output("x", "out").build())
                .vertex(VertexBuilder::new("B", "probe").input("x", "in").build())
                .build(),
        )
        .build();
    let (manager, log) = manager(&cfg);
    let first = QueuedExecutor::new();
    let second = QueuedExecutor::new();

    let a = start(&manager, &first, "main");
    let b = start(&manager, &second, "main");
    let graph = manager.cluster("test").unwrap().graph("main").unwrap();
    assert_eq!(graph.idle_contexts(), 0);

    second.run_all();
    first.run_all();

    assert!(a.lock().unwrap().is_some());
    assert!(b.lock().unwrap().is_some());
    assert_eq!(log.count("B"), 2);
    assert_eq!(graph.idle_contexts(), 2);
}

#[test]
fn independent_producers_on_a_single_slot() {
    let cfg = ClusterConfigBuilder::new("test")
        .graph(
            GraphConfigBuilder::new("main")
                .vertex(VertexBuilder::new("A", "probe").arg("add", 1).output("a", "out").build())
                .vertex(VertexBuilder::new("B", "probe").arg("add", 2).output("b", "out").build())
                .vertex(
                    VertexBuilder::new("C", "probe")
                        .merge_input("in", &["a", "b"], false)
                        .build(),
                )
                .build(),
        )
        .build();
    let (manager, log) = manager(&cfg);

    let summary = run_and_wait(
        &manager,
        ExecuteOptions::new(Arc::new(SingleSlotExecutor::new())),
        Arc::new(DataContext::new()),
        "test",
        "main",
    );

    assert!(summary.is_success());
    assert_eq!(log.count("C"), 1);
    assert_eq!(log.last("C").unwrap().inputs, vec![1, 2]);
}

/// Runs every job on a fresh OS thread.
fn thread_per_job() -> ExecuteOptions {
    ExecuteOptions::new(Arc::new(|job: Job| {
        thread::spawn(job);
    }))
}

#[test]
fn wide_fan_in_on_threads() {
    let mut graph = GraphConfigBuilder::new("main");
    let mut sink = VertexBuilder::new("sink", "probe");
    for i in 0..32 {
        let id = format!("w{i}");
        graph = graph.vertex(VertexBuilder::new(&id, "probe").build());
        sink = sink.dep(&id);
    }
    let cfg = ClusterConfigBuilder::new("test")
        .graph(graph.vertex(sink.build()).build())
        .build();
    let (manager, log) = manager(&cfg);

    for round in 1..=10 {
        let summary = run_and_wait(
            &manager,
            thread_per_job(),
            Arc::new(DataContext::new()),
            "test",
            "main",
        );
        assert!(summary.is_success());
        assert_eq!(log.count("sink"), round);
    }
}

#[test]
fn concurrent_callers_on_threads() {
    let (manager, log) = manager(&diamond());
    let (tx, rx) = mpsc::channel();

    for _ in 0..8 {
        let manager = manager.clone();
        let tx = tx.clone();
        thread::spawn(move || {
            let summary = run_and_wait(
                &manager,
                thread_per_job(),
                Arc::new(DataContext::new()),
                "test",
                "main",
            );
            let _ = tx.send(summary.code);
        });
    }
    drop(tx);

    let codes: Vec<i32> = (0..8)
        .map(|_| rx.recv_timeout(Duration::from_secs(10)).unwrap())
        .collect();
    assert_eq!(codes, vec![0; 8]);
    assert_eq!(log.count("D"), 8);
}

/// Random DAG: vertex `i` depends on a non-empty subset of `0..i`
/// (plus an optional `on_err` edge) and fails when `fail[i]` is set.
#[derive(Debug, Clone)]
struct RandomDag {
    deps: Vec<Vec<(usize, u8)>>,
    fail: Vec<bool>,
}

fn random_dag(max: usize) -> impl Strategy<Value = RandomDag> {
    (2..=max).prop_flat_map(|n| {
        (
            proptest::collection::vec(proptest::collection::vec((any::<usize>(), 0..3u8), 1..4), n),
            proptest::collection::vec(any::<bool>(), n),
        )
            .prop_map(move |(raw, fail)| {
                let deps = raw
                    .into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        if i == 0 {
                            return Vec::new();
                        }
                        let mut seen = HashSet::new();
                        picks
                            .into_iter()
                            .map(|(p, mask)| (p % i, mask))
                            .filter(|(p, _)| seen.insert(*p))
                            .collect()
                    })
                    .collect();
                RandomDag { deps, fail }
            })
    })
}

fn random_cluster(dag: &RandomDag) -> ClusterConfig {
    let mut graph = GraphConfigBuilder::new("main");
    for (i, deps) in dag.deps.iter().enumerate() {
        let mut vertex = VertexBuilder::new(&format!("v{i}"), "probe")
            .arg("code", if dag.fail[i] { 1 } else { 0 });
        for &(dep, mask) in deps {
            let name = format!("v{dep}");
            vertex = match mask {
                0 => vertex.dep(&name),
                1 => vertex.dep_on_ok(&name),
                _ => vertex.dep_on_err(&name),
            };
        }
        graph = graph.vertex(vertex.build());
    }
    ClusterConfigBuilder::new("test").graph(graph.build()).build()
}

/// Which vertices must run, computed directly from the definition.
fn expected_runs(dag: &RandomDag) -> Vec<bool> {
    let mut ran = Vec::with_capacity(dag.deps.len());
    let mut outcome_ok: Vec<bool> = Vec::with_capacity(dag.deps.len());
    for (i, deps) in dag.deps.iter().enumerate() {
        let runs = deps.iter().all(|&(dep, mask)| match mask {
            0 => true,
            1 => outcome_ok[dep],
            _ => !outcome_ok[dep],
        });
        ran.push(runs);
        outcome_ok.push(runs && !dag.fail[i]);
    }
    ran
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_vertex_finishes_exactly_once(dag in random_dag(12), reversed in any::<bool>()) {
        let (manager, log) = manager(&random_cluster(&dag));
        let executor = QueuedExecutor::new();
        let slot = start(&manager, &executor, "main");

        if reversed {
            executor.run_all_reversed();
        } else {
            executor.run_all();
        }

        let summary = slot.lock().unwrap().take();
        prop_assert!(summary.is_some(), "done was not called");
        let summary = summary.unwrap();

        let expected = expected_runs(&dag);
        let position: HashMap<String, usize> = log
            .vertices()
            .into_iter()
            .enumerate()
            .map(|(pos, id)| (id, pos))
            .collect();

        for (i, deps) in dag.deps.iter().enumerate() {
            let id = format!("v{i}");
            let report = summary.vertex(&id).unwrap();
            prop_assert!(report.outcome.is_terminal());
            prop_assert_eq!(log.count(&id), usize::from(expected[i]), "vertex {}", id);
            if expected[i] {
                for &(dep, _) in deps {
                    if let Some(&dep_pos) = position.get(&format!("v{dep}")) {
                        prop_assert!(dep_pos < position[&id], "v{} ran before v{}", i, dep);
                    }
                }
            } else {
                prop_assert_eq!(report.code, VertexCode::Skip);
            }
        }
    }
}
