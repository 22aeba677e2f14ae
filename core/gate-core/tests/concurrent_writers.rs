//! Many writers, one file: no lost updates and no torn reads.

use std::time::Duration;

use gate_core::state::{LockedStore, Mutation, PathResolver, StateKind};
use gate_core::storage::{GateSettings, StorageConfig};
use gate_core::{DelegationEvent, GateEngine, NewTask};
use tempfile::tempdir;

fn patient_settings() -> GateSettings {
    GateSettings {
        lock_timeout: Duration::from_secs(10),
        sweep_probability: 0.0,
        ..GateSettings::default()
    }
}

#[test]
fn test_locked_increments_are_never_lost() {
    let temp = tempdir().unwrap();
    let resolver = PathResolver::new(StorageConfig::with_root(temp.path().to_path_buf()));
    let path = resolver.resolve_path(StateKind::TestRun, "shared");

    const WRITERS: usize = 8;
    const ROUNDS: usize = 20;

    std::thread::scope(|scope| {
        for _ in 0..WRITERS {
            let path = path.clone();
            scope.spawn(move || {
                let store = LockedStore::new(patient_settings());
                for _ in 0..ROUNDS {
                    store
                        .modify_state_with_lock(&path, |raw| {
                            let count = raw
                                .and_then(|c| serde_json::from_str::<serde_json::Value>(&c).ok())
                                .and_then(|v| v["runCount"].as_u64())
                                .unwrap_or(0);
                            let next = serde_json::json!({"active": true, "runCount": count + 1});
                            (Mutation::Write(next.to_string()), ())
                        })
                        .unwrap();
                }
            });
        }
    });

    let store = LockedStore::new(patient_settings());
    let content = store.read_state(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["runCount"].as_u64(), Some((WRITERS * ROUNDS) as u64));
    assert!(resolver.list_lock_artifacts().is_empty());
    assert!(resolver.list_temp_files().is_empty());
}

#[test]
fn test_readers_never_observe_partial_writes() {
    let temp = tempdir().unwrap();
    let resolver = PathResolver::new(StorageConfig::with_root(temp.path().to_path_buf()));
    let path = resolver.resolve_path(StateKind::PlanApproval, "shared");
    let store = LockedStore::new(patient_settings());
    assert!(store.write_state(&path, r#"{"active":true,"workflowId":"seed"}"#));

    std::thread::scope(|scope| {
        let writer_path = path.clone();
        scope.spawn(move || {
            let store = LockedStore::new(patient_settings());
            for i in 0..50 {
                let padding = "x".repeat(i * 100);
                let doc = serde_json::json!({"active": true, "workflowId": padding});
                assert!(store.write_state(&writer_path, &doc.to_string()));
            }
        });
        for _ in 0..2 {
            let reader_path = path.clone();
            scope.spawn(move || {
                let store = LockedStore::new(patient_settings());
                for _ in 0..50 {
                    if let Some(content) = store.read_unlocked(&reader_path).unwrap() {
                        serde_json::from_str::<serde_json::Value>(&content).unwrap();
                    }
                }
            });
        }
    });
}

#[test]
fn test_parallel_task_additions_all_land() {
    let temp = tempdir().unwrap();
    let engine = GateEngine::with_storage(
        StorageConfig::with_root(temp.path().to_path_buf()),
        patient_settings(),
    );
    engine.apply_delegation("s1", DelegationEvent::Activate { workflow_id: None });

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let engine = &engine;
            scope.spawn(move || {
                for n in 0..5 {
                    let applied = engine.apply_delegation(
                        "s1",
                        DelegationEvent::AddTask(NewTask {
                            id: format!("w{}-t{}", worker, n),
                            agent: "builder".into(),
                            ..NewTask::default()
                        }),
                    );
                    assert!(!applied.is_noop(), "{:?}", applied);
                }
            });
        }
    });

    let state = engine.get::<gate_core::DelegationState>("s1").unwrap();
    assert_eq!(state.tasks.len(), 20);
}

#[test]
fn test_two_racing_writers_leave_exactly_one_document() {
    let temp = tempdir().unwrap();
    let resolver = PathResolver::new(StorageConfig::with_root(temp.path().to_path_buf()));
    let path = resolver.resolve_path(StateKind::Orchestration, "race");
    let first = format!(r#"{{"active":true,"writer":"a","pad":"{}"}}"#, "a".repeat(4096));
    let second = format!(r#"{{"active":true,"writer":"b","pad":"{}"}}"#, "b".repeat(4096));

    std::thread::scope(|scope| {
        for content in [&first, &second] {
            let path = path.clone();
            scope.spawn(move || {
                let store = LockedStore::new(patient_settings());
                assert!(store.write_state(&path, content));
            });
        }
    });

    let store = LockedStore::new(patient_settings());
    let result = store.read_state(&path).unwrap();
    assert!(result == first || result == second);
}
