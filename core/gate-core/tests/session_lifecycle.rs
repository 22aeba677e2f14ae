//! End-to-end session flows against a scratch state root and a manual clock.

use gate_core::state::StateKind;
use gate_core::storage::{GateSettings, StorageConfig, HOUR_MS, MINUTE_MS};
use gate_core::{
    Applied, DelegationEvent, GateEngine, ManualClock, NewTask, Notice, Phase, TaskType,
    TransitionIntent,
};
use tempfile::tempdir;

const T0: i64 = 1_700_000_000_000;

fn engine_at(root: &std::path::Path) -> (GateEngine<ManualClock>, ManualClock) {
    let clock = ManualClock::at(T0);
    let settings = GateSettings {
        sweep_probability: 0.0,
        ..GateSettings::default()
    };
    let engine = GateEngine::with_clock(
        StorageConfig::with_root(root.to_path_buf()),
        settings,
        clock.clone(),
    );
    (engine, clock)
}

#[test]
fn test_delegation_blocks_code_but_not_config() {
    let temp = tempdir().unwrap();
    let (engine, _) = engine_at(temp.path());
    engine.apply_delegation("s1", DelegationEvent::Activate { workflow_id: None });

    let verdict = engine.check_file_edit("s1", "src/main.ts");
    let denial = verdict.decision.denial().expect("code edit should be blocked");
    assert!(denial.blocked.contains("main.ts"));
    assert!(!denial.remedy.is_empty());

    assert!(engine.check_file_edit("s1", "package.json").decision.is_allow());
    assert!(!engine.check_command("s1", "npm test").decision.is_allow());
    assert!(engine.check_command("s1", "git diff").decision.is_allow());

    // Another session is unaffected.
    assert!(engine.check_file_edit("s2", "src/main.ts").decision.is_allow());
}

#[test]
fn test_orchestration_flags_only_move_forward() {
    let temp = tempdir().unwrap();
    let (engine, _) = engine_at(temp.path());
    engine.apply_orchestration(
        "s1",
        TransitionIntent::Activate {
            task_type: TaskType::Unknown,
        },
    );

    // Out-of-phase intents are ignored.
    assert!(engine
        .apply_orchestration("s1", TransitionIntent::PlanApproved)
        .is_noop());
    assert!(engine
        .apply_orchestration("s1", TransitionIntent::InterviewComplete)
        .is_noop());

    let applied = engine.apply_orchestration("s1", TransitionIntent::ReconComplete);
    assert_eq!(applied.record().unwrap().phase(), Phase::Interview);
    assert!(engine
        .apply_orchestration("s1", TransitionIntent::ReconComplete)
        .is_noop());
    assert!(engine
        .apply_orchestration(
            "s1",
            TransitionIntent::Activate {
                task_type: TaskType::Research
            }
        )
        .is_noop());

    let state = engine
        .get::<gate_core::OrchestrationState>("s1")
        .unwrap();
    assert!(state.recon_complete);
    assert!(!state.interview_complete);
    assert_eq!(state.task_type, TaskType::Unknown);
}

#[test]
fn test_recon_phase_only_allows_exploratory_agents() {
    let temp = tempdir().unwrap();
    let (engine, _) = engine_at(temp.path());
    engine.classify_and_apply("s1", "orchestrate: implement search").unwrap();

    assert!(engine.check_agent_spawn("s1", "codebase-scout").decision.is_allow());
    assert!(!engine.check_agent_spawn("s1", "backend-engineer").decision.is_allow());
    assert!(!engine.check_file_edit("s1", "search.rs").decision.is_allow());
    assert!(engine.check_file_edit("s1", "NOTES.md").decision.is_allow());
}

#[test]
fn test_retry_escalation_reaches_human_after_ceiling() {
    let temp = tempdir().unwrap();
    let (engine, _) = engine_at(temp.path());
    engine.apply_delegation("s1", DelegationEvent::Activate { workflow_id: None });
    engine.apply_delegation(
        "s1",
        DelegationEvent::AddTask(NewTask {
            id: "t1".into(),
            agent: "builder".into(),
            ..NewTask::default()
        }),
    );

    let mut notices = Vec::new();
    for _ in 0..3 {
        engine.apply_delegation("s1", DelegationEvent::StartTask { task_id: "t1".into() });
        let failed = engine.apply_delegation(
            "s1",
            DelegationEvent::FailTask {
                task_id: "t1".into(),
                error: "boom".into(),
            },
        );
        notices.extend(failed.notice().cloned());
        let popped = engine.apply_delegation("s1", DelegationEvent::PopRetry);
        notices.extend(popped.notice().cloned());
    }

    assert!(matches!(
        notices.last(),
        Some(Notice::EscalatedToHuman { attempts: 3, .. })
    ));
    let status = engine.status("s1");
    assert_eq!(status.delegation.unwrap().summary.needs_human, 1);
}

#[test]
fn test_archives_survive_a_day_then_purge() {
    let temp = tempdir().unwrap();
    let (engine, clock) = engine_at(temp.path());
    engine.apply_delegation(
        "s1",
        DelegationEvent::Activate {
            workflow_id: Some("wf-42".into()),
        },
    );
    engine.apply_delegation(
        "s1",
        DelegationEvent::AddTask(NewTask {
            id: "t1".into(),
            agent: "builder".into(),
            ..NewTask::default()
        }),
    );

    let ended = engine.end_session("s1");
    assert_eq!(ended.archived.len(), 1);
    assert!(engine.get::<gate_core::DelegationState>("s1").is_none());

    clock.advance_ms(23 * HOUR_MS);
    let start = engine.start_session();
    assert_eq!(start.resumable.len(), 1);
    assert_eq!(start.resumable[0].kind, StateKind::Delegation);
    assert_eq!(start.resumable[0].workflow_id.as_deref(), Some("wf-42"));
    assert!(start.summary.unwrap().contains("wf-42"));
    // Listing never resumes.
    assert!(engine.get::<gate_core::DelegationState>("s2").is_none());

    clock.advance_ms(HOUR_MS);
    assert!(engine.start_session().resumable.is_empty());
    assert!(!ended.archived[0].exists());
}

#[test]
fn test_finished_delegation_is_not_archived() {
    let temp = tempdir().unwrap();
    let (engine, _) = engine_at(temp.path());
    engine.apply_delegation("s1", DelegationEvent::Activate { workflow_id: None });
    engine.apply_delegation(
        "s1",
        DelegationEvent::AddTask(NewTask {
            id: "t1".into(),
            agent: "builder".into(),
            ..NewTask::default()
        }),
    );
    engine.apply_delegation("s1", DelegationEvent::StartTask { task_id: "t1".into() });
    engine.apply_delegation(
        "s1",
        DelegationEvent::CompleteTask {
            task_id: "t1".into(),
            commit: Some("abc123".into()),
        },
    );

    let ended = engine.end_session("s1");
    assert!(ended.archived.is_empty());
    assert_eq!(ended.deleted, vec![StateKind::Delegation]);
}

#[test]
fn test_stale_warning_then_expiry() {
    let temp = tempdir().unwrap();
    let (engine, clock) = engine_at(temp.path());
    engine.apply_delegation("s1", DelegationEvent::Activate { workflow_id: None });

    clock.advance_ms(29 * MINUTE_MS);
    assert!(engine.status("s1").warnings.is_empty());
    clock.advance_ms(2 * MINUTE_MS);
    assert_eq!(engine.status("s1").warnings.len(), 1);

    clock.advance_ms(10 * HOUR_MS);
    let warning = &engine.status("s1").warnings[0];
    assert!(warning.contains("expire"));

    clock.advance_ms(2 * HOUR_MS);
    assert!(engine.status("s1").delegation.is_none());
    assert!(engine.check_file_edit("s1", "main.go").decision.is_allow());
}

#[test]
fn test_cancel_without_state_is_a_noop() {
    let temp = tempdir().unwrap();
    let (engine, _) = engine_at(temp.path());
    assert!(matches!(
        engine.apply_delegation("s1", DelegationEvent::Cancel),
        Applied::NoOp { .. }
    ));
}
