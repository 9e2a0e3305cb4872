mod common;

use amen_audit::{AuditEventType, AuditLogger};
use amen_core::{
    ApprovalError, DiffOrigin, ExecutionError, IterationDiff, LifecycleState, RetryConfig,
    Severity, parse_action,
};
use amen_planner::{HeuristicAdvisor, plan};
use amen_runtime::{AmenGate, Engine, ExecuteOptions, Executor, StaticConfirmer};
use common::{Fakes, draft};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn engine(fakes: &Fakes) -> (Engine, Arc<amen_audit::MemoryStorage>) {
    let (logger, storage) = AuditLogger::in_memory();
    let engine = Engine::new(
        AmenGate::new(Arc::new(StaticConfirmer(true))),
        Executor::new(fakes.backends()),
        Arc::new(logger),
    );
    (engine, storage)
}

fn fast_options() -> ExecuteOptions {
    ExecuteOptions {
        action_timeout: Duration::from_secs(5),
        retry: RetryConfig::none(),
        ..ExecuteOptions::default()
    }
}

#[tokio::test]
async fn full_lifecycle_is_audited() {
    let fakes = Fakes::new();
    let (engine, storage) = engine(&fakes);
    let handle = engine
        .register(draft(&[
            "db.create users",
            "db.add_column users email string",
            "api.expose GET /users",
        ]))
        .await;

    let plan = engine.plan(&handle).await.unwrap();
    assert!(plan.diagnostics.is_empty());
    engine.approve(&handle, "alice").await.unwrap();
    let result = engine.execute(&handle, &fast_options()).await.unwrap();
    assert_eq!(result.succeeded.len(), 3);
    assert_eq!(handle.snapshot().await.state(), LifecycleState::Executed);

    let kinds: Vec<AuditEventType> = storage.events().await.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            AuditEventType::IntentRegistered,
            AuditEventType::PlanProduced,
            AuditEventType::ApprovalGranted,
            AuditEventType::ExecutionStarted,
            AuditEventType::ActionSucceeded,
            AuditEventType::ActionSucceeded,
            AuditEventType::ActionSucceeded,
            AuditEventType::ExecutionCompleted,
        ]
    );
    let history = engine.audit().history(handle.id()).await.unwrap();
    assert_eq!(history.len(), 8);
}

#[tokio::test]
async fn empty_shell_command_blocks_approval() {
    let fakes = Fakes::new();
    let (engine, storage) = engine(&fakes);
    let handle = engine.register(draft(&["shell.exec"])).await;

    let plan = engine.plan(&handle).await.unwrap();
    assert_eq!(plan.diagnostics.len(), 1);
    assert_eq!(plan.diagnostics[0].severity, Severity::Error);
    assert!(plan.blocking);

    let err = engine.approve(&handle, "alice").await.unwrap_err();
    assert_eq!(err, ApprovalError::BlockingDiagnostics { errors: 1 });
    assert_eq!(handle.snapshot().await.state(), LifecycleState::Draft);

    let events = storage.events().await;
    assert_eq!(events[1].event_type, AuditEventType::PlanBlocked);
    assert_eq!(events[2].event_type, AuditEventType::ApprovalRejected);
    assert_eq!(events[2].actor.as_deref(), Some("alice"));
}

#[tokio::test]
async fn declined_confirmation_is_audited_and_blocks_execution() {
    let fakes = Fakes::new();
    let (logger, storage) = AuditLogger::in_memory();
    let engine = Engine::new(
        AmenGate::new(Arc::new(StaticConfirmer(false))),
        Executor::new(fakes.backends()),
        Arc::new(logger),
    );
    let handle = engine.register(draft(&["file.create a.txt"])).await;
    engine.plan(&handle).await.unwrap();

    let err = engine.approve(&handle, "alice").await.unwrap_err();
    assert!(matches!(err, ApprovalError::Declined { .. }));

    let err = engine.execute(&handle, &fast_options()).await.unwrap_err();
    assert_eq!(
        err,
        ExecutionError::NotApproved {
            state: LifecycleState::Planned
        }
    );
    assert!(fakes.untouched());
    assert!(
        storage
            .events()
            .await
            .iter()
            .all(|e| e.event_type != AuditEventType::ExecutionStarted)
    );
}

#[tokio::test]
async fn iteration_after_approval_resets_to_draft() {
    let fakes = Fakes::new();
    let (engine, _storage) = engine(&fakes);
    let handle = engine.register(draft(&["api.expose GET /users"])).await;
    engine.plan(&handle).await.unwrap();
    engine.approve(&handle, "alice").await.unwrap();

    // Replacing an action with itself still invalidates the approval.
    engine
        .iterate(
            &handle,
            IterationDiff::ReplaceAction(0, parse_action("api.expose GET /users").unwrap()),
            DiffOrigin::Manual,
        )
        .await
        .unwrap();

    let intent = handle.snapshot().await;
    assert_eq!(intent.state(), LifecycleState::Draft);
    assert!(intent.approval().is_none());
    assert!(matches!(
        engine.approve(&handle, "alice").await,
        Err(ApprovalError::NotPlanned { .. })
    ));
}

#[tokio::test]
async fn planning_is_pure_and_repeatable() {
    let fakes = Fakes::new();
    let intent = draft(&[
        "file.create notes.txt",
        "shell.exec echo hi",
        "rest.call GET https://api.example.com/x",
    ]);

    let first = plan(&intent);
    let second = plan(&intent);
    assert_eq!(first, second);

    let (engine, _storage) = engine(&fakes);
    let handle = engine.register(intent).await;
    engine.plan(&handle).await.unwrap();
    assert!(fakes.untouched());
}

#[tokio::test]
async fn concurrent_iterations_yield_gap_free_versions() {
    let fakes = Fakes::new();
    let (engine, _storage) = engine(&fakes);
    let engine = Arc::new(engine);
    let handle = engine.register(draft(&[])).await;

    let mut tasks = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let action = parse_action(&format!("file.create f{}.txt", i)).unwrap();
            engine
                .iterate(&handle, IterationDiff::AddAction(action), DiffOrigin::Manual)
                .await
                .unwrap()
                .version
        }));
    }
    let mut versions = Vec::new();
    for task in tasks {
        versions.push(task.await.unwrap());
    }
    versions.sort_unstable();

    assert_eq!(versions, (2..=17).collect::<Vec<u64>>());
    let intent = handle.snapshot().await;
    assert_eq!(intent.version(), 17);
    assert_eq!(intent.actions().len(), 16);
    let recorded: Vec<u64> = intent.iteration_history().iter().map(|e| e.version).collect();
    assert_eq!(recorded, (2..=17).collect::<Vec<u64>>());
}

#[tokio::test]
async fn advisory_suggestions_go_through_iteration() {
    let fakes = Fakes::new();
    let (engine, storage) = engine(&fakes);
    let handle = engine.register(draft(&["api.expose GET /users"])).await;
    engine.plan(&handle).await.unwrap();

    let proposals = engine
        .suggest(&handle, &HeuristicAdvisor, Some("reliability"))
        .await;
    assert_eq!(proposals.len(), 2);

    let outcome = engine.apply_suggestions(&handle, proposals).await;
    assert_eq!(outcome.applied.len(), 2);
    assert!(outcome.applied.iter().all(|e| e.origin == DiffOrigin::Advisory));
    assert_eq!(handle.snapshot().await.state(), LifecycleState::Draft);

    let iterations = storage
        .events()
        .await
        .iter()
        .filter(|e| e.event_type == AuditEventType::IterationApplied)
        .count();
    assert_eq!(iterations, 2);
}

#[tokio::test]
async fn failed_execution_can_be_replanned() {
    let fakes = Fakes::new();
    fakes.process.push_exit(2, "nope");
    let (engine, storage) = engine(&fakes);
    let handle = engine.register(draft(&["shell.exec make deploy"])).await;
    engine.plan(&handle).await.unwrap();
    engine.approve(&handle, "alice").await.unwrap();

    let result = engine.execute(&handle, &fast_options()).await.unwrap();
    assert!(!result.is_success());
    assert_eq!(handle.snapshot().await.state(), LifecycleState::Failed);

    let kinds: Vec<AuditEventType> = storage.events().await.iter().map(|e| e.event_type).collect();
    assert!(kinds.ends_with(&[AuditEventType::ActionFailed, AuditEventType::ExecutionFailed]));

    engine.plan(&handle).await.unwrap();
    assert_eq!(handle.snapshot().await.state(), LifecycleState::Planned);
}
