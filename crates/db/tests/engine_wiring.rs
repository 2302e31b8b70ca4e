//! Drives the workflow engine against the SQLite-backed collaborators to
//! verify the storage layer honors the engine's contracts end to end.

use std::sync::Arc;

use stagegate_core::{
    BypassPolicy, EngineError, InMemoryPermissionChecker, RuleSet, TransitionAttempt,
    TransitionOutcome, TransitionRequest, WorkflowEngine,
};
use stagegate_db::{
    connect_with_settings, migrations, ReferencePipelineSeed, SqlApprovalService,
    SqlDocumentIndex, SqlProjectStore, SqlStageCatalog, SqlTransitionLog,
};

struct Harness {
    engine: WorkflowEngine,
    pool: sqlx::SqlitePool,
    seeded: stagegate_db::SeedResult,
}

async fn harness(grants: Vec<(&str, &str, &str)>) -> Harness {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    let seeded = ReferencePipelineSeed::load(&pool).await.expect("seed");

    let engine = WorkflowEngine::new(
        Arc::new(SqlStageCatalog::new(pool.clone())),
        Arc::new(SqlProjectStore::new(pool.clone())),
        Arc::new(SqlDocumentIndex::new(pool.clone())),
        Arc::new(SqlApprovalService::new(pool.clone())),
        Arc::new(InMemoryPermissionChecker::with_grants(grants)),
        Arc::new(SqlTransitionLog::new(pool.clone())),
        RuleSet::reference_pipeline(),
        BypassPolicy::default(),
    );

    Harness { engine, pool, seeded }
}

#[tokio::test]
async fn seeded_project_advances_through_the_first_stages() {
    let harness = harness(Vec::new()).await;
    let project_id = &harness.seeded.project_id;

    // Inquiry -> Technical Review: the seed already attached the drawing.
    let review = harness.seeded.stage_ids[1].clone();
    let report = harness
        .engine
        .attempt_transition(
            project_id,
            &review,
            "u-demo-planner",
            &TransitionRequest { reason: "drawing reviewed".to_string(), bypass_justification: None },
        )
        .await
        .expect("attempt");
    assert!(matches!(report.attempt, TransitionAttempt::Completed(_)));
    assert!(report.audit_warning.is_none());

    // Technical Review -> Supplier RFQ: estimated value is already recorded.
    let rfq = harness.seeded.stage_ids[2].clone();
    let report = harness
        .engine
        .attempt_transition(project_id, &rfq, "u-demo-planner", &TransitionRequest::default())
        .await
        .expect("attempt");
    assert!(matches!(report.attempt, TransitionAttempt::Completed(_)));

    let history = harness.engine.history(project_id).await.expect("history");
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|record| record.outcome == TransitionOutcome::Completed));
}

#[tokio::test]
async fn missing_supplier_quote_blocks_the_quoted_stage() {
    let harness = harness(Vec::new()).await;
    let project_id = &harness.seeded.project_id;
    let quoted = harness.seeded.stage_ids[3].clone();

    let validation = harness
        .engine
        .validate(project_id, &quoted, "u-demo-planner")
        .await
        .expect("validate");

    assert!(!validation.is_valid);
    assert!(!validation.can_proceed);
    assert!(validation.errors.iter().any(|error| error.contains("supplier_quote")));
}

#[tokio::test]
async fn bypass_commits_and_lands_in_the_audit_trail() {
    let harness = harness(vec![("u-ops-manager", "workflow", "bypass")]).await;
    let project_id = &harness.seeded.project_id;
    let quoted = harness.seeded.stage_ids[3].clone();

    let report = harness
        .engine
        .attempt_transition(
            project_id,
            &quoted,
            "u-ops-manager",
            &TransitionRequest {
                reason: "quote sent manually".to_string(),
                bypass_justification: Some("urgent customer request".to_string()),
            },
        )
        .await
        .expect("attempt");

    assert!(matches!(report.attempt, TransitionAttempt::Bypassed(_)));

    let history = harness.engine.history(project_id).await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outcome, TransitionOutcome::Bypassed);
    assert_eq!(history[0].bypass_justification.as_deref(), Some("urgent customer request"));
}

#[tokio::test]
async fn approval_gate_round_trip_unblocks_order_confirmed() {
    let harness = harness(Vec::new()).await;
    let project_id = &harness.seeded.project_id;
    let confirmed = harness.seeded.stage_ids[4].clone();
    let documents = SqlDocumentIndex::new(harness.pool.clone());
    documents
        .attach(project_id, "purchase_order", Some("po-4711.pdf"), Some("u-demo-planner"))
        .await
        .expect("attach");

    let before = harness
        .engine
        .validate(project_id, &confirmed, "u-demo-planner")
        .await
        .expect("validate");
    assert!(!before.is_valid);
    assert!(before.requires_approval);

    harness.engine.request_approvals(project_id, &confirmed).await.expect("request");
    harness.engine.request_approvals(project_id, &confirmed).await.expect("idempotent");

    SqlApprovalService::new(harness.pool.clone())
        .decide(project_id, &confirmed, "sales_manager", true)
        .await
        .expect("approve");

    let after = harness
        .engine
        .validate(project_id, &confirmed, "u-demo-planner")
        .await
        .expect("validate");
    assert!(after.is_valid);
    assert!(!after.requires_approval);
}

#[tokio::test]
async fn stale_snapshot_conflicts_and_fresh_validation_recovers() {
    let harness = harness(Vec::new()).await;
    let project_id = &harness.seeded.project_id;
    let review = harness.seeded.stage_ids[1].clone();

    // First attempt commits and bumps the version.
    harness
        .engine
        .attempt_transition(project_id, &review, "u-demo-planner", &TransitionRequest::default())
        .await
        .expect("first attempt");

    // A raced executor call still holding the version-1 snapshot must lose.
    let store = SqlProjectStore::new(harness.pool.clone());
    let swap = store
        .swap_stage(project_id, 1, &review, chrono::Utc::now())
        .await
        .expect("swap");
    assert_eq!(swap, stagegate_core::StageSwap::Conflict);

    // Re-validating against fresh state shows the no-op rejection instead.
    let validation = harness
        .engine
        .validate(project_id, &review, "u-demo-planner")
        .await
        .expect("validate");
    assert!(!validation.is_valid);
}

#[tokio::test]
async fn auto_advance_probe_reads_live_document_state() {
    let harness = harness(Vec::new()).await;
    let project_id = &harness.seeded.project_id;

    let decision = harness.engine.auto_advance(project_id).await.expect("probe");
    assert!(decision.available, "seeded drawing satisfies Technical Review");

    // Advance twice, then the probe lands on Quoted, which needs a supplier quote.
    for stage in [&harness.seeded.stage_ids[1], &harness.seeded.stage_ids[2]] {
        harness
            .engine
            .attempt_transition(project_id, stage, "u-demo-planner", &TransitionRequest::default())
            .await
            .expect("advance");
    }
    let blocked = harness.engine.auto_advance(project_id).await.expect("probe");
    assert!(!blocked.available);

    SqlDocumentIndex::new(harness.pool.clone())
        .attach(project_id, "supplier_quote", None, None)
        .await
        .expect("attach");
    let unblocked = harness.engine.auto_advance(project_id).await.expect("probe");
    assert!(unblocked.available);
}

#[tokio::test]
async fn unknown_project_surfaces_not_found() {
    let harness = harness(Vec::new()).await;

    let error = harness
        .engine
        .validate(
            &stagegate_core::ProjectId("proj-404".to_string()),
            &harness.seeded.stage_ids[1],
            "u-demo-planner",
        )
        .await
        .expect_err("must fail");

    assert!(matches!(error, EngineError::NotFound { kind: "project", .. }));
}
