use std::sync::Arc;

use tracing::{debug, warn};

use crate::approval_gate::ApprovalGate;
use crate::auto_advance::{AutoAdvanceDecision, AutoAdvanceEngine};
use crate::bypass::BypassAuthority;
use crate::catalog::StageCatalog;
use crate::collaborators::{
    ApprovalService, DocumentIndex, PermissionChecker, ProjectStore,
};
use crate::domain::project::{Project, ProjectId};
use crate::domain::stage::{StageId, WorkflowStage};
use crate::domain::transition::{TransitionOutcome, TransitionRecord};
use crate::errors::EngineError;
use crate::executor::{ExecutionRequest, TransitionExecutor};
use crate::history::{HistoryRecorder, TransitionLog};
use crate::prerequisites::PrerequisiteChecker;
use crate::rules::RuleSet;
use crate::validator::{BypassPolicy, TransitionValidator, ValidationResult};

/// One transition attempt as submitted by the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionRequest {
    pub reason: String,
    /// Present only when the caller explicitly asks to bypass a failed
    /// validation. Ignored when validation passes.
    pub bypass_justification: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionAttempt {
    Completed(Project),
    Bypassed(Project),
    Rejected(ValidationResult),
}

/// Explicit result of one attempt: what happened, the audit row describing
/// it, and whether audit logging degraded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionReport {
    pub attempt: TransitionAttempt,
    pub record: TransitionRecord,
    /// Set when the transition itself succeeded but the audit trail could
    /// not be persisted; callers surface this distinctly, never as a
    /// transition failure.
    pub audit_warning: Option<String>,
}

/// Wires the engine components around shared collaborator handles and
/// drives the explicit two-step protocol:
/// `validate → (optional) request_approvals → re-validate → attempt`.
#[derive(Clone)]
pub struct WorkflowEngine {
    catalog: Arc<dyn StageCatalog>,
    store: Arc<dyn ProjectStore>,
    validator: TransitionValidator,
    gate: ApprovalGate,
    bypass: BypassAuthority,
    executor: TransitionExecutor,
    recorder: HistoryRecorder,
    advancer: AutoAdvanceEngine,
}

impl WorkflowEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<dyn StageCatalog>,
        store: Arc<dyn ProjectStore>,
        documents: Arc<dyn DocumentIndex>,
        approvals: Arc<dyn ApprovalService>,
        permissions: Arc<dyn PermissionChecker>,
        log: Arc<dyn TransitionLog>,
        rules: RuleSet,
        bypass_policy: BypassPolicy,
    ) -> Self {
        let checker = PrerequisiteChecker::new(rules, documents, approvals.clone());
        Self {
            validator: TransitionValidator::new(
                catalog.clone(),
                checker.clone(),
                permissions.clone(),
                bypass_policy.clone(),
            ),
            gate: ApprovalGate::new(approvals),
            bypass: BypassAuthority::new(permissions, bypass_policy),
            executor: TransitionExecutor::new(store.clone()),
            recorder: HistoryRecorder::new(log),
            advancer: AutoAdvanceEngine::new(catalog.clone(), checker),
            catalog,
            store,
        }
    }

    /// Fresh validation snapshot for a candidate transition.
    pub async fn validate(
        &self,
        project_id: &ProjectId,
        target_stage_id: &StageId,
        actor_id: &str,
    ) -> Result<ValidationResult, EngineError> {
        let project = self.load_project(project_id).await?;
        Ok(self.validator.validate(&project, target_stage_id, actor_id).await)
    }

    /// Step two of the protocol: request approver assignment for a gated
    /// stage, then let the caller re-validate.
    pub async fn request_approvals(
        &self,
        project_id: &ProjectId,
        target_stage_id: &StageId,
    ) -> Result<(), EngineError> {
        let project = self.load_project(project_id).await?;
        let target = self.load_stage(&project, target_stage_id).await?;
        self.gate.ensure_requested(&project, &target).await
    }

    pub async fn auto_advance(
        &self,
        project_id: &ProjectId,
    ) -> Result<AutoAdvanceDecision, EngineError> {
        let project = self.load_project(project_id).await?;
        self.advancer.evaluate(&project).await
    }

    pub async fn history(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<TransitionRecord>, EngineError> {
        self.recorder.history(project_id).await
    }

    /// Validate against fresh state, then commit or reject, recording the
    /// outcome exactly once after it is known. A `Conflict` from the
    /// executor propagates without a record: the attempt reached no
    /// recordable outcome, and the retrying caller produces a fresh one.
    pub async fn attempt_transition(
        &self,
        project_id: &ProjectId,
        target_stage_id: &StageId,
        actor_id: &str,
        request: &TransitionRequest,
    ) -> Result<TransitionReport, EngineError> {
        let project = self.load_project(project_id).await?;
        let target = self.load_stage(&project, target_stage_id).await?;
        let validation = self.validator.validate(&project, target_stage_id, actor_id).await;
        let decision_context = serde_json::to_string(&validation.checks).ok();

        if validation.is_valid {
            let execution =
                ExecutionRequest { bypass: false, reason: request.reason.clone() };
            let updated = self.executor.execute(&project, &target, actor_id, &execution).await?;
            let mut record = TransitionRecord::new(
                project.id.clone(),
                project.current_stage_id.clone(),
                target.id.clone(),
                actor_id,
                TransitionOutcome::Completed,
                request.reason.clone(),
            );
            if let Some(context) = decision_context {
                record = record.with_decision_context(context);
            }
            let audit_warning = self.record_outcome(&record).await;
            return Ok(TransitionReport {
                attempt: TransitionAttempt::Completed(updated),
                record,
                audit_warning,
            });
        }

        let justification = request
            .bypass_justification
            .as_deref()
            .map(str::trim)
            .filter(|justification| !justification.is_empty());

        if let Some(justification) = justification {
            let authorization =
                self.bypass.authorize(actor_id, &project, &target, justification).await?;
            let execution = ExecutionRequest { bypass: true, reason: request.reason.clone() };
            let updated = self.executor.execute(&project, &target, actor_id, &execution).await?;
            let mut record = TransitionRecord::new(
                project.id.clone(),
                project.current_stage_id.clone(),
                target.id.clone(),
                actor_id,
                TransitionOutcome::Bypassed,
                request.reason.clone(),
            )
            .with_justification(authorization.justification);
            if let Some(context) = decision_context {
                record = record.with_decision_context(context);
            }
            let audit_warning = self.record_outcome(&record).await;
            return Ok(TransitionReport {
                attempt: TransitionAttempt::Bypassed(updated),
                record,
                audit_warning,
            });
        }

        debug!(
            project_id = %project.id.0,
            target_stage_id = %target.id.0,
            actor_id,
            errors = validation.errors.len(),
            "transition rejected by validation"
        );
        let mut record = TransitionRecord::new(
            project.id.clone(),
            project.current_stage_id.clone(),
            target.id.clone(),
            actor_id,
            TransitionOutcome::Rejected,
            rejection_reason(&validation),
        );
        if let Some(context) = decision_context {
            record = record.with_decision_context(context);
        }
        let audit_warning = self.record_outcome(&record).await;
        Ok(TransitionReport {
            attempt: TransitionAttempt::Rejected(validation),
            record,
            audit_warning,
        })
    }

    async fn record_outcome(&self, record: &TransitionRecord) -> Option<String> {
        match self.recorder.record(record).await {
            Ok(()) => None,
            Err(error) => {
                warn!(
                    project_id = %record.project_id.0,
                    record_id = %record.id.0,
                    error = %error,
                    "transition committed but audit logging failed"
                );
                Some(error.to_string())
            }
        }
    }

    async fn load_project(&self, project_id: &ProjectId) -> Result<Project, EngineError> {
        self.store
            .get(project_id)
            .await?
            .ok_or_else(|| EngineError::project_not_found(project_id.0.clone()))
    }

    async fn load_stage(
        &self,
        project: &Project,
        stage_id: &StageId,
    ) -> Result<WorkflowStage, EngineError> {
        self.catalog
            .get_stage(&project.organization_id, stage_id)
            .await?
            .ok_or_else(|| EngineError::stage_not_found(stage_id.0.clone()))
    }
}

fn rejection_reason(validation: &ValidationResult) -> String {
    if validation.errors.is_empty() {
        "validation failed".to_string()
    } else {
        validation.errors.join("; ")
    }
}
