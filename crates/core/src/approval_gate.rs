use std::sync::Arc;

use tracing::info;

use crate::collaborators::ApprovalService;
use crate::domain::project::Project;
use crate::domain::stage::WorkflowStage;
use crate::errors::EngineError;

/// Triggers approver assignment for stages gated on approval.
///
/// Invoked explicitly by the caller after validation surfaced
/// `requires_approval`; never called implicitly from inside the validator.
#[derive(Clone)]
pub struct ApprovalGate {
    approvals: Arc<dyn ApprovalService>,
}

impl ApprovalGate {
    pub fn new(approvals: Arc<dyn ApprovalService>) -> Self {
        Self { approvals }
    }

    /// Idempotent: approvals already pending or resolved are left untouched,
    /// so repeated calls never create duplicate requests.
    pub async fn ensure_requested(
        &self,
        project: &Project,
        target: &WorkflowStage,
    ) -> Result<(), EngineError> {
        if !target.requires_approval {
            return Ok(());
        }

        let status = self.approvals.approval_status(&project.id, &target.id).await?;
        if status.pending || status.resolved {
            return Ok(());
        }

        self.approvals
            .request_approvals(&project.id, &target.id, &project.organization_id)
            .await?;
        info!(
            project_id = %project.id.0,
            stage_id = %target.id.0,
            stage_name = %target.name,
            "approval requests created"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use crate::collaborators::InMemoryApprovalService;
    use crate::domain::project::{Project, ProjectId};
    use crate::domain::stage::{OrganizationId, StageId, WorkflowStage};
    use crate::errors::EngineError;

    use super::ApprovalGate;

    fn project() -> Project {
        let now = Utc::now();
        Project {
            id: ProjectId("proj-1".to_string()),
            organization_id: OrganizationId("org-1".to_string()),
            name: "Bracket order".to_string(),
            current_stage_id: Some(StageId("stage-3".to_string())),
            stage_entered_at: Some(now),
            owner: None,
            priority: None,
            estimated_value: None,
            state_version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn gated_stage() -> WorkflowStage {
        WorkflowStage {
            id: StageId("stage-4".to_string()),
            organization_id: OrganizationId("org-1".to_string()),
            name: "Quoted".to_string(),
            order: 4,
            is_active: true,
            requires_approval: true,
            approval_roles: vec!["sales_manager".to_string()],
            responsible_roles: Vec::new(),
            estimated_duration_days: None,
            exit_criteria: None,
        }
    }

    #[tokio::test]
    async fn first_call_creates_approval_requests() {
        let approvals = Arc::new(InMemoryApprovalService::default());
        let gate = ApprovalGate::new(approvals.clone());

        gate.ensure_requested(&project(), &gated_stage()).await.expect("gate");

        assert_eq!(approvals.requests().len(), 1);
    }

    #[tokio::test]
    async fn repeated_calls_do_not_duplicate_requests() {
        let approvals = Arc::new(InMemoryApprovalService::default());
        let gate = ApprovalGate::new(approvals.clone());
        let project = project();
        let stage = gated_stage();

        gate.ensure_requested(&project, &stage).await.expect("first");
        gate.ensure_requested(&project, &stage).await.expect("second");
        gate.ensure_requested(&project, &stage).await.expect("third");

        assert_eq!(approvals.requests().len(), 1);
    }

    #[tokio::test]
    async fn resolved_approvals_are_left_untouched() {
        let approvals = Arc::new(InMemoryApprovalService::default());
        let gate = ApprovalGate::new(approvals.clone());
        let project = project();
        let stage = gated_stage();
        approvals.resolve(&project.id, &stage.id);

        gate.ensure_requested(&project, &stage).await.expect("gate");

        assert!(approvals.requests().is_empty());
    }

    #[tokio::test]
    async fn stage_without_approval_gate_is_a_no_op() {
        let approvals = Arc::new(InMemoryApprovalService::default());
        let gate = ApprovalGate::new(approvals.clone());
        let mut stage = gated_stage();
        stage.requires_approval = false;

        gate.ensure_requested(&project(), &stage).await.expect("gate");

        assert!(approvals.requests().is_empty());
    }

    #[tokio::test]
    async fn unreachable_service_surfaces_upstream_unavailable() {
        let gate = ApprovalGate::new(Arc::new(InMemoryApprovalService::unavailable()));

        let error = gate.ensure_requested(&project(), &gated_stage()).await.expect_err("must fail");

        assert!(matches!(error, EngineError::UpstreamUnavailable(_)));
    }
}
