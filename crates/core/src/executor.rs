use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::collaborators::{ProjectStore, StageSwap};
use crate::domain::project::Project;
use crate::domain::stage::WorkflowStage;
use crate::errors::EngineError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub bypass: bool,
    pub reason: String,
}

/// The only writer of a project's `current_stage_id` / `stage_entered_at`
/// pair. Commits via the store's compare-and-swap; a lost race surfaces as
/// `Conflict` with no partial update, and the caller must re-fetch and
/// re-validate before retrying.
#[derive(Clone)]
pub struct TransitionExecutor {
    store: Arc<dyn ProjectStore>,
}

impl TransitionExecutor {
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        project: &Project,
        target: &WorkflowStage,
        actor_id: &str,
        request: &ExecutionRequest,
    ) -> Result<Project, EngineError> {
        if project.organization_id != target.organization_id {
            // Cross-organization targets fail closed as unknown stages.
            return Err(EngineError::stage_not_found(target.id.0.clone()));
        }

        let entered_at = Utc::now();
        let swap = self
            .store
            .compare_and_swap_stage(&project.id, project.state_version, &target.id, entered_at)
            .await?;

        match swap {
            StageSwap::Committed(updated) => {
                info!(
                    project_id = %updated.id.0,
                    from_stage_id = project.current_stage_id.as_ref().map(|id| id.0.as_str()),
                    to_stage_id = %target.id.0,
                    actor_id,
                    bypass = request.bypass,
                    reason = %request.reason,
                    "stage transition committed"
                );
                Ok(updated)
            }
            StageSwap::Conflict => {
                Err(EngineError::Conflict { project_id: project.id.0.clone() })
            }
        }
    }
}
