use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::collaborators::PermissionChecker;
use crate::domain::project::Project;
use crate::domain::stage::WorkflowStage;
use crate::errors::EngineError;
use crate::validator::BypassPolicy;

/// A granted bypass. Licenses the executor to proceed despite a failed
/// validation; it does not itself move the project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BypassAuthorization {
    pub actor_id: String,
    pub justification: String,
    pub granted_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct BypassAuthority {
    permissions: Arc<dyn PermissionChecker>,
    policy: BypassPolicy,
}

impl BypassAuthority {
    pub fn new(permissions: Arc<dyn PermissionChecker>, policy: BypassPolicy) -> Self {
        Self { permissions, policy }
    }

    /// The justification is checked before the permission: an empty
    /// justification is never authorized, whatever the actor holds.
    pub async fn authorize(
        &self,
        actor_id: &str,
        project: &Project,
        target: &WorkflowStage,
        justification: &str,
    ) -> Result<BypassAuthorization, EngineError> {
        let justification = justification.trim();
        if justification.is_empty() {
            return Err(EngineError::InvalidArgument(
                "bypass justification must not be empty".to_string(),
            ));
        }

        let allowed = self
            .permissions
            .has_permission(actor_id, &self.policy.resource, &self.policy.action)
            .await?;
        if !allowed {
            return Err(EngineError::Unauthorized(format!(
                "actor `{actor_id}` lacks `{}:{}`",
                self.policy.resource, self.policy.action
            )));
        }

        warn!(
            project_id = %project.id.0,
            stage_id = %target.id.0,
            actor_id,
            justification,
            "bypass authorized"
        );

        Ok(BypassAuthorization {
            actor_id: actor_id.to_string(),
            justification: justification.to_string(),
            granted_at: Utc::now(),
        })
    }
}
