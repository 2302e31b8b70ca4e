use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageId(pub String);

impl StageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationId(pub String);

/// One ordered step in an organization's pipeline.
///
/// `order` is strictly increasing and unique within the organization; it
/// defines the total pipeline order. Stages referenced by history are never
/// deleted, only deactivated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStage {
    pub id: StageId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub order: u32,
    pub is_active: bool,
    pub requires_approval: bool,
    pub approval_roles: Vec<String>,
    pub responsible_roles: Vec<String>,
    pub estimated_duration_days: Option<u32>,
    /// Human-readable description only. Machine evaluation comes from the
    /// prerequisite rule set keyed by stage, not from this text.
    pub exit_criteria: Option<String>,
}

impl WorkflowStage {
    pub fn is_forward_of(&self, other: &WorkflowStage) -> bool {
        self.order > other.order
    }

    pub fn is_backward_of(&self, other: &WorkflowStage) -> bool {
        self.order < other.order
    }
}
