use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::project::ProjectId;
use crate::domain::stage::StageId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionRecordId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    Completed,
    Bypassed,
    Rejected,
}

impl TransitionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Bypassed => "bypassed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "completed" => Some(Self::Completed),
            "bypassed" => Some(Self::Bypassed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Append-only audit row for one transition attempt. Once written, never
/// mutated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub id: TransitionRecordId,
    pub project_id: ProjectId,
    pub from_stage_id: Option<StageId>,
    pub to_stage_id: StageId,
    pub actor_id: String,
    pub outcome: TransitionOutcome,
    pub reason: String,
    pub bypass_justification: Option<String>,
    /// Serialized snapshot of the checks evaluated for this attempt.
    pub decision_context_json: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TransitionRecord {
    pub fn new(
        project_id: ProjectId,
        from_stage_id: Option<StageId>,
        to_stage_id: StageId,
        actor_id: impl Into<String>,
        outcome: TransitionOutcome,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: TransitionRecordId(Uuid::new_v4().to_string()),
            project_id,
            from_stage_id,
            to_stage_id,
            actor_id: actor_id.into(),
            outcome,
            reason: reason.into(),
            bypass_justification: None,
            decision_context_json: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.bypass_justification = Some(justification.into());
        self
    }

    pub fn with_decision_context(mut self, context_json: impl Into<String>) -> Self {
        self.decision_context_json = Some(context_json.into());
        self
    }
}
