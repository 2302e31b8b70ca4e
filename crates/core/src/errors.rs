use thiserror::Error;

/// Engine-level error taxonomy.
///
/// `NotFound`, `InvalidArgument` and `Unauthorized` are terminal. `Conflict`
/// is retryable after re-fetching and re-validating against fresh state.
/// `UpstreamUnavailable` fails the current evaluation closed. `AuditWriteFailed`
/// is surfaced alongside an otherwise-successful transition, never in place
/// of one.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("concurrent transition conflict for project {project_id}")]
    Conflict { project_id: String },
    #[error("upstream collaborator unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("audit write failed: {0}")]
    AuditWriteFailed(String),
}

impl EngineError {
    pub fn stage_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { kind: "stage", id: id.into() }
    }

    pub fn project_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { kind: "project", id: id.into() }
    }

    /// Whether the caller may retry after observing this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::UpstreamUnavailable(_))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "The requested stage or project does not exist.",
            Self::InvalidArgument(_) => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Unauthorized(_) => "You do not have permission to perform this action.",
            Self::Conflict { .. } => {
                "Another transition was applied first. Reload the project and retry."
            }
            Self::UpstreamUnavailable(_) => {
                "A required service is temporarily unavailable. Please retry shortly."
            }
            Self::AuditWriteFailed(_) => {
                "The transition succeeded but could not be audit-logged."
            }
        }
    }
}
