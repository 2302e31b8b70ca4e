use thiserror::Error;

use stagegate_core::collaborators::CollaboratorError;

pub mod approval;
pub mod document;
pub mod history;
pub mod project;
pub mod stage;

pub use approval::SqlApprovalService;
pub use document::SqlDocumentIndex;
pub use history::SqlTransitionLog;
pub use project::SqlProjectStore;
pub use stage::SqlStageCatalog;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Collapse storage failures to the engine's transport error; the engine
/// treats them fail-closed.
pub(crate) fn unavailable(error: RepositoryError) -> CollaboratorError {
    CollaboratorError::Unavailable(error.to_string())
}

pub(crate) fn decode(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}
