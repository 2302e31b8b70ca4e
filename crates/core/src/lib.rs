pub mod approval_gate;
pub mod auto_advance;
pub mod bypass;
pub mod catalog;
pub mod collaborators;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod history;
pub mod logging;
pub mod prerequisites;
pub mod rules;
pub mod validator;

pub use approval_gate::ApprovalGate;
pub use auto_advance::{AutoAdvanceDecision, AutoAdvanceEngine};
pub use bypass::{BypassAuthority, BypassAuthorization};
pub use catalog::{InMemoryStageCatalog, StageCatalog};
pub use collaborators::{
    ApprovalService, ApprovalState, CollaboratorError, DocumentIndex, InMemoryApprovalService,
    InMemoryDocumentIndex, InMemoryPermissionChecker, InMemoryProjectStore, PermissionChecker,
    ProjectStore, StageSwap,
};
pub use domain::check::{CheckCategory, CheckStatus, PrerequisiteCheck};
pub use domain::project::{Priority, Project, ProjectId};
pub use domain::stage::{OrganizationId, StageId, WorkflowStage};
pub use domain::transition::{TransitionOutcome, TransitionRecord, TransitionRecordId};
pub use engine::{TransitionAttempt, TransitionReport, TransitionRequest, WorkflowEngine};
pub use errors::EngineError;
pub use executor::{ExecutionRequest, TransitionExecutor};
pub use history::{HistoryRecorder, InMemoryTransitionLog, TransitionLog};
pub use prerequisites::{CheckReport, PrerequisiteChecker};
pub use rules::{PrerequisiteRule, ProjectField, RuleKind, RuleSet};
pub use validator::{BypassPolicy, TransitionValidator, ValidationResult};
