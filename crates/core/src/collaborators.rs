use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::project::{Project, ProjectId};
use crate::domain::stage::{OrganizationId, StageId};
use crate::errors::EngineError;

/// Transport-level failure at a collaborator boundary. The engine maps it
/// fail-closed: an unreachable collaborator is never treated as "passed".
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

impl From<CollaboratorError> for EngineError {
    fn from(value: CollaboratorError) -> Self {
        match value {
            CollaboratorError::Unavailable(message) => Self::UpstreamUnavailable(message),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApprovalState {
    pub pending: bool,
    pub resolved: bool,
}

/// Outcome of the project store's compare-and-swap write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageSwap {
    Committed(Project),
    Conflict,
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get(&self, id: &ProjectId) -> Result<Option<Project>, CollaboratorError>;

    /// Atomically move the project's stage pointer. The write must fail with
    /// `StageSwap::Conflict` when `expected_version` no longer matches, with
    /// no partial update.
    async fn compare_and_swap_stage(
        &self,
        id: &ProjectId,
        expected_version: u32,
        new_stage_id: &StageId,
        entered_at: DateTime<Utc>,
    ) -> Result<StageSwap, CollaboratorError>;
}

#[async_trait]
pub trait ApprovalService: Send + Sync {
    async fn approval_status(
        &self,
        project_id: &ProjectId,
        stage_id: &StageId,
    ) -> Result<ApprovalState, CollaboratorError>;

    async fn request_approvals(
        &self,
        project_id: &ProjectId,
        stage_id: &StageId,
        organization_id: &OrganizationId,
    ) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn has_document(
        &self,
        project_id: &ProjectId,
        document_kind: &str,
    ) -> Result<bool, CollaboratorError>;
}

#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn has_permission(
        &self,
        actor_id: &str,
        resource: &str,
        action: &str,
    ) -> Result<bool, CollaboratorError>;
}

fn unavailable(service: &str) -> CollaboratorError {
    CollaboratorError::Unavailable(format!("{service} is unreachable"))
}

#[derive(Default)]
pub struct InMemoryProjectStore {
    projects: Mutex<HashMap<String, Project>>,
    unavailable: bool,
}

impl InMemoryProjectStore {
    pub fn with_projects(projects: Vec<Project>) -> Self {
        Self {
            projects: Mutex::new(
                projects.into_iter().map(|project| (project.id.0.clone(), project)).collect(),
            ),
            unavailable: false,
        }
    }

    /// A store whose every call fails, for fail-closed tests.
    pub fn unavailable() -> Self {
        Self { projects: Mutex::new(HashMap::new()), unavailable: true }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Project>> {
        match self.projects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn get(&self, id: &ProjectId) -> Result<Option<Project>, CollaboratorError> {
        if self.unavailable {
            return Err(unavailable("project store"));
        }
        Ok(self.lock().get(&id.0).cloned())
    }

    async fn compare_and_swap_stage(
        &self,
        id: &ProjectId,
        expected_version: u32,
        new_stage_id: &StageId,
        entered_at: DateTime<Utc>,
    ) -> Result<StageSwap, CollaboratorError> {
        if self.unavailable {
            return Err(unavailable("project store"));
        }

        let mut projects = self.lock();
        let Some(project) = projects.get_mut(&id.0) else {
            // A project deleted underneath the caller is a lost race too.
            return Ok(StageSwap::Conflict);
        };

        if project.state_version != expected_version {
            return Ok(StageSwap::Conflict);
        }

        project.current_stage_id = Some(new_stage_id.clone());
        project.stage_entered_at = Some(entered_at);
        project.state_version += 1;
        project.updated_at = entered_at;

        Ok(StageSwap::Committed(project.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryApprovalService {
    resolved: Mutex<HashSet<(String, String)>>,
    requested: Mutex<Vec<(String, String)>>,
    unavailable: bool,
}

impl InMemoryApprovalService {
    pub fn with_resolved(pairs: Vec<(ProjectId, StageId)>) -> Self {
        Self {
            resolved: Mutex::new(pairs.into_iter().map(|(p, s)| (p.0, s.0)).collect()),
            requested: Mutex::new(Vec::new()),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            resolved: Mutex::new(HashSet::new()),
            requested: Mutex::new(Vec::new()),
            unavailable: true,
        }
    }

    /// Every `request_approvals` call observed, in order.
    pub fn requests(&self) -> Vec<(String, String)> {
        match self.requested.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn resolve(&self, project_id: &ProjectId, stage_id: &StageId) {
        match self.resolved.lock() {
            Ok(mut resolved) => {
                resolved.insert((project_id.0.clone(), stage_id.0.clone()));
            }
            Err(poisoned) => {
                poisoned.into_inner().insert((project_id.0.clone(), stage_id.0.clone()));
            }
        }
    }
}

#[async_trait]
impl ApprovalService for InMemoryApprovalService {
    async fn approval_status(
        &self,
        project_id: &ProjectId,
        stage_id: &StageId,
    ) -> Result<ApprovalState, CollaboratorError> {
        if self.unavailable {
            return Err(unavailable("approval service"));
        }

        let key = (project_id.0.clone(), stage_id.0.clone());
        let resolved = match self.resolved.lock() {
            Ok(resolved) => resolved.contains(&key),
            Err(poisoned) => poisoned.into_inner().contains(&key),
        };
        let pending = !resolved
            && match self.requested.lock() {
                Ok(requests) => requests.contains(&key),
                Err(poisoned) => poisoned.into_inner().contains(&key),
            };

        Ok(ApprovalState { pending, resolved })
    }

    async fn request_approvals(
        &self,
        project_id: &ProjectId,
        stage_id: &StageId,
        _organization_id: &OrganizationId,
    ) -> Result<(), CollaboratorError> {
        if self.unavailable {
            return Err(unavailable("approval service"));
        }

        match self.requested.lock() {
            Ok(mut requests) => requests.push((project_id.0.clone(), stage_id.0.clone())),
            Err(poisoned) => {
                poisoned.into_inner().push((project_id.0.clone(), stage_id.0.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDocumentIndex {
    documents: Mutex<HashSet<(String, String)>>,
    unavailable: bool,
}

impl InMemoryDocumentIndex {
    pub fn with_documents(entries: Vec<(ProjectId, String)>) -> Self {
        Self {
            documents: Mutex::new(entries.into_iter().map(|(p, kind)| (p.0, kind)).collect()),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self { documents: Mutex::new(HashSet::new()), unavailable: true }
    }

    pub fn attach(&self, project_id: &ProjectId, document_kind: impl Into<String>) {
        let entry = (project_id.0.clone(), document_kind.into());
        match self.documents.lock() {
            Ok(mut documents) => {
                documents.insert(entry);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(entry);
            }
        }
    }
}

#[async_trait]
impl DocumentIndex for InMemoryDocumentIndex {
    async fn has_document(
        &self,
        project_id: &ProjectId,
        document_kind: &str,
    ) -> Result<bool, CollaboratorError> {
        if self.unavailable {
            return Err(unavailable("document index"));
        }

        let key = (project_id.0.clone(), document_kind.to_string());
        let present = match self.documents.lock() {
            Ok(documents) => documents.contains(&key),
            Err(poisoned) => poisoned.into_inner().contains(&key),
        };
        Ok(present)
    }
}

#[derive(Default)]
pub struct InMemoryPermissionChecker {
    grants: HashSet<(String, String, String)>,
    unavailable: bool,
}

impl InMemoryPermissionChecker {
    pub fn with_grants(grants: Vec<(&str, &str, &str)>) -> Self {
        Self {
            grants: grants
                .into_iter()
                .map(|(actor, resource, action)| {
                    (actor.to_string(), resource.to_string(), action.to_string())
                })
                .collect(),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self { grants: HashSet::new(), unavailable: true }
    }
}

#[async_trait]
impl PermissionChecker for InMemoryPermissionChecker {
    async fn has_permission(
        &self,
        actor_id: &str,
        resource: &str,
        action: &str,
    ) -> Result<bool, CollaboratorError> {
        if self.unavailable {
            return Err(unavailable("permission service"));
        }

        Ok(self.grants.contains(&(
            actor_id.to_string(),
            resource.to_string(),
            action.to_string(),
        )))
    }
}
