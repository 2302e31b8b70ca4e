use std::sync::Mutex;

use async_trait::async_trait;

use crate::collaborators::CollaboratorError;
use crate::domain::stage::{OrganizationId, StageId, WorkflowStage};

/// Organization-scoped stage definitions, ordered by `order` ascending.
///
/// Lookups are always scoped to the caller's organization: an id that
/// resolves to another organization's stage yields `None`, never that stage.
#[async_trait]
pub trait StageCatalog: Send + Sync {
    async fn list_stages(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<WorkflowStage>, CollaboratorError>;

    async fn get_stage(
        &self,
        organization_id: &OrganizationId,
        id: &StageId,
    ) -> Result<Option<WorkflowStage>, CollaboratorError>;
}

#[derive(Default)]
pub struct InMemoryStageCatalog {
    stages: Mutex<Vec<WorkflowStage>>,
    unavailable: bool,
}

impl InMemoryStageCatalog {
    pub fn with_stages(stages: Vec<WorkflowStage>) -> Self {
        Self { stages: Mutex::new(stages), unavailable: false }
    }

    pub fn unavailable() -> Self {
        Self { stages: Mutex::new(Vec::new()), unavailable: true }
    }

    pub fn upsert(&self, stage: WorkflowStage) {
        let mut stages = match self.stages.lock() {
            Ok(stages) => stages,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(existing) = stages.iter_mut().find(|existing| existing.id == stage.id) {
            *existing = stage;
        } else {
            stages.push(stage);
        }
    }

    fn snapshot(&self) -> Vec<WorkflowStage> {
        match self.stages.lock() {
            Ok(stages) => stages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl StageCatalog for InMemoryStageCatalog {
    async fn list_stages(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<WorkflowStage>, CollaboratorError> {
        if self.unavailable {
            return Err(CollaboratorError::Unavailable("stage catalog is unreachable".to_string()));
        }

        let mut stages: Vec<WorkflowStage> = self
            .snapshot()
            .into_iter()
            .filter(|stage| &stage.organization_id == organization_id)
            .collect();
        stages.sort_by_key(|stage| stage.order);
        Ok(stages)
    }

    async fn get_stage(
        &self,
        organization_id: &OrganizationId,
        id: &StageId,
    ) -> Result<Option<WorkflowStage>, CollaboratorError> {
        if self.unavailable {
            return Err(CollaboratorError::Unavailable("stage catalog is unreachable".to_string()));
        }

        Ok(self
            .snapshot()
            .into_iter()
            .find(|stage| &stage.id == id && &stage.organization_id == organization_id))
    }
}
