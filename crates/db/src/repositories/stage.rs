use chrono::{DateTime, Utc};
use sqlx::Row;

use stagegate_core::collaborators::CollaboratorError;
use stagegate_core::domain::stage::{OrganizationId, StageId, WorkflowStage};
use stagegate_core::StageCatalog;

use super::{decode, unavailable, RepositoryError};
use crate::DbPool;

pub struct SqlStageCatalog {
    pool: DbPool,
}

impl SqlStageCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, stage: &WorkflowStage) -> Result<(), RepositoryError> {
        let approval_roles = serde_json::to_string(&stage.approval_roles).map_err(decode)?;
        let responsible_roles = serde_json::to_string(&stage.responsible_roles).map_err(decode)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO workflow_stage (id, organization_id, name, stage_order, is_active,
                                         requires_approval, approval_roles, responsible_roles,
                                         estimated_duration_days, exit_criteria, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 is_active = excluded.is_active,
                 requires_approval = excluded.requires_approval,
                 approval_roles = excluded.approval_roles,
                 responsible_roles = excluded.responsible_roles,
                 estimated_duration_days = excluded.estimated_duration_days,
                 exit_criteria = excluded.exit_criteria,
                 updated_at = excluded.updated_at",
        )
        .bind(&stage.id.0)
        .bind(&stage.organization_id.0)
        .bind(&stage.name)
        .bind(stage.order)
        .bind(stage.is_active)
        .bind(stage.requires_approval)
        .bind(&approval_roles)
        .bind(&responsible_roles)
        .bind(stage.estimated_duration_days)
        .bind(&stage.exit_criteria)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(
        &self,
        organization_id: &OrganizationId,
        id: &StageId,
    ) -> Result<Option<WorkflowStage>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, organization_id, name, stage_order, is_active, requires_approval,
                    approval_roles, responsible_roles, estimated_duration_days, exit_criteria
             FROM workflow_stage WHERE id = ? AND organization_id = ?",
        )
        .bind(&id.0)
        .bind(&organization_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_stage(row)?)),
            None => Ok(None),
        }
    }

    pub async fn list(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<WorkflowStage>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, organization_id, name, stage_order, is_active, requires_approval,
                    approval_roles, responsible_roles, estimated_duration_days, exit_criteria
             FROM workflow_stage WHERE organization_id = ? ORDER BY stage_order ASC",
        )
        .bind(&organization_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_stage).collect()
    }
}

fn row_to_stage(row: &sqlx::sqlite::SqliteRow) -> Result<WorkflowStage, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let organization_id: String = row.try_get("organization_id").map_err(decode)?;
    let name: String = row.try_get("name").map_err(decode)?;
    let order: u32 = row.try_get("stage_order").map_err(decode)?;
    let is_active: bool = row.try_get("is_active").map_err(decode)?;
    let requires_approval: bool = row.try_get("requires_approval").map_err(decode)?;
    let approval_roles_raw: String = row.try_get("approval_roles").map_err(decode)?;
    let responsible_roles_raw: String = row.try_get("responsible_roles").map_err(decode)?;
    let estimated_duration_days: Option<u32> =
        row.try_get("estimated_duration_days").map_err(decode)?;
    let exit_criteria: Option<String> = row.try_get("exit_criteria").map_err(decode)?;

    let approval_roles: Vec<String> = serde_json::from_str(&approval_roles_raw).map_err(decode)?;
    let responsible_roles: Vec<String> =
        serde_json::from_str(&responsible_roles_raw).map_err(decode)?;

    Ok(WorkflowStage {
        id: StageId(id),
        organization_id: OrganizationId(organization_id),
        name,
        order,
        is_active,
        requires_approval,
        approval_roles,
        responsible_roles,
        estimated_duration_days,
        exit_criteria,
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait::async_trait]
impl StageCatalog for SqlStageCatalog {
    async fn list_stages(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<WorkflowStage>, CollaboratorError> {
        self.list(organization_id).await.map_err(unavailable)
    }

    async fn get_stage(
        &self,
        organization_id: &OrganizationId,
        id: &StageId,
    ) -> Result<Option<WorkflowStage>, CollaboratorError> {
        self.find_by_id(organization_id, id).await.map_err(unavailable)
    }
}
