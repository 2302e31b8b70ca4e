use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use stagegate_core::collaborators::{ApprovalState, CollaboratorError};
use stagegate_core::domain::project::ProjectId;
use stagegate_core::domain::stage::{OrganizationId, StageId};
use stagegate_core::ApprovalService;

use super::{decode, unavailable, RepositoryError};
use crate::DbPool;

/// SQLite-backed approval assignment service.
///
/// One assignment row per (project, stage, approver role). Requests are
/// idempotent via the unique key, so re-requesting never duplicates rows or
/// resets decisions already taken.
pub struct SqlApprovalService {
    pool: DbPool,
}

impl SqlApprovalService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn request(
        &self,
        project_id: &ProjectId,
        stage_id: &StageId,
        organization_id: &OrganizationId,
    ) -> Result<(), RepositoryError> {
        let roles = self.approver_roles(stage_id, organization_id).await?;
        let now = Utc::now().to_rfc3339();

        for role in roles {
            sqlx::query(
                "INSERT INTO approval_assignment (id, project_id, stage_id, organization_id,
                                                  approver_role, status, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)
                 ON CONFLICT(project_id, stage_id, approver_role) DO NOTHING",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&project_id.0)
            .bind(&stage_id.0)
            .bind(&organization_id.0)
            .bind(&role)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    pub async fn status(
        &self,
        project_id: &ProjectId,
        stage_id: &StageId,
    ) -> Result<ApprovalState, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT status FROM approval_assignment WHERE project_id = ? AND stage_id = ?",
        )
        .bind(&project_id.0)
        .bind(&stage_id.0)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(ApprovalState { pending: false, resolved: false });
        }

        let mut pending = false;
        let mut all_approved = true;
        for row in &rows {
            let status: String = row.try_get("status").map_err(decode)?;
            match status.as_str() {
                "pending" => {
                    pending = true;
                    all_approved = false;
                }
                "approved" => {}
                _ => all_approved = false,
            }
        }

        Ok(ApprovalState { pending, resolved: all_approved })
    }

    /// Record a decision for one approver role.
    pub async fn decide(
        &self,
        project_id: &ProjectId,
        stage_id: &StageId,
        approver_role: &str,
        approved: bool,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE approval_assignment
             SET status = ?, updated_at = ?
             WHERE project_id = ? AND stage_id = ? AND approver_role = ?",
        )
        .bind(if approved { "approved" } else { "rejected" })
        .bind(Utc::now().to_rfc3339())
        .bind(&project_id.0)
        .bind(&stage_id.0)
        .bind(approver_role)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn approver_roles(
        &self,
        stage_id: &StageId,
        organization_id: &OrganizationId,
    ) -> Result<Vec<String>, RepositoryError> {
        let row = sqlx::query(
            "SELECT approval_roles FROM workflow_stage WHERE id = ? AND organization_id = ?",
        )
        .bind(&stage_id.0)
        .bind(&organization_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(RepositoryError::Decode(format!(
                "stage `{}` not found in organization `{}`",
                stage_id.0, organization_id.0
            )));
        };

        let raw: String = row.try_get("approval_roles").map_err(decode)?;
        let roles: Vec<String> = serde_json::from_str(&raw).map_err(decode)?;

        // A gated stage with no configured roles still needs one decision.
        if roles.is_empty() {
            return Ok(vec!["approver".to_string()]);
        }
        Ok(roles)
    }
}

#[async_trait::async_trait]
impl ApprovalService for SqlApprovalService {
    async fn approval_status(
        &self,
        project_id: &ProjectId,
        stage_id: &StageId,
    ) -> Result<ApprovalState, CollaboratorError> {
        self.status(project_id, stage_id).await.map_err(unavailable)
    }

    async fn request_approvals(
        &self,
        project_id: &ProjectId,
        stage_id: &StageId,
        organization_id: &OrganizationId,
    ) -> Result<(), CollaboratorError> {
        self.request(project_id, stage_id, organization_id).await.map_err(unavailable)
    }
}
