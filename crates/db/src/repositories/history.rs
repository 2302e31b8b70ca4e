use sqlx::Row;

use stagegate_core::collaborators::CollaboratorError;
use stagegate_core::domain::project::ProjectId;
use stagegate_core::domain::stage::StageId;
use stagegate_core::domain::transition::{
    TransitionOutcome, TransitionRecord, TransitionRecordId,
};
use stagegate_core::TransitionLog;

use super::stage::parse_timestamp;
use super::{decode, unavailable, RepositoryError};
use crate::DbPool;

/// Append-only store for the transition audit trail. Inserts only; there is
/// no update or delete path.
pub struct SqlTransitionLog {
    pool: DbPool,
}

impl SqlTransitionLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, record: &TransitionRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO stage_transition (id, project_id, from_stage_id, to_stage_id, actor_id,
                                           outcome, reason, bypass_justification, decision_context,
                                           occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id.0)
        .bind(&record.project_id.0)
        .bind(record.from_stage_id.as_ref().map(|id| id.0.clone()))
        .bind(&record.to_stage_id.0)
        .bind(&record.actor_id)
        .bind(record.outcome.as_str())
        .bind(&record.reason)
        .bind(&record.bypass_justification)
        .bind(&record.decision_context_json)
        .bind(record.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<TransitionRecord>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, project_id, from_stage_id, to_stage_id, actor_id, outcome, reason,
                    bypass_justification, decision_context, occurred_at
             FROM stage_transition WHERE project_id = ? ORDER BY occurred_at ASC, id ASC",
        )
        .bind(&project_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<TransitionRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let project_id: String = row.try_get("project_id").map_err(decode)?;
    let from_stage_id: Option<String> = row.try_get("from_stage_id").map_err(decode)?;
    let to_stage_id: String = row.try_get("to_stage_id").map_err(decode)?;
    let actor_id: String = row.try_get("actor_id").map_err(decode)?;
    let outcome_raw: String = row.try_get("outcome").map_err(decode)?;
    let reason: String = row.try_get("reason").map_err(decode)?;
    let bypass_justification: Option<String> =
        row.try_get("bypass_justification").map_err(decode)?;
    let decision_context_json: Option<String> =
        row.try_get("decision_context").map_err(decode)?;
    let occurred_at_raw: String = row.try_get("occurred_at").map_err(decode)?;

    let outcome = TransitionOutcome::parse(&outcome_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown outcome `{outcome_raw}`")))?;

    Ok(TransitionRecord {
        id: TransitionRecordId(id),
        project_id: ProjectId(project_id),
        from_stage_id: from_stage_id.map(StageId),
        to_stage_id: StageId(to_stage_id),
        actor_id,
        outcome,
        reason,
        bypass_justification,
        decision_context_json,
        occurred_at: parse_timestamp(&occurred_at_raw),
    })
}

#[async_trait::async_trait]
impl TransitionLog for SqlTransitionLog {
    async fn append(&self, record: TransitionRecord) -> Result<(), CollaboratorError> {
        self.insert(&record).await.map_err(unavailable)
    }

    async fn list_for_project(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<TransitionRecord>, CollaboratorError> {
        self.list(project_id).await.map_err(unavailable)
    }
}
