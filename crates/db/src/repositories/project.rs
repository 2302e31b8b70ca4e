use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use stagegate_core::collaborators::{CollaboratorError, StageSwap};
use stagegate_core::domain::project::{Priority, Project, ProjectId};
use stagegate_core::domain::stage::{OrganizationId, StageId};
use stagegate_core::ProjectStore;

use super::stage::parse_timestamp;
use super::{decode, unavailable, RepositoryError};
use crate::DbPool;

pub struct SqlProjectStore {
    pool: DbPool,
}

impl SqlProjectStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, project: &Project) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO project (id, organization_id, name, current_stage_id, stage_entered_at,
                                  owner, priority, estimated_value, state_version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 owner = excluded.owner,
                 priority = excluded.priority,
                 estimated_value = excluded.estimated_value,
                 updated_at = excluded.updated_at",
        )
        .bind(&project.id.0)
        .bind(&project.organization_id.0)
        .bind(&project.name)
        .bind(project.current_stage_id.as_ref().map(|id| id.0.clone()))
        .bind(project.stage_entered_at.map(|at| at.to_rfc3339()))
        .bind(&project.owner)
        .bind(project.priority.map(|priority| priority.as_str()))
        .bind(project.estimated_value.map(|value| value.to_string()))
        .bind(project.state_version)
        .bind(project.created_at.to_rfc3339())
        .bind(project.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: &ProjectId) -> Result<Option<Project>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, organization_id, name, current_stage_id, stage_entered_at, owner,
                    priority, estimated_value, state_version, created_at, updated_at
             FROM project WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_project(row)?)),
            None => Ok(None),
        }
    }

    /// Version-guarded stage move. The UPDATE carries the expected version in
    /// its WHERE clause, so a concurrent commit makes this a zero-row write.
    pub async fn swap_stage(
        &self,
        id: &ProjectId,
        expected_version: u32,
        new_stage_id: &StageId,
        entered_at: DateTime<Utc>,
    ) -> Result<StageSwap, RepositoryError> {
        let result = sqlx::query(
            "UPDATE project
             SET current_stage_id = ?, stage_entered_at = ?, state_version = state_version + 1,
                 updated_at = ?
             WHERE id = ? AND state_version = ?",
        )
        .bind(&new_stage_id.0)
        .bind(entered_at.to_rfc3339())
        .bind(entered_at.to_rfc3339())
        .bind(&id.0)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(StageSwap::Conflict);
        }

        match self.find_by_id(id).await? {
            Some(updated) => Ok(StageSwap::Committed(updated)),
            None => Ok(StageSwap::Conflict),
        }
    }
}

fn row_to_project(row: &sqlx::sqlite::SqliteRow) -> Result<Project, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let organization_id: String = row.try_get("organization_id").map_err(decode)?;
    let name: String = row.try_get("name").map_err(decode)?;
    let current_stage_id: Option<String> = row.try_get("current_stage_id").map_err(decode)?;
    let stage_entered_at: Option<String> = row.try_get("stage_entered_at").map_err(decode)?;
    let owner: Option<String> = row.try_get("owner").map_err(decode)?;
    let priority_raw: Option<String> = row.try_get("priority").map_err(decode)?;
    let estimated_value_raw: Option<String> = row.try_get("estimated_value").map_err(decode)?;
    let state_version: u32 = row.try_get("state_version").map_err(decode)?;
    let created_at_raw: String = row.try_get("created_at").map_err(decode)?;
    let updated_at_raw: String = row.try_get("updated_at").map_err(decode)?;

    let priority = match priority_raw {
        Some(raw) => Some(
            Priority::parse(&raw)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown priority `{raw}`")))?,
        ),
        None => None,
    };
    let estimated_value = match estimated_value_raw {
        Some(raw) => Some(raw.parse::<Decimal>().map_err(decode)?),
        None => None,
    };

    Ok(Project {
        id: ProjectId(id),
        organization_id: OrganizationId(organization_id),
        name,
        current_stage_id: current_stage_id.map(StageId),
        stage_entered_at: stage_entered_at.as_deref().map(parse_timestamp),
        owner,
        priority,
        estimated_value,
        state_version,
        created_at: parse_timestamp(&created_at_raw),
        updated_at: parse_timestamp(&updated_at_raw),
    })
}

#[async_trait::async_trait]
impl ProjectStore for SqlProjectStore {
    async fn get(&self, id: &ProjectId) -> Result<Option<Project>, CollaboratorError> {
        self.find_by_id(id).await.map_err(unavailable)
    }

    async fn compare_and_swap_stage(
        &self,
        id: &ProjectId,
        expected_version: u32,
        new_stage_id: &StageId,
        entered_at: DateTime<Utc>,
    ) -> Result<StageSwap, CollaboratorError> {
        self.swap_stage(id, expected_version, new_stage_id, entered_at)
            .await
            .map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use stagegate_core::collaborators::StageSwap;
    use stagegate_core::domain::project::{Priority, Project, ProjectId};
    use stagegate_core::domain::stage::{OrganizationId, StageId, WorkflowStage};

    use super::SqlProjectStore;
    use crate::repositories::SqlStageCatalog;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    /// Insert referenced stages so that FK constraints are satisfied.
    async fn insert_stages(pool: &sqlx::SqlitePool) {
        let catalog = SqlStageCatalog::new(pool.clone());
        for (name, order) in [("Inquiry", 1_u32), ("Technical Review", 2), ("Quoted", 3)] {
            catalog
                .save(&WorkflowStage {
                    id: StageId(format!("stage-{order}")),
                    organization_id: OrganizationId("org-1".to_string()),
                    name: name.to_string(),
                    order,
                    is_active: true,
                    requires_approval: false,
                    approval_roles: Vec::new(),
                    responsible_roles: Vec::new(),
                    estimated_duration_days: None,
                    exit_criteria: None,
                })
                .await
                .expect("insert stage");
        }
    }

    fn sample_project(id: &str) -> Project {
        let now = Utc::now();
        Project {
            id: ProjectId(id.to_string()),
            organization_id: OrganizationId("org-1".to_string()),
            name: "Bracket order".to_string(),
            current_stage_id: Some(StageId("stage-1".to_string())),
            stage_entered_at: Some(now),
            owner: Some("u-planner".to_string()),
            priority: Some(Priority::High),
            estimated_value: Some(Decimal::new(125_000, 2)),
            state_version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trips_business_fields() {
        let pool = setup().await;
        insert_stages(&pool).await;
        let store = SqlProjectStore::new(pool);
        let project = sample_project("proj-1");

        store.save(&project).await.expect("save");
        let found = store
            .find_by_id(&ProjectId("proj-1".to_string()))
            .await
            .expect("find")
            .expect("exists");

        assert_eq!(found.name, project.name);
        assert_eq!(found.owner, project.owner);
        assert_eq!(found.priority, Some(Priority::High));
        assert_eq!(found.estimated_value, Some(Decimal::new(125_000, 2)));
        assert_eq!(found.state_version, 1);
    }

    #[tokio::test]
    async fn swap_stage_commits_and_bumps_the_version() {
        let pool = setup().await;
        insert_stages(&pool).await;
        let store = SqlProjectStore::new(pool);
        store.save(&sample_project("proj-1")).await.expect("save");

        let swap = store
            .swap_stage(
                &ProjectId("proj-1".to_string()),
                1,
                &StageId("stage-2".to_string()),
                Utc::now(),
            )
            .await
            .expect("swap");

        match swap {
            StageSwap::Committed(updated) => {
                assert_eq!(
                    updated.current_stage_id.as_ref().map(|id| id.0.as_str()),
                    Some("stage-2")
                );
                assert_eq!(updated.state_version, 2);
            }
            StageSwap::Conflict => panic!("matching version must commit"),
        }
    }

    #[tokio::test]
    async fn concurrent_swaps_against_the_same_version_race_to_one_winner() {
        let pool = setup().await;
        insert_stages(&pool).await;
        let store = SqlProjectStore::new(pool);
        store.save(&sample_project("proj-1")).await.expect("save");
        let id = ProjectId("proj-1".to_string());

        let first = store
            .swap_stage(&id, 1, &StageId("stage-2".to_string()), Utc::now())
            .await
            .expect("first swap");
        let second = store
            .swap_stage(&id, 1, &StageId("stage-3".to_string()), Utc::now())
            .await
            .expect("second swap");

        assert!(matches!(first, StageSwap::Committed(_)));
        assert_eq!(second, StageSwap::Conflict);

        let stored = store.find_by_id(&id).await.expect("find").expect("exists");
        assert_eq!(stored.current_stage_id.as_ref().map(|id| id.0.as_str()), Some("stage-2"));
    }

    #[tokio::test]
    async fn swap_stage_on_missing_project_is_a_conflict() {
        let pool = setup().await;
        insert_stages(&pool).await;
        let store = SqlProjectStore::new(pool);

        let swap = store
            .swap_stage(
                &ProjectId("proj-404".to_string()),
                1,
                &StageId("stage-2".to_string()),
                Utc::now(),
            )
            .await
            .expect("swap");

        assert_eq!(swap, StageSwap::Conflict);
    }

    #[tokio::test]
    async fn save_upsert_does_not_reset_the_stage_pointer() {
        let pool = setup().await;
        insert_stages(&pool).await;
        let store = SqlProjectStore::new(pool);
        let project = sample_project("proj-1");
        store.save(&project).await.expect("save");

        store
            .swap_stage(
                &ProjectId("proj-1".to_string()),
                1,
                &StageId("stage-2".to_string()),
                Utc::now(),
            )
            .await
            .expect("swap");

        // Re-saving stale business fields must not touch executor-owned columns.
        let mut stale = project.clone();
        stale.owner = Some("u-new-owner".to_string());
        store.save(&stale).await.expect("upsert");

        let stored = store
            .find_by_id(&ProjectId("proj-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stored.owner.as_deref(), Some("u-new-owner"));
        assert_eq!(stored.current_stage_id.as_ref().map(|id| id.0.as_str()), Some("stage-2"));
        assert_eq!(stored.state_version, 2);
    }
}
