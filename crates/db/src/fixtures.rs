use chrono::Utc;
use rust_decimal::Decimal;

use stagegate_core::domain::project::{Priority, Project, ProjectId};
use stagegate_core::domain::stage::{OrganizationId, StageId, WorkflowStage};

use crate::repositories::{RepositoryError, SqlDocumentIndex, SqlProjectStore, SqlStageCatalog};
use crate::DbPool;

/// Deterministic seed for local development and end-to-end tests: the
/// eight-stage reference pipeline plus one demo project sitting at Inquiry
/// with its technical drawing already attached.
pub struct ReferencePipelineSeed;

pub struct SeedResult {
    pub organization_id: OrganizationId,
    pub stage_ids: Vec<StageId>,
    pub project_id: ProjectId,
}

const SEED_ORGANIZATION: &str = "org-demo";
const SEED_PROJECT: &str = "proj-demo-0001";

const SEED_STAGES: &[(&str, &str, u32, bool)] = &[
    // (id slug, display name, order, requires_approval)
    ("inquiry", "Inquiry", 1, false),
    ("technical-review", "Technical Review", 2, false),
    ("supplier-rfq", "Supplier RFQ", 3, false),
    ("quoted", "Quoted", 4, false),
    ("order-confirmed", "Order Confirmed", 5, true),
    ("procurement", "Procurement", 6, false),
    ("production", "Production", 7, false),
    ("shipped", "Shipped", 8, false),
];

impl ReferencePipelineSeed {
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let organization_id = OrganizationId(SEED_ORGANIZATION.to_string());
        let catalog = SqlStageCatalog::new(pool.clone());

        let mut stage_ids = Vec::with_capacity(SEED_STAGES.len());
        for (slug, name, order, requires_approval) in SEED_STAGES {
            let id = StageId(format!("{SEED_ORGANIZATION}-{slug}"));
            catalog
                .save(&WorkflowStage {
                    id: id.clone(),
                    organization_id: organization_id.clone(),
                    name: (*name).to_string(),
                    order: *order,
                    is_active: true,
                    requires_approval: *requires_approval,
                    approval_roles: if *requires_approval {
                        vec!["sales_manager".to_string()]
                    } else {
                        Vec::new()
                    },
                    responsible_roles: vec!["project_engineer".to_string()],
                    estimated_duration_days: Some(5),
                    exit_criteria: None,
                })
                .await?;
            stage_ids.push(id);
        }

        let now = Utc::now();
        let project_id = ProjectId(SEED_PROJECT.to_string());
        SqlProjectStore::new(pool.clone())
            .save(&Project {
                id: project_id.clone(),
                organization_id: organization_id.clone(),
                name: "Hydraulic manifold production run".to_string(),
                current_stage_id: Some(stage_ids[0].clone()),
                stage_entered_at: Some(now),
                owner: Some("u-demo-planner".to_string()),
                priority: Some(Priority::Normal),
                estimated_value: Some(Decimal::new(4_250_000, 2)),
                state_version: 1,
                created_at: now,
                updated_at: now,
            })
            .await?;

        SqlDocumentIndex::new(pool.clone())
            .attach(
                &project_id,
                "technical_drawing",
                Some("manifold-rev2.pdf"),
                Some("u-demo-planner"),
            )
            .await?;

        Ok(SeedResult { organization_id, stage_ids, project_id })
    }
}

#[cfg(test)]
mod tests {
    use stagegate_core::StageCatalog;

    use super::ReferencePipelineSeed;
    use crate::repositories::{SqlProjectStore, SqlStageCatalog};
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_creates_the_full_pipeline_and_demo_project() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let seeded = ReferencePipelineSeed::load(&pool).await.expect("seed");

        let stages = SqlStageCatalog::new(pool.clone())
            .list_stages(&seeded.organization_id)
            .await
            .expect("list");
        assert_eq!(stages.len(), 8);
        assert_eq!(stages.first().map(|stage| stage.name.as_str()), Some("Inquiry"));
        assert_eq!(stages.last().map(|stage| stage.name.as_str()), Some("Shipped"));
        assert!(stages.iter().any(|stage| stage.requires_approval));

        let project = SqlProjectStore::new(pool)
            .find_by_id(&seeded.project_id)
            .await
            .expect("find")
            .expect("demo project exists");
        assert_eq!(project.current_stage_id.as_ref(), Some(&seeded.stage_ids[0]));
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        ReferencePipelineSeed::load(&pool).await.expect("first");
        let seeded = ReferencePipelineSeed::load(&pool).await.expect("second");

        let stages = SqlStageCatalog::new(pool)
            .list_stages(&seeded.organization_id)
            .await
            .expect("list");
        assert_eq!(stages.len(), 8);
    }
}
