use chrono::Utc;
use uuid::Uuid;

use stagegate_core::collaborators::CollaboratorError;
use stagegate_core::domain::project::ProjectId;
use stagegate_core::DocumentIndex;

use super::{unavailable, RepositoryError};
use crate::DbPool;

/// Read-mostly index over attached project documents, consumed by the
/// `documents` and `stage_specific` prerequisite categories.
pub struct SqlDocumentIndex {
    pool: DbPool,
}

impl SqlDocumentIndex {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn attach(
        &self,
        project_id: &ProjectId,
        document_kind: &str,
        file_name: Option<&str>,
        uploaded_by: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO project_document (id, project_id, document_kind, file_name, uploaded_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&project_id.0)
        .bind(document_kind)
        .bind(file_name)
        .bind(uploaded_by)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count(
        &self,
        project_id: &ProjectId,
        document_kind: &str,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM project_document WHERE project_id = ? AND document_kind = ?",
        )
        .bind(&project_id.0)
        .bind(document_kind)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[async_trait::async_trait]
impl DocumentIndex for SqlDocumentIndex {
    async fn has_document(
        &self,
        project_id: &ProjectId,
        document_kind: &str,
    ) -> Result<bool, CollaboratorError> {
        let count = self.count(project_id, document_kind).await.map_err(unavailable)?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use stagegate_core::domain::project::{Project, ProjectId};
    use stagegate_core::DocumentIndex;

    use super::SqlDocumentIndex;
    use crate::repositories::SqlProjectStore;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let now = Utc::now();
        SqlProjectStore::new(pool.clone())
            .save(&Project {
                id: ProjectId("proj-1".to_string()),
                organization_id: stagegate_core::OrganizationId("org-1".to_string()),
                name: "Bracket order".to_string(),
                current_stage_id: None,
                stage_entered_at: None,
                owner: None,
                priority: None,
                estimated_value: None,
                state_version: 1,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("insert project");

        pool
    }

    #[tokio::test]
    async fn presence_check_reflects_attached_documents() {
        let pool = setup().await;
        let index = SqlDocumentIndex::new(pool);
        let project_id = ProjectId("proj-1".to_string());

        assert!(!index.has_document(&project_id, "technical_drawing").await.expect("check"));

        index
            .attach(&project_id, "technical_drawing", Some("bracket-rev3.pdf"), Some("u-planner"))
            .await
            .expect("attach");

        assert!(index.has_document(&project_id, "technical_drawing").await.expect("check"));
        assert!(!index.has_document(&project_id, "supplier_quote").await.expect("check"));
    }

    #[tokio::test]
    async fn multiple_documents_of_one_kind_are_counted() {
        let pool = setup().await;
        let index = SqlDocumentIndex::new(pool);
        let project_id = ProjectId("proj-1".to_string());

        index.attach(&project_id, "supplier_quote", None, None).await.expect("attach");
        index.attach(&project_id, "supplier_quote", None, None).await.expect("attach");

        assert_eq!(index.count(&project_id, "supplier_quote").await.expect("count"), 2);
    }
}
