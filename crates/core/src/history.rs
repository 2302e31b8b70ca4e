use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::warn;

use crate::collaborators::CollaboratorError;
use crate::domain::project::ProjectId;
use crate::domain::transition::{TransitionOutcome, TransitionRecord};
use crate::errors::EngineError;

/// Append-only storage for transition records. There is deliberately no
/// update or delete operation on this boundary.
#[async_trait]
pub trait TransitionLog: Send + Sync {
    async fn append(&self, record: TransitionRecord) -> Result<(), CollaboratorError>;

    async fn list_for_project(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<TransitionRecord>, CollaboratorError>;
}

#[derive(Default)]
pub struct InMemoryTransitionLog {
    records: Mutex<Vec<TransitionRecord>>,
    failures_remaining: Mutex<u32>,
}

impl InMemoryTransitionLog {
    /// A log whose next `count` appends fail, for audit-retry tests.
    pub fn failing_next(count: u32) -> Self {
        Self { records: Mutex::new(Vec::new()), failures_remaining: Mutex::new(count) }
    }

    pub fn records(&self) -> Vec<TransitionRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl TransitionLog for InMemoryTransitionLog {
    async fn append(&self, record: TransitionRecord) -> Result<(), CollaboratorError> {
        {
            let mut failures = match self.failures_remaining.lock() {
                Ok(failures) => failures,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *failures > 0 {
                *failures -= 1;
                return Err(CollaboratorError::Unavailable(
                    "transition log is unreachable".to_string(),
                ));
            }
        }

        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
        Ok(())
    }

    async fn list_for_project(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<TransitionRecord>, CollaboratorError> {
        Ok(self
            .records()
            .into_iter()
            .filter(|record| &record.project_id == project_id)
            .collect())
    }
}

/// Writes the audit trail around the executor.
///
/// Audit durability is best-effort relative to the primary state change: a
/// failed append is retried once, and a second failure surfaces as
/// `AuditWriteFailed` without reversing or blocking the transition itself.
#[derive(Clone)]
pub struct HistoryRecorder {
    log: Arc<dyn TransitionLog>,
}

impl HistoryRecorder {
    pub fn new(log: Arc<dyn TransitionLog>) -> Self {
        Self { log }
    }

    pub async fn record(&self, record: &TransitionRecord) -> Result<(), EngineError> {
        if record.outcome == TransitionOutcome::Bypassed
            && record
                .bypass_justification
                .as_deref()
                .map(|justification| justification.trim().is_empty())
                .unwrap_or(true)
        {
            return Err(EngineError::InvalidArgument(
                "bypassed transition records require a justification".to_string(),
            ));
        }

        if let Err(first) = self.log.append(record.clone()).await {
            warn!(
                project_id = %record.project_id.0,
                record_id = %record.id.0,
                error = %first,
                "transition audit append failed; retrying once"
            );
            if let Err(second) = self.log.append(record.clone()).await {
                return Err(EngineError::AuditWriteFailed(second.to_string()));
            }
        }
        Ok(())
    }

    pub async fn history(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<TransitionRecord>, EngineError> {
        Ok(self.log.list_for_project(project_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::domain::project::ProjectId;
    use crate::domain::stage::StageId;
    use crate::domain::transition::{TransitionOutcome, TransitionRecord};
    use crate::errors::EngineError;

    use super::{HistoryRecorder, InMemoryTransitionLog};

    fn record(outcome: TransitionOutcome) -> TransitionRecord {
        TransitionRecord::new(
            ProjectId("proj-1".to_string()),
            Some(StageId("stage-1".to_string())),
            StageId("stage-2".to_string()),
            "u-planner",
            outcome,
            "documents attached",
        )
    }

    #[tokio::test]
    async fn records_accumulate_and_are_never_rewritten() {
        let log = Arc::new(InMemoryTransitionLog::default());
        let recorder = HistoryRecorder::new(log.clone());

        recorder.record(&record(TransitionOutcome::Rejected)).await.expect("first");
        recorder.record(&record(TransitionOutcome::Completed)).await.expect("second");

        let history =
            recorder.history(&ProjectId("proj-1".to_string())).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].outcome, TransitionOutcome::Rejected);
        assert_eq!(history[1].outcome, TransitionOutcome::Completed);
    }

    #[tokio::test]
    async fn single_append_failure_is_retried_transparently() {
        let log = Arc::new(InMemoryTransitionLog::failing_next(1));
        let recorder = HistoryRecorder::new(log.clone());

        recorder.record(&record(TransitionOutcome::Completed)).await.expect("retry succeeds");

        assert_eq!(log.records().len(), 1);
    }

    #[tokio::test]
    async fn repeated_append_failure_surfaces_audit_write_failed() {
        let log = Arc::new(InMemoryTransitionLog::failing_next(2));
        let recorder = HistoryRecorder::new(log.clone());

        let error = recorder
            .record(&record(TransitionOutcome::Completed))
            .await
            .expect_err("both attempts fail");

        assert!(matches!(error, EngineError::AuditWriteFailed(_)));
        assert!(log.records().is_empty());
    }

    #[tokio::test]
    async fn bypassed_record_without_justification_is_rejected() {
        let recorder = HistoryRecorder::new(Arc::new(InMemoryTransitionLog::default()));

        let error = recorder
            .record(&record(TransitionOutcome::Bypassed))
            .await
            .expect_err("must reject");

        assert!(matches!(error, EngineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn bypassed_record_with_justification_is_stored() {
        let log = Arc::new(InMemoryTransitionLog::default());
        let recorder = HistoryRecorder::new(log.clone());
        let record =
            record(TransitionOutcome::Bypassed).with_justification("urgent customer request");

        recorder.record(&record).await.expect("stored");

        assert_eq!(
            log.records()[0].bypass_justification.as_deref(),
            Some("urgent customer request")
        );
    }

    #[tokio::test]
    async fn history_is_scoped_to_the_project() {
        let log = Arc::new(InMemoryTransitionLog::default());
        let recorder = HistoryRecorder::new(log);
        let mut other = record(TransitionOutcome::Completed);
        other.project_id = ProjectId("proj-2".to_string());

        recorder.record(&record(TransitionOutcome::Completed)).await.expect("first");
        recorder.record(&other).await.expect("second");

        let history =
            recorder.history(&ProjectId("proj-1".to_string())).await.expect("history");
        assert_eq!(history.len(), 1);
    }
}
