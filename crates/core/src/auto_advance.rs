use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::StageCatalog;
use crate::domain::project::Project;
use crate::domain::stage::WorkflowStage;
use crate::errors::EngineError;
use crate::prerequisites::PrerequisiteChecker;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoAdvanceDecision {
    pub available: bool,
    pub next_stage: Option<WorkflowStage>,
    pub reason: Option<String>,
}

impl AutoAdvanceDecision {
    fn unavailable(reason: impl Into<String>) -> Self {
        Self { available: false, next_stage: None, reason: Some(reason.into()) }
    }
}

/// Probes whether the project already satisfies the next stage's
/// prerequisites without a user-initiated transition.
///
/// Evaluation is read-only; actually advancing requires a separate explicit
/// executor call with `bypass = false`. Auto-advance never bypasses
/// validation, it only surfaces when validation would already succeed
/// unassisted.
#[derive(Clone)]
pub struct AutoAdvanceEngine {
    catalog: Arc<dyn StageCatalog>,
    checker: PrerequisiteChecker,
}

impl AutoAdvanceEngine {
    pub fn new(catalog: Arc<dyn StageCatalog>, checker: PrerequisiteChecker) -> Self {
        Self { catalog, checker }
    }

    pub async fn evaluate(&self, project: &Project) -> Result<AutoAdvanceDecision, EngineError> {
        let Some(current_id) = &project.current_stage_id else {
            return Ok(AutoAdvanceDecision::unavailable("project has not entered the pipeline"));
        };

        let stages = self.catalog.list_stages(&project.organization_id).await?;
        let current = stages
            .iter()
            .find(|stage| &stage.id == current_id)
            .ok_or_else(|| EngineError::stage_not_found(current_id.0.clone()))?;

        let Some(next) = stages
            .iter()
            .filter(|stage| stage.is_active && stage.order > current.order)
            .min_by_key(|stage| stage.order)
        else {
            return Ok(AutoAdvanceDecision::unavailable(format!(
                "`{}` is the final active stage",
                current.name
            )));
        };

        let report = self.checker.check(project, next, Some(current)).await?;

        if !report.required_passed {
            return Ok(AutoAdvanceDecision {
                available: false,
                next_stage: Some(next.clone()),
                reason: Some(format!(
                    "{} required check(s) outstanding for `{}`",
                    report.errors.len(),
                    next.name
                )),
            });
        }

        if next.requires_approval {
            return Ok(AutoAdvanceDecision {
                available: false,
                next_stage: Some(next.clone()),
                reason: Some(format!("`{}` requires approval before entry", next.name)),
            });
        }

        let cleared: Vec<&str> =
            report.checks.iter().map(|check| check.name.as_str()).collect();
        let reason = if cleared.is_empty() {
            format!("no prerequisites gate entry into `{}`", next.name)
        } else {
            format!("all checks cleared for `{}`: {}", next.name, cleared.join(", "))
        };

        Ok(AutoAdvanceDecision {
            available: true,
            next_stage: Some(next.clone()),
            reason: Some(reason),
        })
    }
}
