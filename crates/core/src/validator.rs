use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::StageCatalog;
use crate::collaborators::{CollaboratorError, PermissionChecker};
use crate::domain::check::{CheckCategory, CheckStatus, PrerequisiteCheck};
use crate::domain::project::Project;
use crate::domain::stage::{StageId, WorkflowStage};
use crate::prerequisites::PrerequisiteChecker;

/// Permission coordinates that license a bypass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BypassPolicy {
    pub resource: String,
    pub action: String,
}

impl Default for BypassPolicy {
    fn default() -> Self {
        Self { resource: "workflow".to_string(), action: "bypass".to_string() }
    }
}

/// Decision snapshot for one candidate transition. Derived on demand and
/// never the source of truth.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub can_proceed: bool,
    pub requires_approval: bool,
    pub requires_bypass: bool,
    pub checks: Vec<PrerequisiteCheck>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// The fail-closed shape: invalid, no path forward, a single error.
    pub fn fail_closed(message: impl Into<String>) -> Self {
        Self { errors: vec![message.into()], ..Self::default() }
    }
}

/// Composes prerequisite evaluation with sequence rules.
///
/// Stage configuration is re-read from the catalog on every call; nothing is
/// cached here, since flags like `requires_approval` can change between
/// reads.
#[derive(Clone)]
pub struct TransitionValidator {
    catalog: Arc<dyn StageCatalog>,
    checker: PrerequisiteChecker,
    permissions: Arc<dyn PermissionChecker>,
    bypass: BypassPolicy,
}

impl TransitionValidator {
    pub fn new(
        catalog: Arc<dyn StageCatalog>,
        checker: PrerequisiteChecker,
        permissions: Arc<dyn PermissionChecker>,
        bypass: BypassPolicy,
    ) -> Self {
        Self { catalog, checker, permissions, bypass }
    }

    pub async fn validate(
        &self,
        project: &Project,
        target_stage_id: &StageId,
        actor_id: &str,
    ) -> ValidationResult {
        let result = match self.try_validate(project, target_stage_id, actor_id).await {
            Ok(result) => result,
            Err(error) => {
                ValidationResult::fail_closed(format!("validation could not complete: {error}"))
            }
        };

        debug!(
            project_id = %project.id.0,
            target_stage_id = %target_stage_id.0,
            actor_id,
            is_valid = result.is_valid,
            can_proceed = result.can_proceed,
            requires_bypass = result.requires_bypass,
            "transition validated"
        );
        result
    }

    async fn try_validate(
        &self,
        project: &Project,
        target_stage_id: &StageId,
        actor_id: &str,
    ) -> Result<ValidationResult, CollaboratorError> {
        let stages = self.catalog.list_stages(&project.organization_id).await?;

        let Some(target) = stages.iter().find(|stage| &stage.id == target_stage_id) else {
            return Ok(ValidationResult::fail_closed(format!(
                "target stage `{}` not found in organization `{}`",
                target_stage_id.0, project.organization_id.0
            )));
        };

        let current = match &project.current_stage_id {
            Some(current_id) => match stages.iter().find(|stage| &stage.id == current_id) {
                Some(stage) => Some(stage),
                None => {
                    return Ok(ValidationResult::fail_closed(format!(
                        "current stage `{}` not found in organization `{}`",
                        current_id.0, project.organization_id.0
                    )));
                }
            },
            None => None,
        };

        let (sequence_errors, sequence_warnings) = sequence_rules(&stages, current, target);

        let report = self.checker.check(project, target, current).await?;
        let has_bypass = self
            .permissions
            .has_permission(actor_id, &self.bypass.resource, &self.bypass.action)
            .await?;

        let is_valid = sequence_errors.is_empty() && report.required_passed;
        let requires_approval = target.requires_approval
            && report.checks.iter().any(|check| {
                check.category == CheckCategory::Approvals
                    && check.required
                    && check.status != CheckStatus::Passed
            });

        let mut errors = sequence_errors;
        errors.extend(report.errors);
        let mut warnings = report.warnings;
        warnings.extend(sequence_warnings);

        Ok(ValidationResult {
            is_valid,
            can_proceed: is_valid || has_bypass,
            requires_approval,
            requires_bypass: !is_valid && has_bypass,
            checks: report.checks,
            errors,
            warnings,
        })
    }
}

/// Sequence legality for a `(current, target)` pair. Backward moves are
/// structurally legal and silent; a forward move that skips over active
/// stages is legal but surfaced as a warning.
fn sequence_rules(
    stages: &[WorkflowStage],
    current: Option<&WorkflowStage>,
    target: &WorkflowStage,
) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match current {
        Some(current) => {
            if current.id == target.id {
                errors.push(format!("project is already in stage `{}`", target.name));
            } else if current.order == target.order {
                errors.push(format!(
                    "stages `{}` and `{}` share order {}; the pipeline order is corrupt",
                    current.name, target.name, target.order
                ));
            } else if target.is_forward_of(current) {
                let skipped: Vec<&str> = stages
                    .iter()
                    .filter(|stage| {
                        stage.is_active
                            && stage.order > current.order
                            && stage.order < target.order
                    })
                    .map(|stage| stage.name.as_str())
                    .collect();
                if !skipped.is_empty() {
                    warnings.push(format!(
                        "transition skips {} active stage(s): {}",
                        skipped.len(),
                        skipped.join(", ")
                    ));
                }
            }
        }
        None => {
            if let Some(first_active) = stages.iter().filter(|stage| stage.is_active).min_by_key(|stage| stage.order) {
                if target.order > first_active.order {
                    warnings.push(format!(
                        "intake skips earlier stages; pipeline starts at `{}`",
                        first_active.name
                    ));
                }
            }
        }
    }

    (errors, warnings)
}
