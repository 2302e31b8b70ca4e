use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collaborators::{ApprovalService, CollaboratorError, DocumentIndex};
use crate::domain::check::{CheckCategory, CheckStatus, PrerequisiteCheck};
use crate::domain::project::Project;
use crate::domain::stage::WorkflowStage;
use crate::rules::{PrerequisiteRule, ProjectField, RuleKind, RuleSet};

/// Aggregate output of one prerequisite evaluation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub checks: Vec<PrerequisiteCheck>,
    pub required_passed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl CheckReport {
    pub fn from_checks(checks: Vec<PrerequisiteCheck>) -> Self {
        let required_passed = checks.iter().all(|check| !check.blocks_required());
        let errors = checks
            .iter()
            .filter(|check| check.blocks_required())
            .map(PrerequisiteCheck::message)
            .collect();
        let warnings = checks
            .iter()
            .filter(|check| {
                matches!(check.status, CheckStatus::Warning)
                    || (!check.required && matches!(check.status, CheckStatus::Failed))
            })
            .map(PrerequisiteCheck::message)
            .collect();

        Self { checks, required_passed, errors, warnings }
    }
}

/// Evaluates the five-category check taxonomy for a candidate transition.
///
/// Evaluation is read-only and idempotent: repeated calls with unchanged
/// underlying data return identical reports. Approval checks always reflect
/// live collaborator state, never a cache.
#[derive(Clone)]
pub struct PrerequisiteChecker {
    rules: RuleSet,
    documents: Arc<dyn DocumentIndex>,
    approvals: Arc<dyn ApprovalService>,
}

impl PrerequisiteChecker {
    pub fn new(
        rules: RuleSet,
        documents: Arc<dyn DocumentIndex>,
        approvals: Arc<dyn ApprovalService>,
    ) -> Self {
        Self { rules, documents, approvals }
    }

    pub async fn check(
        &self,
        project: &Project,
        target: &WorkflowStage,
        current: Option<&WorkflowStage>,
    ) -> Result<CheckReport, CollaboratorError> {
        // No-op transition: nothing to evaluate.
        if current.map(|stage| stage.id == target.id).unwrap_or(false) {
            return Ok(CheckReport::from_checks(Vec::new()));
        }

        let mut checks = self.system_checks(project, target);

        for rule in self.rules.rules_for(target) {
            checks.push(self.evaluate_rule(project, rule).await?);
        }

        if target.requires_approval {
            checks.push(self.approval_check(project, target).await?);
        }

        Ok(CheckReport::from_checks(checks))
    }

    fn system_checks(&self, project: &Project, target: &WorkflowStage) -> Vec<PrerequisiteCheck> {
        let organization_ok = project.organization_id == target.organization_id;
        let mut checks = vec![PrerequisiteCheck {
            id: format!("system-org-{}", target.id.0),
            name: "Stage belongs to the project's organization".to_string(),
            category: CheckCategory::System,
            status: if organization_ok { CheckStatus::Passed } else { CheckStatus::Failed },
            required: true,
            details: (!organization_ok)
                .then(|| format!("stage `{}` is outside organization `{}`", target.name, project.organization_id.0)),
        }];

        checks.push(PrerequisiteCheck {
            id: format!("system-active-{}", target.id.0),
            name: "Target stage is active".to_string(),
            category: CheckCategory::System,
            status: if target.is_active { CheckStatus::Passed } else { CheckStatus::Failed },
            required: true,
            details: (!target.is_active)
                .then(|| format!("stage `{}` has been deactivated", target.name)),
        });

        checks
    }

    async fn evaluate_rule(
        &self,
        project: &Project,
        rule: &PrerequisiteRule,
    ) -> Result<PrerequisiteCheck, CollaboratorError> {
        let (status, details) = match &rule.kind {
            RuleKind::RequireField { field } => {
                let present = match field {
                    ProjectField::Owner => {
                        project.owner.as_deref().map(|owner| !owner.trim().is_empty()).unwrap_or(false)
                    }
                    ProjectField::Priority => project.priority.is_some(),
                    ProjectField::EstimatedValue => project.estimated_value.is_some(),
                };
                if present {
                    (CheckStatus::Passed, None)
                } else {
                    (CheckStatus::Failed, Some(format!("project field `{}` is not set", field.as_str())))
                }
            }
            RuleKind::RequireDocument { document_kind } => {
                let present = self.documents.has_document(&project.id, document_kind).await?;
                if present {
                    (CheckStatus::Passed, None)
                } else {
                    (CheckStatus::Failed, Some(format!("no document of kind `{document_kind}` attached")))
                }
            }
        };

        Ok(PrerequisiteCheck {
            id: rule.id.clone(),
            name: rule.name.clone(),
            category: rule.category,
            status,
            required: rule.required,
            details,
        })
    }

    async fn approval_check(
        &self,
        project: &Project,
        target: &WorkflowStage,
    ) -> Result<PrerequisiteCheck, CollaboratorError> {
        let state = self.approvals.approval_status(&project.id, &target.id).await?;

        let (status, details) = if state.resolved {
            (CheckStatus::Passed, None)
        } else if state.pending {
            (CheckStatus::Pending, Some(format!("approval for `{}` is awaiting a decision", target.name)))
        } else {
            (CheckStatus::Failed, Some(format!("entry into `{}` has not been approved", target.name)))
        };

        Ok(PrerequisiteCheck {
            id: format!("approvals-{}", target.id.0),
            name: format!("Entry approval for `{}`", target.name),
            category: CheckCategory::Approvals,
            status,
            required: true,
            details,
        })
    }
}
