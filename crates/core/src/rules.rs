use serde::{Deserialize, Serialize};

use crate::domain::check::CheckCategory;
use crate::domain::stage::WorkflowStage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectField {
    Owner,
    Priority,
    EstimatedValue,
}

impl ProjectField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Priority => "priority",
            Self::EstimatedValue => "estimated_value",
        }
    }
}

/// What a rule evaluates. Kinds are orthogonal to categories: the category
/// is declared on the rule and drives grouping/presentation, the kind drives
/// evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    RequireField { field: ProjectField },
    RequireDocument { document_kind: String },
}

/// One machine-evaluable prerequisite, keyed to the stage it gates entry
/// into. `target_stage` matches the stage's name or id, case-insensitively.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteRule {
    pub id: String,
    pub name: String,
    pub category: CheckCategory,
    pub target_stage: String,
    pub required: bool,
    #[serde(flatten)]
    pub kind: RuleKind,
}

impl PrerequisiteRule {
    pub fn applies_to(&self, stage: &WorkflowStage) -> bool {
        let key = normalize_key(&self.target_stage);
        key == normalize_key(&stage.name) || key == normalize_key(&stage.id.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<PrerequisiteRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<PrerequisiteRule>) -> Self {
        Self { rules }
    }

    /// Rules gating entry into `target`, in declaration order. Declaration
    /// order is what keeps repeated evaluations deterministic.
    pub fn rules_for<'a>(&'a self, target: &WorkflowStage) -> Vec<&'a PrerequisiteRule> {
        self.rules.iter().filter(|rule| rule.applies_to(target)).collect()
    }

    /// Default rule table for the reference manufacturing pipeline.
    pub fn reference_pipeline() -> Self {
        Self::new(vec![
            PrerequisiteRule {
                id: "rule-review-owner".to_string(),
                name: "Project owner assigned".to_string(),
                category: CheckCategory::ProjectData,
                target_stage: "Technical Review".to_string(),
                required: true,
                kind: RuleKind::RequireField { field: ProjectField::Owner },
            },
            PrerequisiteRule {
                id: "rule-review-drawing".to_string(),
                name: "Technical drawing attached".to_string(),
                category: CheckCategory::Documents,
                target_stage: "Technical Review".to_string(),
                required: true,
                kind: RuleKind::RequireDocument { document_kind: "technical_drawing".to_string() },
            },
            PrerequisiteRule {
                id: "rule-rfq-value".to_string(),
                name: "Estimated order value recorded".to_string(),
                category: CheckCategory::ProjectData,
                target_stage: "Supplier RFQ".to_string(),
                required: true,
                kind: RuleKind::RequireField { field: ProjectField::EstimatedValue },
            },
            PrerequisiteRule {
                id: "rule-quoted-supplier-quote".to_string(),
                name: "Supplier quote received".to_string(),
                category: CheckCategory::StageSpecific,
                target_stage: "Quoted".to_string(),
                required: true,
                kind: RuleKind::RequireDocument { document_kind: "supplier_quote".to_string() },
            },
            PrerequisiteRule {
                id: "rule-confirmed-po".to_string(),
                name: "Customer purchase order attached".to_string(),
                category: CheckCategory::Documents,
                target_stage: "Order Confirmed".to_string(),
                required: true,
                kind: RuleKind::RequireDocument { document_kind: "purchase_order".to_string() },
            },
            PrerequisiteRule {
                id: "rule-procurement-priority".to_string(),
                name: "Project priority set".to_string(),
                category: CheckCategory::ProjectData,
                target_stage: "Procurement".to_string(),
                required: false,
                kind: RuleKind::RequireField { field: ProjectField::Priority },
            },
            PrerequisiteRule {
                id: "rule-shipped-manifest".to_string(),
                name: "Shipping manifest attached".to_string(),
                category: CheckCategory::StageSpecific,
                target_stage: "Shipped".to_string(),
                required: true,
                kind: RuleKind::RequireDocument { document_kind: "shipping_manifest".to_string() },
            },
        ])
    }
}

pub(crate) fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
