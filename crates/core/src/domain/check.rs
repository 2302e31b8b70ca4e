use serde::{Deserialize, Serialize};

/// The fixed taxonomy of prerequisite categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    ProjectData,
    Documents,
    Approvals,
    StageSpecific,
    System,
}

impl CheckCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectData => "project_data",
            Self::Documents => "documents",
            Self::Approvals => "approvals",
            Self::StageSpecific => "stage_specific",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "project_data" => Some(Self::ProjectData),
            "documents" => Some(Self::Documents),
            "approvals" => Some(Self::Approvals),
            "stage_specific" => Some(Self::StageSpecific),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    Warning,
    Pending,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Warning => "warning",
            Self::Pending => "pending",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "warning" => Some(Self::Warning),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}

/// A single evaluated rule instance. Ephemeral: recomputed on every
/// validation call and never persisted as its own record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteCheck {
    pub id: String,
    pub name: String,
    pub category: CheckCategory,
    pub status: CheckStatus,
    pub required: bool,
    pub details: Option<String>,
}

impl PrerequisiteCheck {
    /// A required check counts against `required_passed` unless it passed.
    /// `Warning` status never blocks, regardless of the `required` flag.
    pub fn blocks_required(&self) -> bool {
        self.required && !matches!(self.status, CheckStatus::Passed | CheckStatus::Warning)
    }

    pub fn message(&self) -> String {
        match &self.details {
            Some(details) => format!("{}: {details}", self.name),
            None => self.name.clone(),
        }
    }
}
