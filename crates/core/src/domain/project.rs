use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::stage::{OrganizationId, StageId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// The subject entity moving through the pipeline.
///
/// `current_stage_id` and `stage_entered_at` are owned by the transition
/// executor; no other code path mutates them. `state_version` is the
/// optimistic-concurrency token checked by the store's compare-and-swap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub current_stage_id: Option<StageId>,
    pub stage_entered_at: Option<DateTime<Utc>>,
    pub owner: Option<String>,
    pub priority: Option<Priority>,
    pub estimated_value: Option<Decimal>,
    pub state_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn has_entered_pipeline(&self) -> bool {
        self.current_stage_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::Priority;

    #[test]
    fn priority_round_trips_from_storage_encoding() {
        let cases = [Priority::Low, Priority::Normal, Priority::High, Priority::Urgent];

        for case in cases {
            assert_eq!(Priority::parse(case.as_str()), Some(case));
        }
    }

    #[test]
    fn priority_parse_rejects_unknown_values() {
        assert_eq!(Priority::parse("critical"), None);
        assert_eq!(Priority::parse(""), None);
    }

    #[test]
    fn priority_parse_is_case_insensitive() {
        assert_eq!(Priority::parse(" Urgent "), Some(Priority::Urgent));
    }
}
