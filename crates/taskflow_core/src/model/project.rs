//! Project model.
//!
//! Budget and progress are advisory; `end_date >= start_date` is not enforced.

use crate::model::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub i64);

impl Display for ProjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[default]
    Active,
    Completed,
    #[serde(rename = "On Hold")]
    OnHold,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::OnHold => "On Hold",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Active" => Ok(Self::Active),
            "Completed" => Ok(Self::Completed),
            "On Hold" => Ok(Self::OnHold),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unsupported project status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl ProjectPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl FromStr for ProjectPriority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "High" => Ok(Self::High),
            "Medium" => Ok(Self::Medium),
            "Low" => Ok(Self::Low),
            other => Err(format!("unsupported project priority `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub priority: ProjectPriority,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    /// Percent complete, 0..=100.
    pub progress: Option<u8>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectDraft {
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub priority: ProjectPriority,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub progress: Option<u8>,
}

impl ProjectDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if self.name.trim().is_empty() {
            errors.push("name", "Project name is required");
        }
        check_progress(self.progress, &mut errors);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<ProjectPriority>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
    pub budget: Option<Option<f64>>,
    pub progress: Option<u8>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            errors.push("name", "Project name is required");
        }
        check_progress(self.progress, &mut errors);
        errors.into_result()
    }
}

fn check_progress(progress: Option<u8>, errors: &mut ValidationError) {
    if matches!(progress, Some(value) if value > 100) {
        errors.push("progress", "Progress must be between 0 and 100");
    }
}

#[cfg(test)]
mod tests {
    use super::{ProjectDraft, ProjectStatus};

    #[test]
    fn status_uses_display_spelling() {
        assert_eq!(ProjectStatus::OnHold.as_str(), "On Hold");
        assert_eq!(
            "On Hold".parse::<ProjectStatus>().expect("status parses"),
            ProjectStatus::OnHold
        );
        assert!("Paused".parse::<ProjectStatus>().is_err());
    }

    #[test]
    fn draft_rejects_blank_name_and_progress_overflow() {
        let draft = ProjectDraft {
            progress: Some(140),
            ..ProjectDraft::default()
        };
        let err = draft.validate().expect_err("invalid draft");
        assert!(err.message_for("name").is_some());
        assert!(err.message_for("progress").is_some());
    }
}
