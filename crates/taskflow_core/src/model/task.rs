//! Task domain model.
//!
//! # Responsibility
//! - Define the typed task record, its create draft and its update patch.
//! - Keep completion bookkeeping (`completed_at`) consistent in one place.
//!
//! # Invariants
//! - `title` is non-empty after trim.
//! - `completed_at.is_some() == completed` for records written through
//!   `TaskPatch::completion`.
//! - `created_at` is assigned by the store and never patched.

use crate::model::attachment::Attachment;
use crate::model::list::ListId;
use crate::model::project::ProjectId;
use crate::model::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Store-assigned task identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task urgency. Unknown persisted values decode as `Medium`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Sort weight: high=3, medium=2, low=1.
    pub fn weight(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::High => "High Priority",
            Self::Medium => "Medium Priority",
            Self::Low => "Low Priority",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!(
                "unsupported priority `{other}`; expected high|medium|low"
            )),
        }
    }
}

/// Canonical task record as held by views and the filter engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    /// Calendar date only; malformed stored values decode as `None`.
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub archived: bool,
    pub list_id: ListId,
    pub project_id: Option<ProjectId>,
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn is_active(&self) -> bool {
        !self.completed
    }

    /// Patch that flips completion and stamps/clears `completed_at`.
    pub fn toggle_patch(&self, now: DateTime<Utc>) -> TaskPatch {
        TaskPatch::completion(!self.completed, now)
    }
}

/// Create input for a task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    /// Required; `None` models an unselected list in the form.
    pub list_id: Option<ListId>,
    pub project_id: Option<ProjectId>,
    pub attachments: Vec<Attachment>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, list_id: ListId) -> Self {
        Self {
            title: title.into(),
            list_id: Some(list_id),
            ..Self::default()
        }
    }

    /// Checks form-level required fields.
    ///
    /// List existence is checked by the service, which can reach the store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if self.title.trim().is_empty() {
            errors.push("title", "Task title is required");
        }
        if self.list_id.is_none() {
            errors.push("list_id", "Please select a list");
        }
        for attachment in &self.attachments {
            if let Err(err) = attachment.validate() {
                errors.push("attachments", err.to_string());
            }
        }
        errors.into_result()
    }
}

/// Explicit field-level update. `None` leaves a field untouched; for clearable
/// fields `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub completed: Option<bool>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub archived: Option<bool>,
    pub list_id: Option<ListId>,
    pub project_id: Option<Option<ProjectId>>,
    pub attachments: Option<Vec<Attachment>>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Sets `completed` and keeps `completed_at` in step with it.
    pub fn completion(completed: bool, now: DateTime<Utc>) -> Self {
        Self {
            completed: Some(completed),
            completed_at: Some(completed.then_some(now)),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if matches!(&self.title, Some(title) if title.trim().is_empty()) {
            errors.push("title", "Task title is required");
        }
        if let (Some(completed), Some(completed_at)) = (self.completed, &self.completed_at) {
            if completed != completed_at.is_some() {
                errors.push(
                    "completed_at",
                    "completed_at must be set exactly when the task is completed",
                );
            }
        }
        for attachment in self.attachments.iter().flatten() {
            if let Err(err) = attachment.validate() {
                errors.push("attachments", err.to_string());
            }
        }
        errors.into_result()
    }
}
