//! Pure task filtering, counting and sorting.
//!
//! # Invariants
//! - Pipeline order is scope, status, priority, search, sort.
//! - `counts` cover the scope-filtered set only, so
//!   `all == active + completed` always holds.
//! - Sorts are stable; ties keep input order.

use crate::model::list::ListId;
use crate::model::task::{Priority, Task};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListScope {
    #[default]
    All,
    List(ListId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Active => !task.completed,
            Self::Completed => task.completed,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(format!(
                "unsupported status filter `{other}`; expected all|active|completed"
            )),
        }
    }
}

/// Priority filter; serialized as `all|high|medium|low`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PriorityFilter {
    #[default]
    All,
    Only(Priority),
}

impl PriorityFilter {
    fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Only(priority) => task.priority == priority,
        }
    }
}

impl Display for PriorityFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(priority) => f.write_str(priority.as_str()),
        }
    }
}

impl FromStr for PriorityFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim() == "all" {
            return Ok(Self::All);
        }
        value
            .parse::<Priority>()
            .map(Self::Only)
            .map_err(|_| format!("unsupported priority filter `{value}`; expected all|high|medium|low"))
    }
}

impl TryFrom<String> for PriorityFilter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PriorityFilter> for String {
    fn from(value: PriorityFilter) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    /// Newest first.
    #[default]
    Created,
    /// Dated tasks first, earliest due date first.
    DueDate,
    /// High, medium, low.
    Priority,
    Title,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::DueDate => "dueDate",
            Self::Priority => "priority",
            Self::Title => "title",
        }
    }

    fn compare(self, left: &Task, right: &Task) -> Ordering {
        match self {
            Self::Created => right.created_at.cmp(&left.created_at),
            Self::DueDate => match (left.due_date, right.due_date) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            Self::Priority => right.priority.weight().cmp(&left.priority.weight()),
            Self::Title => compare_titles(&left.title, &right.title),
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "created" => Ok(Self::Created),
            "dueDate" => Ok(Self::DueDate),
            "priority" => Ok(Self::Priority),
            "title" => Ok(Self::Title),
            other => Err(format!(
                "unsupported sort key `{other}`; expected created|dueDate|priority|title"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub scope: ListScope,
    pub status: StatusFilter,
    pub priority: PriorityFilter,
    /// Case-insensitive substring over title and description.
    pub search: String,
    pub sort: SortKey,
}

impl TaskQuery {
    /// Whether any filter beyond the scope is active; distinguishes "no
    /// matches" from an empty list.
    pub fn is_narrowed(&self) -> bool {
        self.status != StatusFilter::All
            || self.priority != PriorityFilter::All
            || !self.search.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub all: usize,
    pub active: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskView<'a> {
    pub tasks: Vec<&'a Task>,
    pub counts: TaskCounts,
}

/// Applies `query` to `tasks` without touching storage.
pub fn filter_tasks<'a>(tasks: &'a [Task], query: &TaskQuery) -> TaskView<'a> {
    let scoped: Vec<&Task> = tasks
        .iter()
        .filter(|task| match query.scope {
            ListScope::All => true,
            ListScope::List(list_id) => task.list_id == list_id,
        })
        .collect();

    let completed = scoped.iter().filter(|task| task.completed).count();
    let counts = TaskCounts {
        all: scoped.len(),
        active: scoped.len() - completed,
        completed,
    };

    let needle = query.search.to_lowercase();
    let mut visible: Vec<&Task> = scoped
        .into_iter()
        .filter(|task| query.status.matches(task))
        .filter(|task| query.priority.matches(task))
        .filter(|task| needle.is_empty() || matches_search(task, &needle))
        .collect();

    visible.sort_by(|left, right| query.sort.compare(left, right));

    TaskView {
        tasks: visible,
        counts,
    }
}

fn matches_search(task: &Task, needle: &str) -> bool {
    task.title.to_lowercase().contains(needle) || task.description.to_lowercase().contains(needle)
}

/// Caseless order first, raw string as the tie-break.
fn compare_titles(left: &str, right: &str) -> Ordering {
    left.to_lowercase()
        .cmp(&right.to_lowercase())
        .then_with(|| left.cmp(right))
}
