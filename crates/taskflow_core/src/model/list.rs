//! Task list model.
//!
//! # Invariants
//! - `name` is non-empty after trim.
//! - `color` is a hex token (`#rgb` or `#rrggbb`).
//! - `task_count` is advisory display data; nothing reconciles it with live
//!   task rows.

use crate::model::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid color regex"));

/// Colors handed out to new lists in creation order.
pub const LIST_PALETTE: [&str; 8] = [
    "#6366f1", "#8b5cf6", "#ec4899", "#10b981", "#f59e0b", "#ef4444", "#3b82f6", "#84cc16",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(pub i64);

impl Display for ListId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: ListId,
    pub name: String,
    pub color: String,
    /// Stable UI ordering key, ascending.
    pub order: i64,
    pub task_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDraft {
    pub name: String,
    /// Defaults to the palette color for the new list's position.
    pub color: Option<String>,
    /// Defaults to the current number of lists.
    pub order: Option<i64>,
}

impl ListDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if self.name.trim().is_empty() {
            errors.push("name", "List name is required");
        }
        if let Some(color) = &self.color {
            check_color(color, &mut errors);
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub order: Option<i64>,
    pub task_count: Option<i64>,
}

impl ListPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            errors.push("name", "List name is required");
        }
        if let Some(color) = &self.color {
            check_color(color, &mut errors);
        }
        errors.into_result()
    }
}

/// Palette color for the list at `index`, wrapping around.
pub fn palette_color(index: usize) -> &'static str {
    LIST_PALETTE[index % LIST_PALETTE.len()]
}

pub fn is_hex_color(value: &str) -> bool {
    HEX_COLOR_RE.is_match(value)
}

fn check_color(color: &str, errors: &mut ValidationError) {
    if !is_hex_color(color) {
        errors.push("color", format!("`{color}` is not a hex color"));
    }
}

#[cfg(test)]
mod tests {
    use super::{is_hex_color, palette_color, ListDraft, ListPatch};

    #[test]
    fn hex_color_accepts_short_and_long_forms() {
        assert!(is_hex_color("#fff"));
        assert!(is_hex_color("#6366F1"));
        assert!(!is_hex_color("6366f1"));
        assert!(!is_hex_color("#12345"));
    }

    #[test]
    fn palette_wraps_around() {
        assert_eq!(palette_color(0), "#6366f1");
        assert_eq!(palette_color(8), palette_color(0));
    }

    #[test]
    fn draft_and_patch_validation() {
        assert!(ListDraft::new("Work").validate().is_ok());
        let err = ListDraft {
            name: " ".to_string(),
            color: Some("red".to_string()),
            order: None,
        }
        .validate()
        .expect_err("blank name and bad color");
        assert_eq!(err.errors().len(), 2);

        assert!(ListPatch::default().is_empty());
        assert!(ListPatch {
            name: Some(String::new()),
            ..ListPatch::default()
        }
        .validate()
        .is_err());
    }
}
