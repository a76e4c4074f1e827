//! Typed domain model for lists, tasks and projects.
//!
//! # Responsibility
//! - Define the explicit record shapes used by services and the filter engine.
//! - Provide draft (create) and patch (update) input types with field-level
//!   validation.
//!
//! # Invariants
//! - Ids are assigned by the record store and never reassigned.
//! - Patches carry only explicitly provided fields.

pub mod attachment;
pub mod list;
pub mod project;
pub mod task;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// One failed field rule, rendered inline next to the offending input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Aggregated field errors for one draft or patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a single failed field.
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        let mut error = Self::new();
        error.push(field, message);
        error
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns the first message recorded for `field`.
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    /// `Ok(())` when no rule failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rendered = self
            .errors
            .iter()
            .map(|error| format!("{}: {}", error.field, error.message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "validation failed: {rendered}")
    }
}

impl Error for ValidationError {}
