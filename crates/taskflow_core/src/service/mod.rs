//! Entity services over the record store.
//!
//! # Responsibility
//! - Map typed list/task/project operations onto the record API.
//! - Give callers one outcome contract regardless of backend.
//! - Surface transport and per-record failures as notifications.
//!
//! # Invariants
//! - No retries and no rollback: a bulk call that partially fails leaves the
//!   successful records applied.
//! - Absent ids are reported as `ServiceError::NotFound` by every backend.

pub mod context;
mod fields;
mod gateway;
pub mod list_service;
pub mod project_service;
pub mod seed;
pub mod task_service;

use crate::model::ValidationError;
use crate::store::{Collection, RecordId, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Records requested per `get_all` round trip unless configured otherwise.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;
pub const MAX_PAGE_LIMIT: u32 = 1000;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// One record the store refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    /// Target id for update/delete; `None` for creates.
    pub id: Option<RecordId>,
    pub message: String,
    pub errors: Vec<String>,
}

impl Display for RecordFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "record {id}: {}", self.message)?,
            None => write!(f, "{}", self.message)?,
        }
        for error in &self.errors {
            write!(f, "; {error}")?;
        }
        Ok(())
    }
}

/// Bulk call where some records failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialFailure {
    pub collection: Collection,
    pub succeeded: Vec<RecordId>,
    pub failed: Vec<RecordFailure>,
}

#[derive(Debug)]
pub enum ServiceError {
    NotFound {
        collection: Collection,
        id: RecordId,
    },
    Validation(ValidationError),
    Transport(StoreError),
    PartialFailure(PartialFailure),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { collection, id } => {
                write!(f, "{} not found: {id}", collection.entity_name())
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Transport(err) => write!(f, "{err}"),
            Self::PartialFailure(partial) => write!(
                f,
                "{} of {} {} records failed",
                partial.failed.len(),
                partial.failed.len() + partial.succeeded.len(),
                partial.collection.entity_name()
            ),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Transport(err) => Some(err),
            Self::NotFound { .. } | Self::PartialFailure(_) => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Transport(value)
    }
}

/// Result of a bulk call that reached the store.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<RecordFailure>,
}

impl<T> BulkOutcome<T> {
    /// First successful item, mirroring single-record callers.
    pub fn first(&self) -> Option<&T> {
        self.succeeded.first()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Clamps a requested page size to `1..=MAX_PAGE_LIMIT`.
pub fn normalize_page_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::{normalize_page_limit, BulkOutcome, RecordFailure, DEFAULT_PAGE_LIMIT};

    #[test]
    fn page_limit_defaults_and_clamps() {
        assert_eq!(normalize_page_limit(None), DEFAULT_PAGE_LIMIT);
        assert_eq!(normalize_page_limit(Some(0)), 1);
        assert_eq!(normalize_page_limit(Some(50_000)), 1000);
    }

    #[test]
    fn bulk_outcome_reports_first_success() {
        let outcome = BulkOutcome {
            succeeded: vec![7, 9],
            failed: vec![RecordFailure {
                id: Some(8),
                message: "task record 8 not found".to_string(),
                errors: Vec::new(),
            }],
        };
        assert_eq!(outcome.first(), Some(&7));
        assert!(outcome.has_failures());
        assert_eq!(
            outcome.failed[0].to_string(),
            "record 8: task record 8 not found"
        );
    }
}
