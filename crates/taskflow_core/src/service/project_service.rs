//! Project use-case service.
//!
//! # Invariants
//! - `get_all` is ordered by `ModifiedOn DESC`.
//! - Writes carry only updateable fields, and never empty strings.

use crate::model::project::{
    Project, ProjectDraft, ProjectId, ProjectPatch, ProjectPriority, ProjectStatus,
};
use crate::notify::Notifier;
use crate::service::fields::{date, date_value, float, int, required_id, text, timestamp};
use crate::service::gateway::{decode_outcome, decode_records, RecordGateway};
use crate::service::{BulkOutcome, ServiceResult};
use crate::store::{
    Collection, OrderBy, Record, RecordStore, StoreResult, FIELD_CREATED_ON, FIELD_ID,
    FIELD_MODIFIED_ON,
};
use log::warn;
use serde_json::Value;
use std::rc::Rc;
use std::str::FromStr;

pub const FIELD_NAME: &str = "Name";
pub const FIELD_DESCRIPTION: &str = "description_c";
pub const FIELD_STATUS: &str = "status_c";
pub const FIELD_PRIORITY: &str = "priority_c";
pub const FIELD_START_DATE: &str = "startDate_c";
pub const FIELD_END_DATE: &str = "endDate_c";
pub const FIELD_BUDGET: &str = "budget_c";
pub const FIELD_PROGRESS: &str = "progress_c";

/// Fields a caller may write.
pub const UPDATEABLE_FIELDS: [&str; 8] = [
    FIELD_NAME,
    FIELD_DESCRIPTION,
    FIELD_STATUS,
    FIELD_PRIORITY,
    FIELD_START_DATE,
    FIELD_END_DATE,
    FIELD_BUDGET,
    FIELD_PROGRESS,
];

const PROJECT_FIELDS: [&str; 10] = [
    FIELD_NAME,
    FIELD_DESCRIPTION,
    FIELD_STATUS,
    FIELD_PRIORITY,
    FIELD_START_DATE,
    FIELD_END_DATE,
    FIELD_BUDGET,
    FIELD_PROGRESS,
    FIELD_CREATED_ON,
    FIELD_MODIFIED_ON,
];

pub struct ProjectService<S: RecordStore> {
    gateway: RecordGateway<S>,
}

impl<S: RecordStore> ProjectService<S> {
    pub fn new(store: S, notifier: Rc<dyn Notifier>) -> Self {
        Self {
            gateway: RecordGateway::new(store, Collection::Projects, notifier),
        }
    }

    pub fn with_page_limit(mut self, limit: Option<u32>) -> Self {
        self.gateway.set_page_limit(limit);
        self
    }

    /// Most recently modified first.
    pub fn get_all(&self) -> ServiceResult<Vec<Project>> {
        let records = self
            .gateway
            .fetch_all(&PROJECT_FIELDS, vec![OrderBy::desc(FIELD_MODIFIED_ON)])?;
        Ok(decode_records(Collection::Projects, records, decode_project))
    }

    pub fn get_by_id(&self, id: ProjectId) -> ServiceResult<Project> {
        let record = self.gateway.get(id.0, &PROJECT_FIELDS)?;
        Ok(decode_project(&record)?)
    }

    pub fn create(&self, draft: &ProjectDraft) -> ServiceResult<Project> {
        draft.validate()?;
        let created = self.gateway.create_one(draft_record(draft))?;
        Ok(decode_project(&created)?)
    }

    pub fn create_many(&self, drafts: &[ProjectDraft]) -> ServiceResult<BulkOutcome<Project>> {
        for draft in drafts {
            draft.validate()?;
        }
        let records = drafts.iter().map(draft_record).collect();
        let outcome = self.gateway.create(records)?;
        Ok(decode_outcome(outcome, decode_project))
    }

    pub fn update(&self, id: ProjectId, patch: &ProjectPatch) -> ServiceResult<Project> {
        patch.validate()?;
        let changes = patch_record(patch);
        if changes.is_empty() {
            return self.get_by_id(id);
        }
        let updated = self.gateway.update_one(id.0, changes)?;
        Ok(decode_project(&updated)?)
    }

    pub fn update_many(
        &self,
        updates: &[(ProjectId, ProjectPatch)],
    ) -> ServiceResult<BulkOutcome<Project>> {
        let mut records = Vec::with_capacity(updates.len());
        for (id, patch) in updates {
            patch.validate()?;
            let mut record = patch_record(patch);
            record.insert(FIELD_ID.to_string(), Value::from(id.0));
            records.push(record);
        }
        let outcome = self.gateway.update(records)?;
        Ok(decode_outcome(outcome, decode_project))
    }

    pub fn delete(&self, id: ProjectId) -> ServiceResult<()> {
        self.gateway.delete_one(id.0)
    }

    pub fn delete_many(&self, ids: &[ProjectId]) -> ServiceResult<BulkOutcome<ProjectId>> {
        let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let outcome = self.gateway.delete(&raw)?;
        Ok(BulkOutcome {
            succeeded: outcome.succeeded.into_iter().map(ProjectId).collect(),
            failed: outcome.failed,
        })
    }
}

pub(crate) fn decode_project(record: &Record) -> StoreResult<Project> {
    let id = required_id(record, Collection::Projects)?;
    Ok(Project {
        id: ProjectId(id),
        name: text(record, FIELD_NAME),
        description: text(record, FIELD_DESCRIPTION),
        status: decode_enum::<ProjectStatus>(record, FIELD_STATUS, id),
        priority: decode_enum::<ProjectPriority>(record, FIELD_PRIORITY, id),
        start_date: date(record, FIELD_START_DATE),
        end_date: date(record, FIELD_END_DATE),
        budget: float(record, FIELD_BUDGET),
        progress: int(record, FIELD_PROGRESS).map(|value| value.clamp(0, 100) as u8),
        created_at: timestamp(record, FIELD_CREATED_ON),
        modified_at: timestamp(record, FIELD_MODIFIED_ON),
    })
}

fn decode_enum<T: FromStr + Default>(record: &Record, field: &str, id: i64) -> T {
    let Some(raw) = record.get(field).and_then(Value::as_str) else {
        return T::default();
    };
    raw.parse().unwrap_or_else(|_| {
        warn!(
            "event=project_decode module=service status=error id={id} field={field} value={raw}"
        );
        T::default()
    })
}

fn draft_record(draft: &ProjectDraft) -> Record {
    let mut record = Record::new();
    insert_text(&mut record, FIELD_NAME, draft.name.trim());
    insert_text(&mut record, FIELD_DESCRIPTION, &draft.description);
    insert_text(&mut record, FIELD_STATUS, draft.status.as_str());
    insert_text(&mut record, FIELD_PRIORITY, draft.priority.as_str());
    if draft.start_date.is_some() {
        record.insert(FIELD_START_DATE.to_string(), date_value(draft.start_date));
    }
    if draft.end_date.is_some() {
        record.insert(FIELD_END_DATE.to_string(), date_value(draft.end_date));
    }
    if let Some(budget) = draft.budget {
        record.insert(FIELD_BUDGET.to_string(), Value::from(budget));
    }
    if let Some(progress) = draft.progress {
        record.insert(FIELD_PROGRESS.to_string(), Value::from(progress));
    }
    record
}

fn patch_record(patch: &ProjectPatch) -> Record {
    let mut record = Record::new();
    if let Some(name) = &patch.name {
        insert_text(&mut record, FIELD_NAME, name.trim());
    }
    if let Some(description) = &patch.description {
        insert_text(&mut record, FIELD_DESCRIPTION, description);
    }
    if let Some(status) = patch.status {
        insert_text(&mut record, FIELD_STATUS, status.as_str());
    }
    if let Some(priority) = patch.priority {
        insert_text(&mut record, FIELD_PRIORITY, priority.as_str());
    }
    if let Some(start_date) = patch.start_date {
        record.insert(FIELD_START_DATE.to_string(), date_value(start_date));
    }
    if let Some(end_date) = patch.end_date {
        record.insert(FIELD_END_DATE.to_string(), date_value(end_date));
    }
    if let Some(budget) = patch.budget {
        record.insert(FIELD_BUDGET.to_string(), Value::from(budget));
    }
    if let Some(progress) = patch.progress {
        record.insert(FIELD_PROGRESS.to_string(), Value::from(progress));
    }
    record
}

fn insert_text(record: &mut Record, field: &str, value: &str) {
    if !value.is_empty() {
        record.insert(field.to_string(), Value::from(value));
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_project, patch_record, UPDATEABLE_FIELDS};
    use crate::model::project::{ProjectPatch, ProjectPriority, ProjectStatus};
    use serde_json::{json, Value};

    #[test]
    fn patch_drops_empty_strings_and_keeps_clears() {
        let patch = ProjectPatch {
            description: Some(String::new()),
            status: Some(ProjectStatus::OnHold),
            end_date: Some(None),
            ..ProjectPatch::default()
        };
        let record = patch_record(&patch);
        assert!(!record.contains_key("description_c"));
        assert_eq!(record["status_c"], json!("On Hold"));
        assert_eq!(record["endDate_c"], Value::Null);
        assert!(record.keys().all(|key| UPDATEABLE_FIELDS.contains(&key.as_str())));
    }

    #[test]
    fn decode_falls_back_on_unknown_enums_and_clamps_progress() {
        let project = decode_project(
            json!({
                "Id": 3,
                "Name": "Launch",
                "status_c": "Paused",
                "priority_c": "High",
                "progress_c": 150,
                "budget_c": 2500
            })
            .as_object()
            .expect("test record is an object"),
        )
        .expect("project decodes");
        assert_eq!(project.status, ProjectStatus::Active);
        assert_eq!(project.priority, ProjectPriority::High);
        assert_eq!(project.progress, Some(100));
        assert_eq!(project.budget, Some(2500.0));
    }
}
