//! Task use-case service.
//!
//! # Responsibility
//! - Map `Task`/`TaskDraft`/`TaskPatch` onto task records.
//! - Check that a task's list exists before creating or moving it.
//! - Keep `completed_at` in step with `completed` for completion helpers.
//!
//! # Invariants
//! - `get_all` is ordered by `CreatedOn DESC`.
//! - Only fields present in a patch are sent; the store merges them.

use crate::model::attachment::Attachment;
use crate::model::list::ListId;
use crate::model::project::ProjectId;
use crate::model::task::{Priority, Task, TaskDraft, TaskId, TaskPatch};
use crate::model::ValidationError;
use crate::notify::Notifier;
use crate::service::fields::{
    date, date_value, flag, reference, required_id, text, timestamp, timestamp_value,
};
use crate::service::gateway::{decode_outcome, decode_records, RecordGateway};
use crate::service::{BulkOutcome, ServiceResult};
use crate::store::{
    Collection, OrderBy, Record, RecordStore, StoreError, StoreResult, FIELD_CREATED_ON, FIELD_ID,
    FIELD_MODIFIED_ON,
};
use chrono::{DateTime, Utc};
use log::warn;
use serde_json::Value;
use std::rc::Rc;

pub const FIELD_TITLE: &str = "title_c";
pub const FIELD_DESCRIPTION: &str = "description_c";
pub const FIELD_PRIORITY: &str = "priority_c";
pub const FIELD_DUE_DATE: &str = "dueDate_c";
pub const FIELD_COMPLETED: &str = "completed_c";
pub const FIELD_COMPLETED_AT: &str = "completedAt_c";
pub const FIELD_ARCHIVED: &str = "archived_c";
pub const FIELD_LIST_ID: &str = "listId_c";
pub const FIELD_PROJECT_ID: &str = "projectId_c";
pub const FIELD_ATTACHMENTS: &str = "attachments_c";

const TASK_FIELDS: [&str; 12] = [
    FIELD_TITLE,
    FIELD_DESCRIPTION,
    FIELD_PRIORITY,
    FIELD_DUE_DATE,
    FIELD_COMPLETED,
    FIELD_COMPLETED_AT,
    FIELD_ARCHIVED,
    FIELD_LIST_ID,
    FIELD_PROJECT_ID,
    FIELD_ATTACHMENTS,
    FIELD_CREATED_ON,
    FIELD_MODIFIED_ON,
];

/// Task service facade over a record store.
pub struct TaskService<S: RecordStore> {
    gateway: RecordGateway<S>,
}

impl<S: RecordStore> TaskService<S> {
    pub fn new(store: S, notifier: Rc<dyn Notifier>) -> Self {
        Self {
            gateway: RecordGateway::new(store, Collection::Tasks, notifier),
        }
    }

    /// Overrides the records fetched per `get_all` round trip (clamped to `1..=1000`).
    pub fn with_page_limit(mut self, limit: Option<u32>) -> Self {
        self.gateway.set_page_limit(limit);
        self
    }

    /// Newest tasks first.
    pub fn get_all(&self) -> ServiceResult<Vec<Task>> {
        let records = self
            .gateway
            .fetch_all(&TASK_FIELDS, vec![OrderBy::desc(FIELD_CREATED_ON)])?;
        Ok(decode_records(Collection::Tasks, records, decode_task))
    }

    pub fn get_by_list(&self, list_id: ListId) -> ServiceResult<Vec<Task>> {
        let mut tasks = self.get_all()?;
        tasks.retain(|task| task.list_id == list_id);
        Ok(tasks)
    }

    pub fn get_by_id(&self, id: TaskId) -> ServiceResult<Task> {
        let record = self.gateway.get(id.0, &TASK_FIELDS)?;
        Ok(decode_task(&record)?)
    }

    pub fn create(&self, draft: &TaskDraft) -> ServiceResult<Task> {
        let record = self.prepare_create(draft)?;
        let created = self.gateway.create_one(record)?;
        Ok(decode_task(&created)?)
    }

    /// Creates every draft in one store call. Any invalid draft rejects the
    /// whole batch before the store is reached.
    pub fn create_many(&self, drafts: &[TaskDraft]) -> ServiceResult<BulkOutcome<Task>> {
        let records = drafts
            .iter()
            .map(|draft| self.prepare_create(draft))
            .collect::<ServiceResult<Vec<_>>>()?;
        let outcome = self.gateway.create(records)?;
        Ok(decode_outcome(outcome, decode_task))
    }

    /// Applies `patch`; an empty patch only reads the task back.
    pub fn update(&self, id: TaskId, patch: &TaskPatch) -> ServiceResult<Task> {
        if patch.is_empty() {
            return self.get_by_id(id);
        }
        self.check_patch(patch)?;
        let updated = self.gateway.update_one(id.0, patch_record(patch)?)?;
        Ok(decode_task(&updated)?)
    }

    pub fn update_many(&self, updates: &[(TaskId, TaskPatch)]) -> ServiceResult<BulkOutcome<Task>> {
        let mut records = Vec::with_capacity(updates.len());
        for (id, patch) in updates {
            self.check_patch(patch)?;
            let mut record = patch_record(patch)?;
            record.insert(FIELD_ID.to_string(), Value::from(id.0));
            records.push(record);
        }
        let outcome = self.gateway.update(records)?;
        Ok(decode_outcome(outcome, decode_task))
    }

    pub fn delete(&self, id: TaskId) -> ServiceResult<()> {
        self.gateway.delete_one(id.0)
    }

    pub fn delete_many(&self, ids: &[TaskId]) -> ServiceResult<BulkOutcome<TaskId>> {
        let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let outcome = self.gateway.delete(&raw)?;
        Ok(BulkOutcome {
            succeeded: outcome.succeeded.into_iter().map(TaskId).collect(),
            failed: outcome.failed,
        })
    }

    /// Marks the task done or not done. `completed_at` is stamped only on the
    /// transition to done and cleared on the way back; an unchanged state
    /// writes nothing.
    pub fn set_completed(
        &self,
        id: TaskId,
        completed: bool,
        now: DateTime<Utc>,
    ) -> ServiceResult<Task> {
        let current = self.get_by_id(id)?;
        if current.completed == completed {
            return Ok(current);
        }
        self.update(id, &TaskPatch::completion(completed, now))
    }

    pub fn toggle_completed(&self, task: &Task, now: DateTime<Utc>) -> ServiceResult<Task> {
        self.update(task.id, &task.toggle_patch(now))
    }

    pub fn set_archived(&self, id: TaskId, archived: bool) -> ServiceResult<Task> {
        self.update(
            id,
            &TaskPatch {
                archived: Some(archived),
                ..TaskPatch::default()
            },
        )
    }

    fn prepare_create(&self, draft: &TaskDraft) -> ServiceResult<Record> {
        draft.validate()?;
        let list_id = draft
            .list_id
            .ok_or_else(|| ValidationError::field("list_id", "Please select a list"))?;
        self.ensure_list_exists(list_id)?;
        Ok(draft_record(draft, list_id)?)
    }

    fn check_patch(&self, patch: &TaskPatch) -> ServiceResult<()> {
        patch.validate()?;
        if let Some(list_id) = patch.list_id {
            self.ensure_list_exists(list_id)?;
        }
        Ok(())
    }

    fn ensure_list_exists(&self, list_id: ListId) -> ServiceResult<()> {
        if self.gateway.exists_in(Collection::Lists, list_id.0)? {
            Ok(())
        } else {
            Err(ValidationError::field("list_id", format!("List {list_id} does not exist")).into())
        }
    }
}

pub(crate) fn decode_task(record: &Record) -> StoreResult<Task> {
    let id = required_id(record, Collection::Tasks)?;
    let list_id = reference(record, FIELD_LIST_ID).ok_or_else(|| {
        StoreError::InvalidData(format!("task record {id} has no `{FIELD_LIST_ID}`"))
    })?;

    Ok(Task {
        id: TaskId(id),
        title: text(record, FIELD_TITLE),
        description: text(record, FIELD_DESCRIPTION),
        priority: decode_priority(record, id),
        due_date: date(record, FIELD_DUE_DATE),
        completed: flag(record, FIELD_COMPLETED),
        completed_at: timestamp(record, FIELD_COMPLETED_AT),
        archived: flag(record, FIELD_ARCHIVED),
        list_id: ListId(list_id),
        project_id: reference(record, FIELD_PROJECT_ID).map(ProjectId),
        attachments: decode_attachments(record, id),
        created_at: timestamp(record, FIELD_CREATED_ON).unwrap_or_default(),
    })
}

fn decode_priority(record: &Record, id: i64) -> Priority {
    let Some(raw) = record.get(FIELD_PRIORITY).and_then(Value::as_str) else {
        return Priority::default();
    };
    raw.parse().unwrap_or_else(|_| {
        warn!(
            "event=task_decode module=service status=error id={id} error_code=unknown_priority value={raw}"
        );
        Priority::default()
    })
}

/// Attachments arrive as a JSON array, or as JSON text from text-typed
/// columns; anything unreadable decodes as no attachments.
fn decode_attachments(record: &Record, id: i64) -> Vec<Attachment> {
    let parsed = match record.get(FIELD_ATTACHMENTS) {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::String(raw)) if raw.trim().is_empty() => return Vec::new(),
        Some(Value::String(raw)) => serde_json::from_str(raw),
        Some(value) => serde_json::from_value(value.clone()),
    };
    parsed.unwrap_or_else(|err| {
        warn!(
            "event=task_decode module=service status=error id={id} error_code=bad_attachments error={err}"
        );
        Vec::new()
    })
}

pub(super) fn draft_record(draft: &TaskDraft, list_id: ListId) -> StoreResult<Record> {
    let mut record = Record::new();
    record.insert(FIELD_TITLE.to_string(), Value::from(draft.title.trim()));
    record.insert(
        FIELD_DESCRIPTION.to_string(),
        Value::from(draft.description.as_str()),
    );
    record.insert(
        FIELD_PRIORITY.to_string(),
        Value::from(draft.priority.as_str()),
    );
    record.insert(FIELD_DUE_DATE.to_string(), date_value(draft.due_date));
    record.insert(FIELD_COMPLETED.to_string(), Value::Bool(false));
    record.insert(FIELD_COMPLETED_AT.to_string(), Value::Null);
    record.insert(FIELD_ARCHIVED.to_string(), Value::Bool(false));
    record.insert(FIELD_LIST_ID.to_string(), Value::from(list_id.0));
    record.insert(
        FIELD_PROJECT_ID.to_string(),
        Value::from(draft.project_id.map(|project| project.0)),
    );
    record.insert(
        FIELD_ATTACHMENTS.to_string(),
        serde_json::to_value(&draft.attachments)?,
    );
    Ok(record)
}

fn patch_record(patch: &TaskPatch) -> StoreResult<Record> {
    let mut record = Record::new();
    if let Some(title) = &patch.title {
        record.insert(FIELD_TITLE.to_string(), Value::from(title.trim()));
    }
    if let Some(description) = &patch.description {
        record.insert(
            FIELD_DESCRIPTION.to_string(),
            Value::from(description.as_str()),
        );
    }
    if let Some(priority) = patch.priority {
        record.insert(FIELD_PRIORITY.to_string(), Value::from(priority.as_str()));
    }
    if let Some(due_date) = patch.due_date {
        record.insert(FIELD_DUE_DATE.to_string(), date_value(due_date));
    }
    if let Some(completed) = patch.completed {
        record.insert(FIELD_COMPLETED.to_string(), Value::Bool(completed));
    }
    if let Some(completed_at) = patch.completed_at {
        record.insert(
            FIELD_COMPLETED_AT.to_string(),
            timestamp_value(completed_at),
        );
    }
    if let Some(archived) = patch.archived {
        record.insert(FIELD_ARCHIVED.to_string(), Value::Bool(archived));
    }
    if let Some(list_id) = patch.list_id {
        record.insert(FIELD_LIST_ID.to_string(), Value::from(list_id.0));
    }
    if let Some(project_id) = patch.project_id {
        record.insert(
            FIELD_PROJECT_ID.to_string(),
            Value::from(project_id.map(|project| project.0)),
        );
    }
    if let Some(attachments) = &patch.attachments {
        record.insert(
            FIELD_ATTACHMENTS.to_string(),
            serde_json::to_value(attachments)?,
        );
    }
    Ok(record)
}
