//! List use-case service.
//!
//! # Invariants
//! - `get_all` is ordered by `order_c ASC`.
//! - New lists default to the next order slot, a palette color and a zero
//!   task count.

use crate::model::list::{palette_color, ListDraft, ListId, ListPatch, TaskList};
use crate::notify::Notifier;
use crate::service::fields::{int, opt_text, required_id, text};
use crate::service::gateway::{decode_outcome, decode_records, RecordGateway};
use crate::service::{BulkOutcome, ServiceResult};
use crate::store::{Collection, OrderBy, Record, RecordStore, StoreResult, FIELD_ID};
use serde_json::Value;
use std::rc::Rc;

pub const FIELD_NAME: &str = "Name";
pub const FIELD_COLOR: &str = "color_c";
pub const FIELD_ORDER: &str = "order_c";
pub const FIELD_TASK_COUNT: &str = "taskCount_c";

const LIST_FIELDS: [&str; 4] = [FIELD_NAME, FIELD_COLOR, FIELD_ORDER, FIELD_TASK_COUNT];

pub struct ListService<S: RecordStore> {
    gateway: RecordGateway<S>,
}

impl<S: RecordStore> ListService<S> {
    pub fn new(store: S, notifier: Rc<dyn Notifier>) -> Self {
        Self {
            gateway: RecordGateway::new(store, Collection::Lists, notifier),
        }
    }

    pub fn with_page_limit(mut self, limit: Option<u32>) -> Self {
        self.gateway.set_page_limit(limit);
        self
    }

    pub fn get_all(&self) -> ServiceResult<Vec<TaskList>> {
        let records = self
            .gateway
            .fetch_all(&LIST_FIELDS, vec![OrderBy::asc(FIELD_ORDER)])?;
        Ok(decode_records(Collection::Lists, records, decode_list))
    }

    pub fn get_by_id(&self, id: ListId) -> ServiceResult<TaskList> {
        let record = self.gateway.get(id.0, &LIST_FIELDS)?;
        Ok(decode_list(&record)?)
    }

    pub fn create(&self, draft: &ListDraft) -> ServiceResult<TaskList> {
        draft.validate()?;
        let position = self.current_count()?;
        let created = self.gateway.create_one(draft_record(draft, position))?;
        Ok(decode_list(&created)?)
    }

    /// Creates lists in draft order; defaults continue from the current count.
    pub fn create_many(&self, drafts: &[ListDraft]) -> ServiceResult<BulkOutcome<TaskList>> {
        for draft in drafts {
            draft.validate()?;
        }
        let base = self.current_count()?;
        let records = drafts
            .iter()
            .enumerate()
            .map(|(offset, draft)| draft_record(draft, base + offset))
            .collect();
        let outcome = self.gateway.create(records)?;
        Ok(decode_outcome(outcome, decode_list))
    }

    pub fn update(&self, id: ListId, patch: &ListPatch) -> ServiceResult<TaskList> {
        if patch.is_empty() {
            return self.get_by_id(id);
        }
        patch.validate()?;
        let updated = self.gateway.update_one(id.0, patch_record(patch))?;
        Ok(decode_list(&updated)?)
    }

    pub fn update_many(
        &self,
        updates: &[(ListId, ListPatch)],
    ) -> ServiceResult<BulkOutcome<TaskList>> {
        let mut records = Vec::with_capacity(updates.len());
        for (id, patch) in updates {
            patch.validate()?;
            let mut record = patch_record(patch);
            record.insert(FIELD_ID.to_string(), Value::from(id.0));
            records.push(record);
        }
        let outcome = self.gateway.update(records)?;
        Ok(decode_outcome(outcome, decode_list))
    }

    /// Deletes the list record only; its tasks are left in place. Use
    /// `AppContext::delete_list_cascade` to remove them too.
    pub fn delete(&self, id: ListId) -> ServiceResult<()> {
        self.gateway.delete_one(id.0)
    }

    pub fn delete_many(&self, ids: &[ListId]) -> ServiceResult<BulkOutcome<ListId>> {
        let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let outcome = self.gateway.delete(&raw)?;
        Ok(BulkOutcome {
            succeeded: outcome.succeeded.into_iter().map(ListId).collect(),
            failed: outcome.failed,
        })
    }

    fn current_count(&self) -> ServiceResult<usize> {
        Ok(self.gateway.fetch_all(&[FIELD_ID], Vec::new())?.len())
    }
}

pub(crate) fn decode_list(record: &Record) -> StoreResult<TaskList> {
    let id = required_id(record, Collection::Lists)?;
    Ok(TaskList {
        id: ListId(id),
        name: text(record, FIELD_NAME),
        color: opt_text(record, FIELD_COLOR).unwrap_or_else(|| palette_color(0).to_string()),
        order: int(record, FIELD_ORDER).unwrap_or_default(),
        task_count: int(record, FIELD_TASK_COUNT).unwrap_or_default(),
    })
}

pub(super) fn draft_record(draft: &ListDraft, position: usize) -> Record {
    let color = draft
        .color
        .clone()
        .unwrap_or_else(|| palette_color(position).to_string());
    let order = draft.order.unwrap_or(position as i64);

    let mut record = Record::new();
    record.insert(FIELD_NAME.to_string(), Value::from(draft.name.trim()));
    record.insert(FIELD_COLOR.to_string(), Value::from(color));
    record.insert(FIELD_ORDER.to_string(), Value::from(order));
    record.insert(FIELD_TASK_COUNT.to_string(), Value::from(0));
    record
}

fn patch_record(patch: &ListPatch) -> Record {
    let mut record = Record::new();
    if let Some(name) = &patch.name {
        record.insert(FIELD_NAME.to_string(), Value::from(name.trim()));
    }
    if let Some(color) = &patch.color {
        record.insert(FIELD_COLOR.to_string(), Value::from(color.as_str()));
    }
    if let Some(order) = patch.order {
        record.insert(FIELD_ORDER.to_string(), Value::from(order));
    }
    if let Some(task_count) = patch.task_count {
        record.insert(FIELD_TASK_COUNT.to_string(), Value::from(task_count));
    }
    record
}
