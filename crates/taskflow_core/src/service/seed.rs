//! Starter content for a fresh local store.
//!
//! Lists are seeded first; tasks are only seeded alongside them so every
//! starter task points at a starter list.

use crate::model::list::{ListDraft, ListId};
use crate::model::task::{Priority, TaskDraft};
use crate::service::{list_service, task_service};
use crate::store::{Collection, KeyValueStore, LocalRecordStore, Record, StoreResult, FIELD_ID};
use serde_json::Value;

const STARTER_LISTS: [&str; 2] = ["Personal", "Work"];

/// Title, index into `STARTER_LISTS`, priority.
const STARTER_TASKS: [(&str, usize, Priority); 3] = [
    ("Plan the week", 0, Priority::High),
    ("Buy groceries", 0, Priority::Medium),
    ("Review open pull requests", 1, Priority::Low),
];

/// Seeds lists and tasks when the local store has no lists yet. Returns
/// whether anything was written.
pub fn seed_starter_data<K: KeyValueStore>(store: &LocalRecordStore<K>) -> StoreResult<bool> {
    let lists: Vec<Record> = STARTER_LISTS
        .iter()
        .enumerate()
        .map(|(index, name)| {
            with_id(
                list_service::draft_record(&ListDraft::new(*name), index),
                index,
            )
        })
        .collect();
    if !store.seed_if_empty(Collection::Lists, &lists)? {
        return Ok(false);
    }

    let tasks = STARTER_TASKS
        .iter()
        .enumerate()
        .map(|(index, (title, list_index, priority))| {
            let list_id = list_id_at(*list_index);
            let draft = TaskDraft {
                priority: *priority,
                ..TaskDraft::new(*title, list_id)
            };
            task_service::draft_record(&draft, list_id).map(|record| with_id(record, index))
        })
        .collect::<StoreResult<Vec<Record>>>()?;
    store.seed_if_empty(Collection::Tasks, &tasks)?;
    Ok(true)
}

fn list_id_at(index: usize) -> ListId {
    ListId(index as i64 + 1)
}

fn with_id(mut record: Record, index: usize) -> Record {
    record.insert(FIELD_ID.to_string(), Value::from(index as i64 + 1));
    record
}
