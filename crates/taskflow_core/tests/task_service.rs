use chrono::{NaiveDate, TimeZone, Utc};
use std::cell::Cell;
use std::rc::Rc;
use taskflow_core::db::open_db_in_memory;
use taskflow_core::notify::{NoticeLevel, NoticeQueue};
use taskflow_core::store::{
    open_store, Backend, BulkResponse, Collection, DeleteRequest, FetchRequest, FetchResponse,
    Record, RecordId, RecordStore, SqliteRecordStore, StoreResult, WriteRequest,
};
use taskflow_core::{
    AppContext, ListDraft, ListId, Priority, ServiceError, StoreError, TaskDraft, TaskId,
    TaskPatch,
};

/// Wraps a store and can be switched to fail every call.
struct SwitchableStore<S> {
    inner: S,
    offline: Cell<bool>,
}

impl<S: RecordStore> SwitchableStore<S> {
    fn check(&self) -> StoreResult<()> {
        if self.offline.get() {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

impl<S: RecordStore> RecordStore for SwitchableStore<S> {
    fn fetch_records(
        &self,
        collection: Collection,
        request: &FetchRequest,
    ) -> StoreResult<FetchResponse> {
        self.check()?;
        self.inner.fetch_records(collection, request)
    }

    fn get_record_by_id(
        &self,
        collection: Collection,
        id: RecordId,
        fields: &[String],
    ) -> StoreResult<Option<Record>> {
        self.check()?;
        self.inner.get_record_by_id(collection, id, fields)
    }

    fn create_records(
        &self,
        collection: Collection,
        request: &WriteRequest,
    ) -> StoreResult<BulkResponse> {
        self.check()?;
        self.inner.create_records(collection, request)
    }

    fn update_records(
        &self,
        collection: Collection,
        request: &WriteRequest,
    ) -> StoreResult<BulkResponse> {
        self.check()?;
        self.inner.update_records(collection, request)
    }

    fn delete_records(
        &self,
        collection: Collection,
        request: &DeleteRequest,
    ) -> StoreResult<BulkResponse> {
        self.check()?;
        self.inner.delete_records(collection, request)
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn with_each_backend(check: impl Fn(&AppContext<Rc<dyn RecordStore + '_>>, &NoticeQueue)) {
    for backend in [Backend::Local, Backend::Remote] {
        let conn = open_db_in_memory().unwrap();
        let store = open_store(&conn, backend).unwrap();
        let notices = Rc::new(NoticeQueue::new());
        let context = AppContext::new(store, notices.clone());
        check(&context, &notices);
    }
}

#[test]
fn update_changes_only_patched_fields() {
    with_each_backend(|context, _| {
        let list = context.lists.create(&ListDraft::new("Work")).unwrap();
        let created = context
            .tasks
            .create(&TaskDraft {
                description: "Quarterly numbers".to_string(),
                priority: Priority::High,
                due_date: Some(date(2024, 4, 1)),
                ..TaskDraft::new("Write report", list.id)
            })
            .unwrap();

        context
            .tasks
            .update(created.id, &TaskPatch::title("X"))
            .unwrap();
        let reloaded = context.tasks.get_by_id(created.id).unwrap();

        assert_eq!(reloaded.title, "X");
        assert_eq!(reloaded.description, "Quarterly numbers");
        assert_eq!(reloaded.priority, Priority::High);
        assert_eq!(reloaded.due_date, Some(date(2024, 4, 1)));
        assert_eq!(reloaded.list_id, list.id);
        assert_eq!(reloaded.created_at, created.created_at);
    });
}

#[test]
fn create_validates_fields_and_list_existence() {
    with_each_backend(|context, notices| {
        let err = context
            .tasks
            .create(&TaskDraft {
                title: " ".to_string(),
                ..TaskDraft::default()
            })
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => {
                assert_eq!(errors.message_for("title"), Some("Task title is required"));
                assert_eq!(errors.message_for("list_id"), Some("Please select a list"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = context
            .tasks
            .create(&TaskDraft::new("Orphan", ListId(77)))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(context.tasks.get_all().unwrap().is_empty());
        assert!(notices.is_empty());
    });
}

#[test]
fn completion_keeps_completed_at_in_step() {
    with_each_backend(|context, _| {
        let list = context.lists.create(&ListDraft::new("Home")).unwrap();
        let task = context
            .tasks
            .create(&TaskDraft::new("Water plants", list.id))
            .unwrap();
        assert!(!task.completed);
        assert_eq!(task.completed_at, None);

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let done = context.tasks.toggle_completed(&task, now).unwrap();
        assert!(done.completed);
        assert_eq!(done.completed_at, Some(now));

        let undone = context.tasks.set_completed(task.id, false, now).unwrap();
        assert!(!undone.completed);
        assert_eq!(undone.completed_at, None);

        let archived = context.tasks.set_archived(task.id, true).unwrap();
        assert!(archived.archived);
    });
}

#[test]
fn missing_tasks_are_not_found_on_every_backend() {
    with_each_backend(|context, notices| {
        assert!(context.tasks.get_by_id(TaskId(404)).unwrap_err().is_not_found());
        assert!(context
            .tasks
            .update(TaskId(404), &TaskPatch::title("Nope"))
            .unwrap_err()
            .is_not_found());
        assert!(context.tasks.delete(TaskId(404)).unwrap_err().is_not_found());
        // The failed update and delete are each surfaced once.
        assert_eq!(notices.len(), 2);
    });
}

#[test]
fn get_all_returns_newest_first_and_filters_by_list() {
    with_each_backend(|context, _| {
        let work = context.lists.create(&ListDraft::new("Work")).unwrap();
        let home = context.lists.create(&ListDraft::new("Home")).unwrap();
        let outcome = context
            .tasks
            .create_many(&[
                TaskDraft::new("First", work.id),
                TaskDraft::new("Second", home.id),
                TaskDraft::new("Third", work.id),
            ])
            .unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.first().unwrap().title, "First");

        let all = context.tasks.get_all().unwrap();
        assert_eq!(all.len(), 3);
        assert!(all
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));

        let work_tasks = context.tasks.get_by_list(work.id).unwrap();
        assert_eq!(work_tasks.len(), 2);
        assert!(work_tasks.iter().all(|task| task.list_id == work.id));
    });
}

#[test]
fn bulk_update_and_delete_report_each_failure() {
    with_each_backend(|context, notices| {
        let list = context.lists.create(&ListDraft::new("Work")).unwrap();
        let task = context
            .tasks
            .create(&TaskDraft::new("Real", list.id))
            .unwrap();

        let updated = context
            .tasks
            .update_many(&[
                (task.id, TaskPatch::title("Renamed")),
                (TaskId(999), TaskPatch::title("Ghost")),
            ])
            .unwrap();
        assert_eq!(updated.succeeded.len(), 1);
        assert_eq!(updated.succeeded[0].title, "Renamed");
        assert_eq!(updated.failed.len(), 1);
        assert_eq!(updated.failed[0].id, Some(999));

        let deleted = context
            .tasks
            .delete_many(&[task.id, TaskId(998)])
            .unwrap();
        assert_eq!(deleted.succeeded, vec![task.id]);
        assert!(deleted.has_failures());

        let drained = notices.drain();
        assert_eq!(drained.len(), 2);
        assert!(drained
            .iter()
            .all(|notice| notice.level == NoticeLevel::Error));
    });
}

#[test]
fn transport_failure_is_returned_and_notified_once() {
    let conn = open_db_in_memory().unwrap();
    let store = Rc::new(SwitchableStore {
        inner: SqliteRecordStore::try_new(&conn).unwrap(),
        offline: Cell::new(false),
    });
    let notices = Rc::new(NoticeQueue::new());
    let context = AppContext::new(store.clone(), notices.clone());
    let list = context.lists.create(&ListDraft::new("Work")).unwrap();

    store.offline.set(true);
    let err = context.tasks.get_all().unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Transport(StoreError::Unavailable(_))
    ));
    let err = context
        .tasks
        .create(&TaskDraft::new("Offline", list.id))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Transport(_)));

    let drained = notices.drain();
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].message, "Failed to load tasks");

    store.offline.set(false);
    assert!(context.tasks.get_all().unwrap().is_empty());
}

#[test]
fn empty_patch_reads_back_without_writing() {
    with_each_backend(|context, _| {
        let list = context.lists.create(&ListDraft::new("Work")).unwrap();
        let task = context
            .tasks
            .create(&TaskDraft::new("Same", list.id))
            .unwrap();
        let read_back = context.tasks.update(task.id, &TaskPatch::default()).unwrap();
        assert_eq!(read_back, task);
    });
}

#[test]
fn moving_a_task_requires_an_existing_list() {
    with_each_backend(|context, _| {
        let list = context.lists.create(&ListDraft::new("Work")).unwrap();
        let task = context
            .tasks
            .create(&TaskDraft::new("Move me", list.id))
            .unwrap();

        let err = context
            .tasks
            .update(
                task.id,
                &TaskPatch {
                    list_id: Some(ListId(55)),
                    ..TaskPatch::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(context.tasks.get_by_id(task.id).unwrap().list_id, list.id);
    });
}

#[test]
fn completing_a_done_task_keeps_the_first_stamp() {
    with_each_backend(|context, _| {
        let list = context.lists.create(&ListDraft::new("Home")).unwrap();
        let task = context
            .tasks
            .create(&TaskDraft::new("Laundry", list.id))
            .unwrap();

        let first = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
        context.tasks.set_completed(task.id, true, first).unwrap();
        let again = context.tasks.set_completed(task.id, true, later).unwrap();
        assert!(again.completed);
        assert_eq!(again.completed_at, Some(first));

        let reopened = context.tasks.set_completed(task.id, false, later).unwrap();
        assert_eq!(reopened.completed_at, None);
        let still_open = context.tasks.set_completed(task.id, false, later).unwrap();
        assert_eq!(still_open, reopened);
    });
}

#[test]
fn completing_a_missing_task_is_not_found() {
    with_each_backend(|context, notices| {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        assert!(context
            .tasks
            .set_completed(TaskId(404), true, now)
            .unwrap_err()
            .is_not_found());
        assert!(notices.is_empty());
    });
}
