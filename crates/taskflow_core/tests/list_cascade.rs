use std::cell::Cell;
use std::rc::Rc;
use taskflow_core::db::open_db_in_memory;
use taskflow_core::notify::{NoticeLevel, NoticeQueue};
use taskflow_core::store::{
    BulkResponse, Collection, DeleteRequest, FetchRequest, FetchResponse, LocalRecordStore,
    Record, RecordId, RecordResult, RecordStore, SqliteKeyValueStore, SqliteRecordStore,
    StoreResult, WriteRequest,
};
use taskflow_core::view::board::TaskBoard;
use taskflow_core::view::task_filter::ListScope;
use taskflow_core::{AppContext, ListDraft, ListPatch, ServiceError, TaskDraft, TaskId};

/// Refuses to delete one task record; everything else passes through.
struct LockedTaskStore<S> {
    inner: S,
    locked: Cell<RecordId>,
}

impl<S: RecordStore> RecordStore for LockedTaskStore<S> {
    fn fetch_records(
        &self,
        collection: Collection,
        request: &FetchRequest,
    ) -> StoreResult<FetchResponse> {
        self.inner.fetch_records(collection, request)
    }

    fn get_record_by_id(
        &self,
        collection: Collection,
        id: RecordId,
        fields: &[String],
    ) -> StoreResult<Option<Record>> {
        self.inner.get_record_by_id(collection, id, fields)
    }

    fn create_records(
        &self,
        collection: Collection,
        request: &WriteRequest,
    ) -> StoreResult<BulkResponse> {
        self.inner.create_records(collection, request)
    }

    fn update_records(
        &self,
        collection: Collection,
        request: &WriteRequest,
    ) -> StoreResult<BulkResponse> {
        self.inner.update_records(collection, request)
    }

    fn delete_records(
        &self,
        collection: Collection,
        request: &DeleteRequest,
    ) -> StoreResult<BulkResponse> {
        if collection == Collection::Tasks && request.record_ids == [self.locked.get()] {
            return Ok(BulkResponse::completed(vec![RecordResult::failed(
                "task is locked",
            )]));
        }
        self.inner.delete_records(collection, request)
    }
}

#[test]
fn cascade_reports_success_when_one_task_delete_fails() {
    let conn = open_db_in_memory().unwrap();
    let store = Rc::new(LockedTaskStore {
        inner: SqliteRecordStore::try_new(&conn).unwrap(),
        locked: Cell::new(0),
    });
    let notices = Rc::new(NoticeQueue::new());
    let context = AppContext::new(store.clone(), notices.clone());

    let doomed = context.lists.create(&ListDraft::new("Doomed")).unwrap();
    let kept = context.lists.create(&ListDraft::new("Kept")).unwrap();
    let created = context
        .tasks
        .create_many(&[
            TaskDraft::new("One", doomed.id),
            TaskDraft::new("Two", doomed.id),
            TaskDraft::new("Three", doomed.id),
            TaskDraft::new("Elsewhere", kept.id),
        ])
        .unwrap();
    assert_eq!(created.succeeded.len(), 4);
    let locked = created.succeeded[1].id;
    store.locked.set(locked.0);

    let report = context.delete_list_cascade(doomed.id).unwrap();

    assert_eq!(report.deleted_tasks.len(), 2);
    assert_eq!(report.failed_tasks.len(), 1);
    assert_eq!(report.failed_tasks[0].0, locked);
    assert!(context.lists.get_by_id(doomed.id).unwrap_err().is_not_found());

    let remaining: Vec<TaskId> = context
        .tasks
        .get_all()
        .unwrap()
        .into_iter()
        .map(|task| task.id)
        .collect();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.contains(&locked));

    let drained = notices.drain();
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].message, "Failed to delete task: task is locked");
    assert_eq!(drained[1].level, NoticeLevel::Error);
}

#[test]
fn cascade_on_local_backend_removes_all_tasks() {
    let conn = open_db_in_memory().unwrap();
    let store = LocalRecordStore::new(SqliteKeyValueStore::try_new(&conn).unwrap());
    let notices = Rc::new(NoticeQueue::new());
    let context = AppContext::new(store, notices.clone());

    let list = context.lists.create(&ListDraft::new("Errands")).unwrap();
    for title in ["Milk", "Stamps"] {
        context.tasks.create(&TaskDraft::new(title, list.id)).unwrap();
    }

    let mut board = TaskBoard::new();
    board.reload(&context).unwrap();
    board.select_scope(ListScope::List(list.id));
    assert_eq!(board.sidebar_counts().for_list(list.id), 2);

    let report = context.delete_list_cascade(list.id).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.deleted_tasks.len(), 2);
    board.remove_list(report.list_id, &report.deleted_tasks);
    assert_eq!(board.query().scope, ListScope::All);
    assert!(board.tasks().is_empty());

    board.reload(&context).unwrap();
    assert!(board.lists().is_empty());
    assert_eq!(notices.drain()[0].message, "List deleted successfully!");
}

#[test]
fn cascade_on_missing_list_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let context = AppContext::new(
        SqliteRecordStore::try_new(&conn).unwrap(),
        Rc::new(NoticeQueue::new()),
    );
    let err = context
        .delete_list_cascade(taskflow_core::ListId(9))
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[test]
fn lists_keep_creation_order_and_advisory_counts() {
    let conn = open_db_in_memory().unwrap();
    let context = AppContext::new(
        SqliteRecordStore::try_new(&conn).unwrap(),
        Rc::new(NoticeQueue::new()),
    );

    let outcome = context
        .lists
        .create_many(&[ListDraft::new("A"), ListDraft::new("B")])
        .unwrap();
    let first = outcome.first().unwrap().clone();
    assert_eq!(first.order, 0);
    assert_eq!(first.task_count, 0);
    let third = context.lists.create(&ListDraft::new("C")).unwrap();
    assert_eq!(third.order, 2);

    context
        .lists
        .update(
            first.id,
            &ListPatch {
                order: Some(5),
                task_count: Some(12),
                ..ListPatch::default()
            },
        )
        .unwrap();
    context
        .tasks
        .create(&TaskDraft::new("Only one", first.id))
        .unwrap();

    let names: Vec<String> = context
        .lists
        .get_all()
        .unwrap()
        .into_iter()
        .map(|list| list.name)
        .collect();
    assert_eq!(names, vec!["B", "C", "A"]);

    let mut board = TaskBoard::new();
    board.reload(&context).unwrap();
    assert_eq!(board.lists()[2].task_count, 12);
    assert_eq!(board.sidebar_counts().for_list(first.id), 1);

    let err = context
        .lists
        .update(
            first.id,
            &ListPatch {
                color: Some("blue".to_string()),
                ..ListPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[test]
fn cascade_finds_tasks_beyond_the_first_page() {
    let conn = open_db_in_memory().unwrap();
    let notices = Rc::new(NoticeQueue::new());
    let context = AppContext::new(SqliteRecordStore::try_new(&conn).unwrap(), notices.clone());

    let doomed = context.lists.create(&ListDraft::new("Doomed")).unwrap();
    let other = context.lists.create(&ListDraft::new("Other")).unwrap();
    let old_tasks: Vec<TaskDraft> = (0..3)
        .map(|n| TaskDraft::new(format!("Old {n}"), doomed.id))
        .collect();
    context.tasks.create_many(&old_tasks).unwrap();
    let newer_tasks: Vec<TaskDraft> = (0..100)
        .map(|n| TaskDraft::new(format!("New {n}"), other.id))
        .collect();
    assert!(context.tasks.create_many(&newer_tasks).unwrap().is_complete());

    assert_eq!(context.tasks.get_all().unwrap().len(), 103);
    let report = context.delete_list_cascade(doomed.id).unwrap();
    assert_eq!(report.deleted_tasks.len(), 3);
    assert!(report.is_complete());

    let left = context.tasks.get_all().unwrap();
    assert_eq!(left.len(), 100);
    assert!(left.iter().all(|task| task.list_id == other.id));
}

#[test]
fn board_reload_sees_every_page() {
    let conn = open_db_in_memory().unwrap();
    let store = LocalRecordStore::new(SqliteKeyValueStore::try_new(&conn).unwrap());
    let context = AppContext::new(store, Rc::new(NoticeQueue::new())).with_page_limit(Some(4));

    let list = context.lists.create(&ListDraft::new("Inbox")).unwrap();
    let drafts: Vec<TaskDraft> = (0..9)
        .map(|n| TaskDraft::new(format!("Task {n}"), list.id))
        .collect();
    context.tasks.create_many(&drafts).unwrap();

    let mut board = TaskBoard::new();
    board.reload(&context).unwrap();
    assert_eq!(board.tasks().len(), 9);
    assert_eq!(board.sidebar_counts().all, 9);
    assert_eq!(board.sidebar_counts().for_list(list.id), 9);
}
