//! Shared record plumbing for the entity services.
//!
//! Owns the failure policy: transport failures are logged, notified once and
//! returned as `Transport`; refused records are logged and notified one by
//! one. Nothing is retried.

use crate::notify::{Notice, Notifier};
use crate::service::{
    normalize_page_limit, BulkOutcome, PartialFailure, RecordFailure, ServiceError, ServiceResult,
};
use crate::store::{
    record_id, BulkResponse, Collection, DeleteRequest, FetchRequest, OrderBy, PagingInfo, Record,
    RecordId, RecordStore, StoreError, StoreResult, WriteRequest, FIELD_ID,
};
use log::{debug, error, warn};
use std::rc::Rc;

#[derive(Debug, Clone, Copy)]
enum Op {
    Load,
    Create,
    Update,
    Delete,
}

impl Op {
    fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

pub(crate) struct RecordGateway<S> {
    store: S,
    collection: Collection,
    notifier: Rc<dyn Notifier>,
    page_limit: u32,
}

impl<S: RecordStore> RecordGateway<S> {
    pub(crate) fn new(store: S, collection: Collection, notifier: Rc<dyn Notifier>) -> Self {
        Self {
            store,
            collection,
            notifier,
            page_limit: normalize_page_limit(None),
        }
    }

    pub(crate) fn set_page_limit(&mut self, limit: Option<u32>) {
        self.page_limit = normalize_page_limit(limit);
    }

    /// Whole collection with projection and ordering, read `page_limit`
    /// records at a time until a short page comes back.
    pub(crate) fn fetch_all(
        &self,
        fields: &[&str],
        order_by: Vec<OrderBy>,
    ) -> ServiceResult<Vec<Record>> {
        let mut request = FetchRequest {
            fields: fields.iter().map(|field| field.to_string()).collect(),
            order_by,
            paging_info: Some(PagingInfo {
                limit: self.page_limit,
                offset: 0,
            }),
        };

        let mut records = Vec::new();
        let mut pages = 0u32;
        loop {
            let page = match self.store.fetch_records(self.collection, &request) {
                Ok(response) if response.success => response.data,
                Ok(response) => {
                    return Err(self.transport(Op::Load, rejected(response.message)));
                }
                Err(err) => return Err(self.transport(Op::Load, err)),
            };
            pages += 1;
            let fetched = page.len();
            records.extend(page);

            // Short pages end the read; so do oversized ones from a store
            // that ignores paging.
            if fetched != self.page_limit as usize {
                break;
            }
            if let Some(paging) = request.paging_info.as_mut() {
                paging.offset += self.page_limit;
            }
        }

        debug!(
            "event=record_fetch module=service status=ok collection={} count={} pages={pages}",
            self.collection,
            records.len()
        );
        Ok(records)
    }

    pub(crate) fn get(&self, id: RecordId, fields: &[&str]) -> ServiceResult<Record> {
        let fields: Vec<String> = fields.iter().map(|field| field.to_string()).collect();
        match self.store.get_record_by_id(self.collection, id, &fields) {
            Ok(Some(record)) => Ok(record),
            Ok(None) => {
                warn!(
                    "event=record_get module=service status=error collection={} id={id} error_code=not_found",
                    self.collection
                );
                Err(ServiceError::NotFound {
                    collection: self.collection,
                    id,
                })
            }
            Err(err) => Err(self.transport(Op::Load, err)),
        }
    }

    /// Whether `id` exists in another collection (e.g. a task's list).
    pub(crate) fn exists_in(&self, collection: Collection, id: RecordId) -> ServiceResult<bool> {
        match self
            .store
            .get_record_by_id(collection, id, &[FIELD_ID.to_string()])
        {
            Ok(found) => Ok(found.is_some()),
            Err(err) => Err(self.transport(Op::Load, err)),
        }
    }

    pub(crate) fn create(&self, records: Vec<Record>) -> ServiceResult<BulkOutcome<Record>> {
        let request = WriteRequest { records };
        let response = self.store.create_records(self.collection, &request);
        let targets = vec![None; request.records.len()];
        self.collect_records(Op::Create, response, &targets)
    }

    pub(crate) fn update(&self, records: Vec<Record>) -> ServiceResult<BulkOutcome<Record>> {
        let targets: Vec<Option<RecordId>> = records.iter().map(record_id).collect();
        let request = WriteRequest { records };
        let response = self.store.update_records(self.collection, &request);
        self.collect_records(Op::Update, response, &targets)
    }

    pub(crate) fn delete(&self, ids: &[RecordId]) -> ServiceResult<BulkOutcome<RecordId>> {
        let request = DeleteRequest {
            record_ids: ids.to_vec(),
        };
        let response = self
            .store
            .delete_records(self.collection, &request)
            .and_then(accepted)
            .map_err(|err| self.transport(Op::Delete, err))?;

        let mut outcome = BulkOutcome {
            succeeded: Vec::new(),
            failed: Vec::new(),
        };
        let mut results = response.results.into_iter();
        for &target in ids {
            match results.next() {
                Some(result) if result.success => outcome.succeeded.push(target),
                Some(result) => outcome.failed.push(RecordFailure {
                    id: Some(target),
                    message: result
                        .message
                        .unwrap_or_else(|| self.default_failure(Op::Delete)),
                    errors: result.errors,
                }),
                None => outcome.failed.push(missing_result(Some(target))),
            }
        }
        self.report_failures(Op::Delete, &outcome.failed);
        Ok(outcome)
    }

    pub(crate) fn create_one(&self, record: Record) -> ServiceResult<Record> {
        let outcome = self.create(vec![record])?;
        match outcome.succeeded.into_iter().next() {
            Some(created) => Ok(created),
            None => Err(ServiceError::PartialFailure(PartialFailure {
                collection: self.collection,
                succeeded: Vec::new(),
                failed: outcome.failed,
            })),
        }
    }

    pub(crate) fn update_one(&self, id: RecordId, mut changes: Record) -> ServiceResult<Record> {
        changes.insert(FIELD_ID.to_string(), id.into());
        let outcome = self.update(vec![changes])?;
        match outcome.succeeded.into_iter().next() {
            Some(updated) => Ok(updated),
            None => Err(self.classify_single_failure(id, outcome.failed)),
        }
    }

    pub(crate) fn delete_one(&self, id: RecordId) -> ServiceResult<()> {
        let outcome = self.delete(&[id])?;
        if outcome.succeeded.contains(&id) {
            Ok(())
        } else {
            Err(self.classify_single_failure(id, outcome.failed))
        }
    }

    fn classify_single_failure(&self, id: RecordId, failed: Vec<RecordFailure>) -> ServiceError {
        match self
            .store
            .get_record_by_id(self.collection, id, &[FIELD_ID.to_string()])
        {
            Ok(None) => ServiceError::NotFound {
                collection: self.collection,
                id,
            },
            _ => ServiceError::PartialFailure(PartialFailure {
                collection: self.collection,
                succeeded: Vec::new(),
                failed,
            }),
        }
    }

    fn collect_records(
        &self,
        op: Op,
        response: StoreResult<BulkResponse>,
        targets: &[Option<RecordId>],
    ) -> ServiceResult<BulkOutcome<Record>> {
        let response = response
            .and_then(accepted)
            .map_err(|err| self.transport(op, err))?;

        let mut outcome = BulkOutcome {
            succeeded: Vec::new(),
            failed: Vec::new(),
        };
        let mut results = response.results.into_iter();
        for &target in targets {
            let Some(result) = results.next() else {
                outcome.failed.push(missing_result(target));
                continue;
            };
            match (result.success, result.data) {
                (true, Some(data)) => outcome.succeeded.push(data),
                (true, None) => outcome.failed.push(RecordFailure {
                    id: target,
                    message: "store returned no record data".to_string(),
                    errors: Vec::new(),
                }),
                (false, _) => outcome.failed.push(RecordFailure {
                    id: target,
                    message: result.message.unwrap_or_else(|| self.default_failure(op)),
                    errors: result.errors,
                }),
            }
        }

        debug!(
            "event=record_{} module=service status=ok collection={} succeeded={} failed={}",
            op.as_str(),
            self.collection,
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        self.report_failures(op, &outcome.failed);
        Ok(outcome)
    }

    fn report_failures(&self, op: Op, failures: &[RecordFailure]) {
        for failure in failures {
            warn!(
                "event=record_{} module=service status=error collection={} error_code=record_rejected error={failure}",
                op.as_str(),
                self.collection
            );
            self.notifier.notify(Notice::error(format!(
                "Failed to {} {}: {}",
                op.as_str(),
                self.collection.entity_name(),
                failure.message
            )));
        }
    }

    fn transport(&self, op: Op, err: StoreError) -> ServiceError {
        error!(
            "event=record_{} module=service status=error collection={} error_code=transport error={err}",
            op.as_str(),
            self.collection
        );
        let subject = match op {
            Op::Load => self.collection.as_str(),
            _ => self.collection.entity_name(),
        };
        self.notifier
            .notify(Notice::error(format!("Failed to {} {subject}", op.as_str())));
        ServiceError::Transport(err)
    }

    fn default_failure(&self, op: Op) -> String {
        format!(
            "Failed to {} {}",
            op.as_str(),
            self.collection.entity_name()
        )
    }
}

/// Decodes a fetched page, skipping records that cannot be typed.
pub(crate) fn decode_records<T>(
    collection: Collection,
    records: Vec<Record>,
    decode: impl Fn(&Record) -> StoreResult<T>,
) -> Vec<T> {
    records
        .iter()
        .filter_map(|record| match decode(record) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!(
                    "event=record_decode module=service status=error collection={collection} id={:?} error={err}",
                    record_id(record)
                );
                None
            }
        })
        .collect()
}

/// Converts decoded records into typed items, demoting undecodable records to
/// failures.
pub(crate) fn decode_outcome<T>(
    outcome: BulkOutcome<Record>,
    decode: impl Fn(&Record) -> StoreResult<T>,
) -> BulkOutcome<T> {
    let mut decoded = BulkOutcome {
        succeeded: Vec::with_capacity(outcome.succeeded.len()),
        failed: outcome.failed,
    };
    for record in &outcome.succeeded {
        match decode(record) {
            Ok(item) => decoded.succeeded.push(item),
            Err(err) => decoded.failed.push(RecordFailure {
                id: record_id(record),
                message: err.to_string(),
                errors: Vec::new(),
            }),
        }
    }
    decoded
}

fn missing_result(id: Option<RecordId>) -> RecordFailure {
    RecordFailure {
        id,
        message: "store returned no result for this record".to_string(),
        errors: Vec::new(),
    }
}

fn accepted(response: BulkResponse) -> StoreResult<BulkResponse> {
    if response.success {
        Ok(response)
    } else {
        Err(rejected(response.message))
    }
}

fn rejected(message: Option<String>) -> StoreError {
    StoreError::Rejected(message.unwrap_or_else(|| "request was not successful".to_string()))
}

#[cfg(test)]
mod tests {
    use super::RecordGateway;
    use crate::db::open_db_in_memory;
    use crate::notify::NoticeQueue;
    use crate::store::{
        BulkResponse, Collection, DeleteRequest, FetchRequest, FetchResponse, OrderBy, Record,
        RecordId, RecordStore, SqliteRecordStore, StoreResult, WriteRequest, FIELD_ID,
    };
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counts fetches and drops the last per-record result of every write.
    struct ShortStore<S> {
        inner: S,
        fetches: Cell<u32>,
    }

    impl<S: RecordStore> RecordStore for ShortStore<S> {
        fn fetch_records(
            &self,
            collection: Collection,
            request: &FetchRequest,
        ) -> StoreResult<FetchResponse> {
            self.fetches.set(self.fetches.get() + 1);
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
            let mut response = self.inner.create_records(collection, request)?;
            response.results.pop();
            Ok(response)
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
            let mut response = self.inner.delete_records(collection, request)?;
            response.results.pop();
            Ok(response)
        }
    }

    fn named(name: &str) -> Record {
        json!({ "Name": name })
            .as_object()
            .cloned()
            .expect("test record is an object")
    }

    #[test]
    fn fetch_all_reads_until_a_short_page() {
        let conn = open_db_in_memory().expect("open db");
        let inner = SqliteRecordStore::try_new(&conn).expect("record store");
        inner
            .create_records(
                Collection::Lists,
                &WriteRequest {
                    records: ["a", "b", "c", "d", "e"].into_iter().map(named).collect(),
                },
            )
            .expect("seed lists");
        let store = ShortStore {
            inner,
            fetches: Cell::new(0),
        };

        let mut gateway =
            RecordGateway::new(&store, Collection::Lists, Rc::new(NoticeQueue::new()));
        gateway.set_page_limit(Some(2));
        let records = gateway
            .fetch_all(&[FIELD_ID], vec![OrderBy::asc(FIELD_ID)])
            .expect("fetch all");

        let ids: Vec<i64> = records
            .iter()
            .filter_map(|record| record[FIELD_ID].as_i64())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(store.fetches.get(), 3);
    }

    #[test]
    fn records_without_a_result_are_reported_as_failures() {
        let conn = open_db_in_memory().expect("open db");
        let store = ShortStore {
            inner: SqliteRecordStore::try_new(&conn).expect("record store"),
            fetches: Cell::new(0),
        };
        let notices = Rc::new(NoticeQueue::new());
        let gateway = RecordGateway::new(&store, Collection::Lists, notices.clone());

        let created = gateway
            .create(vec![named("kept"), named("dropped")])
            .expect("create");
        assert_eq!(created.succeeded.len(), 1);
        assert_eq!(created.failed.len(), 1);
        assert_eq!(created.failed[0].id, None);

        let deleted = gateway.delete(&[1, 2]).expect("delete");
        assert_eq!(deleted.succeeded, vec![1]);
        assert_eq!(deleted.failed.len(), 1);
        assert_eq!(deleted.failed[0].id, Some(2));
        assert_eq!(notices.len(), 2);
    }
}
