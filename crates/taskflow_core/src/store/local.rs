//! Local persistence shim: one serialized JSON array per collection.
//!
//! # Responsibility
//! - Keep each collection as a single blob under a fixed key in a key-value
//!   store.
//! - Serve the same record API as the SQLite backend so services have one
//!   contract regardless of backend.
//!
//! # Invariants
//! - New ids are `max(existing id) + 1` (or 1 for an empty collection).
//! - Every mutation rewrites the whole blob; there is no schema versioning.

use crate::store::sqlite::require_table;
use crate::store::{
    now_timestamp, project_fields, record_id, sort_records, validate_fetch_request,
    validate_field_name, writable_fields, BulkResponse, Collection, DeleteRequest, FetchRequest,
    FetchResponse, Record, RecordId, RecordResult, RecordStore, StoreError, StoreResult,
    WriteRequest, FIELD_CREATED_ON, FIELD_ID, FIELD_MODIFIED_ON,
};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

/// String key-value persistence used by the local backend.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// Key-value store on the `kv_store` table.
#[derive(Clone, Copy)]
pub struct SqliteKeyValueStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteKeyValueStore<'conn> {
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        require_table(conn, "kv_store")?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteKeyValueStore<'_> {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now') * 1000)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Record API over per-collection JSON blobs.
#[derive(Clone, Copy)]
pub struct LocalRecordStore<K> {
    kv: K,
}

impl<K: KeyValueStore> LocalRecordStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    /// Writes `records` as the initial collection content when nothing is
    /// stored yet. Returns whether the seed was applied.
    pub fn seed_if_empty(&self, collection: Collection, records: &[Record]) -> StoreResult<bool> {
        if self.kv.get(collection.storage_key())?.is_some() {
            return Ok(false);
        }
        let now = now_timestamp();
        let mut seeded = Vec::with_capacity(records.len());
        let mut next_id = 1;
        for record in records {
            let id = record_id(record).unwrap_or(next_id);
            next_id = next_id.max(id + 1);
            seeded.push(stamp(writable_fields(record), id, &now, &now));
        }
        self.save(collection, &seeded)?;
        info!(
            "event=collection_seed module=store status=ok backend=local collection={} count={}",
            collection,
            seeded.len()
        );
        Ok(true)
    }

    fn load(&self, collection: Collection) -> StoreResult<Vec<Record>> {
        let Some(blob) = self.kv.get(collection.storage_key())? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Value>(&blob)? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(record) => Ok(record),
                    other => Err(StoreError::InvalidData(format!(
                        "non-object entry `{other}` in `{}`",
                        collection.storage_key()
                    ))),
                })
                .collect(),
            _ => Err(StoreError::InvalidData(format!(
                "`{}` does not hold a JSON array",
                collection.storage_key()
            ))),
        }
    }

    fn save(&self, collection: Collection, records: &[Record]) -> StoreResult<()> {
        let blob = serde_json::to_string(records)?;
        self.kv.set(collection.storage_key(), &blob)
    }
}

impl<K: KeyValueStore> RecordStore for LocalRecordStore<K> {
    fn fetch_records(
        &self,
        collection: Collection,
        request: &FetchRequest,
    ) -> StoreResult<FetchResponse> {
        validate_fetch_request(request)?;

        let mut records = self.load(collection)?;
        sort_records(&mut records, &request.order_by);
        let (offset, limit) = match request.paging_info {
            Some(paging) => (paging.offset as usize, paging.limit as usize),
            None => (0, usize::MAX),
        };
        let data: Vec<Record> = records
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|record| project_fields(record, &request.fields))
            .collect();

        debug!(
            "event=record_fetch module=store status=ok backend=local collection={} count={}",
            collection,
            data.len()
        );
        Ok(FetchResponse {
            success: true,
            message: None,
            data,
        })
    }

    fn get_record_by_id(
        &self,
        collection: Collection,
        id: RecordId,
        fields: &[String],
    ) -> StoreResult<Option<Record>> {
        for field in fields {
            validate_field_name(field)?;
        }
        Ok(self
            .load(collection)?
            .into_iter()
            .find(|record| record_id(record) == Some(id))
            .map(|record| project_fields(record, fields)))
    }

    fn create_records(
        &self,
        collection: Collection,
        request: &WriteRequest,
    ) -> StoreResult<BulkResponse> {
        let mut records = self.load(collection)?;
        let mut next_id = records.iter().filter_map(record_id).max().unwrap_or(0) + 1;
        let now = now_timestamp();
        let mut results = Vec::with_capacity(request.records.len());

        for record in &request.records {
            let fields = writable_fields(record);
            if let Some(bad) = fields.keys().find(|key| validate_field_name(key).is_err()) {
                results.push(RecordResult::failed(format!("invalid field name `{bad}`")));
                continue;
            }
            let created = stamp(fields, next_id, &now, &now);
            next_id += 1;
            results.push(RecordResult::ok(Some(created.clone())));
            records.push(created);
        }

        self.save(collection, &records)?;
        Ok(BulkResponse::completed(results))
    }

    fn update_records(
        &self,
        collection: Collection,
        request: &WriteRequest,
    ) -> StoreResult<BulkResponse> {
        let mut records = self.load(collection)?;
        let now = now_timestamp();
        let mut results = Vec::with_capacity(request.records.len());

        for patch in &request.records {
            let Some(id) = record_id(patch) else {
                results.push(RecordResult::failed("record is missing `Id`"));
                continue;
            };
            let changes = writable_fields(patch);
            if let Some(bad) = changes.keys().find(|key| validate_field_name(key).is_err()) {
                results.push(RecordResult::failed(format!("invalid field name `{bad}`")));
                continue;
            }
            let Some(existing) = records
                .iter_mut()
                .find(|record| record_id(record) == Some(id))
            else {
                results.push(RecordResult::failed(format!(
                    "{} record {id} not found",
                    collection.entity_name()
                )));
                continue;
            };

            existing.extend(changes);
            existing.insert(FIELD_MODIFIED_ON.to_string(), Value::String(now.clone()));
            results.push(RecordResult::ok(Some(existing.clone())));
        }

        self.save(collection, &records)?;
        Ok(BulkResponse::completed(results))
    }

    fn delete_records(
        &self,
        collection: Collection,
        request: &DeleteRequest,
    ) -> StoreResult<BulkResponse> {
        let mut records = self.load(collection)?;
        let mut results = Vec::with_capacity(request.record_ids.len());

        for id in &request.record_ids {
            let before = records.len();
            records.retain(|record| record_id(record) != Some(*id));
            if records.len() == before {
                results.push(RecordResult::failed(format!(
                    "{} record {id} not found",
                    collection.entity_name()
                )));
            } else {
                results.push(RecordResult::ok(None));
            }
        }

        self.save(collection, &records)?;
        Ok(BulkResponse::completed(results))
    }
}

fn stamp(mut fields: Record, id: RecordId, created_on: &str, modified_on: &str) -> Record {
    fields.insert(FIELD_ID.to_string(), Value::from(id));
    fields.insert(
        FIELD_CREATED_ON.to_string(),
        Value::String(created_on.to_string()),
    );
    fields.insert(
        FIELD_MODIFIED_ON.to_string(),
        Value::String(modified_on.to_string()),
    );
    fields
}
