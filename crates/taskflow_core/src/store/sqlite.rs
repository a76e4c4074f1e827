//! SQLite implementation of the record API.
//!
//! # Responsibility
//! - Keep every collection in the shared `records` table with caller fields
//!   stored as a JSON object.
//! - Translate projection, ordering and paging into SQL.
//!
//! # Invariants
//! - Ids come from `AUTOINCREMENT` and are never reused.
//! - Updates merge the supplied fields onto the stored object; fields not
//!   named in the request are left untouched.

use crate::store::{
    now_timestamp, project_fields, record_id, validate_fetch_request, validate_field_name,
    writable_fields, BulkResponse, Collection, DeleteRequest, FetchRequest, FetchResponse, Record,
    RecordId, RecordResult, RecordStore, SortDirection, StoreError, StoreResult, WriteRequest,
    FIELD_CREATED_ON, FIELD_ID, FIELD_MODIFIED_ON,
};
use log::{debug, warn};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Value;

const RECORD_SELECT_SQL: &str = "SELECT
    id,
    data,
    created_on,
    modified_on
FROM records";

/// Record API over the `records` table.
#[derive(Clone, Copy)]
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordStore<'conn> {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `MissingRequiredTable("records")` when migrations have not run.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        require_table(conn, "records")?;
        Ok(Self { conn })
    }

    fn load(&self, collection: Collection, id: RecordId) -> StoreResult<Option<Record>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL}
             WHERE collection = ?1
               AND id = ?2;"
        ))?;
        let row = stmt
            .query_row(params![collection.as_str(), id], |row| {
                Ok((
                    row.get::<_, i64>("id")?,
                    row.get::<_, String>("data")?,
                    row.get::<_, String>("created_on")?,
                    row.get::<_, String>("modified_on")?,
                ))
            })
            .optional()?;

        row.map(|(id, data, created_on, modified_on)| {
            assemble_record(id, &data, created_on, modified_on)
        })
        .transpose()
    }

    fn insert_one(&self, collection: Collection, record: &Record) -> StoreResult<RecordResult> {
        let fields = writable_fields(record);
        if let Some(bad) = fields.keys().find(|key| validate_field_name(key).is_err()) {
            return Ok(RecordResult::failed(format!("invalid field name `{bad}`")));
        }

        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO records (collection, data, created_on, modified_on)
             VALUES (?1, ?2, ?3, ?3);",
            params![
                collection.as_str(),
                serde_json::to_string(&fields)?,
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(RecordResult::ok(self.load(collection, id)?))
    }

    fn update_one(&self, collection: Collection, record: &Record) -> StoreResult<RecordResult> {
        let Some(id) = record_id(record) else {
            return Ok(RecordResult::failed("record is missing `Id`"));
        };
        let changes = writable_fields(record);
        if let Some(bad) = changes.keys().find(|key| validate_field_name(key).is_err()) {
            return Ok(RecordResult::failed(format!("invalid field name `{bad}`")));
        }
        let Some(existing) = self.load(collection, id)? else {
            return Ok(RecordResult::failed(format!(
                "{} record {id} not found",
                collection.entity_name()
            )));
        };

        let mut merged = writable_fields(&existing);
        merged.extend(changes);
        self.conn.execute(
            "UPDATE records
             SET
                data = ?1,
                modified_on = ?2
             WHERE collection = ?3
               AND id = ?4;",
            params![
                serde_json::to_string(&merged)?,
                now_timestamp(),
                collection.as_str(),
                id
            ],
        )?;
        Ok(RecordResult::ok(self.load(collection, id)?))
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn fetch_records(
        &self,
        collection: Collection,
        request: &FetchRequest,
    ) -> StoreResult<FetchResponse> {
        validate_fetch_request(request)?;

        let mut sql = format!("{RECORD_SELECT_SQL} WHERE collection = ?");
        let mut bind_values = vec![SqlValue::Text(collection.as_str().to_string())];

        sql.push_str(" ORDER BY ");
        for order in &request.order_by {
            let direction = match order.sort_type {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            sql.push_str(&format!("{} {direction}, ", order_expression(&order.field_name)));
        }
        sql.push_str("id ASC");

        if let Some(paging) = request.paging_info {
            sql.push_str(" LIMIT ? OFFSET ?");
            bind_values.push(SqlValue::Integer(i64::from(paging.limit)));
            bind_values.push(SqlValue::Integer(i64::from(paging.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut data = Vec::new();
        while let Some(row) = rows.next()? {
            data.push(project_fields(parse_record_row(row)?, &request.fields));
        }

        debug!(
            "event=record_fetch module=store status=ok backend=sqlite collection={} count={}",
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
            .load(collection, id)?
            .map(|record| project_fields(record, fields)))
    }

    fn create_records(
        &self,
        collection: Collection,
        request: &WriteRequest,
    ) -> StoreResult<BulkResponse> {
        let results = request
            .records
            .iter()
            .map(|record| self.insert_one(collection, record))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(BulkResponse::completed(results))
    }

    fn update_records(
        &self,
        collection: Collection,
        request: &WriteRequest,
    ) -> StoreResult<BulkResponse> {
        let results = request
            .records
            .iter()
            .map(|record| self.update_one(collection, record))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(BulkResponse::completed(results))
    }

    fn delete_records(
        &self,
        collection: Collection,
        request: &DeleteRequest,
    ) -> StoreResult<BulkResponse> {
        let mut results = Vec::with_capacity(request.record_ids.len());
        for id in &request.record_ids {
            let changed = self.conn.execute(
                "DELETE FROM records WHERE collection = ?1 AND id = ?2;",
                params![collection.as_str(), id],
            )?;
            if changed == 0 {
                warn!(
                    "event=record_delete module=store status=error backend=sqlite collection={collection} id={id} error_code=not_found"
                );
                results.push(RecordResult::failed(format!(
                    "{} record {id} not found",
                    collection.entity_name()
                )));
            } else {
                results.push(RecordResult::ok(None));
            }
        }
        Ok(BulkResponse::completed(results))
    }
}

fn order_expression(field: &str) -> String {
    match field {
        FIELD_ID => "id".to_string(),
        FIELD_CREATED_ON => "created_on".to_string(),
        FIELD_MODIFIED_ON => "modified_on".to_string(),
        // Field names are validated identifiers at this point.
        other => format!("json_extract(data, '$.{other}')"),
    }
}

fn parse_record_row(row: &Row<'_>) -> StoreResult<Record> {
    let id: i64 = row.get("id")?;
    let data: String = row.get("data")?;
    assemble_record(id, &data, row.get("created_on")?, row.get("modified_on")?)
}

fn assemble_record(
    id: RecordId,
    data: &str,
    created_on: String,
    modified_on: String,
) -> StoreResult<Record> {
    let mut record = match serde_json::from_str::<Value>(data)? {
        Value::Object(fields) => fields,
        other => {
            return Err(StoreError::InvalidData(format!(
                "record {id} holds non-object data `{other}`"
            )));
        }
    };
    record.insert(FIELD_ID.to_string(), Value::from(id));
    record.insert(FIELD_CREATED_ON.to_string(), Value::String(created_on));
    record.insert(FIELD_MODIFIED_ON.to_string(), Value::String(modified_on));
    Ok(record)
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn require_table(conn: &Connection, table: &'static str) -> StoreResult<()> {
    if table_exists(conn, table)? {
        Ok(())
    } else {
        Err(StoreError::MissingRequiredTable(table))
    }
}
