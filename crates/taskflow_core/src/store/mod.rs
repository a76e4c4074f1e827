//! Record store client contracts and shared record helpers.
//!
//! # Responsibility
//! - Define the record API consumed by entity services: fetch with field
//!   projection, ordering and paging; get by id; bulk create/update/delete
//!   with per-record results.
//! - Provide the two backends: a SQLite record table (`SqliteRecordStore`)
//!   and the local blob-per-collection shim (`LocalRecordStore`).
//!
//! # Invariants
//! - `Id`, `CreatedOn` and `ModifiedOn` are system fields owned by the store;
//!   values supplied by callers are ignored.
//! - Record ids are unique within a collection and never reassigned by the
//!   SQLite backend.
//! - Bulk calls apply record by record; there is no rollback when one record
//!   fails.

pub mod local;
pub mod sqlite;

use crate::db::DbError;
use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use std::str::FromStr;

pub use local::{KeyValueStore, LocalRecordStore, SqliteKeyValueStore};
pub use sqlite::SqliteRecordStore;

pub const FIELD_ID: &str = "Id";
pub const FIELD_CREATED_ON: &str = "CreatedOn";
pub const FIELD_MODIFIED_ON: &str = "ModifiedOn";

const SYSTEM_FIELDS: [&str; 3] = [FIELD_ID, FIELD_CREATED_ON, FIELD_MODIFIED_ON];

static FIELD_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{0,63}$").expect("valid field name regex"));

/// Store-assigned record identity.
pub type RecordId = i64;

/// Untyped record as exchanged with the record API.
pub type Record = serde_json::Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Serialization(serde_json::Error),
    /// Request rejected before touching storage (bad field name, bad paging).
    InvalidRequest(String),
    /// Persisted data does not have the expected record shape.
    InvalidData(String),
    /// Backend answered with `success = false`.
    Rejected(String),
    /// Backend could not be reached.
    Unavailable(String),
    MissingRequiredTable(&'static str),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "record serialization failed: {err}"),
            Self::InvalidRequest(message) => write!(f, "invalid record request: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::Rejected(message) => write!(f, "record request rejected: {message}"),
            Self::Unavailable(message) => write!(f, "record store unavailable: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Named record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Lists,
    Tasks,
    Projects,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Self::Lists, Self::Tasks, Self::Projects];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lists => "lists",
            Self::Tasks => "tasks",
            Self::Projects => "projects",
        }
    }

    /// Fixed key of the serialized blob used by the local backend.
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Lists => "taskflow_lists",
            Self::Tasks => "taskflow_tasks",
            Self::Projects => "taskflow_projects",
        }
    }

    /// Singular noun used in notifications.
    pub fn entity_name(self) -> &'static str {
        match self {
            Self::Lists => "list",
            Self::Tasks => "task",
            Self::Projects => "project",
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which record store backs the services.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// JSON blob per collection in the key-value table.
    #[default]
    Local,
    /// Record API semantics over the `records` table.
    Remote,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unsupported backend `{other}`; expected local|remote")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    pub field_name: String,
    #[serde(rename = "sorttype")]
    pub sort_type: SortDirection,
}

impl OrderBy {
    pub fn asc(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            sort_type: SortDirection::Asc,
        }
    }

    pub fn desc(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            sort_type: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingInfo {
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    /// Projected fields; empty means every field. `Id` is always returned.
    pub fields: Vec<String>,
    pub order_by: Vec<OrderBy>,
    pub paging_info: Option<PagingInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Vec<Record>,
}

/// Body of create and update calls. Update records must carry `Id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(rename = "RecordIds")]
    pub record_ids: Vec<RecordId>,
}

/// Per-record outcome of a bulk call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl RecordResult {
    pub fn ok(data: Option<Record>) -> Self {
        Self {
            success: true,
            data,
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub results: Vec<RecordResult>,
}

impl BulkResponse {
    pub fn completed(results: Vec<RecordResult>) -> Self {
        Self {
            success: true,
            message: None,
            results,
        }
    }
}

/// Record API consumed by the entity services.
///
/// `Err` means the call itself failed (transport); per-record problems are
/// reported through `RecordResult::success = false`.
pub trait RecordStore {
    fn fetch_records(
        &self,
        collection: Collection,
        request: &FetchRequest,
    ) -> StoreResult<FetchResponse>;

    fn get_record_by_id(
        &self,
        collection: Collection,
        id: RecordId,
        fields: &[String],
    ) -> StoreResult<Option<Record>>;

    fn create_records(
        &self,
        collection: Collection,
        request: &WriteRequest,
    ) -> StoreResult<BulkResponse>;

    fn update_records(
        &self,
        collection: Collection,
        request: &WriteRequest,
    ) -> StoreResult<BulkResponse>;

    fn delete_records(
        &self,
        collection: Collection,
        request: &DeleteRequest,
    ) -> StoreResult<BulkResponse>;
}

macro_rules! forward_record_store {
    ($ty:ty) => {
        impl<S: RecordStore + ?Sized> RecordStore for $ty {
            fn fetch_records(
                &self,
                collection: Collection,
                request: &FetchRequest,
            ) -> StoreResult<FetchResponse> {
                (**self).fetch_records(collection, request)
            }

            fn get_record_by_id(
                &self,
                collection: Collection,
                id: RecordId,
                fields: &[String],
            ) -> StoreResult<Option<Record>> {
                (**self).get_record_by_id(collection, id, fields)
            }

            fn create_records(
                &self,
                collection: Collection,
                request: &WriteRequest,
            ) -> StoreResult<BulkResponse> {
                (**self).create_records(collection, request)
            }

            fn update_records(
                &self,
                collection: Collection,
                request: &WriteRequest,
            ) -> StoreResult<BulkResponse> {
                (**self).update_records(collection, request)
            }

            fn delete_records(
                &self,
                collection: Collection,
                request: &DeleteRequest,
            ) -> StoreResult<BulkResponse> {
                (**self).delete_records(collection, request)
            }
        }
    };
}

forward_record_store!(&S);
forward_record_store!(Rc<S>);
forward_record_store!(Box<S>);

/// Opens the configured backend over an already migrated connection.
pub fn open_store(conn: &Connection, backend: Backend) -> StoreResult<Rc<dyn RecordStore + '_>> {
    let store: Rc<dyn RecordStore + '_> = match backend {
        Backend::Local => Rc::new(LocalRecordStore::new(SqliteKeyValueStore::try_new(conn)?)),
        Backend::Remote => Rc::new(SqliteRecordStore::try_new(conn)?),
    };
    log::info!(
        "event=store_open module=store status=ok backend={}",
        match backend {
            Backend::Local => "local",
            Backend::Remote => "remote",
        }
    );
    Ok(store)
}

/// Rejects field names that are not plain identifiers.
pub fn validate_field_name(name: &str) -> StoreResult<()> {
    if FIELD_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidRequest(format!(
            "invalid field name `{name}`"
        )))
    }
}

/// Validates every field referenced by a fetch request.
pub fn validate_fetch_request(request: &FetchRequest) -> StoreResult<()> {
    for field in &request.fields {
        validate_field_name(field)?;
    }
    for order in &request.order_by {
        validate_field_name(&order.field_name)?;
    }
    if matches!(request.paging_info, Some(PagingInfo { limit: 0, .. })) {
        return Err(StoreError::InvalidRequest(
            "paging limit must be positive".to_string(),
        ));
    }
    Ok(())
}

pub fn is_system_field(name: &str) -> bool {
    SYSTEM_FIELDS.contains(&name)
}

/// Reads the `Id` system field.
pub fn record_id(record: &Record) -> Option<RecordId> {
    record.get(FIELD_ID).and_then(Value::as_i64)
}

/// Copies caller-owned fields, dropping system fields.
pub fn writable_fields(record: &Record) -> Record {
    record
        .iter()
        .filter(|(key, _)| !is_system_field(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Keeps `Id` plus the requested fields; an empty projection keeps everything.
pub fn project_fields(record: Record, fields: &[String]) -> Record {
    if fields.is_empty() {
        return record;
    }
    record
        .into_iter()
        .filter(|(key, _)| key == FIELD_ID || fields.iter().any(|field| field == key))
        .collect()
}

/// Orders records by the given keys; missing values sort first ascending.
///
/// The sort is stable and falls back to ascending `Id`.
pub fn sort_records(records: &mut [Record], order_by: &[OrderBy]) {
    records.sort_by(|left, right| {
        for order in order_by {
            let ordering = compare_values(
                left.get(&order.field_name),
                right.get(&order.field_name),
            );
            let ordering = match order.sort_type {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        record_id(left).cmp(&record_id(right))
    });
}

/// Total order over JSON values: missing/null < bool < number < string <
/// array < object.
pub fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (left, right) {
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or_default();
            let b = b.as_f64().unwrap_or_default();
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        _ => rank(left).cmp(&rank(right)),
    }
}

/// Current time in the record API timestamp format (RFC 3339, millis, `Z`).
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::{
        compare_values, project_fields, sort_records, validate_field_name, writable_fields,
        OrderBy, Record,
    };
    use serde_json::{json, Value};
    use std::cmp::Ordering;

    fn record(value: Value) -> Record {
        value.as_object().cloned().expect("test record is an object")
    }

    #[test]
    fn field_names_must_be_identifiers() {
        assert!(validate_field_name("title_c").is_ok());
        assert!(validate_field_name("Id").is_ok());
        assert!(validate_field_name("title') OR 1=1 --").is_err());
        assert!(validate_field_name("").is_err());
    }

    #[test]
    fn projection_keeps_id_and_requested_fields() {
        let projected = project_fields(
            record(json!({"Id": 3, "Name": "Work", "color_c": "#fff"})),
            &["Name".to_string()],
        );
        assert_eq!(Value::Object(projected), json!({"Id": 3, "Name": "Work"}));
    }

    #[test]
    fn writable_fields_drop_system_fields() {
        let writable = writable_fields(&record(
            json!({"Id": 1, "CreatedOn": "x", "ModifiedOn": "y", "Name": "n"}),
        ));
        assert_eq!(Value::Object(writable), json!({"Name": "n"}));
    }

    #[test]
    fn sort_places_missing_values_first_and_breaks_ties_by_id() {
        let mut records = vec![
            record(json!({"Id": 2, "order_c": 1})),
            record(json!({"Id": 1, "order_c": 1})),
            record(json!({"Id": 3})),
        ];
        sort_records(&mut records, &[OrderBy::asc("order_c")]);
        let ids: Vec<_> = records.iter().map(|r| r["Id"].clone()).collect();
        assert_eq!(ids, vec![json!(3), json!(1), json!(2)]);

        sort_records(&mut records, &[OrderBy::desc("order_c")]);
        let ids: Vec<_> = records.iter().map(|r| r["Id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(
            compare_values(Some(&json!(10)), Some(&json!(9.5))),
            Ordering::Greater
        );
        assert_eq!(compare_values(None, Some(&json!("a"))), Ordering::Less);
    }
}
