//! Typed values and the codec that moves them to and from SQLite storage
//! classes.
//!
//! [Value] is the one interchange type every property slot, bind list and
//! cursor read passes through — the role [arrow::record_batch::RecordBatch]
//! plays for the ADBC driver manager this crate is modeled on.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Row, Statement, ToSql};

use crate::error::{Error, Result};

/// The kind of value a [crate::schema::Property] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ValueKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Bool,
    F32,
    F64,
    Text,
    Blob,
    Instant,
    StringList,
    Enum,
    Reference,
}

/// The SQLite storage class a column is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Integer,
    Float,
    Text,
    Blob,
}

impl StorageKind {
    /// The SQL type name used in `CREATE TABLE`/`ALTER TABLE` column
    /// definitions.
    pub fn sql_type(self) -> &'static str {
        match self {
            StorageKind::Integer => "INTEGER",
            StorageKind::Float => "FLOAT",
            StorageKind::Text => "TEXT",
            StorageKind::Blob => "BLOB",
        }
    }
}

impl ValueKind {
    /// The storage class used for a property of this kind, ignoring any
    /// custom transform (a transform always forces BLOB; see
    /// [crate::schema::Property::storage_kind]).
    pub fn storage_kind(self) -> StorageKind {
        match self {
            ValueKind::I8
            | ValueKind::I16
            | ValueKind::I32
            | ValueKind::I64
            | ValueKind::U8
            | ValueKind::U16
            | ValueKind::U32
            | ValueKind::U64
            | ValueKind::Bool
            | ValueKind::Enum
            | ValueKind::Reference => StorageKind::Integer,
            ValueKind::F32 | ValueKind::F64 => StorageKind::Float,
            ValueKind::Text | ValueKind::Instant => StorageKind::Text,
            ValueKind::Blob | ValueKind::StringList => StorageKind::Blob,
        }
    }
}

/// A pair of pure functions converting a value to/from a byte blob,
/// attached to a [crate::schema::Property].
///
/// Storage becomes `BLOB` regardless of the property's declared
/// [ValueKind]. This lets callers round-trip media-specific encodings
/// (images, compressed documents, …) without the ORM knowing about them.
#[derive(Clone)]
pub struct ValueTransform {
    pub to_blob: std::sync::Arc<dyn Fn(&Value) -> Vec<u8> + Send + Sync>,
    pub from_blob: std::sync::Arc<dyn Fn(&[u8]) -> Value + Send + Sync>,
}

impl fmt::Debug for ValueTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueTransform(..)")
    }
}

/// A typed value moving between an entity's property slots and SQLite.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Bool(bool),
    F32(f32),
    F64(f64),
    Text(String),
    Blob(Vec<u8>),
    Instant(DateTime<Utc>),
    StringList(Vec<String>),
    Enum(i64),
    Reference(i64),
    Null,
}

impl Value {
    /// The kind this value would be stored as for a property with the
    /// matching declared [ValueKind].
    pub fn kind(&self) -> Option<ValueKind> {
        Some(match self {
            Value::I8(_) => ValueKind::I8,
            Value::I16(_) => ValueKind::I16,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::U8(_) => ValueKind::U8,
            Value::U16(_) => ValueKind::U16,
            Value::U32(_) => ValueKind::U32,
            Value::U64(_) => ValueKind::U64,
            Value::Bool(_) => ValueKind::Bool,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::Text(_) => ValueKind::Text,
            Value::Blob(_) => ValueKind::Blob,
            Value::Instant(_) => ValueKind::Instant,
            Value::StringList(_) => ValueKind::StringList,
            Value::Enum(_) => ValueKind::Enum,
            Value::Reference(_) => ValueKind::Reference,
            Value::Null => return None,
        })
    }

    /// Builds an [Value::Instant], encoding `None` as the Unix epoch.
    ///
    /// This is the "observed behavior" of the original C implementation
    /// (spec.md §9 Open Questions): a null instant is not represented as
    /// SQL `NULL` but as `1970-01-01T00:00:00Z`, so that the column never
    /// needs a nullable read path for this one kind.
    pub fn from_instant(instant: Option<DateTime<Utc>>) -> Value {
        Value::Instant(instant.unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap()))
    }
}

/// ISO-8601 UTC form mandated by spec.md §4.1: `YYYY-MM-DDTHH:MM:SSZ`.
const INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Encodes a [Value::StringList] the way the original implementation does:
/// each element UTF-8 encoded and NUL-terminated, the whole sequence
/// terminated by one extra NUL byte. An empty list is a single NUL byte.
fn encode_string_list(items: &[String]) -> Vec<u8> {
    let mut buf = Vec::new();
    for item in items {
        buf.extend_from_slice(item.as_bytes());
        buf.push(0);
    }
    buf.push(0);
    buf
}

/// Inverse of [encode_string_list].
fn decode_string_list(blob: &[u8]) -> Vec<String> {
    if blob.len() <= 1 {
        return Vec::new();
    }
    blob[..blob.len() - 1]
        .split_terminator(|&b| b == 0)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// Binds `value` to `?`-placeholder `index` (1-based) of `statement`.
///
/// If `transform` is set, `value` is run through [ValueTransform::to_blob]
/// and bound as a `BLOB` regardless of its own kind.
pub fn bind(
    statement: &mut Statement<'_>,
    index: usize,
    value: &Value,
    transform: Option<&ValueTransform>,
) -> Result<()> {
    if let Some(transform) = transform {
        let blob = (transform.to_blob)(value);
        statement
            .raw_bind_parameter(index, blob)
            .map_err(|e| Error::UnsupportedKind(e.to_string()))?;
        return Ok(());
    }
    let sql_value = to_sql_value(value)?;
    statement
        .raw_bind_parameter(index, sql_value)
        .map_err(|e| Error::UnsupportedKind(e.to_string()))?;
    Ok(())
}

fn to_sql_value(value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::I8(v) => SqlValue::Integer(*v as i64),
        Value::I16(v) => SqlValue::Integer(*v as i64),
        Value::I32(v) => SqlValue::Integer(*v as i64),
        Value::I64(v) => SqlValue::Integer(*v),
        Value::U8(v) => SqlValue::Integer(*v as i64),
        Value::U16(v) => SqlValue::Integer(*v as i64),
        Value::U32(v) => SqlValue::Integer(*v as i64),
        Value::U64(v) => SqlValue::Integer(*v as i64),
        Value::Bool(v) => SqlValue::Integer(if *v { 1 } else { 0 }),
        Value::F32(v) => SqlValue::Real(*v as f64),
        Value::F64(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Blob(v) => SqlValue::Blob(v.clone()),
        Value::Instant(v) => SqlValue::Text(v.format(INSTANT_FORMAT).to_string()),
        Value::StringList(items) => SqlValue::Blob(encode_string_list(items)),
        Value::Enum(v) => SqlValue::Integer(*v),
        Value::Reference(v) => SqlValue::Integer(*v),
        Value::Null => SqlValue::Null,
    })
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        to_sql_value(self)
            .map(ToSqlOutput::Owned)
            .map_err(|e| {
                rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    e.to_string(),
                )))
            })
    }
}

/// Reads the column at `index` (0-based) from `row`, interpreting it as
/// `expected`.
///
/// When `transform` is set the raw bytes are always read as `BLOB` and
/// passed through [ValueTransform::from_blob]. Otherwise the fallback
/// ordering from spec.md §4.1 applies when a column is `NULL` for a
/// non-nullable kind isn't in play — `expected` drives interpretation
/// directly, and an actual SQL `NULL` is surfaced as [Value::Null].
pub fn read(
    row: &Row<'_>,
    index: usize,
    expected: ValueKind,
    transform: Option<&ValueTransform>,
) -> Result<Value> {
    let value_ref = row
        .get_ref(index)
        .map_err(|e| Error::UnsupportedKind(e.to_string()))?;

    if let Some(transform) = transform {
        return match value_ref {
            ValueRef::Null => Ok(Value::Null),
            ValueRef::Blob(b) => Ok((transform.from_blob)(b)),
            other => Err(Error::UnsupportedKind(format!(
                "expected BLOB for transformed column, got {:?}",
                other
            ))),
        };
    }

    if matches!(value_ref, ValueRef::Null) {
        return Ok(Value::Null);
    }

    Ok(match expected {
        ValueKind::I8 => Value::I8(value_ref.as_i64().map_err(sqlite_err)? as i8),
        ValueKind::I16 => Value::I16(value_ref.as_i64().map_err(sqlite_err)? as i16),
        ValueKind::I32 => Value::I32(value_ref.as_i64().map_err(sqlite_err)? as i32),
        ValueKind::I64 => Value::I64(value_ref.as_i64().map_err(sqlite_err)?),
        ValueKind::U8 => Value::U8(value_ref.as_i64().map_err(sqlite_err)? as u8),
        ValueKind::U16 => Value::U16(value_ref.as_i64().map_err(sqlite_err)? as u16),
        ValueKind::U32 => Value::U32(value_ref.as_i64().map_err(sqlite_err)? as u32),
        ValueKind::U64 => Value::U64(value_ref.as_i64().map_err(sqlite_err)? as u64),
        ValueKind::Bool => Value::Bool(value_ref.as_i64().map_err(sqlite_err)? != 0),
        ValueKind::F32 => Value::F32(value_ref.as_f64().map_err(sqlite_err)? as f32),
        ValueKind::F64 => Value::F64(value_ref.as_f64().map_err(sqlite_err)?),
        ValueKind::Text => Value::Text(value_ref.as_str().map_err(sqlite_err)?.to_owned()),
        ValueKind::Blob => Value::Blob(value_ref.as_blob().map_err(sqlite_err)?.to_vec()),
        ValueKind::Instant => {
            let text = value_ref.as_str().map_err(sqlite_err)?;
            let parsed = NaiveDateTime::parse_from_str(text, INSTANT_FORMAT)
                .map_err(|e| Error::UnsupportedKind(format!("bad instant {text:?}: {e}")))?;
            Value::Instant(parsed.and_utc())
        }
        ValueKind::StringList => {
            Value::StringList(decode_string_list(value_ref.as_blob().map_err(sqlite_err)?))
        }
        ValueKind::Enum => Value::Enum(value_ref.as_i64().map_err(sqlite_err)?),
        ValueKind::Reference => Value::Reference(value_ref.as_i64().map_err(sqlite_err)?),
    })
}

fn sqlite_err(e: rusqlite::types::FromSqlError) -> Error {
    Error::UnsupportedKind(e.to_string())
}

/// The storage-type fallback used when a caller reads a column without
/// knowing its expected kind (spec.md §4.1): INTEGER → i64, FLOAT → f64,
/// TEXT → String, BLOB → bytes.
pub fn read_untyped(row: &Row<'_>, index: usize) -> Result<Value> {
    let value_ref = row
        .get_ref(index)
        .map_err(|e| Error::UnsupportedKind(e.to_string()))?;
    Ok(match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::I64(i),
        ValueRef::Real(f) => Value::F64(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn roundtrip(value: Value, kind: ValueKind) -> Value {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (v)", []).unwrap();
        {
            let mut stmt = conn.prepare("INSERT INTO t (v) VALUES (?)").unwrap();
            bind(&mut stmt, 1, &value, None).unwrap();
            stmt.raw_execute().unwrap();
        }
        let mut stmt = conn.prepare("SELECT v FROM t").unwrap();
        let mut rows = stmt.query([]).unwrap();
        let row = rows.next().unwrap().unwrap();
        read(row, 0, kind, None).unwrap()
    }

    #[test]
    fn integers_roundtrip() {
        assert_eq!(roundtrip(Value::I64(-42), ValueKind::I64), Value::I64(-42));
        assert_eq!(roundtrip(Value::U32(9001), ValueKind::U32), Value::U32(9001));
        assert_eq!(roundtrip(Value::Bool(true), ValueKind::Bool), Value::Bool(true));
        assert_eq!(roundtrip(Value::Bool(false), ValueKind::Bool), Value::Bool(false));
    }

    #[test]
    fn floats_roundtrip() {
        assert_eq!(roundtrip(Value::F64(1.5), ValueKind::F64), Value::F64(1.5));
    }

    #[test]
    fn text_and_blob_roundtrip() {
        assert_eq!(
            roundtrip(Value::Text("hello".into()), ValueKind::Text),
            Value::Text("hello".into())
        );
        assert_eq!(
            roundtrip(Value::Blob(vec![1, 2, 3]), ValueKind::Blob),
            Value::Blob(vec![1, 2, 3])
        );
    }

    #[test]
    fn instant_roundtrips_at_second_precision() {
        let now = Value::from_instant(Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        assert_eq!(roundtrip(now.clone(), ValueKind::Instant), now);
    }

    #[test]
    fn null_instant_encodes_as_epoch() {
        let encoded = Value::from_instant(None);
        assert_eq!(encoded, Value::Instant(Utc.timestamp_opt(0, 0).unwrap()));
    }

    #[test]
    fn string_list_roundtrips() {
        let list = Value::StringList(vec!["a".into(), "bb".into(), "ccc".into()]);
        assert_eq!(roundtrip(list.clone(), ValueKind::StringList), list);
    }

    #[test]
    fn empty_string_list_is_single_nul_blob() {
        assert_eq!(encode_string_list(&[]), vec![0u8]);
        assert_eq!(decode_string_list(&[0u8]), Vec::<String>::new());
    }

    #[test]
    fn enum_and_reference_are_integers() {
        assert_eq!(roundtrip(Value::Enum(3), ValueKind::Enum), Value::Enum(3));
        assert_eq!(
            roundtrip(Value::Reference(7), ValueKind::Reference),
            Value::Reference(7)
        );
    }

    #[test]
    fn transform_forces_blob_regardless_of_kind() {
        let transform = ValueTransform {
            to_blob: std::sync::Arc::new(|v| match v {
                Value::I64(n) => n.to_be_bytes().to_vec(),
                _ => unreachable!(),
            }),
            from_blob: std::sync::Arc::new(|b| {
                Value::I64(i64::from_be_bytes(b.try_into().unwrap()))
            }),
        };
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (v)", []).unwrap();
        {
            let mut stmt = conn.prepare("INSERT INTO t (v) VALUES (?)").unwrap();
            bind(&mut stmt, 1, &Value::I64(99), Some(&transform)).unwrap();
            stmt.raw_execute().unwrap();
        }
        let mut stmt = conn.prepare("SELECT v FROM t").unwrap();
        let mut rows = stmt.query([]).unwrap();
        let row = rows.next().unwrap().unwrap();
        let value_ref = row.get_ref(0).unwrap();
        assert!(matches!(value_ref, ValueRef::Blob(_)));
        let read_back = read(row, 0, ValueKind::I64, Some(&transform)).unwrap();
        assert_eq!(read_back, Value::I64(99));
    }
}
