//! Bridges between [`Value`] and the two sqlx backends: parameter binding on the way
//! in, positional row decoding on the way out.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use core_types::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Postgres, Row, Sqlite, TypeInfo, ValueRef};

use crate::statement::Statement;

pub(crate) fn bind_sqlite(statement: &Statement) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    let mut query = sqlx::query(&statement.sql);
    for param in &statement.params {
        query = match param {
            Value::Null => query.bind(None::<i64>),
            Value::Bool(v) => query.bind(*v),
            Value::Integer(v) => query.bind(*v),
            Value::Real(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

pub(crate) fn bind_postgres(statement: &Statement) -> Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(&statement.sql);
    for param in &statement.params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(*v),
            Value::Integer(v) => query.bind(*v),
            Value::Real(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

fn unsupported(column: usize, type_name: &str) -> sqlx::Error {
    sqlx::Error::Decode(format!("column {column} has unsupported type {type_name}").into())
}

/// Decodes by SQLite storage class; declared types are applied later from the descriptor.
pub(crate) fn decode_sqlite_row(row: &SqliteRow) -> Result<Vec<Value>, sqlx::Error> {
    (0..row.len())
        .map(|i| {
            let raw = row.try_get_raw(i)?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            let type_name = raw.type_info().name().to_string();
            Ok(match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Value::Integer(row.try_get_unchecked::<i64, _>(i)?),
                "REAL" | "NUMERIC" => Value::Real(row.try_get_unchecked::<f64, _>(i)?),
                "TEXT" | "DATETIME" | "DATE" | "TIME" => {
                    Value::Text(row.try_get_unchecked::<String, _>(i)?)
                }
                "BLOB" => {
                    let bytes = row.try_get_unchecked::<Vec<u8>, _>(i)?;
                    Value::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
                other => return Err(unsupported(i, other)),
            })
        })
        .collect()
}

pub(crate) fn decode_pg_row(row: &PgRow) -> Result<Vec<Value>, sqlx::Error> {
    (0..row.len())
        .map(|i| {
            let raw = row.try_get_raw(i)?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            let type_name = raw.type_info().name().to_string();
            Ok(match type_name.as_str() {
                "BOOL" => Value::Bool(row.try_get::<bool, _>(i)?),
                "INT2" => Value::Integer(row.try_get::<i16, _>(i)?.into()),
                "INT4" => Value::Integer(row.try_get::<i32, _>(i)?.into()),
                "INT8" => Value::Integer(row.try_get::<i64, _>(i)?),
                "FLOAT4" => Value::Real(row.try_get::<f32, _>(i)?.into()),
                "FLOAT8" => Value::Real(row.try_get::<f64, _>(i)?),
                "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => {
                    Value::Text(row.try_get::<String, _>(i)?)
                }
                "TIMESTAMPTZ" => Value::Timestamp(row.try_get::<DateTime<Utc>, _>(i)?),
                "TIMESTAMP" => Value::Timestamp(row.try_get::<NaiveDateTime, _>(i)?.and_utc()),
                "DATE" => Value::Text(row.try_get::<NaiveDate, _>(i)?.to_string()),
                "JSON" | "JSONB" => {
                    Value::Text(row.try_get::<serde_json::Value, _>(i)?.to_string())
                }
                other => return Err(unsupported(i, other)),
            })
        })
        .collect()
}
