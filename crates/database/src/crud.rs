//! The CRUD executor.
//!
//! Each operation builds its statement from a [`TableSchema`], runs it inside one
//! scoped transaction on the role's connection, and maps rows back to records.
//! Backend errors roll the transaction back and surface as
//! [`DbError::QueryExecutionFailure`]; absence is reported with `None`/`false`.

use chrono::Utc;
use core_types::{Record, Role};

use crate::connection::{ConnectionRegistry, DbTransaction, Failure};
use crate::descriptor::TableSchema;
use crate::error::DbError;
use crate::statement::{self, Statement};

fn no_row(statement: &str) -> Failure {
    Failure::new(statement, sqlx::Error::RowNotFound)
}

/// Runs `insert` for `count` rows and reads every inserted row back, in insertion order.
async fn insert_rows(
    tx: &mut DbTransaction<'_>,
    schema: &TableSchema,
    insert: &Statement,
    count: usize,
    returning: bool,
) -> Result<Vec<Record>, Failure> {
    let rows = if returning {
        tx.fetch_all(insert).await?
    } else {
        let executed = tx.execute(insert).await?;
        let last = executed.last_insert_id.ok_or_else(|| no_row(&insert.sql))?;
        let first = last - count as i64 + 1;
        tx.fetch_all(&statement::select_by_rowid_range(schema, first, last))
            .await?
    };

    if rows.len() != count {
        return Err(no_row(&insert.sql));
    }
    Ok(rows
        .into_iter()
        .map(|row| schema.record_from_row(row))
        .collect())
}

/// Inserts one record and returns the row as stored.
pub async fn create(
    registry: &mut ConnectionRegistry,
    role: Role,
    schema: &TableSchema,
    data: &Record,
) -> Result<Record, DbError> {
    let data = schema.coerce(data);
    let connection = registry.get(role).await?;
    let returning = connection.returning();
    let insert = statement::insert(connection.dialect(), schema, std::slice::from_ref(&data), returning)?;

    let mut tx = connection.begin().await.map_err(|f| f.into_query_error(role))?;
    let outcome = insert_rows(&mut tx, schema, &insert, 1, returning)
        .await
        .and_then(|rows| rows.into_iter().next().ok_or_else(|| no_row(&insert.sql)));
    tx.finish(outcome).await.map_err(|f| f.into_query_error(role))
}

/// Inserts all `records` with one multi-row statement in one transaction.
///
/// Either every record is stored or none is.
pub async fn batch_create(
    registry: &mut ConnectionRegistry,
    role: Role,
    schema: &TableSchema,
    records: &[Record],
) -> Result<Vec<Record>, DbError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let records: Vec<Record> = records.iter().map(|r| schema.coerce(r)).collect();
    let connection = registry.get(role).await?;
    let returning = connection.returning();
    let insert = statement::insert(connection.dialect(), schema, &records, returning)?;

    let mut tx = connection.begin().await.map_err(|f| f.into_query_error(role))?;
    let outcome = insert_rows(&mut tx, schema, &insert, records.len(), returning).await;
    let created = tx.finish(outcome).await.map_err(|f| f.into_query_error(role))?;
    tracing::debug!(%role, table = schema.name(), rows = created.len(), "Batch inserted.");
    Ok(created)
}

/// Fetches one record by key, or `None` when no row has that key.
pub async fn get(
    registry: &mut ConnectionRegistry,
    role: Role,
    schema: &TableSchema,
    id: i64,
) -> Result<Option<Record>, DbError> {
    let connection = registry.get(role).await?;
    let select = statement::select_by_id(connection.dialect(), schema, id);

    let mut tx = connection.begin().await.map_err(|f| f.into_query_error(role))?;
    let outcome = tx.fetch_optional(&select).await;
    let row = tx.finish(outcome).await.map_err(|f| f.into_query_error(role))?;
    Ok(row.map(|row| schema.record_from_row(row)))
}

/// Fetches every record matching all `filters` (column equality), in key order.
pub async fn get_all(
    registry: &mut ConnectionRegistry,
    role: Role,
    schema: &TableSchema,
    filters: &Record,
) -> Result<Vec<Record>, DbError> {
    let filters = schema.coerce(filters);
    let connection = registry.get(role).await?;
    let select = statement::select_where(connection.dialect(), schema, &filters)?;

    let mut tx = connection.begin().await.map_err(|f| f.into_query_error(role))?;
    let outcome = tx.fetch_all(&select).await;
    let rows = tx.finish(outcome).await.map_err(|f| f.into_query_error(role))?;
    Ok(rows
        .into_iter()
        .map(|row| schema.record_from_row(row))
        .collect())
}

/// Applies `data` to the row with key `id`, stamping `updated_at` with the current
/// time, and returns the row after the update. `None` when no row has that key.
pub async fn update(
    registry: &mut ConnectionRegistry,
    role: Role,
    schema: &TableSchema,
    id: i64,
    data: &Record,
) -> Result<Option<Record>, DbError> {
    let data = schema.coerce(data);
    let connection = registry.get(role).await?;
    let (dialect, returning) = (connection.dialect(), connection.returning());
    let Some(update) = statement::update(dialect, schema, id, &data, Utc::now(), returning) else {
        tracing::debug!(%role, table = schema.name(), id, "Nothing to update; reading current row.");
        return get(registry, role, schema, id).await;
    };
    let select = statement::select_by_id(dialect, schema, id);

    let mut tx = connection.begin().await.map_err(|f| f.into_query_error(role))?;
    let outcome = async {
        if returning {
            return tx.fetch_optional(&update).await;
        }
        if tx.execute(&update).await?.rows_affected == 0 {
            return Ok(None);
        }
        tx.fetch_optional(&select).await
    }
    .await;
    let row = tx.finish(outcome).await.map_err(|f| f.into_query_error(role))?;
    Ok(row.map(|row| schema.record_from_row(row)))
}

/// Deletes the row with key `id`. Returns whether a row was actually removed.
pub async fn delete(
    registry: &mut ConnectionRegistry,
    role: Role,
    schema: &TableSchema,
    id: i64,
) -> Result<bool, DbError> {
    let connection = registry.get(role).await?;
    let delete = statement::delete(connection.dialect(), schema, id);

    let mut tx = connection.begin().await.map_err(|f| f.into_query_error(role))?;
    let outcome = tx.execute(&delete).await;
    let executed = tx.finish(outcome).await.map_err(|f| f.into_query_error(role))?;
    Ok(executed.rows_affected > 0)
}
