//! Idempotent DDL, one statement per scoped transaction.

use core_types::Role;

use crate::connection::ConnectionRegistry;
use crate::descriptor::TableSchema;
use crate::error::DbError;
use crate::statement::{self, Statement};

async fn run_ddl(
    registry: &mut ConnectionRegistry,
    role: Role,
    statement: &Statement,
) -> Result<(), DbError> {
    let connection = registry.get(role).await?;
    let mut tx = connection
        .begin()
        .await
        .map_err(|f| f.into_schema_error(role))?;
    let outcome = tx.execute(statement).await.map(|_| ());
    tx.finish(outcome)
        .await
        .map_err(|f| f.into_schema_error(role))?;
    tracing::info!(%role, sql = %statement.sql, "Schema statement applied.");
    Ok(())
}

/// Creates `schema` in `role`'s database unless a table of that name already exists.
pub async fn create_table(
    registry: &mut ConnectionRegistry,
    role: Role,
    schema: &TableSchema,
) -> Result<(), DbError> {
    run_ddl(registry, role, &statement::create_table(schema)).await
}

/// Drops `table` from `role`'s database if it exists.
pub async fn drop_table(
    registry: &mut ConnectionRegistry,
    role: Role,
    table: &str,
) -> Result<(), DbError> {
    crate::descriptor::validate_identifier(table)?;
    run_ddl(registry, role, &statement::drop_table(table)).await
}

/// Creates a target-role table with the fixed base layout (identity, active flag,
/// created and updated timestamps).
///
/// This is the one table whose columns do not come from a model descriptor.
pub async fn create_target_base_table(
    registry: &mut ConnectionRegistry,
    table: &str,
) -> Result<(), DbError> {
    let schema = TableSchema::target_base(table)?;
    run_ddl(registry, Role::Target, &statement::create_table(&schema)).await
}

/// Reports whether `table` exists in `role`'s database.
pub async fn table_exists(
    registry: &mut ConnectionRegistry,
    role: Role,
    table: &str,
) -> Result<bool, DbError> {
    let connection = registry.get(role).await?;
    let lookup = statement::table_exists(connection.dialect(), table);
    let mut tx = connection
        .begin()
        .await
        .map_err(|f| f.into_query_error(role))?;
    let outcome = tx.fetch_optional(&lookup).await.map(|row| row.is_some());
    tx.finish(outcome)
        .await
        .map_err(|f| f.into_query_error(role))
}
