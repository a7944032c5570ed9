//! Parameterized SQL construction.
//!
//! Identifiers come only from a validated [`TableSchema`] and are always quoted.
//! Values are always bound through placeholders, except `NULL`, which is written
//! as a literal because PostgreSQL cannot infer a type for an untyped null parameter.

use chrono::{DateTime, Utc};
use core_types::{Backend, Record, Role, Value};

use crate::descriptor::{ColumnSpec, TableSchema, quote_ident};
use crate::error::DbError;

/// Name of the column every update stamps with the current time.
pub const UPDATED_AT: &str = "updated_at";

/// SQL flavour spoken by a role's backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Positional `?N` placeholders.
    Sqlite,
    /// Numbered `$N` placeholders.
    Postgres,
}

impl Dialect {
    pub fn for_role(role: Role) -> Self {
        match role.backend() {
            Backend::Embedded => Dialect::Sqlite,
            Backend::Networked => Dialect::Postgres,
        }
    }

    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Postgres => format!("${index}"),
        }
    }
}

/// SQL text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

struct Builder {
    dialect: Dialect,
    sql: String,
    params: Vec<Value>,
}

impl Builder {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    fn push_ident(&mut self, name: &str) -> &mut Self {
        self.sql.push_str(&quote_ident(name));
        self
    }

    fn push_value(&mut self, value: &Value) -> &mut Self {
        if value.is_null() {
            self.sql.push_str("NULL");
        } else {
            self.params.push(value.clone());
            let placeholder = self.dialect.placeholder(self.params.len());
            self.sql.push_str(&placeholder);
        }
        self
    }

    fn push_list<T>(
        &mut self,
        items: impl IntoIterator<Item = T>,
        mut each: impl FnMut(&mut Self, T),
    ) -> &mut Self {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            each(self, item);
        }
        self
    }

    fn push_projection(&mut self, schema: &TableSchema) -> &mut Self {
        self.push_list(schema.column_names(), |b, name| {
            b.push_ident(name);
        })
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// `CREATE TABLE IF NOT EXISTS` with the column specs as the definition list.
pub fn create_table(schema: &TableSchema) -> Statement {
    let definitions: Vec<String> = schema.columns().iter().map(ColumnSpec::definition).collect();
    Statement::raw(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(schema.name()),
        definitions.join(", ")
    ))
}

pub fn drop_table(table: &str) -> Statement {
    Statement::raw(format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
}

pub fn table_exists(dialect: Dialect, table: &str) -> Statement {
    let mut b = Builder::new(dialect);
    match dialect {
        Dialect::Sqlite => b.push("SELECT name FROM sqlite_master WHERE type = 'table' AND name = "),
        Dialect::Postgres => b.push(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = ",
        ),
    };
    b.push_value(&Value::from(table));
    b.finish()
}

/// Multi-row INSERT over the non-generated columns, one value group per record.
///
/// Keys missing from a record are written as NULL; keys that are not columns are ignored.
pub fn insert(
    dialect: Dialect,
    schema: &TableSchema,
    records: &[Record],
    returning: bool,
) -> Result<Statement, DbError> {
    let columns: Vec<&ColumnSpec> = schema.insert_columns().collect();
    let mut b = Builder::new(dialect);
    b.push("INSERT INTO ").push_ident(schema.name());

    if columns.is_empty() {
        if records.len() != 1 {
            return Err(DbError::Validation(format!(
                "table `{}` has no insertable columns for a multi-row insert",
                schema.name()
            )));
        }
        b.push(" DEFAULT VALUES");
    } else {
        b.push(" (")
            .push_list(columns.iter(), |b, c| {
                b.push_ident(c.name());
            })
            .push(") VALUES ");
        b.push_list(records, |b, record| {
            b.push("(")
                .push_list(columns.iter(), |b, c| {
                    b.push_value(record.get(c.name()).unwrap_or(&Value::Null));
                })
                .push(")");
        });
    }

    if returning {
        b.push(" RETURNING ").push_projection(schema);
    }
    Ok(b.finish())
}

fn select_prefix(dialect: Dialect, schema: &TableSchema) -> Builder {
    let mut b = Builder::new(dialect);
    b.push("SELECT ")
        .push_projection(schema)
        .push(" FROM ")
        .push_ident(schema.name());
    b
}

pub fn select_by_id(dialect: Dialect, schema: &TableSchema, id: i64) -> Statement {
    let mut b = select_prefix(dialect, schema);
    b.push(" WHERE ")
        .push_ident(schema.key_column())
        .push(" = ")
        .push_value(&Value::Integer(id));
    b.finish()
}

/// SELECT with equality predicates joined by AND, ordered by the primary key when there is one.
pub fn select_where(
    dialect: Dialect,
    schema: &TableSchema,
    filters: &Record,
) -> Result<Statement, DbError> {
    let mut b = select_prefix(dialect, schema);
    for (i, (column, value)) in filters.iter().enumerate() {
        if schema.column(column).is_none() {
            return Err(DbError::UnknownColumn {
                table: schema.name().to_string(),
                column: column.to_string(),
            });
        }
        b.push(if i == 0 { " WHERE " } else { " AND " })
            .push_ident(column);
        if value.is_null() {
            b.push(" IS NULL");
        } else {
            b.push(" = ").push_value(value);
        }
    }
    if schema.has_primary_key() {
        b.push(" ORDER BY ").push_ident(schema.key_column());
    }
    Ok(b.finish())
}

/// Reads back rows by SQLite rowid, used when RETURNING is disabled.
pub fn select_by_rowid_range(schema: &TableSchema, first: i64, last: i64) -> Statement {
    let mut b = select_prefix(Dialect::Sqlite, schema);
    b.push(" WHERE rowid BETWEEN ")
        .push_value(&Value::Integer(first))
        .push(" AND ")
        .push_value(&Value::Integer(last))
        .push(" ORDER BY rowid");
    b.finish()
}

/// UPDATE of the columns present in `data`, always stamping `updated_at` when the
/// table has one. Returns `None` when there is nothing to set.
pub fn update(
    dialect: Dialect,
    schema: &TableSchema,
    id: i64,
    data: &Record,
    now: DateTime<Utc>,
    returning: bool,
) -> Option<Statement> {
    let now = Value::Timestamp(now);
    let assignments: Vec<(&str, &Value)> = schema
        .columns()
        .iter()
        .filter(|c| !c.is_generated())
        .filter_map(|c| {
            if c.name() == UPDATED_AT {
                Some((c.name(), &now))
            } else {
                data.get(c.name()).map(|value| (c.name(), value))
            }
        })
        .collect();
    if assignments.is_empty() {
        return None;
    }

    let mut b = Builder::new(dialect);
    b.push("UPDATE ")
        .push_ident(schema.name())
        .push(" SET ")
        .push_list(assignments, |b, (column, value)| {
            b.push_ident(column).push(" = ").push_value(value);
        })
        .push(" WHERE ")
        .push_ident(schema.key_column())
        .push(" = ")
        .push_value(&Value::Integer(id));
    if returning {
        b.push(" RETURNING ").push_projection(schema);
    }
    Some(b.finish())
}

pub fn delete(dialect: Dialect, schema: &TableSchema, id: i64) -> Statement {
    let mut b = Builder::new(dialect);
    b.push("DELETE FROM ")
        .push_ident(schema.name())
        .push(" WHERE ")
        .push_ident(schema.key_column())
        .push(" = ")
        .push_value(&Value::Integer(id));
    b.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;
    use chrono::TimeZone;

    fn holdings() -> TableSchema {
        Descriptor::builder("Holding")
            .columns(["id INTEGER PRIMARY KEY", "symbol", "quantity"])
            .build()
            .unwrap()
            .schema_for(Role::App)
    }

    #[test]
    fn ddl_joins_column_specs() {
        assert_eq!(
            create_table(&holdings()).sql,
            r#"CREATE TABLE IF NOT EXISTS "holding" ("id" INTEGER PRIMARY KEY, "symbol", "quantity")"#
        );
        assert_eq!(drop_table("holding").sql, r#"DROP TABLE IF EXISTS "holding""#);
    }

    #[test]
    fn insert_without_insertable_columns() {
        let counter = Descriptor::builder("Counter")
            .column("id INTEGER PRIMARY KEY")
            .build()
            .unwrap()
            .schema_for(Role::App);
        let stmt = insert(Dialect::Sqlite, &counter, &[Record::new()], false).unwrap();
        assert_eq!(stmt.sql, r#"INSERT INTO "counter" DEFAULT VALUES"#);

        let err = insert(Dialect::Sqlite, &counter, &[Record::new(), Record::new()], false).unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[test]
    fn insert_skips_generated_key_and_nulls_missing_values() {
        let record = Record::new().with("symbol", "IBM").with("unrelated", 1);
        let stmt = insert(Dialect::Sqlite, &holdings(), &[record], true).unwrap();
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "holding" ("symbol", "quantity") VALUES (?1, NULL) RETURNING "id", "symbol", "quantity""#
        );
        assert_eq!(stmt.params, vec![Value::from("IBM")]);
    }

    #[test]
    fn batch_insert_numbers_postgres_placeholders() {
        let rows = [
            Record::new().with("symbol", "IBM").with("quantity", 100),
            Record::new().with("symbol", "MSFT").with("quantity", 50),
        ];
        let stmt = insert(Dialect::Postgres, &holdings(), &rows, false).unwrap();
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "holding" ("symbol", "quantity") VALUES ($1, $2), ($3, $4)"#
        );
        assert_eq!(stmt.params.len(), 4);
    }

    #[test]
    fn select_filters_are_conjoined_and_ordered() {
        let filters = Record::new().with("symbol", "MSFT").with("quantity", Value::Null);
        let stmt = select_where(Dialect::Sqlite, &holdings(), &filters).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT "id", "symbol", "quantity" FROM "holding" WHERE "symbol" = ?1 AND "quantity" IS NULL ORDER BY "id""#
        );
        assert_eq!(stmt.params, vec![Value::from("MSFT")]);
    }

    #[test]
    fn unknown_filter_columns_are_rejected() {
        let filters = Record::new().with("symbol; DROP TABLE holding", "x");
        let err = select_where(Dialect::Sqlite, &holdings(), &filters).unwrap_err();
        assert!(matches!(err, DbError::UnknownColumn { .. }));
    }

    #[test]
    fn update_always_stamps_updated_at() {
        let schema = Descriptor::builder("Holding")
            .columns(["id INTEGER PRIMARY KEY", "quantity"])
            .inherit(&Descriptor::base())
            .build()
            .unwrap()
            .schema_for(Role::App);
        let now = Utc.with_ymd_and_hms(2024, 1, 19, 0, 0, 0).unwrap();

        let stmt = update(Dialect::Postgres, &schema, 7, &Record::new(), now, true).unwrap();
        assert_eq!(
            stmt.sql,
            r#"UPDATE "holding" SET "updated_at" = $1 WHERE "id" = $2 RETURNING "id", "quantity", "is_active", "created_at", "updated_at""#
        );
        assert_eq!(stmt.params, vec![Value::Timestamp(now), Value::Integer(7)]);

        let changes = Record::new().with("quantity", 200).with("id", 99);
        let stmt = update(Dialect::Sqlite, &schema, 7, &changes, now, false).unwrap();
        assert_eq!(
            stmt.sql,
            r#"UPDATE "holding" SET "quantity" = ?1, "updated_at" = ?2 WHERE "id" = ?3"#
        );
    }

    #[test]
    fn update_without_assignments_is_skipped() {
        assert!(update(Dialect::Sqlite, &holdings(), 1, &Record::new(), Utc::now(), true).is_none());
    }

    #[test]
    fn delete_and_lookup_by_key() {
        assert_eq!(
            delete(Dialect::Postgres, &holdings(), 3).sql,
            r#"DELETE FROM "holding" WHERE "id" = $1"#
        );
        assert_eq!(
            select_by_id(Dialect::Sqlite, &holdings(), 3).sql,
            r#"SELECT "id", "symbol", "quantity" FROM "holding" WHERE "id" = ?1"#
        );
    }
}
