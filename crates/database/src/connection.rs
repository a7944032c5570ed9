use configuration::{DatabaseSettings, EmbeddedSettings, NetworkedSettings, RoleSettings};
use core_types::{Role, Value};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Postgres, Sqlite, Transaction};
use std::str::FromStr;

use crate::error::DbError;
use crate::row::{bind_postgres, bind_sqlite, decode_pg_row, decode_sqlite_row};
use crate::statement::{Dialect, Statement};

/// A live handle for one role.
#[derive(Debug)]
pub struct DbConnection {
    role: Role,
    returning: bool,
    inner: Handle,
}

#[derive(Debug)]
enum Handle {
    Sqlite(SqliteConnection),
    Postgres(PgConnection),
}

/// Opens the connection for `role` using that role's settings. Never retries.
pub async fn connect(role: Role, settings: &DatabaseSettings) -> Result<DbConnection, DbError> {
    let failure = |source| DbError::ConnectionFailure { role, source };

    let connection = match settings.for_role(role) {
        RoleSettings::Embedded(embedded) => DbConnection {
            role,
            returning: embedded.returning,
            inner: Handle::Sqlite(
                sqlite_options(embedded)
                    .map_err(failure)?
                    .connect()
                    .await
                    .map_err(failure)?,
            ),
        },
        RoleSettings::Networked(networked) => DbConnection {
            role,
            returning: true,
            inner: Handle::Postgres(
                postgres_options(networked)
                    .connect()
                    .await
                    .map_err(failure)?,
            ),
        },
    };

    tracing::info!(%role, dialect = ?connection.dialect(), "Opened database connection.");
    Ok(connection)
}

fn sqlite_options(settings: &EmbeddedSettings) -> Result<SqliteConnectOptions, sqlx::Error> {
    let options = if settings.path == ":memory:" {
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else {
        SqliteConnectOptions::new().filename(&settings.path)
    };
    Ok(options.create_if_missing(settings.create_if_missing))
}

fn postgres_options(settings: &NetworkedSettings) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .database(&settings.database)
        .username(&settings.user)
        .password(&settings.password)
}

impl DbConnection {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn dialect(&self) -> Dialect {
        match self.inner {
            Handle::Sqlite(_) => Dialect::Sqlite,
            Handle::Postgres(_) => Dialect::Postgres,
        }
    }

    /// Whether INSERT/UPDATE read rows back with `RETURNING`.
    pub fn returning(&self) -> bool {
        self.returning
    }

    pub(crate) async fn begin(&mut self) -> Result<DbTransaction<'_>, Failure> {
        let inner = match &mut self.inner {
            Handle::Sqlite(conn) => TxHandle::Sqlite(
                conn.begin().await.map_err(|e| Failure::new("BEGIN", e))?,
            ),
            Handle::Postgres(conn) => TxHandle::Postgres(
                conn.begin().await.map_err(|e| Failure::new("BEGIN", e))?,
            ),
        };
        Ok(DbTransaction {
            role: self.role,
            inner,
        })
    }

    pub async fn close(self) -> Result<(), sqlx::Error> {
        match self.inner {
            Handle::Sqlite(conn) => conn.close().await,
            Handle::Postgres(conn) => conn.close().await,
        }
    }
}

/// A statement that failed, with the backend's reason. Converted to a classified
/// [`DbError`] at the edge of each schema or CRUD operation.
#[derive(Debug)]
pub(crate) struct Failure {
    statement: String,
    source: sqlx::Error,
}

impl Failure {
    pub(crate) fn new(statement: impl Into<String>, source: sqlx::Error) -> Self {
        Self {
            statement: statement.into(),
            source,
        }
    }

    pub(crate) fn into_query_error(self, role: Role) -> DbError {
        tracing::error!(%role, statement = %self.statement, error = %self.source, "Query failed.");
        DbError::QueryExecutionFailure {
            role,
            statement: self.statement,
            source: self.source,
        }
    }

    pub(crate) fn into_schema_error(self, role: Role) -> DbError {
        tracing::error!(%role, statement = %self.statement, error = %self.source, "Schema operation failed.");
        DbError::SchemaOperationFailure {
            role,
            statement: self.statement,
            source: self.source,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Executed {
    pub rows_affected: u64,
    /// SQLite rowid of the last inserted row; `None` on PostgreSQL.
    pub last_insert_id: Option<i64>,
}

/// One scoped transaction. Dropping it without [`DbTransaction::commit`] rolls back.
pub(crate) struct DbTransaction<'c> {
    role: Role,
    inner: TxHandle<'c>,
}

enum TxHandle<'c> {
    Sqlite(Transaction<'c, Sqlite>),
    Postgres(Transaction<'c, Postgres>),
}

impl DbTransaction<'_> {
    fn trace(&self, statement: &Statement) {
        tracing::debug!(
            role = %self.role,
            params = statement.params.len(),
            sql = %statement.sql,
            "Executing statement."
        );
    }

    pub(crate) async fn fetch_all(
        &mut self,
        statement: &Statement,
    ) -> Result<Vec<Vec<Value>>, Failure> {
        self.trace(statement);
        let rows: Result<Vec<Vec<Value>>, sqlx::Error> = match &mut self.inner {
            TxHandle::Sqlite(tx) => bind_sqlite(statement)
                .fetch_all(&mut **tx)
                .await
                .and_then(|rows| rows.iter().map(decode_sqlite_row).collect()),
            TxHandle::Postgres(tx) => bind_postgres(statement)
                .fetch_all(&mut **tx)
                .await
                .and_then(|rows| rows.iter().map(decode_pg_row).collect()),
        };
        rows.map_err(|e| Failure::new(&statement.sql, e))
    }

    pub(crate) async fn fetch_optional(
        &mut self,
        statement: &Statement,
    ) -> Result<Option<Vec<Value>>, Failure> {
        Ok(self.fetch_all(statement).await?.into_iter().next())
    }

    pub(crate) async fn execute(&mut self, statement: &Statement) -> Result<Executed, Failure> {
        self.trace(statement);
        let executed: Result<Executed, sqlx::Error> = match &mut self.inner {
            TxHandle::Sqlite(tx) => bind_sqlite(statement)
                .execute(&mut **tx)
                .await
                .map(|done| Executed {
                    rows_affected: done.rows_affected(),
                    last_insert_id: Some(done.last_insert_rowid()),
                }),
            TxHandle::Postgres(tx) => bind_postgres(statement)
                .execute(&mut **tx)
                .await
                .map(|done| Executed {
                    rows_affected: done.rows_affected(),
                    last_insert_id: None,
                }),
        };
        executed.map_err(|e| Failure::new(&statement.sql, e))
    }

    pub(crate) async fn commit(self) -> Result<(), Failure> {
        let committed = match self.inner {
            TxHandle::Sqlite(tx) => tx.commit().await,
            TxHandle::Postgres(tx) => tx.commit().await,
        };
        committed.map_err(|e| Failure::new("COMMIT", e))
    }

    pub(crate) async fn rollback(self) {
        let role = self.role;
        let rolled_back = match self.inner {
            TxHandle::Sqlite(tx) => tx.rollback().await,
            TxHandle::Postgres(tx) => tx.rollback().await,
        };
        if let Err(e) = rolled_back {
            tracing::warn!(%role, error = %e, "Rollback failed.");
        }
    }

    /// Commits `outcome` on success, rolls back on failure.
    pub(crate) async fn finish<T>(self, outcome: Result<T, Failure>) -> Result<T, Failure> {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(failure) => {
                self.rollback().await;
                Err(failure)
            }
        }
    }
}

/// Owns at most one live connection per role, opened on first use and reused
/// until closed.
///
/// The registry is an ordinary value: whoever holds it owns the connections, and
/// `&mut self` on every accessor keeps a role's handle to one user at a time.
#[derive(Debug)]
pub struct ConnectionRegistry {
    settings: DatabaseSettings,
    app: Option<DbConnection>,
    source: Option<DbConnection>,
    target: Option<DbConnection>,
}

impl ConnectionRegistry {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            settings,
            app: None,
            source: None,
            target: None,
        }
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    fn slot(&mut self, role: Role) -> &mut Option<DbConnection> {
        match role {
            Role::App => &mut self.app,
            Role::Source => &mut self.source,
            Role::Target => &mut self.target,
        }
    }

    pub fn is_open(&self, role: Role) -> bool {
        match role {
            Role::App => self.app.is_some(),
            Role::Source => self.source.is_some(),
            Role::Target => self.target.is_some(),
        }
    }

    /// Returns the role's cached connection, connecting on first use.
    pub async fn get(&mut self, role: Role) -> Result<&mut DbConnection, DbError> {
        let cached = self.slot(role).take();
        let connection = match cached {
            Some(connection) => connection,
            None => connect(role, &self.settings).await?,
        };
        Ok(self.slot(role).insert(connection))
    }

    /// Releases the role's connection. Closing a role that is not open is a no-op.
    pub async fn close(&mut self, role: Role) -> Result<(), DbError> {
        let Some(connection) = self.slot(role).take() else {
            return Ok(());
        };
        connection
            .close()
            .await
            .map_err(|source| DbError::ConnectionFailure { role, source })?;
        tracing::info!(%role, "Closed database connection.");
        Ok(())
    }

    /// Closes every role. A failure on one role is logged and does not stop the others.
    pub async fn close_all(&mut self) {
        for role in Role::ALL {
            if let Err(e) = self.close(role).await {
                tracing::warn!(%role, error = %e, "Failed to close connection; continuing.");
            }
        }
    }
}
