//! # Modelbase Database Crate
//!
//! The data-access layer behind every model: one connection per role, static
//! per-model metadata, idempotent DDL and scoped-transaction CRUD.
//!
//! ## Roles
//!
//! - `app` and `source` live in embedded SQLite files.
//! - `target` lives in a networked PostgreSQL server. Its tables share one fixed
//!   base layout instead of following the model descriptor.
//!
//! ## Public API
//!
//! - `ConnectionRegistry`: opens a role's connection on first use and reuses it.
//! - `Descriptor`: a model's table names, ordered columns and sample payload.
//! - `schema`: `create_table`, `drop_table`, `create_target_base_table`.
//! - `crud`: `create`, `get`, `get_all`, `update`, `delete`, `batch_create`.
//! - `Repository` and `Model`: the entity-level façade over the two modules above.
//! - `DbError`: the error type returned from this crate.

pub mod connection;
pub mod crud;
pub mod descriptor;
pub mod error;
pub mod repository;
mod row;
pub mod schema;
pub mod statement;

pub use connection::{ConnectionRegistry, DbConnection, connect};
pub use descriptor::{ColumnKind, ColumnSpec, Descriptor, DescriptorBuilder, TableSchema};
pub use error::DbError;
pub use repository::{DEFAULT_EXCLUDED, Model, Repository, from_record, to_record};
pub use statement::Dialect;
