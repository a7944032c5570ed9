use core_types::{Record, Role};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

use crate::connection::ConnectionRegistry;
use crate::descriptor::{Descriptor, TableSchema};
use crate::error::DbError;
use crate::{crud, schema};

/// Fields left out of [`to_record`] unless the caller supplies its own exclusion list.
pub const DEFAULT_EXCLUDED: [&str; 3] = ["id", "created_at", "updated_at"];

/// A persistable entity. Its serde field names are its column names.
pub trait Model: Serialize + DeserializeOwned {
    fn descriptor() -> Result<Descriptor, DbError>;

    /// Checked before every create; nothing is written when it fails.
    fn validate(&self) -> Result<(), DbError> {
        Ok(())
    }
}

/// Serializes a model into a record, dropping `exclude` (or [`DEFAULT_EXCLUDED`]).
pub fn to_record<M: Serialize>(model: &M, exclude: Option<&[&str]>) -> Result<Record, DbError> {
    let record = Record::from_json(serde_json::to_value(model)?)?;
    Ok(record.without(exclude.unwrap_or(&DEFAULT_EXCLUDED)))
}

pub fn from_record<M: DeserializeOwned>(record: Record) -> Result<M, DbError> {
    Ok(serde_json::from_value(record.to_json())?)
}

/// Entity-level operations for `M`, bound to one role.
///
/// Holds nothing but the descriptor, so building one per call is fine. Connections
/// are borrowed from the [`ConnectionRegistry`] passed to each operation.
#[derive(Debug, Clone)]
pub struct Repository<M> {
    descriptor: Descriptor,
    role: Role,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Repository<M> {
    /// A repository on the app role.
    pub fn new() -> Result<Self, DbError> {
        Self::for_role(Role::App)
    }

    pub fn for_role(role: Role) -> Result<Self, DbError> {
        Ok(Self {
            descriptor: M::descriptor()?,
            role,
            _model: PhantomData,
        })
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The table this repository reads and writes.
    pub fn schema(&self) -> TableSchema {
        self.descriptor.schema_for(self.role)
    }

    pub async fn create(&self, registry: &mut ConnectionRegistry, model: &M) -> Result<M, DbError> {
        model.validate()?;
        let record = to_record(model, Some(&[]))?;
        from_record(self.create_record(registry, &record).await?)
    }

    pub async fn get(&self, registry: &mut ConnectionRegistry, id: i64) -> Result<Option<M>, DbError> {
        self.get_record(registry, id)
            .await?
            .map(from_record)
            .transpose()
    }

    /// All rows matching every `filters` entry, in key order. An empty filter returns everything.
    pub async fn get_all(
        &self,
        registry: &mut ConnectionRegistry,
        filters: &Record,
    ) -> Result<Vec<M>, DbError> {
        self.get_all_records(registry, filters)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    pub async fn update(
        &self,
        registry: &mut ConnectionRegistry,
        id: i64,
        changes: &Record,
    ) -> Result<Option<M>, DbError> {
        self.update_record(registry, id, changes)
            .await?
            .map(from_record)
            .transpose()
    }

    pub async fn delete(&self, registry: &mut ConnectionRegistry, id: i64) -> Result<bool, DbError> {
        crud::delete(registry, self.role, &self.schema(), id).await
    }

    /// Validates every model first, then inserts all of them atomically.
    pub async fn batch_create(
        &self,
        registry: &mut ConnectionRegistry,
        models: &[M],
    ) -> Result<Vec<M>, DbError> {
        let records = models
            .iter()
            .map(|model| {
                model.validate()?;
                to_record(model, Some(&[]))
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        self.batch_create_records(registry, &records)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    // Record-level variants, for callers holding plain column mappings.

    pub async fn create_record(
        &self,
        registry: &mut ConnectionRegistry,
        data: &Record,
    ) -> Result<Record, DbError> {
        crud::create(registry, self.role, &self.schema(), data).await
    }

    pub async fn get_record(
        &self,
        registry: &mut ConnectionRegistry,
        id: i64,
    ) -> Result<Option<Record>, DbError> {
        crud::get(registry, self.role, &self.schema(), id).await
    }

    pub async fn get_all_records(
        &self,
        registry: &mut ConnectionRegistry,
        filters: &Record,
    ) -> Result<Vec<Record>, DbError> {
        crud::get_all(registry, self.role, &self.schema(), filters).await
    }

    pub async fn update_record(
        &self,
        registry: &mut ConnectionRegistry,
        id: i64,
        changes: &Record,
    ) -> Result<Option<Record>, DbError> {
        crud::update(registry, self.role, &self.schema(), id, changes).await
    }

    pub async fn batch_create_records(
        &self,
        registry: &mut ConnectionRegistry,
        records: &[Record],
    ) -> Result<Vec<Record>, DbError> {
        crud::batch_create(registry, self.role, &self.schema(), records).await
    }

    // Schema helpers.

    /// Creates this repository's table in its bound role.
    pub async fn create_table(&self, registry: &mut ConnectionRegistry) -> Result<(), DbError> {
        match self.role {
            Role::Target => self.create_target_table(registry).await,
            role => schema::create_table(registry, role, &self.schema()).await,
        }
    }

    pub async fn drop_table(&self, registry: &mut ConnectionRegistry) -> Result<(), DbError> {
        schema::drop_table(registry, self.role, &self.descriptor.table_for(self.role)).await
    }

    pub async fn create_source_table(&self, registry: &mut ConnectionRegistry) -> Result<(), DbError> {
        schema::create_table(registry, Role::Source, &self.descriptor.schema_for(Role::Source)).await
    }

    pub async fn drop_source_table(&self, registry: &mut ConnectionRegistry) -> Result<(), DbError> {
        schema::drop_table(registry, Role::Source, &self.descriptor.table_s()).await
    }

    /// Creates `{type}_t` in the target role with the fixed base layout.
    pub async fn create_target_table(&self, registry: &mut ConnectionRegistry) -> Result<(), DbError> {
        schema::create_target_base_table(registry, &self.descriptor.table_t()).await
    }

    pub async fn drop_target_table(&self, registry: &mut ConnectionRegistry) -> Result<(), DbError> {
        schema::drop_table(registry, Role::Target, &self.descriptor.table_t()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Value;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: Option<i64>,
        body: String,
        created_at: Option<String>,
        updated_at: Option<String>,
    }

    impl Model for Note {
        fn descriptor() -> Result<Descriptor, DbError> {
            Descriptor::builder("Note")
                .columns(["id INTEGER PRIMARY KEY", "body TEXT"])
                .inherit(&Descriptor::base())
                .build()
        }
    }

    fn note() -> Note {
        Note {
            id: Some(3),
            body: "hello".to_string(),
            created_at: Some("2024-01-19T00:00:00Z".to_string()),
            updated_at: None,
        }
    }

    #[test]
    fn to_record_excludes_key_and_timestamps_by_default() {
        let record = to_record(&note(), None).unwrap();
        assert_eq!(record, Record::new().with("body", "hello"));
    }

    #[test]
    fn to_record_honours_caller_exclusions() {
        let record = to_record(&note(), Some(&["body"])).unwrap();
        assert_eq!(record.get("id"), Some(&Value::Integer(3)));
        assert_eq!(record.get("updated_at"), Some(&Value::Null));
        assert!(!record.contains("body"));
    }

    #[test]
    fn from_record_round_trips() {
        let record = to_record(&note(), Some(&[])).unwrap();
        assert_eq!(from_record::<Note>(record).unwrap(), note());
    }

    #[test]
    fn repository_binds_role_tables() {
        let app = Repository::<Note>::new().unwrap();
        assert_eq!(app.schema().name(), "note");
        let source = Repository::<Note>::for_role(Role::Source).unwrap();
        assert_eq!(source.schema().name(), "note_s");
        let target = Repository::<Note>::for_role(Role::Target).unwrap();
        assert_eq!(target.schema(), TableSchema::target_base("note_t").unwrap());
    }
}
