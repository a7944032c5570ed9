mod common;

use common::{holding, holdings, registry, trade_descriptor};
use configuration::{DatabaseSettings, EmbeddedSettings};
use core_types::{Record, Role};
use database::{ConnectionRegistry, DbError, Descriptor, crud, schema};

#[tokio::test]
async fn create_table_is_idempotent() {
    let (_dir, mut registry) = registry();
    let table = trade_descriptor().schema_for(Role::App);

    schema::create_table(&mut registry, Role::App, &table).await.unwrap();
    crud::create(&mut registry, Role::App, &table, &holding("IBM", 100))
        .await
        .unwrap();
    schema::create_table(&mut registry, Role::App, &table).await.unwrap();

    // Existing rows survive the second call.
    let all = crud::get_all(&mut registry, Role::App, &table, &Record::new())
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert!(schema::table_exists(&mut registry, Role::App, "trades").await.unwrap());
}

#[tokio::test]
async fn drop_table_is_idempotent() {
    let (_dir, mut registry) = registry();
    let table = holdings();
    schema::create_table(&mut registry, Role::Source, &table).await.unwrap();

    schema::drop_table(&mut registry, Role::Source, "holding").await.unwrap();
    schema::drop_table(&mut registry, Role::Source, "holding").await.unwrap();
    assert!(!schema::table_exists(&mut registry, Role::Source, "holding").await.unwrap());

    let err = schema::drop_table(&mut registry, Role::Source, "holding; --")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidDescriptor(_)));
}

#[tokio::test]
async fn roles_use_separate_databases() {
    let (_dir, mut registry) = registry();
    let trade = trade_descriptor();
    schema::create_table(&mut registry, Role::Source, &trade.schema_for(Role::Source))
        .await
        .unwrap();

    assert!(schema::table_exists(&mut registry, Role::Source, "trade_s").await.unwrap());
    assert!(!schema::table_exists(&mut registry, Role::App, "trade_s").await.unwrap());
}

#[tokio::test]
async fn failed_ddl_is_a_schema_failure() {
    let (_dir, mut registry) = registry();
    let table = Descriptor::builder("Broken")
        .columns(["a INTEGER PRIMARY KEY", "b INTEGER PRIMARY KEY"])
        .build()
        .unwrap()
        .schema_for(Role::App);

    let err = schema::create_table(&mut registry, Role::App, &table)
        .await
        .unwrap_err();
    match err {
        DbError::SchemaOperationFailure { role, statement, .. } => {
            assert_eq!(role, Role::App);
            assert!(statement.starts_with("CREATE TABLE IF NOT EXISTS \"broken\""));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn registry_reuses_and_releases_connections() {
    let (_dir, mut registry) = registry();
    assert!(!registry.is_open(Role::App));

    let first = registry.get(Role::App).await.unwrap();
    assert_eq!(first.role(), Role::App);
    assert!(registry.is_open(Role::App));
    assert!(!registry.is_open(Role::Source));

    let table = Descriptor::builder("Scratch")
        .columns(["id INTEGER PRIMARY KEY", "note"])
        .build()
        .unwrap()
        .schema_for(Role::App);
    schema::create_table(&mut registry, Role::App, &table).await.unwrap();
    registry.get(Role::App).await.unwrap();
    assert!(schema::table_exists(&mut registry, Role::App, "scratch").await.unwrap());

    registry.close(Role::App).await.unwrap();
    assert!(!registry.is_open(Role::App));
    // Closing again is a no-op.
    registry.close(Role::App).await.unwrap();

    registry.get(Role::Source).await.unwrap();
    registry.get(Role::App).await.unwrap();
    registry.close_all().await;
    for role in Role::ALL {
        assert!(!registry.is_open(role));
    }
}

#[tokio::test]
async fn unreachable_database_is_a_connection_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = DatabaseSettings::default();
    let missing = dir.path().join("missing").join("app.db");
    settings.app = EmbeddedSettings::new(missing.to_string_lossy());
    let mut registry = ConnectionRegistry::new(settings);

    let err = registry.get(Role::App).await.unwrap_err();
    assert!(matches!(err, DbError::ConnectionFailure { role: Role::App, .. }));
    assert_eq!(err.role(), Some(Role::App));
    assert!(!registry.is_open(Role::App));
}

#[tokio::test]
async fn in_memory_databases_are_supported() {
    let mut settings = DatabaseSettings::default();
    settings.app = EmbeddedSettings::new(":memory:");
    let mut registry = ConnectionRegistry::new(settings);

    schema::create_table(&mut registry, Role::App, &holdings()).await.unwrap();
    let created = crud::create(&mut registry, Role::App, &holdings(), &holding("IBM", 1))
        .await
        .unwrap();
    assert_eq!(created.id(), Some(1));
    registry.close_all().await;
}
