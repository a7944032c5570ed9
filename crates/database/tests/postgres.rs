//! Target-role tests. They need a reachable PostgreSQL server configured through the
//! usual `MODELBASE__DATABASE__TARGET__*` variables, so they are ignored by default:
//!
//! ```sh
//! MODELBASE__DATABASE__TARGET__PORT=5432 cargo test -p database --test postgres -- --ignored
//! ```

use chrono::Utc;
use core_types::{Record, Role, Value};
use database::{ConnectionRegistry, Descriptor, crud, schema};

fn target_registry() -> ConnectionRegistry {
    let config = configuration::load_config().unwrap();
    ConnectionRegistry::new(config.database)
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server"]
async fn target_base_table_lifecycle() {
    let mut registry = target_registry();
    let descriptor = Descriptor::builder("ModelbaseCheck")
        .columns(["id INTEGER PRIMARY KEY", "note TEXT"])
        .build()
        .unwrap();
    let table = descriptor.schema_for(Role::Target);

    schema::drop_table(&mut registry, Role::Target, table.name()).await.unwrap();
    schema::create_target_base_table(&mut registry, table.name()).await.unwrap();
    schema::create_target_base_table(&mut registry, table.name()).await.unwrap();

    // Missing keys are written as NULL, so defaults do not apply; supply the row in full.
    let now = Utc::now();
    let row = Record::new()
        .with("is_active", true)
        .with("created_at", now)
        .with("updated_at", now);
    let created = crud::create(&mut registry, Role::Target, &table, &row)
        .await
        .unwrap();
    assert_eq!(created.get("is_active"), Some(&Value::Bool(true)));
    assert!(matches!(created.get("created_at"), Some(Value::Timestamp(_))));

    let id = created.id().unwrap();
    let updated = crud::update(&mut registry, Role::Target, &table, id, &Record::new())
        .await
        .unwrap()
        .unwrap();
    let stamp = |record: &Record| record.get("updated_at").and_then(Value::as_timestamp);
    assert!(stamp(&updated) >= stamp(&created));

    let batch = crud::batch_create(
        &mut registry,
        Role::Target,
        &table,
        &[
            Record::new().with("is_active", false),
            Record::new().with("is_active", true),
        ],
    )
    .await
    .unwrap();
    assert_eq!(batch.len(), 2);

    let filters = Record::new().with("is_active", false);
    let inactive = crud::get_all(&mut registry, Role::Target, &table, &filters)
        .await
        .unwrap();
    assert_eq!(inactive.len(), 1);

    assert!(crud::delete(&mut registry, Role::Target, &table, id).await.unwrap());
    schema::drop_table(&mut registry, Role::Target, table.name()).await.unwrap();
    registry.close_all().await;
}
