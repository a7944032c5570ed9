#![allow(dead_code)]

use configuration::{DatabaseSettings, EmbeddedSettings};
use core_types::{Record, Role};
use database::{ConnectionRegistry, Descriptor, TableSchema};
use tempfile::TempDir;

/// A registry whose embedded roles live in a temporary directory.
///
/// Keep the `TempDir` alive for as long as the registry is used.
pub fn registry() -> (TempDir, ConnectionRegistry) {
    registry_with(true)
}

pub fn registry_with(returning: bool) -> (TempDir, ConnectionRegistry) {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = DatabaseSettings::default();
    settings.app = EmbeddedSettings::new(dir.path().join("app.db").to_string_lossy());
    settings.app.returning = returning;
    settings.source = EmbeddedSettings::new(dir.path().join("source.db").to_string_lossy());
    settings.source.returning = returning;
    (dir, ConnectionRegistry::new(settings))
}

/// The three-column table used throughout the holdings scenarios.
pub fn holdings() -> TableSchema {
    Descriptor::builder("Holding")
        .columns(["id INTEGER PRIMARY KEY", "symbol", "quantity"])
        .build()
        .unwrap()
        .schema_for(Role::App)
}

pub fn trade_descriptor() -> Descriptor {
    Descriptor::builder("Trade")
        .table("trades")
        .columns([
            "id INTEGER PRIMARY KEY",
            "date TEXT",
            "activity TEXT",
            "symbol TEXT NOT NULL",
            "quantity INTEGER",
            "price REAL",
        ])
        .inherit(&Descriptor::base())
        .build()
        .unwrap()
}

pub fn holding(symbol: &str, quantity: i64) -> Record {
    Record::new().with("symbol", symbol).with("quantity", quantity)
}
