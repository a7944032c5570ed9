use core_types::Role;
use serde::Deserialize;

use crate::error::ConfigError;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseSettings,
}

/// Connection parameters for each of the three database roles.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "EmbeddedSettings::app")]
    pub app: EmbeddedSettings,
    #[serde(default = "EmbeddedSettings::source")]
    pub source: EmbeddedSettings,
    #[serde(default)]
    pub target: NetworkedSettings,
}

/// Settings for a file-backed SQLite role.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddedSettings {
    /// Path to the database file, or `:memory:`.
    pub path: String,
    /// Create the file on first connect when it does not exist.
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
    /// Read inserted rows back with `RETURNING`. When disabled, inserts are
    /// followed by a SELECT keyed on the last inserted rowid.
    #[serde(default = "default_true")]
    pub returning: bool,
}

/// Settings for the networked PostgreSQL role.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkedSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

/// Connection parameters resolved for a single role.
#[derive(Debug, Clone, Copy)]
pub enum RoleSettings<'a> {
    Embedded(&'a EmbeddedSettings),
    Networked(&'a NetworkedSettings),
}

/// Database file used by the app role when none is configured.
pub const DEFAULT_APP_PATH: &str = "app.db";
/// Database file used by the source role when none is configured.
pub const DEFAULT_SOURCE_PATH: &str = "source.db";

fn default_true() -> bool {
    true
}

impl EmbeddedSettings {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            create_if_missing: true,
            returning: true,
        }
    }

    fn app() -> Self {
        Self::new(DEFAULT_APP_PATH)
    }

    fn source() -> Self {
        Self::new(DEFAULT_SOURCE_PATH)
    }
}

impl Default for NetworkedSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5433,
            database: "postgres".to_string(),
            user: "n8n_user".to_string(),
            password: "n8n_password".to_string(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            app: EmbeddedSettings::app(),
            source: EmbeddedSettings::source(),
            target: NetworkedSettings::default(),
        }
    }
}

impl DatabaseSettings {
    /// Returns the connection parameters for `role`.
    pub fn for_role(&self, role: Role) -> RoleSettings<'_> {
        match role {
            Role::App => RoleSettings::Embedded(&self.app),
            Role::Source => RoleSettings::Embedded(&self.source),
            Role::Target => RoleSettings::Networked(&self.target),
        }
    }
}

impl Config {
    /// Checks values the deserializer cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let db = &self.database;
        for (role, embedded) in [(Role::App, &db.app), (Role::Source, &db.source)] {
            if embedded.path.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "database.{role}.path must not be empty"
                )));
            }
        }
        if db.target.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.target.host must not be empty".to_string(),
            ));
        }
        if db.target.port == 0 {
            return Err(ConfigError::ValidationError(
                "database.target.port must be non-zero".to_string(),
            ));
        }
        if db.target.database.trim().is_empty() || db.target.user.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.target.database and database.target.user must be set".to_string(),
            ));
        }
        Ok(())
    }
}
