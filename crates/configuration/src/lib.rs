//! Typed settings for the three database roles.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `MODELBASE` (`__` separates nested keys,
//! e.g. `MODELBASE__DATABASE__TARGET__HOST`). A `.env` file is loaded first when present.

use crate::error::ConfigError;
use std::path::Path;
use tracing_subscriber::EnvFilter;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{Config, DatabaseSettings, EmbeddedSettings, NetworkedSettings, RoleSettings};

pub const ENV_PREFIX: &str = "MODELBASE";
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Loads the application configuration from `config.toml` and the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(DEFAULT_CONFIG_FILE)
}

/// Loads the application configuration from the given file and the environment.
///
/// A missing file is not an error; every setting has a default.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    // Missing .env is fine, the environment may already be populated.
    let _ = dotenvy::dotenv();

    // Paths are defaulted per role here so a file or environment that only sets
    // `returning` or `create_if_missing` still deserializes.
    let builder = config::Config::builder()
        .set_default("database.app.path", settings::DEFAULT_APP_PATH)?
        .set_default("database.source.path", settings::DEFAULT_SOURCE_PATH)?
        .add_source(config::File::from(path.as_ref()).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;
    tracing::debug!(path = %path.as_ref().display(), "Configuration loaded.");

    Ok(config)
}

/// Installs the global `fmt` subscriber. `RUST_LOG` wins over `default_directive`.
///
/// Calling it more than once is harmless; later calls are ignored.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Command-line flags shared by binaries that read this configuration.
#[cfg(feature = "clap")]
#[derive(Debug, Clone, clap::Args)]
pub struct ConfigArgs {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: std::path::PathBuf,
}

#[cfg(feature = "clap")]
impl ConfigArgs {
    pub fn load(&self) -> Result<Config, ConfigError> {
        load_config_from(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Role;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.database.app.path, "app.db");
        assert_eq!(config.database.source.path, "source.db");
        assert_eq!(config.database.target.port, 5433);
        assert!(config.database.app.returning);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[database.app]
path = "/tmp/custom-app.db"
returning = false

[database.target]
host = "db.internal"
port = 5432
"#
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.database.app.path, "/tmp/custom-app.db");
        assert!(!config.database.app.returning);
        assert_eq!(config.database.target.host, "db.internal");
        assert_eq!(config.database.target.port, 5432);
        // Unset target fields keep their defaults.
        assert_eq!(config.database.target.user, "n8n_user");

        match config.database.for_role(Role::Target) {
            RoleSettings::Networked(target) => assert_eq!(target.host, "db.internal"),
            RoleSettings::Embedded(_) => panic!("target role must be networked"),
        }
    }

    #[test]
    fn partial_role_tables_keep_default_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[database.app]\nreturning = false\n\n[database.source]\ncreate_if_missing = false\n",
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.database.app.path, "app.db");
        assert!(!config.database.app.returning);
        assert_eq!(config.database.source.path, "source.db");
        assert!(!config.database.source.create_if_missing);
        assert!(config.database.source.returning);
    }

    #[test]
    fn validation_rejects_empty_paths() {
        let mut config = Config::default();
        config.database.source.path = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = Config::default();
        config.database.target.port = 0;
        assert!(config.validate().is_err());
    }
}
