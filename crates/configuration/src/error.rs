use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from file or environment: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Invalid database configuration: {0}")]
    ValidationError(String),
}
