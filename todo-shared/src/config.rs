/// Application configuration
///
/// Sources, later ones winning:
///
/// 1. `.env`, loaded into the process environment by `dotenvy`
/// 2. an optional `todo.toml` (or `.json`/`.yaml`) in the working directory
/// 3. environment variables prefixed `TODO`, with `__` between sections:
///    `TODO__DATABASE__PROVIDER=sqlite`, `TODO__DATABASE__URL=sqlite::memory:`,
///    `TODO__SEED_USER__USERNAME=admin`, `TODO__LOG_FORMAT=json`
///
/// # Example
///
/// ```no_run
/// use todo_shared::config::AppConfig;
///
/// let config = AppConfig::load().expect("invalid configuration");
/// println!("provider: {}", config.database.provider);
/// ```

use crate::db::migrations::UserCreationConfig;
use crate::db::pool::DatabaseConfig;
use config::{Config, Environment, File};
use serde::Deserialize;

/// Configuration file looked up in the working directory, extension optional
pub const CONFIG_FILE: &str = "todo";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "TODO";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,

    /// User inserted after migrations, if any
    pub seed_user: Option<UserCreationConfig>,

    pub log_format: LogFormat,
}

impl AppConfig {
    /// Loads `.env`, the optional config file and the environment
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if a source cannot be parsed and
    /// `ConfigError::Invalid` if the result fails validation
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(config)
    }

    /// Deserializes and validates an already built configuration
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate().map_err(ConfigError::Invalid)?;
        if let Some(seed) = &self.seed_user {
            seed.validate().map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::dialect::Provider;

    fn sqlite_builder() -> config::ConfigBuilder<config::builder::DefaultState> {
        Config::builder()
            .set_override("database.provider", "sqlite")
            .unwrap()
            .set_override("database.url", "sqlite::memory:")
            .unwrap()
    }

    #[test]
    fn test_minimal_config() {
        let config = AppConfig::from_config(sqlite_builder().build().unwrap()).unwrap();

        assert_eq!(config.database.provider, Provider::Sqlite);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.export_bucket_size, 1000);
        assert!(config.seed_user.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_seed_user_and_overrides() {
        let built = sqlite_builder()
            .set_override("database.export_bucket_size", 50)
            .unwrap()
            .set_override("seed_user.username", "admin")
            .unwrap()
            .set_override("seed_user.password", "hunter2hunter2")
            .unwrap()
            .set_override("seed_user.is_admin", true)
            .unwrap()
            .set_override("log_format", "json")
            .unwrap()
            .build()
            .unwrap();

        let config = AppConfig::from_config(built).unwrap();
        assert_eq!(config.database.export_bucket_size, 50);
        assert_eq!(config.log_format, LogFormat::Json);

        let seed = config.seed_user.unwrap();
        assert_eq!(seed.username, "admin");
        assert!(seed.is_admin);
    }

    #[test]
    fn test_mismatched_url_is_rejected() {
        let built = Config::builder()
            .set_override("database.provider", "mariadb")
            .unwrap()
            .set_override("database.url", "postgres://localhost/todo")
            .unwrap()
            .build()
            .unwrap();

        assert!(matches!(
            AppConfig::from_config(built),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_url_is_rejected() {
        let built = Config::builder().build().unwrap();
        assert!(matches!(
            AppConfig::from_config(built),
            Err(ConfigError::Invalid(_))
        ));
    }
}
