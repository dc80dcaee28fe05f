use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::library_store::PostgresLibraryStoreConfig;

/// Start-up configuration. Read from an optional `library.{toml,yaml,json}` file,
/// then from environment variables (`USE_IN_MEMORY_DB`, `DB_HOST`, `DB_USERNAME`, `DB_PASSWORD`)
#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
pub struct Settings {
    pub use_in_memory_db: bool,
    pub db_host: String,
    pub db_username: String,
    pub db_password: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_config(
            Self::builder()?
                .add_source(File::with_name("library").required(false))
                .add_source(Environment::default().try_parsing(true))
                .build()?,
        )
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("use_in_memory_db", false)?
            .set_default("db_host", "127.0.0.1")?
            .set_default("db_username", "postgres")?
            .set_default("db_password", "postgres")
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.try_deserialize()
    }

    pub fn postgres_config(&self) -> PostgresLibraryStoreConfig {
        PostgresLibraryStoreConfig {
            hostname: self.db_host.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
        }
    }
}
