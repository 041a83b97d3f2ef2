use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Directory of the sled database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Sync sled's log to disk on every flush instead of in the background.
    #[serde(default = "default_flush_on_write")]
    pub flush_on_write: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("ride_share.db")
}

fn default_flush_on_write() -> bool {
    true
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            flush_on_write: default_flush_on_write(),
        }
    }
}

impl ServiceConfig {
    /// Reads `config/ride_share.{toml,json,..}` if present, then overrides from
    /// the environment, e.g. `RIDE_SHARE__DB_PATH=/var/lib/rides`.
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/ride_share").required(false))
            .add_source(config::Environment::with_prefix("RIDE_SHARE").separator("__"))
            .build()?;

        Self::from_settings(settings)
    }

    pub fn from_settings(settings: config::Config) -> Result<Self, config::ConfigError> {
        settings.try_deserialize()
    }
}
