use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};
use std::env;
use std::path::PathBuf;

/// Minimum length accepted for the cookie signing secret.
pub const MIN_SECRET_LEN: usize = 32;

fn deserialize_allowed_origins<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }
    match StringOrVec::deserialize(deserializer) {
        Ok(StringOrVec::String(s)) => Ok(s.split(',').map(|x| x.trim().to_string()).filter(|x| !x.is_empty()).collect()),
        Ok(StringOrVec::Vec(v)) => Ok(v),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub cookie_name: String,
    pub ttl_seconds: u64,
    pub secure: bool,
    pub store: SessionBackend,
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    #[serde(default, deserialize_with = "deserialize_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for the rolling JSON log file. Console only when unset.
    pub dir: Option<PathBuf>,
}

impl Settings {
    /// Defaults, then `config.toml`, then `TELEMED__*` variables, then the
    /// conventional unprefixed variables (`PORT`, `DATABASE_URL`, ...).
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Self::defaults()?
            .add_source(File::with_name("config.toml").required(false))
            .add_source(Environment::with_prefix("TELEMED").prefix_separator("__").separator("__"))
            .set_override_option("server.port", env::var("PORT").ok())?
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("session.secret", env::var("SESSION_SECRET").ok())?
            .set_override_option("session.redis_url", env::var("REDIS_URL").ok())?;

        Self::from_builder(builder)
    }

    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.run_migrations", true)?
            .set_default("session.cookie_name", "telemed.sid")?
            .set_default("session.ttl_seconds", 86_400)?
            .set_default("session.secure", false)?
            .set_default("session.store", "memory")?
            .set_default("logging.level", "info")
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Message(format!(
                "session.secret must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }
        if self.session.store == SessionBackend::Redis && self.session.redis_url.is_none() {
            return Err(ConfigError::Message(
                "session.redis_url is required when session.store = \"redis\"".to_string(),
            ));
        }
        Ok(())
    }
}
