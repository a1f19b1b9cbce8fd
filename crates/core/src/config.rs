use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Effective runtime configuration. Built in layers: compiled defaults, an
/// optional TOML file, `SPENDGATE_*` environment variables, then
/// programmatic overrides. Later layers win.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://spendgate.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

/// Every field optional so a config file only has to name what it changes.
#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl ConfigPatch {
    fn merge_into(self, config: &mut AppConfig) {
        if let Some(database) = self.database {
            overwrite(&mut config.database.url, database.url);
            overwrite(&mut config.database.max_connections, database.max_connections);
            overwrite(&mut config.database.timeout_secs, database.timeout_secs);
        }
        if let Some(logging) = self.logging {
            overwrite(&mut config.logging.level, logging.level);
            overwrite(&mut config.logging.format, logging.format);
        }
    }
}

fn overwrite<T>(target: &mut T, candidate: Option<T>) {
    if let Some(value) = candidate {
        *target = value;
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match locate_file(options.config_path.as_deref()) {
            Some(path) => parse_file(&path)?.merge_into(&mut config),
            None if options.require_file => {
                let wanted =
                    options.config_path.unwrap_or_else(|| PathBuf::from("spendgate.toml"));
                return Err(ConfigError::MissingConfigFile(wanted));
            }
            None => {}
        }

        config.layer_environment()?;
        overwrite_opt_string(&mut config.database.url, options.overrides.database_url);
        overwrite_opt_string(&mut config.logging.level, options.overrides.log_level);
        config.validate()?;

        Ok(config)
    }

    fn layer_environment(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = env_value("SPENDGATE_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(raw) = env_value("SPENDGATE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = env_parse("SPENDGATE_DATABASE_MAX_CONNECTIONS", &raw)?;
        }
        if let Some(raw) = env_value("SPENDGATE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = env_parse("SPENDGATE_DATABASE_TIMEOUT_SECS", &raw)?;
        }
        if let Some(level) = env_value("SPENDGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(raw) = env_value("SPENDGATE_LOG_FORMAT") {
            self.logging.format = raw.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.database.url.trim();
        let is_sqlite =
            url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
        if !is_sqlite {
            return Err(invalid(
                "database.url must name a sqlite database (`sqlite://...`, `sqlite::...`, or `:memory:`)",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(invalid("database.max_connections must be at least 1"));
        }
        if !(1..=300).contains(&self.database.timeout_secs) {
            return Err(invalid("database.timeout_secs must be within 1..=300"));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(invalid(&format!(
                "logging.level `{}` is not a tracing level",
                self.logging.level
            )));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation(message.to_string())
}

fn overwrite_opt_string(target: &mut String, candidate: Option<String>) {
    if let Some(value) = candidate {
        *target = value;
    }
}

fn locate_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => ["spendgate.toml", "config/spendgate.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.exists()),
    }
}

fn parse_file(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    #[test]
    fn defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.url, "sqlite://spendgate.db");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn overrides_win_over_defaults() {
        let options = LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                log_level: Some("debug".to_string()),
            },
            ..LoadOptions::default()
        };

        let config = AppConfig::load(options).expect("load");
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn rejects_non_sqlite_database_url() {
        let mut config = AppConfig::default();
        config.database.url = "postgres://localhost/spendgate".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "chatty".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn missing_required_file_is_reported() {
        let options = LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        };
        assert!(matches!(AppConfig::load(options), Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn log_format_parses_known_values() {
        assert_eq!("json".parse::<LogFormat>().expect("json"), LogFormat::Json);
        assert_eq!("PRETTY".parse::<LogFormat>().expect("pretty"), LogFormat::Pretty);
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
