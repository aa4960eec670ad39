use outage_client::{db::TableNameError, OutageTable};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use std::{fmt, fs, time::Duration};

pub const CONFIG_PATH_ENV: &str = "OUTAGE_SYNC_CONFIG";
pub const API_KEY_ENV: &str = "API_KEY";
pub const DB_USERNAME_ENV: &str = "USERNAME_EIADB";
pub const DB_PASSWORD_ENV: &str = "PASSWORD_EIADB";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("invalid sink table: {0}")]
    Table(#[from] TableNameError),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "eiaDB".to_string(),
            max_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    /// Connection options for the destination database. Credentials are set
    /// field by field, never spliced into a URL.
    pub fn connect_options(&self, secrets: &Secrets) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&secrets.db_username)
            .password(secrets.db_password.expose())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EiaConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Rows published per day, used only to estimate whether a window fits in one page.
    pub generators_per_day: u32,
    /// Maximum rows the API returns for a single request.
    pub page_limit: u32,
}

impl Default for EiaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.eia.gov/v2/nuclear-outages/generator-nuclear-outages/data/"
                .to_string(),
            timeout_secs: 15,
            generators_per_day: 94,
            page_limit: 5000,
        }
    }
}

impl EiaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub table: String,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            table: "Outages".to_string(),
            batch_size: 1000,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

impl SinkConfig {
    pub fn table(&self) -> Result<OutageTable, ConfigError> {
        Ok(OutageTable::new(self.table.clone())?)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus textfile written once the run finishes.
    pub textfile_path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub eia: EiaConfig,
    pub sink: SinkConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        use std::env;

        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "outage-sync.toml".to_string());
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.sink.table()?;
        if self.sink.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "sink.batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "database.max_connections",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.eia.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "eia.timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// A value that must not show up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Credentials supplied through the process environment.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub api_key: Secret,
    pub db_username: String,
    pub db_password: Secret,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingEnv(name))
        };

        Ok(Self {
            api_key: Secret::new(require(API_KEY_ENV)?),
            db_username: require(DB_USERNAME_ENV)?,
            db_password: Secret::new(require(DB_PASSWORD_ENV)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.sink.table, "Outages");
        assert_eq!(cfg.eia.timeout_secs, 15);
        assert_eq!(cfg.eia.page_limit, 5000);
        assert_eq!(cfg.database.max_connections, 1);
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [database]
            host = "db.internal"

            [sink]
            table = "nuclear_outages"
            max_retries = 2

            [metrics]
            textfile_path = "/var/lib/node_exporter/outage_sync.prom"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.database.host, "db.internal");
        assert_eq!(cfg.database.port, 5432);
        assert_eq!(cfg.sink.table().unwrap().name(), "nuclear_outages");
        assert_eq!(cfg.sink.max_retries, 2);
        assert_eq!(cfg.sink.batch_size, 1000);
        assert_eq!(
            cfg.metrics.unwrap().textfile_path,
            "/var/lib/node_exporter/outage_sync.prom"
        );
    }

    #[test]
    fn rejects_unsafe_table_name() {
        let res = AppConfig::from_toml_str(
            r#"
            [sink]
            table = "Outages; DROP TABLE Outages"
            "#,
        );
        assert!(matches!(res, Err(ConfigError::Table(_))));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let res = AppConfig::from_toml_str("[sink]\nbatch_size = 0\n");
        assert!(matches!(
            res,
            Err(ConfigError::Invalid {
                field: "sink.batch_size",
                ..
            })
        ));
    }

    #[test]
    fn secrets_require_every_variable() {
        let env: HashMap<&str, &str> =
            HashMap::from([(API_KEY_ENV, "key"), (DB_USERNAME_ENV, "sync")]);
        let res = Secrets::from_lookup(|name| env.get(name).map(|v| v.to_string()));
        assert!(matches!(res, Err(ConfigError::MissingEnv(DB_PASSWORD_ENV))));
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let env: HashMap<&str, &str> = HashMap::from([
            (API_KEY_ENV, "super-secret-key"),
            (DB_USERNAME_ENV, "sync"),
            (DB_PASSWORD_ENV, "hunter2"),
        ]);
        let secrets = Secrets::from_lookup(|name| env.get(name).map(|v| v.to_string())).unwrap();
        let rendered = format!("{secrets:?}");

        assert!(!rendered.contains("super-secret-key"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(secrets.api_key.expose(), "super-secret-key");
    }
}
