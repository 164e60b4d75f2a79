//! Project configuration loaded from `config.yaml` at the project root.

use crate::error::TrellisError;
use indexmap::IndexMap;
use serde::Deserialize;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::fs;
use std::path::Path;
use url::Url;

pub const CONFIG_FILENAME: &str = "config.yaml";

const DEFAULT_USERNAME: &str = "root";
const DEFAULT_PASSWORD: &str = "root";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3306;
const DEFAULT_MAX_CONNECTION_POOL: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub env: String,
    pub paging: Paging,
    /// Environment name to database settings.
    pub database: IndexMap<String, DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Paging {
    pub limit: i64,
    #[serde(rename = "maxLimit")]
    pub max_limit: i64,
    pub offset: i64,
}

impl Default for Paging {
    fn default() -> Self {
        Paging {
            limit: 20,
            max_limit: 100,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub adapter: String,
    pub charset: String,
    pub username: String,
    pub password: String,
    /// Database host. The field keeps its historical `database` key in the
    /// config file.
    pub database: String,
    pub port: String,
    /// Name of the schema to `USE` after connecting.
    pub schema: String,
    pub plural: bool,
    #[serde(rename = "maxConnectionPool")]
    pub max_connection_pool: u32,
    #[serde(rename = "logmode")]
    pub log_mode: bool,
}

impl Config {
    /// Reads `config.yaml` from the project root. A missing file yields the
    /// built-in defaults so freshly scaffolded projects still boot.
    pub fn load(project_dir: &Path) -> Result<Config, TrellisError> {
        let path = project_dir.join(CONFIG_FILENAME);
        match fs::read_to_string(&path) {
            Ok(body) => Ok(serde_yaml::from_str(&body)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn database(&self, env: &str) -> Result<&DatabaseConfig, TrellisError> {
        self.database
            .get(env)
            .ok_or_else(|| TrellisError::UnknownEnvironment {
                env: env.to_string(),
            })
    }
}

impl DatabaseConfig {
    pub fn username(&self) -> &str {
        if self.username.is_empty() {
            DEFAULT_USERNAME
        } else {
            &self.username
        }
    }

    pub fn password(&self) -> &str {
        if self.password.is_empty() {
            DEFAULT_PASSWORD
        } else {
            &self.password
        }
    }

    pub fn host(&self) -> &str {
        if self.database.is_empty() {
            DEFAULT_HOST
        } else {
            &self.database
        }
    }

    pub fn port(&self) -> u16 {
        self.port.parse().unwrap_or(DEFAULT_PORT)
    }

    pub fn max_connection_pool(&self) -> u32 {
        if self.max_connection_pool == 0 {
            DEFAULT_MAX_CONNECTION_POOL
        } else {
            self.max_connection_pool
        }
    }

    /// Connection URL without credentials, recorded in the persisted schema
    /// document for provenance.
    pub fn url(&self) -> Result<Url, TrellisError> {
        Url::parse(&format!(
            "mysql://{}@{}:{}/{}",
            self.username(),
            self.host(),
            self.port(),
            self.schema
        ))
        .map_err(|err| TrellisError::Internal {
            message: format!("invalid database url: {err}"),
        })
    }

    /// Opens the connection pool for this environment.
    pub async fn connect(&self) -> Result<MySqlPool, TrellisError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(self.max_connection_pool())
            .connect_with(self.connect_options())
            .await?;
        tracing::info!(host = %self.host(), schema = %self.schema, "connected to database");
        Ok(pool)
    }

    /// Builds a pool that connects on first use. Handy for tests and tooling
    /// that construct a context without touching the database.
    pub fn connect_lazy(&self) -> MySqlPool {
        MySqlPoolOptions::new()
            .max_connections(self.max_connection_pool())
            .connect_lazy_with(self.connect_options())
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(self.host())
            .port(self.port())
            .username(self.username())
            .password(self.password());
        if !self.schema.is_empty() {
            options = options.database(&self.schema);
        }
        if !self.charset.is_empty() {
            options = options.charset(&self.charset);
        }
        options
    }
}
