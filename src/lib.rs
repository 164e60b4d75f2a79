//! Trellis exposes a relational database through a graph-shaped query
//! protocol: a client posts a tree describing a root entity, the fields it
//! wants (including nested entities), filter/sort/pagination arguments, and
//! receives a JSON tree assembled from persisted columns, per-row computed
//! fields and batch lookups, gated by a declarative field-level
//! authorization policy.

pub mod authority;
pub mod codegen;
pub mod config;
pub mod error;
pub mod model;
pub mod naming;
pub mod request;
pub mod schema;
pub mod server;

pub use crate::config::Config;
pub use crate::error::TrellisError;
pub use crate::request::{dispatch, Operation, Request, RequestInput};

use crate::authority::Authority;
use crate::model::ModelRegistry;
use crate::schema::Schema;
use sqlx::mysql::MySqlPool;
use std::path::Path;

/// Process-wide state shared by every request: configuration, the cached
/// schema and authority documents, the model registry and the connection
/// pool. Built once at startup and read-only afterwards.
pub struct Context {
    pub config: Config,
    pub schema: Schema,
    pub authority: Authority,
    pub registry: ModelRegistry,
    pub pool: MySqlPool,
}

impl Context {
    /// Loads the project documents from `project_dir`, connects to the
    /// `env` database, and seeds the registry from the schema. Applications
    /// attach their custom capabilities to `registry` afterwards.
    pub async fn initialize(project_dir: &Path, env: &str) -> Result<Context, TrellisError> {
        let config = Config::load(project_dir)?;
        let schema = Schema::load(project_dir)?;
        let authority = Authority::load(project_dir)?;
        let registry = ModelRegistry::from_schema(&schema);
        let pool = config.database(env)?.connect().await?;

        Ok(Context {
            config,
            schema,
            authority,
            registry,
            pool,
        })
    }
}
