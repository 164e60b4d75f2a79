//! Project scaffolding and the build step.
//!
//! `scaffold` lays down a new project directory with config and authority
//! templates. `build` introspects the live catalog, persists `db.json`, and
//! emits a `models.rs` stub that registers every introspected table with the
//! model registry — the place applications attach getters, batch providers
//! and joins.

use crate::config::Config;
use crate::error::TrellisError;
use crate::schema::{introspect, Schema};
use std::fs;
use std::path::Path;

pub const MODELS_FILENAME: &str = "models.rs";

const CONFIG_TEMPLATE: &str = r#"env: local

paging:
  limit: 20
  maxLimit: 100
  offset: 0

database:
  local:
    adapter: mysql
    charset: utf8
    username: root
    password: root
    database: 127.0.0.1
    port: "3306"
    schema: app
    maxConnectionPool: 100
    logmode: false
"#;

const AUTHORITY_TEMPLATE: &str = r#"# Field-level authorization policy.
#
# default: hasRole("admin")
# models:
#   user:
#     read:
#       default: hasRole("user")
#       fields:
#         password:
#           - hasId(.id)
#           - hasRole("admin")
"#;

/// Creates a new project directory with template configuration files.
pub fn scaffold(dir: &Path) -> Result<(), TrellisError> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(crate::config::CONFIG_FILENAME), CONFIG_TEMPLATE)?;
    fs::write(dir.join(crate::authority::AUTHORITY_FILENAME), AUTHORITY_TEMPLATE)?;
    tracing::info!(dir = %dir.display(), "scaffolded project");
    Ok(())
}

/// Connects to the `env` database, introspects it, and writes `db.json`
/// plus the generated model stub into the project directory.
pub async fn build(dir: &Path, env: &str, config: &Config) -> Result<Schema, TrellisError> {
    let database = config.database(env)?;
    let pool = database.connect().await?;
    let url = database.url()?;

    let schema = introspect::introspect(&pool, env, &database.adapter, url.as_str()).await?;
    schema.save(dir)?;
    fs::write(dir.join(MODELS_FILENAME), render_models(&schema))?;
    tracing::info!(tables = schema.tables.len(), "built schema documents");

    Ok(schema)
}

/// Renders the model stub: one registration call per table, with the
/// available attributes and capability naming conventions spelled out.
pub fn render_models(schema: &Schema) -> String {
    let mut out = String::new();
    out.push_str("//! Generated by `trellis --build`. Regenerated on every build;\n");
    out.push_str("//! attach custom capabilities from your own module instead of here.\n");
    out.push_str("\nuse trellis::model::ModelRegistry;\n");
    out.push_str("\npub fn register_models(registry: &mut ModelRegistry) {\n");

    for (type_name, table) in &schema.tables {
        let attributes: Vec<&str> = table.columns.keys().map(String::as_str).collect();
        out.push_str(&format!("    // {}: {}\n", type_name, attributes.join(", ")));
        out.push_str(&format!("    registry.hooks_mut(\"{type_name}\");\n"));
    }

    out.push_str("}\n");
    out
}
