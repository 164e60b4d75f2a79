//! Live-catalog introspection.
//!
//! Reads `SHOW FULL TABLES` and `DESC` from a connected database and maps the
//! result rows into the cached [`Schema`] document, keying tables by type
//! name and columns by attribute name.

use crate::error::TrellisError;
use crate::naming::{camel_case, classify};
use crate::schema::{Column, Schema, Table};
use indexmap::IndexMap;
use sqlx::mysql::MySqlPool;
use sqlx::Row as _;

/// Introspects every base table of the connected database.
pub async fn introspect(
    pool: &MySqlPool,
    env: &str,
    adapter: &str,
    url: &str,
) -> Result<Schema, TrellisError> {
    let mut tables = IndexMap::new();

    let rows = sqlx::query("SHOW FULL TABLES WHERE Table_Type = 'BASE TABLE'")
        .fetch_all(pool)
        .await?;
    for row in rows {
        let name: String = row.try_get(0)?;
        let columns = describe(pool, &name).await?;
        tracing::debug!(table = %name, columns = columns.len(), "introspected table");
        tables.insert(classify(&name), Table { name, columns });
    }

    Ok(Schema {
        url: url.to_string(),
        adapter: adapter.to_string(),
        env: env.to_string(),
        tables,
    })
}

async fn describe(
    pool: &MySqlPool,
    table_name: &str,
) -> Result<IndexMap<String, Column>, TrellisError> {
    let mut columns = IndexMap::new();

    let rows = sqlx::query(&format!("DESC `{table_name}`"))
        .fetch_all(pool)
        .await?;
    for row in rows {
        let name: String = row.try_get("Field")?;
        let sql_type: String = row.try_get("Type")?;
        let null: String = row.try_get("Null")?;
        let key: String = row.try_get("Key")?;
        let default: Option<String> = row.try_get("Default")?;
        let extra: String = row.try_get("Extra")?;

        columns.insert(
            camel_case(&name),
            Column {
                name,
                sql_type,
                null: null.eq_ignore_ascii_case("yes"),
                key,
                default: default.unwrap_or_default(),
                extra,
            },
        );
    }

    Ok(columns)
}
