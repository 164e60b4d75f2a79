//! Cached catalog of the relational schema the gateway serves.
//!
//! Tables are keyed by their pascal-cased type name and columns by their
//! camel-cased attribute name, so lookups accept raw SQL names, graph names
//! and type names interchangeably. The schema is either loaded from the
//! persisted `db.json` document at the project root or introspected from the
//! live database catalog (see [`introspect`]).

use crate::error::TrellisError;
use crate::naming::{camel_case, classify};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub mod introspect;

/// File name of the persisted schema document at the project root.
pub const DB_FILENAME: &str = "db.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub adapter: String,
    #[serde(default)]
    pub env: String,
    /// Pascal-cased type name to table.
    #[serde(default)]
    pub tables: IndexMap<String, Table>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    /// Raw (snake-cased) SQL name.
    pub name: String,
    /// Camel-cased attribute name to column.
    #[serde(default)]
    pub columns: IndexMap<String, Column>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Column {
    /// Raw SQL name.
    pub name: String,
    /// SQL type string as reported by the catalog, e.g. `int(11)`.
    #[serde(rename = "type")]
    pub sql_type: String,
    #[serde(default)]
    pub null: bool,
    /// Key tag reported by the catalog: `PRI`, `UNI` or empty.
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub default: String,
    #[serde(default)]
    pub extra: String,
}

impl Schema {
    /// Loads the persisted schema document. A missing file yields an empty
    /// schema, matching a project that has not been built yet.
    pub fn load(project_dir: &Path) -> Result<Schema, TrellisError> {
        let path = project_dir.join(DB_FILENAME);
        match fs::read_to_string(&path) {
            Ok(body) => Ok(serde_json::from_str(&body)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Schema::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes the schema document to `db.json` at the project root.
    pub fn save(&self, project_dir: &Path) -> Result<(), TrellisError> {
        let body = serde_json::to_vec_pretty(self)?;
        fs::write(project_dir.join(DB_FILENAME), body)?;
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&classify(name))
    }

    pub fn must_table(&self, name: &str) -> Result<&Table, TrellisError> {
        self.get_table(name).ok_or_else(|| TrellisError::UnknownTable {
            name: name.to_string(),
        })
    }

    pub fn get_column(&self, table_name: &str, column_name: &str) -> Option<&Column> {
        self.get_table(table_name)?
            .columns
            .get(&camel_case(column_name))
    }

    pub fn must_column(&self, table_name: &str, column_name: &str) -> Result<&Column, TrellisError> {
        self.get_column(table_name, column_name)
            .ok_or_else(|| TrellisError::UnknownColumn {
                table: table_name.to_string(),
                column: column_name.to_string(),
            })
    }

    /// All `PRI`-tagged columns of the table, or an error when the table is
    /// absent or has none.
    pub fn get_primaries(&self, table_name: &str) -> Result<Vec<&Column>, TrellisError> {
        let primaries: Vec<&Column> = self
            .get_table(table_name)
            .map(|table| table.columns.values().filter(|c| c.is_primary()).collect())
            .unwrap_or_default();

        if primaries.is_empty() {
            return Err(TrellisError::MissingPrimaryKey {
                table: table_name.to_string(),
            });
        }

        Ok(primaries)
    }

    /// The canonical primary key: when several columns are tagged `PRI`, the
    /// shortest-named one wins, with the name itself as tiebreak.
    pub fn get_primary(&self, table_name: &str) -> Result<&Column, TrellisError> {
        let mut primaries = self.get_primaries(table_name)?;
        primaries.sort_by_key(|c| (c.name.len(), c.name.clone()));
        Ok(primaries[0])
    }
}

impl Table {
    /// DDL to create this table, used by test harnesses to build a throwaway
    /// schema matching the catalog.
    pub fn create_statement(&self) -> String {
        let mut lines = Vec::with_capacity(self.columns.len() + 1);
        let mut primaries = Vec::new();

        for column in self.columns.values() {
            let null = if column.is_primary() || !column.null {
                "NOT NULL"
            } else {
                "NULL"
            };
            if column.is_primary() {
                primaries.push(format!("`{}`", column.name));
            }
            lines.push(format!("  `{}` {} {}", column.name, column.sql_type, null));
        }

        if !primaries.is_empty() {
            lines.push(format!("  PRIMARY KEY ({})", primaries.join(",")));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS `{}` (\n{}\n);",
            self.name,
            lines.join(",\n")
        )
    }

    pub fn truncate_statement(&self) -> String {
        format!("TRUNCATE TABLE `{}`", self.name)
    }
}

impl Column {
    pub fn is_primary(&self) -> bool {
        self.key == "PRI"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        let mut columns = IndexMap::new();
        columns.insert(
            "wantedJobId".to_string(),
            Column {
                name: "wanted_job_id".to_string(),
                sql_type: "int(11)".to_string(),
                key: "PRI".to_string(),
                ..Default::default()
            },
        );
        columns.insert(
            "id".to_string(),
            Column {
                name: "id".to_string(),
                sql_type: "int(11)".to_string(),
                key: "PRI".to_string(),
                ..Default::default()
            },
        );
        columns.insert(
            "createdAt".to_string(),
            Column {
                name: "created_at".to_string(),
                sql_type: "datetime".to_string(),
                null: true,
                ..Default::default()
            },
        );

        let mut tables = IndexMap::new();
        tables.insert(
            "WantedJobDetail".to_string(),
            Table {
                name: "wanted_job_detail".to_string(),
                columns,
            },
        );
        Schema {
            tables,
            ..Default::default()
        }
    }

    #[test]
    fn tables_are_indexed_by_any_spelling() {
        let schema = schema();
        assert!(schema.get_table("WantedJobDetail").is_some());
        assert!(schema.get_table("wanted_job_detail").is_some());
        assert!(schema.get_table("wantedJobDetail").is_some());
        assert!(schema.get_table("article").is_none());
    }

    #[test]
    fn columns_are_indexed_by_any_spelling() {
        let schema = schema();
        assert!(schema.get_column("wanted_job_detail", "created_at").is_some());
        assert!(schema.get_column("WantedJobDetail", "createdAt").is_some());
        assert!(schema.get_column("WantedJobDetail", "missing").is_none());
    }

    #[test]
    fn shortest_named_primary_wins() {
        let schema = schema();
        let primary = schema.get_primary("WantedJobDetail").unwrap();
        assert_eq!(primary.name, "id");
        assert_eq!(schema.get_primaries("WantedJobDetail").unwrap().len(), 2);
    }

    #[test]
    fn missing_primary_is_an_error() {
        let schema = schema();
        assert!(matches!(
            schema.get_primary("article"),
            Err(TrellisError::MissingPrimaryKey { .. })
        ));
    }

    #[test]
    fn create_statement_lists_every_column() {
        let schema = schema();
        let table = schema.must_table("WantedJobDetail").unwrap();
        let ddl = table.create_statement();
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS `wanted_job_detail`"));
        assert!(ddl.contains("`created_at` datetime NULL"));
        assert!(ddl.contains("PRIMARY KEY (`wanted_job_id`,`id`)"));
    }
}
