//! Shared fixtures: an in-memory schema mirroring a small user/role catalog
//! and a context whose pool connects lazily, so nothing here needs a
//! database.

use indexmap::IndexMap;
use trellis::authority::Authority;
use trellis::config::DatabaseConfig;
use trellis::model::ModelRegistry;
use trellis::schema::{Column, Schema, Table};
use trellis::{Config, Context, Request, RequestInput};

pub fn column(raw: &str, sql_type: &str, key: &str) -> (String, Column) {
    (
        trellis::naming::camel_case(raw),
        Column {
            name: raw.to_string(),
            sql_type: sql_type.to_string(),
            key: key.to_string(),
            ..Default::default()
        },
    )
}

pub fn test_schema() -> Schema {
    let mut tables = IndexMap::new();
    tables.insert(
        "User".to_string(),
        Table {
            name: "user".to_string(),
            columns: IndexMap::from([
                column("id", "int(11)", "PRI"),
                column("name", "varchar(255)", ""),
                column("about", "text", ""),
                column("password", "varchar(255)", ""),
                column("user_id", "int(11)", ""),
                column("created_at", "datetime", ""),
            ]),
        },
    );
    tables.insert(
        "Role".to_string(),
        Table {
            name: "role".to_string(),
            columns: IndexMap::from([
                column("id", "int(11)", "PRI"),
                column("user_id", "int(11)", ""),
                column("role_type_id", "int(11)", ""),
                column("created_at", "datetime", ""),
            ]),
        },
    );
    tables.insert(
        "RoleType".to_string(),
        Table {
            name: "role_type".to_string(),
            columns: IndexMap::from([
                column("id", "int(11)", "PRI"),
                column("name", "varchar(255)", ""),
            ]),
        },
    );
    Schema {
        tables,
        ..Default::default()
    }
}

pub fn test_context_with(authority: Authority) -> Context {
    let schema = test_schema();
    let registry = ModelRegistry::from_schema(&schema);
    Context {
        config: Config::default(),
        schema,
        authority,
        registry,
        pool: DatabaseConfig::default().connect_lazy(),
    }
}

pub fn test_context() -> Context {
    test_context_with(Authority::default())
}

pub fn request(raw: serde_json::Value) -> Request {
    let input: RequestInput = serde_json::from_value(raw).expect("valid request input");
    Request::set_up(input)
}
