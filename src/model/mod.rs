//! The model registry: the capability table the planner consults.
//!
//! Where the schema store describes what the database persists, the registry
//! describes what the application computes on top of it. Each row type may
//! register, keyed by graph field name:
//!
//! - `getters` — per-row computed fields, evaluated once per fetched row;
//! - `bulks` — batch providers, evaluated once per list over the parallel
//!   column set of all fetched rows and returning row-parallel output;
//! - `scans` — the persisted attributes a getter or bulk provider needs in
//!   the projection;
//! - `joins` — producers of the SQL JOIN clause for a recorded join onto a
//!   target type;
//! - `query` — an optional transformer of the base select for the type.
//!
//! [`ModelRegistry::from_schema`] seeds empty hooks for every introspected
//! table (plus conventional foreign-key joins), so a freshly built project is
//! queryable before any custom code exists.

use crate::error::TrellisError;
use crate::model::user::{CurrentUser, RowUser};
use crate::naming::{camel_case, classify};
use crate::request::executor::SqlSelect;
use crate::request::node::{Node, NodeId};
use crate::request::Request;
use crate::schema::Schema;
use crate::Context;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

pub mod user;
pub mod values;

/// A fetched row: camel-cased attribute name to decoded value.
pub type Row = IndexMap<String, Value>;

/// The parallel column set handed to batch providers: scanned attribute
/// name to one value per fetched row, in row order.
pub type Columns = IndexMap<String, Vec<Value>>;

/// A per-row computed field. Receives the context, the request (for nested
/// fetches), the requested child node when the field was asked for
/// explicitly, and the fetched row. Register with
/// `hooks.getter("name", |ctx, request, node, row| Box::pin(async move { .. }))`.
pub type GetterFn = Arc<
    dyn for<'a> Fn(
            &'a Context,
            &'a mut Request,
            Option<NodeId>,
            &'a Row,
        ) -> BoxFuture<'a, Result<Value, TrellisError>>
        + Send
        + Sync,
>;

/// A batch provider. Receives the scanned attributes of every fetched row
/// as parallel columns and must answer with one value per row, in the same
/// order.
pub type BulkFn = Arc<
    dyn for<'a> Fn(
            &'a Context,
            &'a mut Request,
            Option<NodeId>,
            &'a Columns,
        ) -> BoxFuture<'a, Result<Vec<Value>, TrellisError>>
        + Send
        + Sync,
>;
pub type QueryFn = Arc<dyn Fn(&Node, SqlSelect) -> SqlSelect + Send + Sync>;
pub type JoinFn = Arc<dyn Fn(&Schema, SqlSelect) -> Result<SqlSelect, TrellisError> + Send + Sync>;
pub type UserFactoryFn = Arc<dyn Fn(Row) -> Arc<dyn CurrentUser> + Send + Sync>;

/// Capabilities registered for one row type.
#[derive(Clone, Default)]
pub struct ModelHooks {
    pub query: Option<QueryFn>,
    pub getters: IndexMap<String, GetterFn>,
    pub bulks: IndexMap<String, BulkFn>,
    pub scans: IndexMap<String, Vec<String>>,
    /// Keyed by pascal-cased target type name.
    pub joins: IndexMap<String, JoinFn>,
}

impl ModelHooks {
    pub fn query_with(
        &mut self,
        f: impl Fn(&Node, SqlSelect) -> SqlSelect + Send + Sync + 'static,
    ) -> &mut Self {
        self.query = Some(Arc::new(f));
        self
    }

    pub fn getter(
        &mut self,
        field: &str,
        f: impl for<'a> Fn(
                &'a Context,
                &'a mut Request,
                Option<NodeId>,
                &'a Row,
            ) -> BoxFuture<'a, Result<Value, TrellisError>>
            + Send
            + Sync
            + 'static,
    ) -> &mut Self {
        self.getters.insert(camel_case(field), Arc::new(f));
        self
    }

    pub fn bulk(
        &mut self,
        field: &str,
        f: impl for<'a> Fn(
                &'a Context,
                &'a mut Request,
                Option<NodeId>,
                &'a Columns,
            ) -> BoxFuture<'a, Result<Vec<Value>, TrellisError>>
            + Send
            + Sync
            + 'static,
    ) -> &mut Self {
        self.bulks.insert(camel_case(field), Arc::new(f));
        self
    }

    /// Declares the persisted attributes a getter or bulk provider for
    /// `field` wants included in the projection.
    pub fn scan(&mut self, field: &str, attributes: &[&str]) -> &mut Self {
        self.scans.insert(
            camel_case(field),
            attributes.iter().map(|a| camel_case(a)).collect(),
        );
        self
    }

    pub fn join(&mut self, target: &str, f: JoinFn) -> &mut Self {
        self.joins.insert(classify(target), f);
        self
    }
}

/// Builds a `LEFT JOIN` producer joining `origin.origin_column` onto
/// `target.target_column`. Table and column names are resolved against the
/// schema at execution time, so stale registrations fail loudly.
pub fn join_on(origin: &str, origin_column: &str, target: &str, target_column: &str) -> JoinFn {
    let origin = origin.to_string();
    let origin_column = origin_column.to_string();
    let target = target.to_string();
    let target_column = target_column.to_string();

    Arc::new(move |schema: &Schema, mut query: SqlSelect| {
        let origin_table = schema.must_table(&origin)?;
        let target_table = schema.must_table(&target)?;
        let origin_col = schema.must_column(&origin, &origin_column)?;
        let target_col = schema.must_column(&target, &target_column)?;
        query.join(format!(
            "LEFT JOIN `{}` ON `{}`.`{}` = `{}`.`{}`",
            target_table.name, origin_table.name, origin_col.name, target_table.name, target_col.name
        ));
        Ok(query)
    })
}

/// Name to capability hooks, plus the current-user plumbing.
#[derive(Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelHooks>,
    user_model: String,
    user_factory: Option<UserFactoryFn>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        ModelRegistry {
            models: IndexMap::new(),
            user_model: "User".to_string(),
            user_factory: None,
        }
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds hooks for every table of the schema and registers conventional
    /// foreign-key joins: a `role_id` column on `user` yields joins for both
    /// `user` -> `role` and `role` -> `user`.
    pub fn from_schema(schema: &Schema) -> Self {
        let mut registry = Self::new();
        for type_name in schema.tables.keys() {
            registry.models.insert(type_name.clone(), ModelHooks::default());
        }

        for (type_name, table) in &schema.tables {
            for column in table.columns.values() {
                let Some(base) = column.name.strip_suffix("_id") else {
                    continue;
                };
                let target_type = classify(base);
                if schema.get_table(&target_type).is_none() {
                    continue;
                }

                let forward = {
                    let origin = type_name.clone();
                    let target = target_type.clone();
                    let fk = column.name.clone();
                    Arc::new(move |schema: &Schema, mut query: SqlSelect| {
                        let origin_table = schema.must_table(&origin)?;
                        let target_table = schema.must_table(&target)?;
                        let primary = schema.get_primary(&target)?;
                        query.join(format!(
                            "LEFT JOIN `{}` ON `{}`.`{}` = `{}`.`{}`",
                            target_table.name, origin_table.name, fk, target_table.name, primary.name
                        ));
                        Ok(query)
                    }) as JoinFn
                };
                let backward = {
                    let origin = target_type.clone();
                    let target = type_name.clone();
                    let fk = column.name.clone();
                    Arc::new(move |schema: &Schema, mut query: SqlSelect| {
                        let origin_table = schema.must_table(&origin)?;
                        let target_table = schema.must_table(&target)?;
                        let primary = schema.get_primary(&origin)?;
                        query.join(format!(
                            "LEFT JOIN `{}` ON `{}`.`{}` = `{}`.`{}`",
                            target_table.name, target_table.name, fk, origin_table.name, primary.name
                        ));
                        Ok(query)
                    }) as JoinFn
                };

                registry
                    .hooks_mut(type_name)
                    .joins
                    .entry(target_type.clone())
                    .or_insert(forward);
                registry
                    .hooks_mut(target_type.as_str())
                    .joins
                    .entry(type_name.clone())
                    .or_insert(backward);
            }
        }

        registry
    }

    /// Looks up the hooks for a type. `None` marks scalars and unknown
    /// types, which the planner leaves alone.
    pub fn get(&self, type_name: &str) -> Option<&ModelHooks> {
        self.models.get(&classify(type_name))
    }

    /// The hooks for a type, registering an empty set on first use.
    pub fn hooks_mut(&mut self, type_name: &str) -> &mut ModelHooks {
        self.models.entry(classify(type_name)).or_default()
    }

    pub fn user_model(&self) -> &str {
        &self.user_model
    }

    pub fn set_user_model(&mut self, name: &str) {
        self.user_model = classify(name);
    }

    pub fn set_user_factory(&mut self, factory: UserFactoryFn) {
        self.user_factory = Some(factory);
    }

    /// Wraps a fetched user row in the registered capability object, falling
    /// back to the row-backed default.
    pub fn make_user(&self, row: Row, primary_attribute: &str) -> Arc<dyn CurrentUser> {
        match &self.user_factory {
            Some(factory) => factory(row),
            None => Arc::new(RowUser::new(row, primary_attribute)),
        }
    }
}
