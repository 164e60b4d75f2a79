//! The request executor.
//!
//! Execution runs the planned query once, fulfills per-row fields (columns
//! and getters) under the node's validators, fans out batch providers over
//! the complete row set, and assembles the final JSON payload with its
//! paging and counting envelope fields.

use crate::error::TrellisError;
use crate::model::values;
use crate::model::Row;
use crate::naming::{camel_case, classify};
use crate::request::arguments::Condition;
use crate::request::node::{Node, NodeId};
use crate::request::{planner, Request, COUNT, DATA, ERROR, KEY, LIMIT, OFFSET, TOTAL};
use crate::schema::{Schema, Table};
use crate::Config;
use crate::Context;
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde_json::{json, Map as JsonMap, Value};
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column as _, Row as _};

/// External transformer applied to the query right before execution.
pub type QueryHandler = Box<dyn Fn(SqlSelect) -> SqlSelect + Send + Sync>;

/// A single-table select under construction. Identifiers come from the
/// schema catalog and are backquoted; every value is a bound parameter.
#[derive(Debug, Clone, Default)]
pub struct SqlSelect {
    pub table: String,
    pub select: String,
    pub joins: Vec<String>,
    pub wheres: Vec<Condition>,
    pub orders: Vec<String>,
    pub group: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl SqlSelect {
    pub fn new(table: &str) -> Self {
        SqlSelect {
            table: table.to_string(),
            select: "*".to_string(),
            ..Default::default()
        }
    }

    pub fn select(&mut self, select: impl Into<String>) -> &mut Self {
        self.select = select.into();
        self
    }

    pub fn join(&mut self, clause: impl Into<String>) -> &mut Self {
        self.joins.push(clause.into());
        self
    }

    pub fn and_where(&mut self, condition: Condition) -> &mut Self {
        self.wheres.push(condition);
        self
    }

    pub fn order(&mut self, clause: impl Into<String>) -> &mut Self {
        self.orders.push(clause.into());
        self
    }

    pub fn group_by(&mut self, clause: impl Into<String>) -> &mut Self {
        self.group = Some(clause.into());
        self
    }

    /// Renders the statement, expanding array arguments into one
    /// placeholder per element.
    pub fn render(&self) -> (String, Vec<Value>) {
        let (where_sql, args) = self.render_wheres();

        let mut sql = format!("SELECT {} FROM `{}`", self.select, self.table);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        sql.push_str(&where_sql);
        if let Some(group) = &self.group {
            sql.push_str(" GROUP BY ");
            sql.push_str(group);
        }
        if !self.orders.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.orders.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        (sql, args)
    }

    /// Renders the counting form of the statement: same joins and filters,
    /// no ordering or paging. A deduplicating `GROUP BY` becomes a
    /// `COUNT(DISTINCT ...)`.
    pub fn render_count(&self) -> (String, Vec<Value>) {
        let (where_sql, args) = self.render_wheres();

        let select = match &self.group {
            Some(group) => format!("COUNT(DISTINCT {group})"),
            None => "COUNT(*)".to_string(),
        };
        let mut sql = format!("SELECT {} FROM `{}`", select, self.table);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        sql.push_str(&where_sql);

        (sql, args)
    }

    fn render_wheres(&self) -> (String, Vec<Value>) {
        if self.wheres.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut fragments = Vec::with_capacity(self.wheres.len());
        let mut args = Vec::new();
        for condition in &self.wheres {
            fragments.push(format!("({})", expand_placeholders(condition, &mut args)));
        }

        (format!(" WHERE {}", fragments.join(" AND ")), args)
    }
}

/// Rewrites a condition's `?` placeholders against its arguments: array
/// arguments become one placeholder per element, an empty array becomes
/// `NULL` so `IN ()` never reaches the server.
fn expand_placeholders(condition: &Condition, args: &mut Vec<Value>) -> String {
    let mut out = String::with_capacity(condition.query.len());
    let mut pending = condition.args.iter();

    for c in condition.query.chars() {
        if c != '?' {
            out.push(c);
            continue;
        }
        match pending.next() {
            Some(Value::Array(items)) if items.is_empty() => out.push_str("NULL"),
            Some(Value::Array(items)) => {
                out.push_str(&vec!["?"; items.len()].join(", "));
                args.extend(items.iter().cloned());
            }
            Some(value) => {
                out.push('?');
                args.push(value.clone());
            }
            None => out.push('?'),
        }
    }

    out
}

/// The column projection of a planned node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// A getter without a scan declaration widens the select to `*`.
    Star,
    Columns(Vec<String>),
    /// Nothing to select; the fetch is skipped entirely.
    Empty,
}

impl Projection {
    pub fn to_select(&self) -> Option<String> {
        match self {
            Projection::Star => Some("*".to_string()),
            Projection::Columns(columns) => Some(columns.join(", ")),
            Projection::Empty => None,
        }
    }
}

/// Computes the minimal projection for an analyzed node: persisted fields
/// (except those shadowed by getters), plus every scanned attribute.
pub fn select_columns(schema: &Schema, node: &Node) -> Result<Projection, TrellisError> {
    let table = schema.must_table(&node.type_name)?;
    let mut columns: Vec<String> = Vec::new();

    for persist in &node.persists {
        if node.customs.contains(persist) {
            continue;
        }
        let column = schema.must_column(&node.type_name, persist)?;
        let qualified = format!("`{}`.`{}`", table.name, column.name);
        if !columns.contains(&qualified) {
            columns.push(qualified);
        }
    }

    for scanned in flatten_scanneds(&node.scanneds) {
        let column = schema.must_column(&node.type_name, &scanned)?;
        let qualified = format!("`{}`.`{}`", table.name, column.name);
        if !columns.contains(&qualified) {
            columns.push(qualified);
        }
    }

    // A getter that declared no inputs may read anything.
    if node.customs.iter().any(|custom| !node.scanneds.contains_key(custom)) {
        return Ok(Projection::Star);
    }

    if columns.is_empty() {
        return Ok(Projection::Empty);
    }

    Ok(Projection::Columns(columns))
}

/// Paging applies only to envelope lists: effective limit is the argument
/// clamped to the configured maximum (falling back to the default, and to
/// the maximum when non-positive), effective offset is the argument floored
/// at the configured offset.
pub fn query_limit_and_offset(node: &Node, config: &Config, mut query: SqlSelect) -> SqlSelect {
    if !node.is_list {
        return query;
    }

    let mut limit = config.paging.limit;
    let max_limit = config.paging.max_limit;
    let mut offset = config.paging.offset;

    if let Some(requested) = node.args.get(LIMIT).and_then(Value::as_f64) {
        limit = (requested as i64).min(max_limit);
    }
    if let Some(requested) = node.args.get(OFFSET).and_then(Value::as_f64) {
        offset = (requested as i64).max(config.paging.offset);
    }
    if limit <= 0 {
        limit = max_limit;
    }

    query.limit = Some(limit);
    query.offset = Some(offset);
    query
}

/// Runs the node's query and returns the final data alongside the query it
/// ran, so envelope counts can reissue it.
pub async fn fetch(
    ctx: &Context,
    request: &mut Request,
    id: NodeId,
    is_list: bool,
    handlers: &[QueryHandler],
) -> Result<(SqlSelect, Value), TrellisError> {
    planner::analyze(ctx, request, id, false)?;

    let node = request.node(id).clone();
    let hooks = ctx
        .registry
        .get(&node.type_name)
        .ok_or_else(|| TrellisError::UnknownModel {
            name: node.type_name.clone(),
        })?;
    let table = ctx.schema.must_table(&node.type_name)?;

    let mut query = match &hooks.query {
        Some(base) => base(&node, SqlSelect::new(&table.name)),
        None => SqlSelect::new(&table.name),
    };

    let projection = select_columns(&ctx.schema, &node)?;
    if let Some(select) = projection.to_select() {
        query.select(select);
    }

    for join in &node.joins {
        let producer = ctx
            .registry
            .get(&join.origin)
            .and_then(|origin| origin.joins.get(&classify(&join.target)))
            .cloned()
            .ok_or_else(|| TrellisError::MissingJoin {
                origin: join.origin.clone(),
                target: join.target.clone(),
            })?;
        query = producer(&ctx.schema, query)?;
    }

    if let Some(condition) = compose_or_groups(&node.ors) {
        query.and_where(condition);
    }
    if let Some(condition) = compose_and_blocks(&node.ands) {
        query.and_where(condition);
    }
    for condition in &node.wheres {
        query.and_where(condition.clone());
    }
    for order in &node.orders {
        query.order(order.clone());
    }

    if is_list && node.parent.is_none() {
        // Joins can multiply the root rows; group on the primary to
        // deduplicate.
        if let Ok(primary) = ctx.schema.get_primary(&node.type_name) {
            query.group_by(format!("`{}`.`{}`", table.name, primary.name));
        }
    }
    if is_list {
        query = query_limit_and_offset(&node, &ctx.config, query);
    }
    for handler in handlers {
        query = handler(query);
    }

    let rows = if projection == Projection::Empty {
        Vec::new()
    } else {
        let mut single = query.clone();
        let executed = if is_list {
            &query
        } else {
            single.limit = Some(1);
            &single
        };
        let (sql, args) = executed.render();
        tracing::debug!(%sql, "executing select");
        let mut prepared = sqlx::query(&sql);
        for arg in &args {
            prepared = bind_value(prepared, arg);
        }
        let fetched = prepared.fetch_all(&ctx.pool).await?;
        fetched
            .iter()
            .map(|row| decode_row(table, row))
            .collect::<Result<Vec<_>, _>>()?
    };

    let data = if is_list {
        let mut list: Vec<Value> = Vec::with_capacity(rows.len());
        for row in &rows {
            let fulfilled = fulfill_row(ctx, request, &node, row).await?;
            list.push(Value::Object(fulfilled));
        }

        if !rows.is_empty() && !node.bulks.is_empty() {
            let columns = values::get_by_name(&rows, &flatten_scanneds(&node.scanneds));
            for name in &node.bulks {
                let provider =
                    hooks
                        .bulks
                        .get(name)
                        .cloned()
                        .ok_or_else(|| TrellisError::Internal {
                            message: format!(
                                "`{}` is planned as a bulk field but has no provider.",
                                name
                            ),
                        })?;
                let child = node.fields.get(name).copied();
                let bulked = provider(ctx, &mut *request, child, &columns).await?;
                merge_bulk(&mut list, name, &bulked);
            }
        }

        Value::Array(list)
    } else {
        match rows.first() {
            Some(row) => Value::Object(fulfill_row(ctx, request, &node, row).await?),
            None => Value::Null,
        }
    };

    Ok((query, data))
}

/// Fetches the node and wraps list results in their envelope, populating the
/// reserved `_total` / `_count` / `_limit` / `_offset` children on request.
pub async fn result(
    ctx: &Context,
    request: &mut Request,
    id: NodeId,
    handlers: &[QueryHandler],
) -> Result<Value, TrellisError> {
    planner::analyze(ctx, request, id, false)?;
    let (is_list, is_listish) = {
        let node = request.node(id);
        (node.is_list, node.is_listish())
    };

    let (query, data) = fetch(ctx, request, id, is_listish, handlers).await?;

    if !is_list {
        return Ok(data);
    }

    let mut payload = JsonMap::new();
    payload.insert(DATA.to_string(), data);

    if request.find(id, TOTAL).is_some() {
        let table = ctx.schema.must_table(&request.node(id).type_name)?;
        let total = run_count(ctx, &SqlSelect::new(&table.name)).await?;
        payload.insert(TOTAL.to_string(), json!(total));
    }

    if request.find(id, COUNT).is_some() {
        let mut unpaged = query.clone();
        unpaged.limit = None;
        unpaged.offset = None;
        let count = run_count(ctx, &unpaged).await?;
        payload.insert(COUNT.to_string(), json!(count));
    }

    let node = request.node(id);
    if request.find(id, LIMIT).is_some() {
        payload.insert(LIMIT.to_string(), paging_echo(node, ctx, LIMIT));
    }
    if request.find(id, OFFSET).is_some() {
        payload.insert(OFFSET.to_string(), paging_echo(node, ctx, OFFSET));
    }

    Ok(Value::Object(payload))
}

/// Echoes a paging argument back into the envelope: an explicit null falls
/// back to the configured value, an absent argument to zero.
fn paging_echo(node: &Node, ctx: &Context, key: &str) -> Value {
    match node.args.get(key) {
        Some(Value::Null) => {
            if key == LIMIT {
                json!(ctx.config.paging.limit)
            } else {
                json!(ctx.config.paging.offset)
            }
        }
        Some(value) => value.clone(),
        None => json!(0),
    }
}

async fn run_count(ctx: &Context, query: &SqlSelect) -> Result<i64, TrellisError> {
    let (sql, args) = query.render_count();
    tracing::debug!(%sql, "executing count");
    let mut prepared = sqlx::query(&sql);
    for arg in &args {
        prepared = bind_value(prepared, arg);
    }
    let row = prepared.fetch_one(&ctx.pool).await?;
    Ok(row.try_get::<i64, _>(0)?)
}

/// Fulfills one row: validates and writes persisted fields, runs getters,
/// and attaches the row's `_error` envelope. A field is written only when
/// every one of its validators passes; failures are recorded per validator
/// and never touch sibling fields.
async fn fulfill_row(
    ctx: &Context,
    request: &mut Request,
    node: &Node,
    row: &Row,
) -> Result<JsonMap<String, Value>, TrellisError> {
    let mut errors: Vec<Value> = Vec::new();
    let mut fulfilled = JsonMap::new();

    for persist in &node.persists {
        let rejections = validate(ctx, request, node, persist, row).await?;
        if !rejections.is_empty() {
            errors.extend(rejections);
            continue;
        }

        let value = row.get(persist).cloned().unwrap_or(Value::Null);
        let value = match node.fields.get(persist) {
            Some(child) => request.node(*child).parse(value),
            None => value,
        };
        fulfilled.insert(persist.clone(), value);
    }

    let root_is_listish = request.node(request.root()).is_listish();
    for custom in &node.customs {
        let rejections = validate(ctx, request, node, custom, row).await?;
        if !rejections.is_empty() {
            errors.extend(rejections);
            continue;
        }
        // Bulk-capable fields on list roots are filled by the batch pass.
        if node.bulks.contains(custom) && root_is_listish {
            continue;
        }

        let getter = ctx
            .registry
            .get(&node.type_name)
            .and_then(|hooks| hooks.getters.get(custom))
            .cloned()
            .ok_or_else(|| TrellisError::Internal {
                message: format!("`{}` is planned as a custom field but has no getter.", custom),
            })?;
        let child = node.fields.get(custom).copied();
        let value = getter(ctx, &mut *request, child, row).await?;
        fulfilled.insert(custom.clone(), value);
    }

    let count = errors.len();
    fulfilled.insert(ERROR.to_string(), json!({ DATA: errors, COUNT: count }));
    Ok(fulfilled)
}

/// Evaluates every validator bound to a field against the row, returning
/// the full list of rejection records.
async fn validate(
    ctx: &Context,
    request: &Request,
    node: &Node,
    candidate: &str,
    row: &Row,
) -> Result<Vec<Value>, TrellisError> {
    let Some(validators) = node.validator_map.get(candidate) else {
        return Ok(Vec::new());
    };
    let Some(child_id) = node.fields.get(candidate) else {
        return Ok(Vec::new());
    };

    let mut rejections = Vec::new();
    for validator in validators {
        if matches!(validator, crate::authority::Validator::All) {
            continue;
        }
        let user = request.current_user(ctx).await?;
        let child = request.node(*child_id);
        if let Some(rejection) = validator.exec(child, row, user.as_ref()) {
            rejections.push(json!({
                KEY: candidate,
                "code": rejection.code,
                "message": rejection.message,
            }));
        }
    }

    Ok(rejections)
}

/// Writes a batch provider's row-parallel output into the fulfilled list,
/// skipping rows whose `_error` already rejects the field.
fn merge_bulk(list: &mut [Value], name: &str, bulked: &[Value]) {
    for (i, item) in list.iter_mut().enumerate() {
        let Some(object) = item.as_object_mut() else {
            continue;
        };
        if row_has_error(object, name) {
            continue;
        }
        object.insert(
            name.to_string(),
            bulked.get(i).cloned().unwrap_or(Value::Null),
        );
    }
}

fn row_has_error(object: &JsonMap<String, Value>, name: &str) -> bool {
    object
        .get(ERROR)
        .and_then(|error| error.get(DATA))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .any(|entry| entry.get(KEY).and_then(Value::as_str) == Some(name))
}

/// Composes `_or` groups: conditions inside a group are ANDed, groups are
/// ORed, the whole block is parenthesized.
pub(crate) fn compose_or_groups(groups: &[Vec<Condition>]) -> Option<Condition> {
    let mut fragments = Vec::new();
    let mut args = Vec::new();
    for group in groups {
        if group.is_empty() {
            continue;
        }
        let queries: Vec<&str> = group.iter().map(|c| c.query.as_str()).collect();
        fragments.push(format!("({})", queries.join(" AND ")));
        for condition in group {
            args.extend(condition.args.iter().cloned());
        }
    }

    if fragments.is_empty() {
        return None;
    }

    Some(Condition {
        query: fragments.join(" OR "),
        args,
    })
}

/// Composes an `_and` block: a list of OR-groups joined with `AND`.
pub(crate) fn compose_and_blocks(blocks: &[Vec<Vec<Condition>>]) -> Option<Condition> {
    let mut fragments = Vec::new();
    let mut args = Vec::new();
    for block in blocks {
        let Some(or_group) = compose_or_groups(block) else {
            continue;
        };
        fragments.push(format!("({})", or_group.query));
        args.extend(or_group.args);
    }

    if fragments.is_empty() {
        return None;
    }

    Some(Condition {
        query: fragments.join(" AND "),
        args,
    })
}

pub(crate) fn flatten_scanneds(scanneds: &IndexMap<String, Vec<String>>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for scanned in scanneds.values() {
        for attribute in scanned {
            if !out.contains(attribute) {
                out.push(attribute.clone());
            }
        }
    }
    out
}

/// Decodes a database row into attribute-keyed JSON values, driving the
/// decoding off the catalog's declared column types.
pub(crate) fn decode_row(table: &Table, row: &MySqlRow) -> Result<Row, TrellisError> {
    let mut out = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let attribute = camel_case(column.name());
        let value = match table.columns.get(&attribute) {
            Some(declared) => decode_value(row, i, &declared.sql_type)?,
            None => fallback_decode(row, i),
        };
        out.insert(attribute, value);
    }
    Ok(out)
}

fn decode_value(row: &MySqlRow, i: usize, sql_type: &str) -> Result<Value, TrellisError> {
    let declared = sql_type.to_lowercase();

    let value = if declared.starts_with("tinyint(1)") {
        row.try_get::<Option<bool>, _>(i)?
            .map(Value::Bool)
            .unwrap_or(Value::Null)
    } else if declared.starts_with("tinyint")
        || declared.starts_with("smallint")
        || declared.starts_with("mediumint")
        || declared.starts_with("int")
        || declared.starts_with("bigint")
    {
        if declared.contains("unsigned") {
            row.try_get::<Option<u64>, _>(i)?
                .map(|v| json!(v))
                .unwrap_or(Value::Null)
        } else {
            row.try_get::<Option<i64>, _>(i)?
                .map(|v| json!(v))
                .unwrap_or(Value::Null)
        }
    } else if declared.starts_with("float") || declared.starts_with("double") {
        row.try_get::<Option<f64>, _>(i)?
            .map(|v| json!(v))
            .unwrap_or(Value::Null)
    } else if declared.starts_with("datetime") || declared.starts_with("timestamp") {
        row.try_get::<Option<NaiveDateTime>, _>(i)?
            .map(|v| {
                Value::String(
                    v.format(crate::request::DATETIME_CANONICAL)
                        .to_string(),
                )
            })
            .unwrap_or(Value::Null)
    } else if declared.starts_with("date") {
        row.try_get::<Option<NaiveDate>, _>(i)?
            .map(|v| Value::String(v.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null)
    } else if declared.starts_with("json") {
        row.try_get::<Option<Value>, _>(i)?.unwrap_or(Value::Null)
    } else {
        row.try_get::<Option<String>, _>(i)?
            .map(Value::String)
            .unwrap_or(Value::Null)
    };

    Ok(value)
}

/// Best-effort decoding for columns the catalog does not describe, e.g.
/// expressions added by a custom base query.
fn fallback_decode(row: &MySqlRow, i: usize) -> Value {
    if let Ok(value) = row.try_get::<Option<String>, _>(i) {
        return value.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<i64>, _>(i) {
        return value.map(|v| json!(v)).unwrap_or(Value::Null);
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(i) {
        return value.map(|v| json!(v)).unwrap_or(Value::Null);
    }
    Value::Null
}

pub(crate) fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(u) = n.as_u64() {
                query.bind(u)
            } else {
                query.bind(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

/// Reserved-argument joins: any argument map carrying `_tableName` induces an
/// aliased `LEFT JOIN` against that table, joined through `_joinTo` (default
/// `<argument>_id`) onto `_joinFrom` (default the target primary). Remaining
/// entries become equality filters on the alias, or `LIKE` when the value is
/// a `%`-anchored string.
pub fn query_join(
    schema: &Schema,
    node: &Node,
    mut query: SqlSelect,
) -> Result<SqlSelect, TrellisError> {
    for (arg_name, arg_value) in &node.args {
        let Some(arg) = arg_value.as_object() else {
            continue;
        };
        let Some(table_name) = arg.get("_tableName").and_then(Value::as_str) else {
            continue;
        };
        // The argument name becomes the join alias.
        if !arg_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            continue;
        }

        let join_to = arg
            .get("_joinTo")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{arg_name}_id"));

        let origin_table = schema.must_table(&node.type_name)?;
        let target_table = schema.must_table(table_name)?;
        let origin_column = schema.must_column(&node.type_name, &join_to)?;
        let target_key = match arg.get("_joinFrom").and_then(Value::as_str) {
            Some(from) => schema.must_column(table_name, from)?.name.clone(),
            None => schema.get_primary(table_name)?.name.clone(),
        };

        query.join(format!(
            "LEFT JOIN `{}` `{}` ON `{}`.`{}` = `{}`.`{}`",
            target_table.name, arg_name, origin_table.name, origin_column.name, arg_name, target_key
        ));

        for (key, value) in arg {
            if key.starts_with('_') {
                continue;
            }
            let Some(column) = schema.get_column(&target_table.name, key) else {
                continue;
            };
            let anchored = value
                .as_str()
                .is_some_and(|s| s.starts_with('%') || s.ends_with('%'));
            let operator = if anchored { "LIKE" } else { "=" };
            query.and_where(Condition {
                query: format!("`{}`.`{}` {} ?", arg_name, column.name, operator),
                args: vec![value.clone()],
            });
        }
    }

    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(query: &str, args: Vec<Value>) -> Condition {
        Condition {
            query: query.to_string(),
            args,
        }
    }

    #[test]
    fn render_assembles_every_clause() {
        let mut query = SqlSelect::new("user");
        query
            .select("`user`.`id`, `user`.`name`")
            .join("LEFT JOIN `role` ON `user`.`role_id` = `role`.`id`")
            .and_where(condition("`user`.`name` = ?", vec![json!("Leo")]))
            .and_where(condition("`role`.`id` IS NOT NULL", vec![]))
            .order("`user`.`name` ASC")
            .group_by("`user`.`id`");
        query.limit = Some(20);
        query.offset = Some(0);

        let (sql, args) = query.render();
        insta::assert_snapshot!(sql, @"SELECT `user`.`id`, `user`.`name` FROM `user` LEFT JOIN `role` ON `user`.`role_id` = `role`.`id` WHERE (`user`.`name` = ?) AND (`role`.`id` IS NOT NULL) GROUP BY `user`.`id` ORDER BY `user`.`name` ASC LIMIT 20 OFFSET 0");
        assert_eq!(args, vec![json!("Leo")]);
    }

    #[test]
    fn render_expands_array_arguments() {
        let mut query = SqlSelect::new("user");
        query.and_where(condition(
            "`user`.`id` IN (?)",
            vec![json!([1, 2, 3])],
        ));

        let (sql, args) = query.render();
        assert_eq!(sql, "SELECT * FROM `user` WHERE (`user`.`id` IN (?, ?, ?))");
        assert_eq!(args, vec![json!(1), json!(2), json!(3)]);

        let mut query = SqlSelect::new("user");
        query.and_where(condition("`user`.`id` IN (?)", vec![json!([])]));
        let (sql, args) = query.render();
        assert_eq!(sql, "SELECT * FROM `user` WHERE (`user`.`id` IN (NULL))");
        assert!(args.is_empty());
    }

    #[test]
    fn render_count_drops_ordering_and_paging() {
        let mut query = SqlSelect::new("user");
        query
            .and_where(condition("`user`.`name` = ?", vec![json!("Leo")]))
            .order("`user`.`name` ASC");
        query.limit = Some(20);

        let (sql, args) = query.render_count();
        assert_eq!(sql, "SELECT COUNT(*) FROM `user` WHERE (`user`.`name` = ?)");
        assert_eq!(args, vec![json!("Leo")]);

        query.group_by("`user`.`id`");
        let (sql, _) = query.render_count();
        assert_eq!(
            sql,
            "SELECT COUNT(DISTINCT `user`.`id`) FROM `user` WHERE (`user`.`name` = ?)"
        );
    }

    #[test]
    fn or_groups_compose_with_inner_and() {
        let groups = vec![
            vec![
                condition("`role`.`created_at` = ?", vec![json!("2017-6-17")]),
                condition("`role_type`.`name` != ?", vec![json!("ADMIN")]),
            ],
            vec![condition("`user`.`name` = ?", vec![json!("Leo")])],
        ];

        let composed = compose_or_groups(&groups).unwrap();
        assert_eq!(
            composed.query,
            "(`role`.`created_at` = ? AND `role_type`.`name` != ?) OR (`user`.`name` = ?)"
        );
        assert_eq!(
            composed.args,
            vec![json!("2017-6-17"), json!("ADMIN"), json!("Leo")]
        );

        assert_eq!(compose_or_groups(&[]), None);
        assert_eq!(compose_or_groups(&[vec![]]), None);
    }

    #[test]
    fn and_blocks_wrap_or_groups() {
        let blocks = vec![
            vec![
                vec![condition("`user`.`name` = ?", vec![json!("Leo")])],
                vec![condition("`user`.`name` = ?", vec![json!("Kay")])],
            ],
            vec![vec![condition("`role`.`id` > ?", vec![json!(3)])]],
        ];

        let composed = compose_and_blocks(&blocks).unwrap();
        assert_eq!(
            composed.query,
            "((`user`.`name` = ?) OR (`user`.`name` = ?)) AND ((`role`.`id` > ?))"
        );
        assert_eq!(composed.args, vec![json!("Leo"), json!("Kay"), json!(3)]);
    }

    #[test]
    fn merge_bulk_skips_rows_with_field_errors() {
        let mut list = vec![
            json!({ "_error": { "_data": [], "_count": 0 } }),
            json!({ "_error": { "_data": [{ "key": "roles", "code": 401 }], "_count": 1 } }),
        ];
        merge_bulk(&mut list, "roles", &[json!(["a"]), json!(["b"])]);

        assert_eq!(list[0]["roles"], json!(["a"]));
        assert!(list[1].get("roles").is_none());
    }

    #[test]
    fn query_join_builds_aliased_joins_from_reserved_arguments() {
        let mut user_columns = IndexMap::new();
        for raw in ["id", "company_id"] {
            user_columns.insert(
                camel_case(raw),
                crate::schema::Column {
                    name: raw.to_string(),
                    sql_type: "int(11)".to_string(),
                    key: if raw == "id" { "PRI" } else { "" }.to_string(),
                    ..Default::default()
                },
            );
        }
        let mut company_columns = IndexMap::new();
        for raw in ["id", "name"] {
            company_columns.insert(
                camel_case(raw),
                crate::schema::Column {
                    name: raw.to_string(),
                    sql_type: "varchar(255)".to_string(),
                    key: if raw == "id" { "PRI" } else { "" }.to_string(),
                    ..Default::default()
                },
            );
        }
        let mut tables = IndexMap::new();
        tables.insert(
            "User".to_string(),
            Table {
                name: "user".to_string(),
                columns: user_columns,
            },
        );
        tables.insert(
            "Company".to_string(),
            Table {
                name: "company".to_string(),
                columns: company_columns,
            },
        );
        let schema = Schema {
            tables,
            ..Default::default()
        };

        let node = Node {
            name: "user".to_string(),
            type_name: "User".to_string(),
            args: json!({
                "company": {
                    "_tableName": "company",
                    "name": "%wanted%"
                }
            })
            .as_object()
            .unwrap()
            .clone(),
            ..Default::default()
        };

        let query = query_join(&schema, &node, SqlSelect::new("user")).unwrap();
        assert_eq!(
            query.joins,
            vec!["LEFT JOIN `company` `company` ON `user`.`company_id` = `company`.`id`"]
        );
        assert_eq!(
            query.wheres,
            vec![Condition {
                query: "`company`.`name` LIKE ?".to_string(),
                args: vec![json!("%wanted%")],
            }]
        );
    }

    #[test]
    fn flatten_scanneds_deduplicates_in_order() {
        let mut scanneds = IndexMap::new();
        scanneds.insert("a".to_string(), vec!["x".to_string(), "y".to_string()]);
        scanneds.insert("b".to_string(), vec!["y".to_string(), "z".to_string()]);
        assert_eq!(flatten_scanneds(&scanneds), vec!["x", "y", "z"]);
    }
}
