//! The argument compiler.
//!
//! `_where`, `_or`, `_and` and `_order` are structurally recursive maps: a
//! map carrying the sentinel key `_object: true` descends into a child table
//! (inducing a join), any other key names either a column with operator
//! conditions or an order clause. Compilation translates those subtrees into
//! parameterized SQL fragments plus the joins they imply.
//!
//! Column and table names that the schema does not know are silently
//! dropped, so generated queries targeting an older schema degrade instead
//! of failing.

use crate::schema::Schema;
use itertools::Itertools;
use serde_json::Value;

/// A directed join induced by descending through an `_object` subtree.
/// Origin and target are raw SQL table names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub origin: String,
    pub target: String,
}

/// One parameterized SQL fragment with its bound arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub query: String,
    pub args: Vec<Value>,
}

const OBJECT: &str = "_object";
const ORDER_TO: &str = "to";

const EQUAL: &str = "eq";
const NOT_EQUAL: &str = "ne";
const IN: &str = "in";
const NOT_IN: &str = "notIn";
const NIL: &str = "nil";
const LESS_THAN: &str = "lt";
const LESS_THAN_EQUAL: &str = "lte";
const GREAT_THAN: &str = "gt";
const GREAT_THAN_EQUAL: &str = "gte";
const LIKE: &str = "like";
const INSENSITIVE_LIKE: &str = "ilike";

/// Compiles a `_where`-shaped subtree rooted at `type_name` into conditions
/// (combined with `AND` by the executor) and induced joins.
pub fn compile_filter(schema: &Schema, type_name: &str, raw: &Value) -> (Vec<Condition>, Vec<Join>) {
    let mut conditions = Vec::new();
    let mut joins = Vec::new();
    walk_filter(schema, type_name, raw, &mut conditions, &mut joins);
    (conditions, joins)
}

fn walk_filter(
    schema: &Schema,
    parent: &str,
    raw: &Value,
    conditions: &mut Vec<Condition>,
    joins: &mut Vec<Join>,
) {
    let Some(entries) = raw.as_object() else {
        tracing::warn!(%parent, "ignoring non-map filter argument");
        return;
    };
    let Some(table) = schema.get_table(parent) else {
        return;
    };

    for (name, source) in entries {
        if name == OBJECT {
            continue;
        }

        if is_object(source) {
            let Some(child) = schema.get_table(name) else {
                continue;
            };
            joins.push(Join {
                origin: table.name.clone(),
                target: child.name.clone(),
            });
            walk_filter(schema, name, source, conditions, joins);
            continue;
        }

        let Some(column) = schema.get_column(&table.name, name) else {
            continue;
        };
        let Some(operators) = source.as_object() else {
            continue;
        };

        let mut queries = Vec::new();
        let mut args = Vec::new();
        for (operator, value) in operators {
            let qualified = format!("`{}`.`{}`", table.name, column.name);
            let fragment = match operator.as_str() {
                EQUAL => format!("{qualified} = ?"),
                NOT_EQUAL => format!("{qualified} != ?"),
                IN => format!("{qualified} IN (?)"),
                NOT_IN => format!("{qualified} NOT IN (?)"),
                NIL => {
                    if value.as_bool().unwrap_or(false) {
                        queries.push(format!("{qualified} IS NULL"));
                    } else {
                        queries.push(format!("{qualified} IS NOT NULL"));
                    }
                    continue;
                }
                LESS_THAN => format!("{qualified} < ?"),
                LESS_THAN_EQUAL => format!("{qualified} <= ?"),
                GREAT_THAN => format!("{qualified} > ?"),
                GREAT_THAN_EQUAL => format!("{qualified} >= ?"),
                LIKE => format!("{qualified} LIKE ?"),
                INSENSITIVE_LIKE => format!("{qualified} ILIKE ?"),
                other => {
                    tracing::warn!(operator = %other, column = %column.name, "ignoring unknown operator");
                    continue;
                }
            };
            queries.push(fragment);
            args.push(value.clone());
        }

        if !queries.is_empty() {
            conditions.push(Condition {
                query: queries.join(" AND "),
                args,
            });
        }
    }
}

/// Compiles an `_order` subtree into ``` `table`.`column` ASC|DESC ```
/// clauses and induced joins. Clauses are emitted lexicographically by field
/// name at each nesting level so the generated SQL is stable.
pub fn compile_orders(schema: &Schema, type_name: &str, raw: &Value) -> (Vec<String>, Vec<Join>) {
    let mut orders = Vec::new();
    let mut joins = Vec::new();
    walk_orders(schema, type_name, raw, &mut orders, &mut joins);
    (orders, joins)
}

fn walk_orders(
    schema: &Schema,
    parent: &str,
    raw: &Value,
    orders: &mut Vec<String>,
    joins: &mut Vec<Join>,
) {
    let Some(entries) = raw.as_object() else {
        tracing::warn!(%parent, "ignoring non-map order argument");
        return;
    };
    let Some(table) = schema.get_table(parent) else {
        return;
    };

    for (name, source) in entries
        .iter()
        .sorted_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()))
    {
        if name == OBJECT {
            continue;
        }

        if is_object(source) {
            let Some(child) = schema.get_table(name) else {
                continue;
            };
            joins.push(Join {
                origin: table.name.clone(),
                target: child.name.clone(),
            });
            walk_orders(schema, name, source, orders, joins);
            continue;
        }

        let Some(column) = schema.get_column(&table.name, name) else {
            continue;
        };
        let Some(direction) = source
            .as_object()
            .and_then(|source| source.get(ORDER_TO))
            .and_then(Value::as_str)
        else {
            continue;
        };
        // Direction strings end up in the SQL text; anything but ASC/DESC is
        // dropped.
        let direction = direction.to_uppercase();
        if direction != "ASC" && direction != "DESC" {
            tracing::warn!(%direction, column = %column.name, "ignoring unknown order direction");
            continue;
        }

        orders.push(format!("`{}`.`{}` {}", table.name, column.name, direction));
    }
}

/// Appends joins, deduplicating by (origin, target) equality.
pub fn append_joins(existing: &mut Vec<Join>, candidates: Vec<Join>) {
    for candidate in candidates {
        if !existing.contains(&candidate) {
            existing.push(candidate);
        }
    }
}

fn is_object(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|map| map.get(OBJECT))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
