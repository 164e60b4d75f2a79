//! The request node tree.
//!
//! A request arrives as a recursive JSON tree ([`NodeInput`]); the setup pass
//! flattens it into an arena owned by the request, wiring each child's
//! parent link. Nodes carry both the client-visible shape (name, type,
//! arguments, children) and the derived sets the planner fills in.

use crate::request::arguments::{Condition, Join};
use crate::authority::ValidatorMap;
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value};

/// Index of a node inside its request's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// The wire shape of one node of the request tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInput {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub args: JsonMap<String, Value>,
    #[serde(default)]
    pub is_leaf: bool,
    #[serde(default)]
    pub is_list: bool,
    #[serde(default)]
    pub is_plain_list: bool,
    #[serde(default)]
    pub fields: IndexMap<String, NodeInput>,
}

/// One position in the request tree, after setup.
///
/// The derived sets below are only meaningful once `analyzed` is true; the
/// planner keeps them consistent with the current arguments.
#[derive(Debug, Clone, Default)]
pub struct Node {
    /// Graph name, camelCase.
    pub name: String,
    /// Pascal-cased type name matching a schema entry, or a scalar tag such
    /// as `DateTime`, `Int`, `String`.
    pub type_name: String,
    pub args: JsonMap<String, Value>,
    pub is_leaf: bool,
    /// Returns an envelope carrying `_data` plus paging fields.
    pub is_list: bool,
    /// Returns a bare array.
    pub is_plain_list: bool,
    /// Graph name to child node.
    pub fields: IndexMap<String, NodeId>,
    /// Wired by the setup pass; only the root is without a parent.
    pub parent: Option<NodeId>,

    /// Children backed by persisted columns.
    pub persists: Vec<String>,
    /// Children served by per-row getters.
    pub customs: Vec<String>,
    /// Children served by batch providers.
    pub bulks: Vec<String>,
    /// Children nothing can serve.
    pub no_exists: Vec<String>,
    /// Extra persisted attributes declared by getters and batch providers.
    pub scanneds: IndexMap<String, Vec<String>>,
    pub joins: Vec<Join>,
    pub wheres: Vec<Condition>,
    pub ors: Vec<Vec<Condition>>,
    pub ands: Vec<Vec<Vec<Condition>>>,
    pub orders: Vec<String>,
    pub validator_map: ValidatorMap,
    pub analyzed: bool,
}

impl Node {
    pub fn is_listish(&self) -> bool {
        self.is_list || self.is_plain_list
    }

    /// Node-level post-processing of a fetched value. `DateTime` leaves with
    /// a `format` argument are reformatted; everything else passes through.
    pub fn parse(&self, value: Value) -> Value {
        if self.type_name == crate::request::DATETIME {
            if let (Some(format), Value::String(raw)) =
                (self.args.get(crate::request::FORMAT).and_then(Value::as_str), &value)
            {
                if let Some(formatted) = reformat_datetime(raw, format) {
                    return Value::String(formatted);
                }
            }
        }

        value
    }

    /// The shape-correct empty payload for this node.
    pub fn empty(&self) -> Value {
        if self.is_list {
            serde_json::json!({ (crate::request::DATA): [] })
        } else if self.is_plain_list {
            Value::Array(Vec::new())
        } else {
            Value::Null
        }
    }
}

/// Reformats a canonical datetime (or date) string with a strftime format.
/// Returns `None` when the value does not parse, leaving it untouched.
fn reformat_datetime(raw: &str, format: &str) -> Option<String> {
    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, crate::request::DATETIME_CANONICAL) {
        return Some(datetime.format(format).to_string());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(datetime.format(format).to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.format(format).to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn datetime_leaves_reformat_with_the_format_argument() {
        let mut args = JsonMap::new();
        args.insert("format".to_string(), json!("%Y/%m/%d"));
        let node = Node {
            name: "createdAt".to_string(),
            type_name: "DateTime".to_string(),
            args,
            ..Default::default()
        };

        assert_eq!(
            node.parse(json!("2017-06-17T10:20:30")),
            json!("2017/06/17")
        );
        assert_eq!(node.parse(json!("2017-06-17 10:20:30")), json!("2017/06/17"));
        // Unparseable values pass through untouched.
        assert_eq!(node.parse(json!("not a date")), json!("not a date"));
        assert_eq!(node.parse(Value::Null), Value::Null);
    }

    #[test]
    fn non_datetime_values_pass_through() {
        let node = Node {
            name: "name".to_string(),
            type_name: "String".to_string(),
            ..Default::default()
        };
        assert_eq!(node.parse(json!("Leo")), json!("Leo"));
    }

    #[test]
    fn empty_payload_matches_the_node_shape() {
        let list = Node {
            is_list: true,
            ..Default::default()
        };
        assert_eq!(list.empty(), json!({ "_data": [] }));

        let plain = Node {
            is_plain_list: true,
            ..Default::default()
        };
        assert_eq!(plain.empty(), json!([]));

        let single = Node::default();
        assert_eq!(single.empty(), Value::Null);
    }
}
