//! The request data model and dispatcher.
//!
//! A request is one graph-shaped read (or reserved write) against the
//! database: an operation, an opaque user id, and a tree of nodes. The
//! setup pass flattens the wire tree into an arena and wires parent links;
//! the dispatcher selects the read or write branch and hands the root to
//! the executor.

use crate::error::TrellisError;
use crate::model::user::{AnonymousUser, CurrentUser};
use crate::naming::{camel_case, classify};
use crate::request::node::{Node, NodeId, NodeInput};
use crate::Context;
use http::HeaderMap;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub mod arguments;
pub mod executor;
pub mod node;
pub mod planner;

/// Reserved argument and envelope keys.
pub const WHERE: &str = "_where";
pub const OR: &str = "_or";
pub const AND: &str = "_and";
pub const ORDER: &str = "_order";
pub const LIMIT: &str = "_limit";
pub const OFFSET: &str = "_offset";
pub const COUNT: &str = "_count";
pub const TOTAL: &str = "_total";
pub const DATA: &str = "_data";
pub const ERROR: &str = "_error";
pub const KEY: &str = "key";
pub const FORMAT: &str = "format";

/// Scalar tag for datetime leaves, and the canonical string form their
/// values are carried in.
pub const DATETIME: &str = "DateTime";
pub const DATETIME_CANONICAL: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Query,
    /// Reserved in the data model; dispatching one answers `null`.
    Mutation,
}

/// The wire shape of a request, as posted by clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInput {
    #[serde(default)]
    pub name: String,
    pub operation: Operation,
    #[serde(default)]
    pub user_id: Value,
    pub node: NodeInput,
}

/// One in-flight request: the node arena plus the lazily resolved current
/// user. Nodes refer to each other by [`NodeId`]; only the planner mutates
/// them, on the request's own task.
pub struct Request {
    pub name: String,
    pub operation: Operation,
    pub user_id: Value,
    /// Opaque transport metadata, available to getters and providers.
    pub header: HeaderMap,
    nodes: Vec<Node>,
    root: NodeId,
    user: OnceCell<Arc<dyn CurrentUser>>,
}

impl Request {
    /// Flattens the wire tree into the arena, wiring every child's parent
    /// link. Type names are normalized to their pascal-cased form.
    pub fn set_up(input: RequestInput) -> Request {
        let mut nodes = Vec::new();
        let root = flatten(input.node, None, &mut nodes);
        Request {
            name: input.name,
            operation: input.operation,
            user_id: input.user_id,
            header: HeaderMap::new(),
            nodes,
            root,
            user: OnceCell::new(),
        }
    }

    pub fn with_header(mut self, header: HeaderMap) -> Request {
        self.header = header;
        self
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Looks up a child of the node by graph name. Reserved names (leading
    /// underscore) are matched verbatim, everything else camel-cased.
    pub fn find(&self, id: NodeId, candidate: &str) -> Option<NodeId> {
        let name = if candidate.starts_with('_') {
            candidate.to_string()
        } else {
            camel_case(candidate)
        };
        self.node(id).fields.get(&name).copied()
    }

    /// Resolves the current user once per request: an absent or empty
    /// `userId` is anonymous, anything else is looked up by primary key on
    /// the configured user model and wrapped by the registered factory. An
    /// unknown id degrades to anonymous rather than failing the request.
    pub async fn current_user(
        &self,
        ctx: &Context,
    ) -> Result<Arc<dyn CurrentUser>, TrellisError> {
        self.user
            .get_or_try_init(|| async {
                let anonymous = || Arc::new(AnonymousUser) as Arc<dyn CurrentUser>;

                let missing = self.user_id.is_null()
                    || self.user_id.as_str().is_some_and(str::is_empty);
                if missing {
                    return Ok(anonymous());
                }

                let model = ctx.registry.user_model();
                let table = ctx.schema.must_table(model)?;
                let primary = ctx.schema.get_primary(model)?;
                let sql = format!(
                    "SELECT * FROM `{}` WHERE `{}`.`{}` = ? LIMIT 1",
                    table.name, table.name, primary.name
                );
                let prepared = executor::bind_value(sqlx::query(&sql), &self.user_id);

                match prepared.fetch_optional(&ctx.pool).await? {
                    Some(row) => {
                        let row = executor::decode_row(table, &row)?;
                        Ok(ctx.registry.make_user(row, &camel_case(&primary.name)))
                    }
                    None => Ok(anonymous()),
                }
            })
            .await
            .map(Arc::clone)
    }
}

fn flatten(input: NodeInput, parent: Option<NodeId>, nodes: &mut Vec<Node>) -> NodeId {
    let id = NodeId(nodes.len());
    nodes.push(Node {
        name: input.name,
        type_name: classify(&input.type_name),
        args: input.args,
        is_leaf: input.is_leaf,
        is_list: input.is_list,
        is_plain_list: input.is_plain_list,
        parent,
        ..Default::default()
    });

    for (name, child) in input.fields {
        let child_id = flatten(child, Some(id), nodes);
        nodes[id.0].fields.insert(name, child_id);
    }

    id
}

/// Selects the read or write branch for a request. Unknown operations never
/// reach this point; they are rejected when the wire shape is deserialized.
pub async fn dispatch(ctx: &Context, request: &mut Request) -> Result<Value, TrellisError> {
    tracing::debug!(operation = %request.operation, name = %request.name, "dispatching request");

    let root = request.root();
    match request.operation {
        Operation::Query => executor::result(ctx, request, root, &[]).await,
        Operation::Mutation => Ok(Value::Null),
    }
}
