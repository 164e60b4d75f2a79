//! The request planner.
//!
//! Planning classifies every requested field of a node as persisted,
//! computed-per-row, batch-computed or nonexistent, compiles the filter and
//! order arguments into SQL fragments, fixes the column projection, records
//! the joins the arguments imply, and binds the authorization validators the
//! executor will evaluate per row.
//!
//! Planning is idempotent: a node already analyzed is left untouched unless
//! `force` is set, and re-planning replaces the derived sets wholesale.

use crate::error::TrellisError;
use crate::naming::camel_case;
use crate::request::arguments::{append_joins, compile_filter, compile_orders, Condition, Join};
use crate::request::node::NodeId;
use crate::request::{Request, AND, OR, ORDER, WHERE};
use crate::Context;
use indexmap::IndexMap;

/// Analyzes one node. Nodes whose type has no registered model (scalars,
/// unknown types) are skipped.
pub fn analyze(
    ctx: &Context,
    request: &mut Request,
    id: NodeId,
    force: bool,
) -> Result<(), TrellisError> {
    let Some(hooks) = ctx.registry.get(&request.node(id).type_name) else {
        return Ok(());
    };
    if request.node(id).analyzed && !force {
        return Ok(());
    }

    let (validator_map, forced) = ctx.authority.analyze(request, id)?;

    let node = request.node(id);
    let type_name = node.type_name.clone();
    let args = node.args.clone();
    let parent = node.parent;
    let children: Vec<String> = node.fields.keys().cloned().collect();
    let schema = &ctx.schema;

    let mut wheres: Vec<Condition> = Vec::new();
    let mut ors: Vec<Vec<Condition>> = Vec::new();
    let mut ands: Vec<Vec<Vec<Condition>>> = Vec::new();
    let mut orders: Vec<String> = Vec::new();
    let mut joins: Vec<Join> = Vec::new();

    if let Some(raw) = args.get(WHERE) {
        let (conditions, induced) = compile_filter(schema, &type_name, raw);
        wheres = conditions;
        append_joins(&mut joins, induced);
    }

    if let Some(raw) = args.get(ORDER) {
        let (compiled, induced) = compile_orders(schema, &type_name, raw);
        orders = compiled;
        append_joins(&mut joins, induced);
    }

    if let Some(groups) = args.get(OR).and_then(|raw| raw.as_array()) {
        for group in groups {
            let (conditions, induced) = compile_filter(schema, &type_name, group);
            ors.push(conditions);
            append_joins(&mut joins, induced);
        }
    }

    if let Some(blocks) = args.get(AND).and_then(|raw| raw.as_array()) {
        for block in blocks {
            let Some(groups) = block.as_array() else {
                continue;
            };
            let mut or_groups = Vec::new();
            for group in groups {
                let (conditions, induced) = compile_filter(schema, &type_name, group);
                or_groups.push(conditions);
                append_joins(&mut joins, induced);
            }
            ands.push(or_groups);
        }
    }

    // Field classification: getters and batch providers are consulted by
    // graph name; scan declarations must resolve to persisted attributes.
    let mut customs: Vec<String> = Vec::new();
    let mut bulks: Vec<String> = Vec::new();
    let mut no_exists: Vec<String> = Vec::new();
    let mut scanneds: IndexMap<String, Vec<String>> = IndexMap::new();

    for name in &children {
        if hooks.getters.contains_key(name) {
            customs.push(name.clone());
        }
        if hooks.bulks.contains_key(name) {
            bulks.push(name.clone());
        }
        if let Some(scanned) = hooks.scans.get(name) {
            for attribute in scanned {
                schema.must_column(&type_name, attribute)?;
            }
            scanneds.insert(name.clone(), scanned.clone());
        }
    }

    // Columns referenced by validators are always selected.
    let mut persists: Vec<String> = Vec::new();
    for field in &forced {
        let attribute = camel_case(field);
        if !persists.contains(&attribute) {
            persists.push(attribute);
        }
    }

    // Non-root rows always select their primaries, so identity survives
    // joins and later lookups.
    if parent.is_some() {
        if let Ok(primaries) = schema.get_primaries(&type_name) {
            for primary in primaries {
                let attribute = camel_case(&primary.name);
                if !persists.contains(&attribute) {
                    persists.push(attribute);
                }
            }
        }
    }

    for name in &children {
        let column = schema.get_column(&type_name, name);
        if column.is_some() && !customs.contains(name) {
            if !persists.contains(name) {
                persists.push(name.clone());
            }
        } else if column.is_none() && !customs.contains(name) && !bulks.contains(name) {
            no_exists.push(name.clone());
        }
    }

    let node = request.node_mut(id);
    node.validator_map = validator_map;
    node.wheres = wheres;
    node.ors = ors;
    node.ands = ands;
    node.orders = orders;
    node.joins = joins;
    node.persists = persists;
    node.customs = customs;
    node.bulks = bulks;
    node.no_exists = no_exists;
    node.scanneds = scanneds;
    node.analyzed = true;

    Ok(())
}
