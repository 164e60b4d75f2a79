//! Planning against the fixture catalog: argument compilation, field
//! classification, projection and idempotence.

use crate::common::{request, test_context, test_context_with};
use serde_json::json;
use trellis::authority::Authority;
use trellis::request::arguments::{Condition, Join};
use trellis::request::executor::{select_columns, Projection};
use trellis::request::planner::analyze;
use trellis::Request;

fn filtered_request() -> Request {
    request(json!({
        "operation": "query",
        "node": {
            "name": "user",
            "type": "User",
            "isList": true,
            "args": {
                "_where": {
                    "_object": true,
                    "role": {
                        "_object": true,
                        "userId": { "ne": 3, "gt": 39 },
                        "roleType": {
                            "_object": true,
                            "name": { "eq": "ADMIN" }
                        }
                    },
                    "name": { "eq": "Leo" }
                },
                "_or": [
                    {
                        "_object": true,
                        "role": {
                            "_object": true,
                            "createdAt": { "eq": "2017-6-17" },
                            "roleType": {
                                "_object": true,
                                "name": { "ne": "ADMIN" }
                            }
                        }
                    }
                ],
                "_order": {
                    "_object": true,
                    "name": { "to": "ASC" }
                }
            },
            "fields": {
                "id": { "name": "id", "type": "Int", "isLeaf": true },
                "name": { "name": "name", "type": "String", "isLeaf": true }
            }
        }
    }))
}

#[tokio::test]
async fn where_subtrees_produce_joins_and_conditions() {
    let ctx = test_context();
    let mut request = filtered_request();
    let root = request.root();

    analyze(&ctx, &mut request, root, false).unwrap();
    let node = request.node(root);

    // Joins are deduplicated across _where, _or and _order.
    assert_eq!(
        node.joins,
        vec![
            Join {
                origin: "user".to_string(),
                target: "role".to_string()
            },
            Join {
                origin: "role".to_string(),
                target: "role_type".to_string()
            },
        ]
    );

    assert!(node.wheres.contains(&Condition {
        query: "`role_type`.`name` = ?".to_string(),
        args: vec![json!("ADMIN")],
    }));
    assert!(node.wheres.contains(&Condition {
        query: "`role`.`user_id` != ? AND `role`.`user_id` > ?".to_string(),
        args: vec![json!(3), json!(39)],
    }));
    assert!(node.wheres.contains(&Condition {
        query: "`user`.`name` = ?".to_string(),
        args: vec![json!("Leo")],
    }));

    assert_eq!(node.ors.len(), 1);
    assert!(node.ors[0].contains(&Condition {
        query: "`role`.`created_at` = ?".to_string(),
        args: vec![json!("2017-6-17")],
    }));
    assert!(node.ors[0].contains(&Condition {
        query: "`role_type`.`name` != ?".to_string(),
        args: vec![json!("ADMIN")],
    }));

    assert_eq!(node.orders, vec!["`user`.`name` ASC"]);
}

#[tokio::test]
async fn planning_is_idempotent() {
    let ctx = test_context();
    let mut request = filtered_request();
    let root = request.root();

    analyze(&ctx, &mut request, root, false).unwrap();
    let first = request.node(root).clone();

    analyze(&ctx, &mut request, root, false).unwrap();
    analyze(&ctx, &mut request, root, true).unwrap();
    let second = request.node(root);

    assert_eq!(first.persists, second.persists);
    assert_eq!(first.customs, second.customs);
    assert_eq!(first.bulks, second.bulks);
    assert_eq!(first.no_exists, second.no_exists);
    assert_eq!(first.joins, second.joins);
    assert_eq!(first.wheres, second.wheres);
    assert_eq!(first.ors, second.ors);
    assert_eq!(first.orders, second.orders);
    assert!(second.analyzed);
}

#[tokio::test]
async fn fields_classify_into_disjoint_sets() {
    let mut ctx = test_context();
    ctx.registry
        .hooks_mut("User")
        .getter("fullName", |_ctx, _request, _node, _row| {
            Box::pin(async move { Ok(json!("stub")) })
        })
        .scan("fullName", &["name"])
        .bulk("roles", |_ctx, _request, _node, columns| {
            let rows = columns.values().next().map(|c| c.len()).unwrap_or(0);
            Box::pin(async move { Ok(vec![json!([]); rows]) })
        })
        .scan("roles", &["id"]);

    let mut request = request(json!({
        "operation": "query",
        "node": {
            "name": "user",
            "type": "User",
            "isList": true,
            "fields": {
                "id": { "name": "id", "type": "Int", "isLeaf": true },
                "name": { "name": "name", "type": "String", "isLeaf": true },
                "fullName": { "name": "fullName", "type": "String", "isLeaf": true },
                "roles": { "name": "roles", "type": "Role", "isPlainList": true },
                "ghost": { "name": "ghost", "type": "String", "isLeaf": true }
            }
        }
    }));
    let root = request.root();
    analyze(&ctx, &mut request, root, false).unwrap();
    let node = request.node(root);

    assert_eq!(node.persists, vec!["id", "name"]);
    assert_eq!(node.customs, vec!["fullName"]);
    assert_eq!(node.bulks, vec!["roles"]);
    assert_eq!(node.no_exists, vec!["ghost"]);
    assert_eq!(node.scanneds["fullName"], vec!["name"]);
    assert_eq!(node.scanneds["roles"], vec!["id"]);

    // Every scanned attribute joins the projection.
    let projection = select_columns(&ctx.schema, node).unwrap();
    assert_eq!(
        projection,
        Projection::Columns(vec![
            "`user`.`id`".to_string(),
            "`user`.`name`".to_string(),
        ])
    );
}

#[tokio::test]
async fn getters_without_scan_declarations_widen_the_projection() {
    let mut ctx = test_context();
    ctx.registry
        .hooks_mut("User")
        .getter("fullName", |_ctx, _request, _node, _row| {
            Box::pin(async move { Ok(json!("stub")) })
        });

    let mut request = request(json!({
        "operation": "query",
        "node": {
            "name": "user",
            "type": "User",
            "fields": {
                "fullName": { "name": "fullName", "type": "String", "isLeaf": true }
            }
        }
    }));
    let root = request.root();
    analyze(&ctx, &mut request, root, false).unwrap();

    let projection = select_columns(&ctx.schema, request.node(root)).unwrap();
    assert_eq!(projection, Projection::Star);
}

#[tokio::test]
async fn nothing_requested_means_nothing_selected() {
    let ctx = test_context();
    let mut request = request(json!({
        "operation": "query",
        "node": { "name": "user", "type": "User" }
    }));
    let root = request.root();
    analyze(&ctx, &mut request, root, false).unwrap();

    let projection = select_columns(&ctx.schema, request.node(root)).unwrap();
    assert_eq!(projection, Projection::Empty);
}

#[tokio::test]
async fn validator_columns_and_child_primaries_are_forced_into_persists() {
    let raw: serde_yaml::Value = serde_yaml::from_str(
        r#"
models:
  user: hasId(.userId)
"#,
    )
    .unwrap();
    let ctx = test_context_with(Authority::parse(&raw).unwrap());

    let mut request = request(json!({
        "operation": "query",
        "node": {
            "name": "user",
            "type": "User",
            "fields": {
                "about": { "name": "about", "type": "String", "isLeaf": true },
                "role": {
                    "name": "role",
                    "type": "Role",
                    "fields": {
                        "createdAt": { "name": "createdAt", "type": "DateTime", "isLeaf": true }
                    }
                }
            }
        }
    }));
    let root = request.root();
    analyze(&ctx, &mut request, root, false).unwrap();

    // The hasId validator forces its column even though nobody asked for it.
    let node = request.node(root);
    assert!(node.persists.contains(&"userId".to_string()));
    assert!(node.persists.contains(&"about".to_string()));

    // Non-root nodes always select their primaries.
    let role = request.find(root, "role").unwrap();
    analyze(&ctx, &mut request, role, false).unwrap();
    let role_node = request.node(role);
    assert!(role_node.persists.contains(&"id".to_string()));
    assert!(role_node.persists.contains(&"createdAt".to_string()));
}

#[tokio::test]
async fn scalar_nodes_are_skipped() {
    let ctx = test_context();
    let mut request = request(json!({
        "operation": "query",
        "node": {
            "name": "user",
            "type": "User",
            "fields": {
                "id": { "name": "id", "type": "Int", "isLeaf": true }
            }
        }
    }));
    let root = request.root();
    let id = request.find(root, "id").unwrap();

    analyze(&ctx, &mut request, id, false).unwrap();
    assert!(!request.node(id).analyzed);
}

#[tokio::test]
async fn unknown_scan_attributes_are_fatal() {
    let mut ctx = test_context();
    ctx.registry
        .hooks_mut("User")
        .getter("fullName", |_ctx, _request, _node, _row| {
            Box::pin(async move { Ok(json!("stub")) })
        })
        .scan("fullName", &["ghost"]);

    let mut request = request(json!({
        "operation": "query",
        "node": {
            "name": "user",
            "type": "User",
            "fields": {
                "fullName": { "name": "fullName", "type": "String", "isLeaf": true }
            }
        }
    }));
    let root = request.root();
    assert!(analyze(&ctx, &mut request, root, false).is_err());
}
