//! The current-user capability object validators evaluate against.

use crate::model::values::loose_eq;
use crate::model::Row;
use serde_json::Value;

/// Capability predicates exposed by the resolved current user.
///
/// Applications may register a `user_factory` on the registry to wrap the
/// fetched user row in their own implementation; [`RowUser`] is the default.
pub trait CurrentUser: Send + Sync {
    /// Does the user own the row carrying this id value?
    fn has_id(&self, id: &Value) -> bool;
    fn has_role(&self, role: &str) -> bool;
    fn has_prop(&self, key: &str, value: &str) -> bool;
}

/// Sentinel user for requests without a resolvable `userId`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousUser;

impl CurrentUser for AnonymousUser {
    fn has_id(&self, _id: &Value) -> bool {
        false
    }

    fn has_role(&self, role: &str) -> bool {
        role == "anonymous"
    }

    fn has_prop(&self, _key: &str, _value: &str) -> bool {
        false
    }
}

/// Default capability object backed by the fetched user row: `has_id`
/// compares against the primary key, `has_role` against a `role` attribute
/// and `has_prop` against the named attribute.
#[derive(Debug, Clone)]
pub struct RowUser {
    row: Row,
    primary: String,
}

impl RowUser {
    pub fn new(row: Row, primary_attribute: impl Into<String>) -> Self {
        RowUser {
            row,
            primary: primary_attribute.into(),
        }
    }

    pub fn row(&self) -> &Row {
        &self.row
    }
}

impl CurrentUser for RowUser {
    fn has_id(&self, id: &Value) -> bool {
        self.row
            .get(&self.primary)
            .is_some_and(|own| loose_eq(own, id))
    }

    fn has_role(&self, role: &str) -> bool {
        self.row
            .get("role")
            .is_some_and(|own| loose_eq(own, &Value::String(role.to_string())))
    }

    fn has_prop(&self, key: &str, value: &str) -> bool {
        self.row
            .get(&crate::naming::camel_case(key))
            .is_some_and(|own| loose_eq(own, &Value::String(value.to_string())))
    }
}
