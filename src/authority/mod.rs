//! The field-level authorization policy loaded from `authority.yaml`.
//!
//! The document is a recursive YAML tree: wherever a node may carry a
//! permission, a bare string is accepted as a shorthand validator applying to
//! both read and write. Missing pieces inherit from the enclosing defaults,
//! so the policy degrades gracefully down to "everything allowed" when no
//! file exists.
//!
//! ```yaml
//! default: hasRole("admin")
//! models:
//!   user:
//!     read:
//!       default: hasRole("user")
//!       fields:
//!         about: hasRole("headhunter")
//!         password:
//!           - hasId(.id)
//!           - hasRole("admin")
//!   article: hasRole("user")
//! ```

use crate::error::TrellisError;
use crate::naming::{camel_case, classify};
use crate::request::node::NodeId;
use crate::request::{Operation, Request};
use indexmap::IndexMap;
use serde_yaml::Value;
use std::fs;
use std::path::Path;

pub mod validator;

pub use validator::{parse_validator, Rejection, Validator};

pub const AUTHORITY_FILENAME: &str = "authority.yaml";

/// Validator lists selected for each child of a node, keyed by graph name.
pub type ValidatorMap = IndexMap<String, Vec<Validator>>;

#[derive(Debug, Clone, Default)]
pub struct Authority {
    pub default: DefaultAuthority,
    /// Pascal-cased type name to model policy.
    pub models: IndexMap<String, AuthorityModel>,
}

#[derive(Debug, Clone, Default)]
pub struct DefaultAuthority {
    pub read: Validator,
    pub write: Validator,
}

#[derive(Debug, Clone, Default)]
pub struct AuthorityModel {
    pub read: Permission,
    pub write: Permission,
}

#[derive(Debug, Clone, Default)]
pub struct Permission {
    pub default: Validator,
    /// Camel-cased field name to ordered validator list.
    pub fields: IndexMap<String, Vec<Validator>>,
}

impl Authority {
    /// Reads `authority.yaml` from the project root. A missing file yields
    /// the permissive default policy; a malformed file is fatal.
    pub fn load(project_dir: &Path) -> Result<Authority, TrellisError> {
        let path = project_dir.join(AUTHORITY_FILENAME);
        match fs::read_to_string(&path) {
            Ok(body) => {
                let raw: Value = serde_yaml::from_str(&body)?;
                Authority::parse(&raw)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Authority::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Parses the generic YAML tree into the policy.
    pub fn parse(raw: &Value) -> Result<Authority, TrellisError> {
        let mut authority = Authority::default();

        if raw.is_null() {
            return Ok(authority);
        }

        let Some(mapping) = raw.as_mapping() else {
            return Err(TrellisError::InvalidAuthority {
                message: "the document root must be a mapping".to_string(),
            });
        };

        if let Some(defaults) = mapping.get(&key("default")) {
            authority.default = parse_defaults(defaults)?;
        }

        if let Some(models) = mapping.get(&key("models")) {
            let Some(models) = models.as_mapping() else {
                return Err(TrellisError::InvalidAuthority {
                    message: "`models` must be a mapping".to_string(),
                });
            };
            for (name, model) in models {
                let Some(name) = name.as_str() else {
                    return Err(TrellisError::InvalidAuthority {
                        message: "model names must be strings".to_string(),
                    });
                };
                authority
                    .models
                    .insert(classify(name), parse_model(model, &authority.default)?);
            }
        }

        Ok(authority)
    }

    /// Selects the validators for each child of the node, dispatching on the
    /// request operation. Also returns the columns those validators
    /// reference, which the planner forces into the projection.
    pub fn analyze(
        &self,
        request: &Request,
        id: NodeId,
    ) -> Result<(ValidatorMap, Vec<String>), TrellisError> {
        match request.operation {
            Operation::Query => Ok(self.analyze_read(request, id)),
            Operation::Mutation => Ok(self.analyze_write(request, id)),
        }
    }

    /// Read-side validator selection. For each child, in order: an explicit
    /// field entry on the node's model; the model's read default (unless the
    /// child is itself a modeled type, which will validate itself); the
    /// parent's model by the same rules; the global read default.
    pub fn analyze_read(&self, request: &Request, id: NodeId) -> (ValidatorMap, Vec<String>) {
        let node = request.node(id);

        let model = self.models.get(&node.type_name).or_else(|| {
            node.parent
                .and_then(|parent| self.models.get(&request.node(parent).type_name))
        });

        let mut validator_map = ValidatorMap::new();
        for (name, child_id) in &node.fields {
            let child = request.node(*child_id);
            let mut validators = Vec::new();

            match model {
                None => validators.push(self.default.read.clone()),
                Some(model) => {
                    if let Some(bound) = model.read.fields.get(name) {
                        validators.extend(bound.iter().cloned());
                    } else if !self.models.contains_key(&child.type_name) {
                        validators.push(model.read.default.clone());
                    }
                }
            }

            validator_map.insert(name.clone(), validators);
        }

        let mut fields: Vec<String> = Vec::new();
        for validators in validator_map.values() {
            for validator in validators {
                if let Some(field) = validator.field() {
                    if !fields.iter().any(|f| f == field) {
                        fields.push(field.to_string());
                    }
                }
            }
        }

        (validator_map, fields)
    }

    /// Write-side selection. Mutations are reserved; nothing is selected.
    pub fn analyze_write(&self, _request: &Request, _id: NodeId) -> (ValidatorMap, Vec<String>) {
        (ValidatorMap::new(), Vec::new())
    }
}

fn key(name: &str) -> Value {
    Value::String(name.to_string())
}

fn parse_defaults(raw: &Value) -> Result<DefaultAuthority, TrellisError> {
    let mut defaults = DefaultAuthority::default();

    if let Some(shorthand) = raw.as_str() {
        defaults.read = parse_validator(shorthand)?;
        defaults.write = parse_validator(shorthand)?;
        return Ok(defaults);
    }

    if let Some(mapping) = raw.as_mapping() {
        if let Some(read) = mapping.get(&key("read")).and_then(Value::as_str) {
            defaults.read = parse_validator(read)?;
        }
        if let Some(write) = mapping.get(&key("write")).and_then(Value::as_str) {
            defaults.write = parse_validator(write)?;
        }
        return Ok(defaults);
    }

    Err(TrellisError::InvalidAuthority {
        message: "`default` must be a string or a mapping".to_string(),
    })
}

fn parse_model(raw: &Value, defaults: &DefaultAuthority) -> Result<AuthorityModel, TrellisError> {
    let mut model = AuthorityModel {
        read: Permission {
            default: defaults.read.clone(),
            fields: IndexMap::new(),
        },
        write: Permission {
            default: defaults.write.clone(),
            fields: IndexMap::new(),
        },
    };

    if raw.as_str().is_some() {
        model.read = parse_permission(raw, &defaults.read)?;
        model.write = parse_permission(raw, &defaults.write)?;
    } else if let Some(mapping) = raw.as_mapping() {
        if let Some(read) = mapping.get(&key("read")) {
            model.read = parse_permission(read, &defaults.read)?;
        }
        if let Some(write) = mapping.get(&key("write")) {
            model.write = parse_permission(write, &defaults.write)?;
        }
    }

    Ok(model)
}

fn parse_permission(raw: &Value, default: &Validator) -> Result<Permission, TrellisError> {
    let mut permission = Permission {
        default: default.clone(),
        fields: IndexMap::new(),
    };

    if let Some(shorthand) = raw.as_str() {
        permission.default = parse_validator(shorthand)?;
        return Ok(permission);
    }

    let Some(mapping) = raw.as_mapping() else {
        return Ok(permission);
    };

    if let Some(shorthand) = mapping.get(&key("default")).and_then(Value::as_str) {
        permission.default = parse_validator(shorthand)?;
    }

    if let Some(fields) = mapping.get(&key("fields")) {
        let Some(fields) = fields.as_mapping() else {
            return Err(TrellisError::InvalidAuthority {
                message: "`fields` must be a mapping".to_string(),
            });
        };
        for (name, bound) in fields {
            let Some(name) = name.as_str() else {
                return Err(TrellisError::InvalidAuthority {
                    message: "field names must be strings".to_string(),
                });
            };
            let validators = match bound {
                Value::String(shorthand) => vec![parse_validator(shorthand)?],
                Value::Sequence(items) => items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .ok_or_else(|| TrellisError::InvalidAuthority {
                                message: format!(
                                    "`{name}` can only be entered in string and array"
                                ),
                            })
                            .and_then(parse_validator)
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                _ => {
                    return Err(TrellisError::InvalidAuthority {
                        message: format!("`{name}` can only be entered in string and array"),
                    })
                }
            };
            permission.fields.insert(camel_case(name), validators);
        }
    }

    Ok(permission)
}
