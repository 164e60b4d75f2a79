//! The validator shorthand grammar and its evaluation.
//!
//! Validators are written in the authority document as short capability
//! expressions:
//!
//! ```yaml
//! fields:
//!   password:
//!     - hasId(.userId)
//!     - hasRole("admin", "developer")
//!   locale: hasProp("lang", "ko")
//! ```
//!
//! An empty expression allows unconditionally. Parsing is strict: `hasId`
//! without a `.field`, `hasRole` without at least one quoted value, and any
//! unknown expression are all rejected at load time.

use crate::error::TrellisError;
use crate::model::user::CurrentUser;
use crate::model::Row;
use crate::naming::camel_case;
use crate::request::node::Node;
use nom::branch::alt;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, multispace0};
use nom::combinator::{all_consuming, opt};
use nom::multi::separated_list1;
use nom::sequence::{delimited, preceded, tuple};
use nom::IResult;
use serde_json::Value;

/// A declarative capability predicate bound to a field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Validator {
    /// Unconditional allow; the parse of an empty expression.
    #[default]
    All,
    /// The current user must own the row via the named column.
    HasId { field: String },
    /// The current user must hold any of the listed roles.
    HasRole { values: Vec<String> },
    /// The current user must carry the property.
    HasProp { key: String, value: String },
}

/// A single validator rejection; carried in-band in the row's `_error`
/// envelope, never raised as a request error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: u16,
    pub message: String,
}

impl Validator {
    /// The column the validator forces into the projection, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Validator::HasId { field } => Some(field),
            _ => None,
        }
    }

    /// Evaluates the validator for one field of one row. `node` is the
    /// requested child node naming the field; its column value is read from
    /// the row and handed to the user's capability predicates.
    pub fn exec(&self, node: &Node, row: &Row, user: &dyn CurrentUser) -> Option<Rejection> {
        let allowed = match self {
            Validator::All => true,
            Validator::HasId { .. } => {
                let value = row.get(&camel_case(&node.name)).cloned().unwrap_or(Value::Null);
                user.has_id(&value)
            }
            Validator::HasRole { values } => values.iter().any(|role| user.has_role(role)),
            Validator::HasProp { key, value } => user.has_prop(key, value),
        };

        if allowed {
            None
        } else {
            Some(Rejection {
                code: 401,
                message: format!("No permission to read `{}`.", node.name),
            })
        }
    }
}

/// Parses a shorthand validator expression.
pub fn parse_validator(raw: &str) -> Result<Validator, TrellisError> {
    if raw.trim().is_empty() {
        return Ok(Validator::All);
    }

    let invalid = || TrellisError::InvalidValidator {
        expression: raw.to_string(),
    };

    let (_, (expression, param)) =
        all_consuming(validator)(raw).map_err(|_: nom::Err<nom::error::Error<&str>>| invalid())?;

    match (camel_case(expression).as_str(), param) {
        ("hasId", Some(Param::Field(field))) => Ok(Validator::HasId {
            field: field.to_string(),
        }),
        ("hasRole", Some(Param::Values(values))) if !values.is_empty() => Ok(Validator::HasRole {
            values: values.iter().map(|v| v.to_string()).collect(),
        }),
        ("hasProp", Some(Param::Values(values))) if values.len() == 2 => Ok(Validator::HasProp {
            key: values[0].to_string(),
            value: values[1].to_string(),
        }),
        _ => Err(invalid()),
    }
}

enum Param<'a> {
    Field(&'a str),
    Values(Vec<&'a str>),
}

fn validator(input: &str) -> IResult<&str, (&str, Option<Param<'_>>)> {
    let (input, _) = multispace0(input)?;
    let (input, expression) = ident(input)?;
    let (input, param) = opt(delimited(
        tuple((multispace0, char('('), multispace0)),
        param,
        tuple((multispace0, char(')'), multispace0)),
    ))(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, (expression, param)))
}

fn param(input: &str) -> IResult<&str, Param<'_>> {
    alt((field_param, values_param))(input)
}

fn field_param(input: &str) -> IResult<&str, Param<'_>> {
    let (input, field) = preceded(char('.'), ident)(input)?;
    Ok((input, Param::Field(field)))
}

fn values_param(input: &str) -> IResult<&str, Param<'_>> {
    let (input, values) = separated_list1(
        tuple((multispace0, char(','), multispace0)),
        delimited(char('"'), ident, char('"')),
    )(input)?;
    Ok((input, Param::Values(values)))
}

fn ident(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphabetic())(input)
}
