// Licensed under the Apache-2.0 license

//! Property values attached to nodes and the schema of known property keys.

use crate::error::{ContextError, ContextResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Namespace of the tool-specific properties in the register description.
pub const TOOL_PROPERTY_PREFIX: &str = "desyrdl_";

pub const ACCESS_CHANNEL: &str = "desyrdl_access_channel";
pub const INTERFACE: &str = "desyrdl_interface";
pub const GENERATE_HDL: &str = "desyrdl_generate_hdl";
pub const DATA_TYPE: &str = "desyrdl_data_type";

/// Ordered property bag copied into context records.
pub type Properties = BTreeMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    U64(u64),
    I64(i64),
    String(String),
    /// Anything else (floats, lists, objects), carried through verbatim.
    Other(serde_json::Value),
}

impl Value {
    pub fn property_type(&self) -> PropertyType {
        match self {
            Value::Bool(_) => PropertyType::Boolean,
            Value::U64(_) | Value::I64(_) => PropertyType::Integer,
            Value::String(_) => PropertyType::String,
            Value::Other(_) => PropertyType::Other,
        }
    }
}

impl From<u64> for Value {
    fn from(val: u64) -> Self {
        Value::U64(val)
    }
}
impl From<bool> for Value {
    fn from(val: bool) -> Self {
        Value::Bool(val)
    }
}
impl From<String> for Value {
    fn from(val: String) -> Self {
        Value::String(val)
    }
}
impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value::String(val.into())
    }
}

fn unexpected(expected: PropertyType, value: &Value) -> ContextError {
    ContextError::Configuration(format!(
        "Unexpected property type. Expected {:?} but got {:?}",
        expected, value,
    ))
}

impl TryFrom<Value> for u64 {
    type Error = ContextError;
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::U64(value) => Ok(value),
            Value::I64(v) if v >= 0 => Ok(v as u64),
            _ => Err(unexpected(PropertyType::Integer, &value)),
        }
    }
}
impl TryFrom<Value> for bool {
    type Error = ContextError;
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(value) => Ok(value),
            _ => Err(unexpected(PropertyType::Boolean, &value)),
        }
    }
}
impl TryFrom<Value> for String {
    type Error = ContextError;
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(value) => Ok(value),
            _ => Err(unexpected(PropertyType::String, &value)),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PropertyType {
    Integer,
    Boolean,
    String,
    /// Outside the schema; never matches a declared key.
    Other,
}

/// Declared type of a known property key, `None` for keys without a schema.
pub fn known_property(name: &str) -> Option<PropertyType> {
    match name {
        ACCESS_CHANNEL => Some(PropertyType::Integer),
        INTERFACE | DATA_TYPE => Some(PropertyType::String),
        GENERATE_HDL => Some(PropertyType::Boolean),
        "we" => Some(PropertyType::Boolean),
        "desc" | "name" => Some(PropertyType::String),
        "fieldwidth" | "regwidth" | "mementries" | "memwidth" | "incrwidth" | "decrwidth"
        | "incrvalue" | "decrvalue" => Some(PropertyType::Integer),
        _ => None,
    }
}

/// Check a property bag against the schema.
///
/// Keys in the tool namespace must be declared; declared keys must carry a
/// value of the declared type. Everything else passes through untouched.
pub fn validate_properties(owner: &str, properties: &Properties) -> ContextResult<()> {
    for (name, value) in properties {
        match known_property(name) {
            Some(expected) if expected != value.property_type() => {
                return Err(ContextError::Configuration(format!(
                    "property '{name}' of '{owner}' must be {expected:?}, got {value:?}"
                )));
            }
            Some(_) => {}
            None if name.starts_with(TOOL_PROPERTY_PREFIX) => {
                return Err(ContextError::Configuration(format!(
                    "unrecognized property '{name}' on '{owner}'"
                )));
            }
            None => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(entries: &[(&str, Value)]) -> Properties {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_known_properties_pass() {
        let props = bag(&[
            (ACCESS_CHANNEL, Value::U64(0)),
            (INTERFACE, "AXI4L".into()),
            ("we", Value::Bool(true)),
            ("user_flag", Value::Bool(true)),
        ]);
        assert!(validate_properties("top", &props).is_ok());
    }

    #[test]
    fn test_wrong_type_is_fatal() {
        let props = bag(&[(ACCESS_CHANNEL, "zero".into())]);
        assert!(matches!(
            validate_properties("top", &props),
            Err(ContextError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_tool_property_is_fatal() {
        let props = bag(&[("desyrdl_bogus", Value::U64(1))]);
        let err = validate_properties("top", &props).unwrap_err();
        assert!(err.to_string().contains("desyrdl_bogus"));
    }

    #[test]
    fn test_free_form_values_pass() {
        let props: Properties =
            serde_json::from_str(r#"{"gain": 1.5, "tags": ["a", "b"], "n": -2}"#).unwrap();
        assert_eq!(props["gain"], Value::Other(serde_json::json!(1.5)));
        assert_eq!(props["tags"].property_type(), PropertyType::Other);
        assert_eq!(props["n"], Value::I64(-2));
        assert!(validate_properties("r", &props).is_ok());
        assert_eq!(
            serde_json::to_value(&props).unwrap(),
            serde_json::json!({"gain": 1.5, "tags": ["a", "b"], "n": -2})
        );
    }

    #[test]
    fn test_free_form_value_on_known_key() {
        let props: Properties = serde_json::from_str(r#"{"desyrdl_access_channel": 0.5}"#).unwrap();
        let err = validate_properties("top", &props).unwrap_err();
        assert!(matches!(err, ContextError::Configuration(_)));
        assert!(err.to_string().contains("desyrdl_access_channel"));
        assert!(err.to_string().contains("top"));
    }

    #[test]
    fn test_try_from() {
        assert_eq!(u64::try_from(Value::I64(3)).unwrap(), 3);
        assert!(u64::try_from(Value::I64(-3)).is_err());
        assert!(bool::try_from(Value::U64(1)).is_err());
        assert_eq!(String::try_from(Value::from("x")).unwrap(), "x");
    }
}
