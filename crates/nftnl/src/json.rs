//! Shared helpers for walking JSON ruleset documents.
//!
//! Field access maps onto the parse error taxonomy: an absent mandatory
//! field is a missing node, a field of the wrong JSON type is a bad type.

use serde_json::{Map, Value};

use crate::error::ParseError;

pub(crate) type JsonObject = Map<String, Value>;

/// The value must be a JSON object.
pub(crate) fn as_object<'a>(value: &'a Value, node: &str) -> Result<&'a JsonObject, ParseError> {
    value.as_object().ok_or_else(|| ParseError::bad_type(node))
}

/// Mandatory string field.
pub(crate) fn str_field<'a>(obj: &'a JsonObject, name: &str) -> Result<&'a str, ParseError> {
    match obj.get(name) {
        None => Err(ParseError::missing(name)),
        Some(value) => value.as_str().ok_or_else(|| ParseError::bad_type(name)),
    }
}

/// Optional string field.
pub(crate) fn opt_str_field<'a>(
    obj: &'a JsonObject,
    name: &str,
) -> Result<Option<&'a str>, ParseError> {
    match obj.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| ParseError::bad_type(name)),
    }
}

/// Optional u32 field.
pub(crate) fn opt_u32_field(obj: &JsonObject, name: &str) -> Result<Option<u32>, ParseError> {
    match obj.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| ParseError::bad_type(name)),
    }
}

/// Optional i32 field.
pub(crate) fn opt_i32_field(obj: &JsonObject, name: &str) -> Result<Option<i32>, ParseError> {
    match obj.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| ParseError::bad_type(name)),
    }
}

/// Mandatory i32 field.
pub(crate) fn i32_field(obj: &JsonObject, name: &str) -> Result<i32, ParseError> {
    match obj.get(name) {
        None => Err(ParseError::missing(name)),
        Some(value) => value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| ParseError::bad_type(name)),
    }
}

/// Optional u64 field.
pub(crate) fn opt_u64_field(obj: &JsonObject, name: &str) -> Result<Option<u64>, ParseError> {
    match obj.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| ParseError::bad_type(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_and_bad_type_are_distinguished() {
        let value = json!({"name": "filter", "flags": "nope"});
        let obj = as_object(&value, "table").unwrap();

        assert_eq!(str_field(obj, "name").unwrap(), "filter");
        assert_eq!(str_field(obj, "table"), Err(ParseError::missing("table")));
        assert_eq!(
            opt_u32_field(obj, "flags"),
            Err(ParseError::bad_type("flags"))
        );
        assert_eq!(opt_u32_field(obj, "use"), Ok(None));
    }

    #[test]
    fn numeric_range_is_checked() {
        let value = json!({"prio": -2147483649i64});
        let obj = as_object(&value, "chain").unwrap();
        assert_eq!(opt_i32_field(obj, "prio"), Err(ParseError::bad_type("prio")));
    }
}
