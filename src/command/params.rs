// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command parameter extraction.
//!
//! Parameters are coerced with the same rules as state values, so `"on"`
//! is a boolean and `"42"` a number. A `null` parameter counts as absent.

use serde_json::{Map, Value};

use crate::error::CommandError;
use crate::value::{Normalize, Primitive, coerce};

type Params = Map<String, Value>;

/// Returns a parameter, treating `null` as absent.
pub(crate) fn raw<'p>(params: &'p Params, name: &str) -> Option<&'p Value> {
    params.get(name).filter(|v| !v.is_null())
}

pub(crate) fn required<'p>(params: &'p Params, name: &str) -> Result<&'p Value, CommandError> {
    raw(params, name).ok_or_else(|| CommandError::MissingCommandParameter(name.to_string()))
}

/// Returns the first present parameter among `names`.
pub(crate) fn first_of<'p, 'n>(
    params: &'p Params,
    names: &[&'n str],
) -> Result<(&'n str, &'p Value), CommandError> {
    names
        .iter()
        .find_map(|name| raw(params, name).map(|v| (*name, v)))
        .ok_or_else(|| CommandError::MissingCommandParameter(names.join("|")))
}

fn convert(name: &str, raw: &Value, primitive: Primitive) -> Result<Value, CommandError> {
    coerce(name, raw, primitive, Normalize::TRIM, None)
        .ok_or_else(|| CommandError::invalid(name, format!("expected {primitive}")))
}

pub(crate) fn to_bool(name: &str, raw: &Value) -> Result<bool, CommandError> {
    convert(name, raw, Primitive::Boolean)?
        .as_bool()
        .ok_or_else(|| CommandError::invalid(name, "expected boolean"))
}

pub(crate) fn to_number(name: &str, raw: &Value) -> Result<f64, CommandError> {
    convert(name, raw, Primitive::Float)?
        .as_f64()
        .ok_or_else(|| CommandError::invalid(name, "expected number"))
}

pub(crate) fn to_integer(name: &str, raw: &Value) -> Result<i64, CommandError> {
    convert(name, raw, Primitive::Integer)?
        .as_i64()
        .ok_or_else(|| CommandError::invalid(name, "expected integer"))
}

pub(crate) fn to_text(name: &str, raw: &Value) -> Result<String, CommandError> {
    match convert(name, raw, Primitive::String)? {
        Value::String(s) if !s.is_empty() => Ok(s),
        _ => Err(CommandError::invalid(name, "expected non-empty string")),
    }
}

pub(crate) fn boolean(params: &Params, name: &str) -> Result<bool, CommandError> {
    to_bool(name, required(params, name)?)
}

pub(crate) fn opt_boolean(params: &Params, name: &str) -> Result<Option<bool>, CommandError> {
    raw(params, name).map(|v| to_bool(name, v)).transpose()
}

pub(crate) fn number(params: &Params, name: &str) -> Result<f64, CommandError> {
    to_number(name, required(params, name)?)
}

pub(crate) fn integer(params: &Params, name: &str) -> Result<i64, CommandError> {
    to_integer(name, required(params, name)?)
}

pub(crate) fn text(params: &Params, name: &str) -> Result<String, CommandError> {
    to_text(name, required(params, name)?)
}

pub(crate) fn opt_text(params: &Params, name: &str) -> Result<Option<String>, CommandError> {
    raw(params, name).map(|v| to_text(name, v)).transpose()
}

pub(crate) fn object<'p>(params: &'p Params, name: &str) -> Result<&'p Params, CommandError> {
    required(params, name)?
        .as_object()
        .ok_or_else(|| CommandError::invalid(name, "expected object"))
}

/// Checks `v` against `min..=max`.
pub(crate) fn in_range(key: &str, v: f64, min: f64, max: f64) -> Result<f64, CommandError> {
    if v >= min && v <= max {
        Ok(v)
    } else {
        Err(CommandError::OutOfRange {
            key: key.to_string(),
            value: v,
            min,
            max,
        })
    }
}

/// Finds `wanted` among `names`, ignoring case and surrounding whitespace.
/// Returns the configured spelling.
pub(crate) fn find_name<'c>(names: impl IntoIterator<Item = &'c str>, wanted: &str) -> Option<&'c str> {
    let wanted = wanted.trim();
    names.into_iter().find(|n| n.trim().eq_ignore_ascii_case(wanted))
}

/// Rounds to the nearest integer state value.
// Values are range-checked or clamped before this, far inside i64.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn whole(v: f64) -> Value {
    Value::from(v.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(value: Value) -> Params {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn null_is_missing() {
        let params = p(json!({"on": null}));
        assert_eq!(
            boolean(&params, "on"),
            Err(CommandError::MissingCommandParameter("on".to_string()))
        );
        assert_eq!(opt_boolean(&params, "on"), Ok(None));
    }

    #[test]
    fn loose_types_are_coerced() {
        let params = p(json!({"on": "ON", "level": "42", "name": " hdmi "}));
        assert_eq!(boolean(&params, "on"), Ok(true));
        assert_eq!(integer(&params, "level"), Ok(42));
        assert_eq!(text(&params, "name"), Ok("hdmi".to_string()));
    }

    #[test]
    fn wrong_types_are_invalid() {
        let params = p(json!({"on": "maybe", "name": "  "}));
        assert!(matches!(boolean(&params, "on"), Err(CommandError::InvalidParameter { .. })));
        assert!(matches!(text(&params, "name"), Err(CommandError::InvalidParameter { .. })));
    }

    #[test]
    fn first_of_reports_all_names() {
        let params = p(json!({"b": 2}));
        assert_eq!(first_of(&params, &["a", "b"]).unwrap().0, "b");
        assert_eq!(
            first_of(&params, &["x", "y"]),
            Err(CommandError::MissingCommandParameter("x|y".to_string()))
        );
    }

    #[test]
    fn range_and_names() {
        assert_eq!(in_range("brightness", 50.0, 0.0, 100.0), Ok(50.0));
        assert!(matches!(
            in_range("brightness", 150.0, 0.0, 100.0),
            Err(CommandError::OutOfRange { .. })
        ));
        assert_eq!(find_name(["Heat", "Cool"], " cool"), Some("Cool"));
        assert_eq!(find_name(["Heat"], "broil"), None);
        assert_eq!(whole(54.6), json!(55));
    }
}
