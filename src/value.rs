// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Primitive value coercion.
//!
//! Inputs arrive as loosely typed JSON: booleans spelled as `"on"`, numbers
//! sent as strings, names with stray whitespace. [`coerce`] normalizes a raw
//! value to one [`Primitive`] type or reports it as absent. It never fails
//! loudly; the reconciler decides whether absence is an error or a deletion.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use traitstate_lib::value::{coerce, Normalize, Primitive};
//!
//! let on = coerce("on", &json!("ON"), Primitive::Boolean, Normalize::NONE, None);
//! assert_eq!(on, Some(json!(true)));
//!
//! let level = coerce("brightness", &json!(" 42 "), Primitive::Integer, Normalize::NONE, None);
//! assert_eq!(level, Some(json!(42)));
//!
//! let bad = coerce("brightness", &json!("bright"), Primitive::Integer, Normalize::NONE, None);
//! assert_eq!(bad, None);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Primitive target types for coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    /// `true` / `false`.
    Boolean,
    /// Signed 64-bit integer.
    Integer,
    /// Finite 64-bit float.
    Float,
    /// UTF-8 string.
    String,
}

impl Primitive {
    /// Returns the lowercase name of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
        }
    }

    /// Returns `true` for integer and float.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String normalization applied after coercion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalize {
    /// Convert to upper case.
    pub upper_case: bool,
    /// Strip leading and trailing whitespace.
    pub trim: bool,
}

impl Normalize {
    /// No normalization.
    pub const NONE: Self = Self {
        upper_case: false,
        trim: false,
    };

    /// Trim only.
    pub const TRIM: Self = Self {
        upper_case: false,
        trim: true,
    };

    /// Applies the normalization to a string.
    #[must_use]
    pub fn apply(&self, s: &str) -> String {
        let s = if self.trim { s.trim() } else { s };
        if self.upper_case {
            s.to_uppercase()
        } else {
            s.to_string()
        }
    }
}

/// Coerces `raw` to `kind`.
///
/// `null` yields `default` (cloned) when supplied. Returns `None` when the
/// value cannot be represented as `kind`.
#[must_use]
pub fn coerce(
    key: &str,
    raw: &Value,
    kind: Primitive,
    normalize: Normalize,
    default: Option<&Value>,
) -> Option<Value> {
    if raw.is_null() {
        return default.cloned();
    }

    let coerced = match kind {
        Primitive::Boolean => to_bool(raw).map(Value::Bool),
        Primitive::Integer => to_f64(raw).and_then(round_integer).map(Value::from),
        Primitive::Float => to_f64(raw).and_then(Number::from_f64).map(Value::Number),
        Primitive::String => to_string(raw).map(|s| Value::String(normalize.apply(&s))),
    };

    if coerced.is_none() {
        tracing::trace!(key, kind = %kind, raw = %raw, "Value cannot be coerced");
    }
    coerced
}

/// Renders a scalar the way it is used in keys and messages: strings bare,
/// everything else as JSON.
#[must_use]
pub fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Some(true),
            "false" | "off" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn to_f64(raw: &Value) -> Option<f64> {
    let v = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

// i64 bounds are exact as f64 only up to 2^53; anything beyond is not a
// meaningful device value anyway.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn round_integer(v: f64) -> Option<i64> {
    let rounded = v.round();
    if rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
        return None;
    }
    Some(rounded as i64)
}

fn to_string(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
