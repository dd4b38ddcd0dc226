// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Field schemas and schema maps.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::value::{Normalize, Primitive};

/// The shape of one state field.
///
/// Every reconciliation step matches on this exhaustively, so a field is
/// always exactly one of these.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// `true` / `false`.
    Boolean,
    /// Whole number.
    Integer,
    /// Floating point number.
    Float,
    /// String.
    String,
    /// Nested object with its own schema.
    Object {
        /// Schema of the nested attributes.
        attributes: SchemaMap,
        /// Attributes absent from an update are removed from the state.
        delete_missing: bool,
    },
    /// Array of objects identified by a natural key.
    ObjectArray {
        /// Schema of each element.
        attributes: SchemaMap,
        /// Keyed upsert behavior.
        keyed: KeyedArray,
    },
    /// Array of primitives.
    PrimitiveArray {
        /// Element type.
        element: Primitive,
        /// The input replaces the array instead of extending it.
        replace_all: bool,
        /// An empty result removes the key.
        remove_if_empty: bool,
    },
}

impl FieldKind {
    /// Returns the primitive type for scalar kinds.
    #[must_use]
    pub const fn primitive(&self) -> Option<Primitive> {
        match self {
            Self::Boolean => Some(Primitive::Boolean),
            Self::Integer => Some(Primitive::Integer),
            Self::Float => Some(Primitive::Float),
            Self::String => Some(Primitive::String),
            Self::Object { .. } | Self::ObjectArray { .. } | Self::PrimitiveArray { .. } => None,
        }
    }

    /// Returns a short name for messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Object { .. } => "object",
            Self::ObjectArray { .. } => "object array",
            Self::PrimitiveArray { .. } => "array",
        }
    }
}

/// Upsert behavior of an [`FieldKind::ObjectArray`].
#[derive(Debug, Clone)]
pub struct KeyedArray {
    /// Attribute names forming each element's natural key.
    pub key_id: Vec<String>,
    /// Unknown keys create new elements.
    pub add_if_missing: bool,
    /// An empty result removes the key from the state.
    pub remove_if_empty: bool,
    /// The input replaces the array; omitted elements are dropped.
    pub replace_all: bool,
    /// Validates and canonicalizes key components of new elements.
    pub is_valid_key: KeyValidator,
}

impl KeyedArray {
    /// Creates an upsert rule keyed by the given attributes.
    #[must_use]
    pub fn new<I, S>(key_id: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key_id: key_id.into_iter().map(Into::into).collect(),
            add_if_missing: false,
            remove_if_empty: false,
            replace_all: false,
            is_valid_key: KeyValidator::Any,
        }
    }
}

/// Predicate and normalizer for natural key components.
#[derive(Debug, Clone)]
pub enum KeyValidator {
    /// Any key is accepted as is.
    Any,
    /// Keys are trimmed; empty keys are rejected.
    NonEmpty,
    /// Keys must match one of the names, ignoring case and surrounding
    /// whitespace. The listed spelling is returned.
    OneOf(Vec<String>),
    /// Custom check returning the canonical key.
    Custom(fn(&str) -> Option<String>),
}

impl KeyValidator {
    /// Validates a key component, returning its canonical form.
    #[must_use]
    pub fn validate(&self, key: &str) -> Option<String> {
        match self {
            Self::Any => Some(key.to_string()),
            Self::NonEmpty => {
                let trimmed = key.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Self::OneOf(names) => {
                let wanted = key.trim();
                names
                    .iter()
                    .find(|n| n.eq_ignore_ascii_case(wanted))
                    .cloned()
            }
            Self::Custom(check) => check(key),
        }
    }
}

/// Description of one state key.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use traitstate_lib::schema::FieldSchema;
///
/// let brightness = FieldSchema::integer().with_range(0.0, 100.0);
/// assert_eq!(brightness.max, Some(100.0));
///
/// let mode = FieldSchema::string()
///     .with_allowed(["heat", "cool", "off"])
///     .with_default(json!("off"));
/// assert!(mode.allows(&json!("heat")));
/// assert!(!mode.allows(&json!("broil")));
/// ```
#[derive(Debug, Clone)]
pub struct FieldSchema {
    /// Shape of the value.
    pub kind: FieldKind,
    /// The key must always be present.
    pub mandatory: bool,
    /// Inclusive lower bound for numbers.
    pub min: Option<f64>,
    /// Inclusive upper bound for numbers.
    pub max: Option<f64>,
    /// Legal literals; for primitive arrays, legal elements.
    pub allowed_values: Option<Vec<Value>>,
    /// Value used when the key is absent.
    pub default_value: Option<Value>,
    /// Sibling keys removed whenever this key is written.
    pub exclusive_with: BTreeSet<String>,
    /// String normalization.
    pub normalize: Normalize,
}

impl FieldSchema {
    pub(crate) fn of(kind: FieldKind) -> Self {
        Self {
            kind,
            mandatory: false,
            min: None,
            max: None,
            allowed_values: None,
            default_value: None,
            exclusive_with: BTreeSet::new(),
            normalize: Normalize::NONE,
        }
    }

    /// A boolean field.
    #[must_use]
    pub fn boolean() -> Self {
        Self::of(FieldKind::Boolean)
    }

    /// An integer field.
    #[must_use]
    pub fn integer() -> Self {
        Self::of(FieldKind::Integer)
    }

    /// A float field.
    #[must_use]
    pub fn float() -> Self {
        Self::of(FieldKind::Float)
    }

    /// A string field.
    #[must_use]
    pub fn string() -> Self {
        Self::of(FieldKind::String)
    }

    /// A field of the given primitive type.
    #[must_use]
    pub fn primitive(primitive: Primitive) -> Self {
        match primitive {
            Primitive::Boolean => Self::boolean(),
            Primitive::Integer => Self::integer(),
            Primitive::Float => Self::float(),
            Primitive::String => Self::string(),
        }
    }

    /// A nested object.
    #[must_use]
    pub fn object(attributes: SchemaMap) -> Self {
        Self::of(FieldKind::Object {
            attributes,
            delete_missing: false,
        })
    }

    /// A keyed array of objects.
    #[must_use]
    pub fn object_array(attributes: SchemaMap, keyed: KeyedArray) -> Self {
        Self::of(FieldKind::ObjectArray { attributes, keyed })
    }

    /// An array of primitives.
    #[must_use]
    pub fn primitive_array(element: Primitive) -> Self {
        Self::of(FieldKind::PrimitiveArray {
            element,
            replace_all: false,
            remove_if_empty: false,
        })
    }

    /// Marks the field mandatory.
    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Sets inclusive numeric bounds.
    #[must_use]
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Restricts the field to string literals.
    #[must_use]
    pub fn with_allowed<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = Some(
            values
                .into_iter()
                .map(|v| Value::String(v.into()))
                .collect(),
        );
        self
    }

    /// Restricts the field to arbitrary JSON literals.
    #[must_use]
    pub fn with_allowed_values(mut self, values: Vec<Value>) -> Self {
        self.allowed_values = Some(values);
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Declares mutually exclusive sibling keys.
    #[must_use]
    pub fn exclusive_with<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusive_with.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Sets string normalization.
    #[must_use]
    pub fn with_normalize(mut self, normalize: Normalize) -> Self {
        self.normalize = normalize;
        self
    }

    /// Upper-cases string values.
    #[must_use]
    pub fn upper_case(mut self) -> Self {
        self.normalize.upper_case = true;
        self
    }

    /// Trims string values.
    #[must_use]
    pub fn trim(mut self) -> Self {
        self.normalize.trim = true;
        self
    }

    /// Removes object attributes absent from an update.
    ///
    /// Only meaningful for [`FieldKind::Object`].
    #[must_use]
    pub fn delete_missing(mut self) -> Self {
        if let FieldKind::Object { delete_missing, .. } = &mut self.kind {
            *delete_missing = true;
        }
        self
    }

    /// Makes the input replace the whole array.
    ///
    /// Only meaningful for array kinds.
    #[must_use]
    pub fn replace_all(mut self) -> Self {
        match &mut self.kind {
            FieldKind::ObjectArray { keyed, .. } => keyed.replace_all = true,
            FieldKind::PrimitiveArray { replace_all, .. } => *replace_all = true,
            _ => {}
        }
        self
    }

    /// Removes the key when the resulting array is empty.
    ///
    /// Only meaningful for array kinds.
    #[must_use]
    pub fn remove_if_empty(mut self) -> Self {
        match &mut self.kind {
            FieldKind::ObjectArray { keyed, .. } => keyed.remove_if_empty = true,
            FieldKind::PrimitiveArray {
                remove_if_empty, ..
            } => *remove_if_empty = true,
            _ => {}
        }
        self
    }

    /// Lets unknown natural keys create new elements.
    ///
    /// Only meaningful for [`FieldKind::ObjectArray`].
    #[must_use]
    pub fn add_if_missing(mut self) -> Self {
        if let FieldKind::ObjectArray { keyed, .. } = &mut self.kind {
            keyed.add_if_missing = true;
        }
        self
    }

    /// Sets the natural key validator.
    ///
    /// Only meaningful for [`FieldKind::ObjectArray`].
    #[must_use]
    pub fn with_key_validator(mut self, validator: KeyValidator) -> Self {
        if let FieldKind::ObjectArray { keyed, .. } = &mut self.kind {
            keyed.is_valid_key = validator;
        }
        self
    }

    /// Returns whether `value` satisfies `allowed_values`.
    ///
    /// Fields without `allowed_values` accept everything.
    #[must_use]
    pub fn allows(&self, value: &Value) -> bool {
        self.allowed_values
            .as_ref()
            .is_none_or(|allowed| allowed.contains(value))
    }

    /// Returns whether a number lies inside `min..=max`.
    #[must_use]
    pub fn in_range(&self, v: f64) -> bool {
        self.min.is_none_or(|min| v >= min) && self.max.is_none_or(|max| v <= max)
    }

    /// Returns the nested schema of object and object-array kinds.
    #[must_use]
    pub fn attributes(&self) -> Option<&SchemaMap> {
        match &self.kind {
            FieldKind::Object { attributes, .. } | FieldKind::ObjectArray { attributes, .. } => {
                Some(attributes)
            }
            _ => None,
        }
    }
}

/// Mapping from state key to [`FieldSchema`].
///
/// Iteration order is the key order, which makes reconciliation of
/// mutually exclusive keys deterministic.
#[derive(Debug, Clone, Default)]
pub struct SchemaMap(BTreeMap<String, FieldSchema>);

impl SchemaMap {
    /// Creates an empty schema map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, field: FieldSchema) -> Self {
        self.insert(key, field);
        self
    }

    /// Inserts a field, replacing any previous schema for the key.
    pub fn insert(&mut self, key: impl Into<String>, field: FieldSchema) {
        self.0.insert(key.into(), field);
    }

    /// Looks up a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldSchema> {
        self.0.get(key)
    }

    /// Follows a dotted path through nested objects, e.g. `color.temperatureK`.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&FieldSchema> {
        let mut segments = path.split('.');
        let mut field = self.get(segments.next()?)?;
        for segment in segments {
            field = field.attributes()?.get(segment)?;
        }
        Some(field)
    }

    /// Returns whether the key is described.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSchema)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the map has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldSchema)> for SchemaMap {
    fn from_iter<I: IntoIterator<Item = (K, FieldSchema)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
