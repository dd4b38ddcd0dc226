// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The state reconciler.
//!
//! [`reconcile`] merges a partial update into a [`StateDocument`] under a
//! [`SchemaMap`]: every value is coerced and validated, objects merge
//! attribute by attribute, keyed arrays upsert by natural key, exclusive
//! siblings are removed, and every change is recorded in a [`ChangeSet`].
//!
//! Field errors never abort the update. The offending field keeps its prior
//! value and the error is collected in the [`Reconciliation`]. The one
//! exception is a nested mandatory attribute that ends up missing: the
//! enclosing object (or array element) is left exactly as it was.
//!
//! Keys are visited in schema order. A key absent from the update keeps its
//! current value; if the state lacks it too, its default is written. An
//! explicit `null` resets a key to its default or, without one, deletes it.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use super::{Change, ChangeSet, StateDocument};
use crate::error::ValidationError;
use crate::schema::{FieldKind, FieldSchema, KeyedArray, SchemaMap};
use crate::value::{Normalize, Primitive, coerce, display_scalar};

/// Outcome of one reconciliation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// What changed in the state document.
    pub changes: ChangeSet,
    /// Field-level errors; the affected fields were skipped.
    pub errors: Vec<ValidationError>,
}

impl Reconciliation {
    /// Returns `true` if the state document changed.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Returns `true` if no field was rejected.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Reconciles `update` into `state` in place.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use traitstate_lib::schema::{FieldSchema, SchemaMap};
/// use traitstate_lib::state::{reconcile, StateDocument};
///
/// let schema = SchemaMap::new()
///     .with("on", FieldSchema::boolean())
///     .with("brightness", FieldSchema::integer().with_range(0.0, 100.0));
/// let mut state = StateDocument::new();
///
/// let update = json!({"on": "on", "brightness": 150});
/// let result = reconcile(&schema, &mut state, update.as_object().unwrap());
///
/// assert_eq!(state.get("on"), Some(&json!(true)));
/// assert!(state.get("brightness").is_none());
/// assert!(result.changes.contains("on"));
/// assert_eq!(result.errors.len(), 1);
/// ```
pub fn reconcile(
    schema: &SchemaMap,
    state: &mut StateDocument,
    update: &Map<String, Value>,
) -> Reconciliation {
    let mut reconciler = Reconciler::default();
    let changes = reconciler
        .fields("", schema, state.as_map_mut(), update, Scope::Root)
        .unwrap_or_default();

    tracing::debug!(
        changed = changes.len(),
        errors = reconciler.errors.len(),
        "State reconciled"
    );

    Reconciliation {
        changes,
        errors: reconciler.errors,
    }
}

/// Reconciles `update` into a copy of `state`, leaving `state` untouched.
#[must_use]
pub fn reconciled(
    schema: &SchemaMap,
    state: &StateDocument,
    update: &Map<String, Value>,
) -> (StateDocument, Reconciliation) {
    let mut next = state.clone();
    let result = reconcile(schema, &mut next, update);
    (next, result)
}

/// Removes top-level keys the schema no longer describes.
///
/// Used after a reconfiguration disabled traits.
pub fn prune(schema: &SchemaMap, state: &mut StateDocument) -> ChangeSet {
    let map = state.as_map_mut();
    let stale: Vec<String> = map
        .keys()
        .filter(|k| !schema.contains_key(k))
        .cloned()
        .collect();

    let mut changes = ChangeSet::new();
    for key in stale {
        map.remove(&key);
        tracing::debug!(key = %key, "Pruned state key outside the schema");
        changes.record(key, Change::Removed);
    }
    changes
}

/// Where a map of fields sits in the document.
#[derive(Debug, Clone, Copy)]
enum Scope {
    /// The document itself.
    Root,
    /// A nested object attribute.
    Object { delete_missing: bool },
    /// An element of a keyed array.
    Element,
}

impl Scope {
    const fn delete_missing(self) -> bool {
        matches!(
            self,
            Self::Object {
                delete_missing: true
            }
        )
    }

    const fn aborts_on_missing(self) -> bool {
        !matches!(self, Self::Root)
    }
}

/// A nested update was abandoned because a mandatory attribute is missing.
#[derive(Debug)]
struct Aborted;

/// What to do with one key after validating its input.
#[derive(Debug)]
enum Write {
    /// The input was rejected; the key is left alone.
    Rejected,
    /// The input was accepted and equals the current value.
    Unchanged,
    /// The input replaces the value.
    Set(Value),
    /// The input produced a new value with a detailed change.
    Update(Value, Change),
    /// The input empties a `remove_if_empty` array.
    Remove,
    /// The input was rejected, but the key falls back to another value.
    Fallback(Value),
}

/// Result of checking one primitive value.
enum Checked {
    Valid(Value),
    NotAllowed,
    Invalid,
}

#[derive(Debug, Clone, Copy)]
struct ArrayMode {
    replace_all: bool,
    remove_if_empty: bool,
}

#[derive(Debug, Default)]
struct Reconciler {
    errors: Vec<ValidationError>,
}

impl Reconciler {
    fn report(&mut self, error: ValidationError) {
        tracing::warn!(path = error.path(), kind = %error.kind(), "{error}");
        self.errors.push(error);
    }

    fn fields<'s>(
        &mut self,
        path: &str,
        schema: &'s SchemaMap,
        target: &mut Map<String, Value>,
        input: &Map<String, Value>,
        scope: Scope,
    ) -> Result<ChangeSet, Aborted> {
        let mut changes = ChangeSet::new();
        let mut suppressed: BTreeSet<&'s str> = BTreeSet::new();
        let mut pending: Vec<(&'s str, &'s FieldSchema)> = Vec::new();

        for key in input.keys().filter(|k| !schema.contains_key(k)) {
            tracing::trace!(path, key = %key, "Ignoring key outside the schema");
        }

        for (key, field) in schema.iter() {
            let field_path = join(path, key);
            match input.get(key) {
                Some(_) if suppressed.contains(key) => {
                    tracing::warn!(path, key, "Exclusive sibling already written, input skipped");
                }
                Some(Value::Null) => match &field.default_value {
                    Some(default) => {
                        let write = self.value(&field_path, field, target.get(key), default);
                        apply(key, write, target, &mut changes);
                    }
                    None => self.drop_key(key, field, target, &mut changes, &mut pending),
                },
                Some(raw) => {
                    let write = self.value(&field_path, field, target.get(key), raw);
                    if apply(key, write, target, &mut changes) {
                        for sibling in &field.exclusive_with {
                            if target.remove(sibling).is_some() {
                                tracing::trace!(path, key, sibling = %sibling, "Removed exclusive sibling");
                                changes.record(sibling.clone(), Change::Removed);
                            }
                            suppressed.insert(sibling.as_str());
                        }
                    }
                }
                None if suppressed.contains(key) => {}
                None if target.contains_key(key) => {
                    if scope.delete_missing() {
                        self.drop_key(key, field, target, &mut changes, &mut pending);
                    }
                }
                None => {
                    let displaced = field
                        .exclusive_with
                        .iter()
                        .any(|sibling| target.contains_key(sibling));
                    if displaced {
                        continue;
                    }
                    if let Some(default) = &field.default_value {
                        let write = self.value(&field_path, field, None, default);
                        apply(key, write, target, &mut changes);
                    } else if field.mandatory {
                        pending.push((key, field));
                    }
                }
            }
        }

        // A mandatory key may be absent only while one of its own exclusive
        // siblings is present.
        let mut aborted = false;
        for (key, field) in pending {
            let excused = field
                .exclusive_with
                .iter()
                .any(|sibling| target.contains_key(sibling));
            if excused {
                if target.remove(key).is_some() {
                    changes.record(key, Change::Removed);
                }
            } else {
                self.report(ValidationError::MandatoryFieldMissing {
                    path: join(path, key),
                });
                aborted = true;
            }
        }

        if aborted && scope.aborts_on_missing() {
            tracing::debug!(path, "Nested update abandoned");
            return Err(Aborted);
        }
        Ok(changes)
    }

    fn drop_key<'s>(
        &mut self,
        key: &'s str,
        field: &'s FieldSchema,
        target: &mut Map<String, Value>,
        changes: &mut ChangeSet,
        pending: &mut Vec<(&'s str, &'s FieldSchema)>,
    ) {
        if field.mandatory {
            pending.push((key, field));
        } else if target.remove(key).is_some() {
            changes.record(key, Change::Removed);
        }
    }

    fn value(
        &mut self,
        path: &str,
        field: &FieldSchema,
        prior: Option<&Value>,
        raw: &Value,
    ) -> Write {
        match &field.kind {
            FieldKind::Boolean => self.scalar(path, field, Primitive::Boolean, prior, raw),
            FieldKind::Integer => self.scalar(path, field, Primitive::Integer, prior, raw),
            FieldKind::Float => self.scalar(path, field, Primitive::Float, prior, raw),
            FieldKind::String => self.scalar(path, field, Primitive::String, prior, raw),
            FieldKind::Object {
                attributes,
                delete_missing,
            } => self.object(path, attributes, *delete_missing, prior, raw),
            FieldKind::ObjectArray { attributes, keyed } => {
                self.object_array(path, attributes, keyed, prior, raw)
            }
            FieldKind::PrimitiveArray {
                element,
                replace_all,
                remove_if_empty,
            } => {
                let mode = ArrayMode {
                    replace_all: *replace_all,
                    remove_if_empty: *remove_if_empty,
                };
                self.primitive_array(path, field, *element, mode, prior, raw)
            }
        }
    }

    fn check(
        &mut self,
        path: &str,
        field: &FieldSchema,
        primitive: Primitive,
        raw: &Value,
    ) -> Checked {
        let Some(value) = coerce(path, raw, primitive, field.normalize, None) else {
            self.report(ValidationError::InvalidType {
                path: path.to_string(),
                expected: primitive.as_str(),
            });
            return Checked::Invalid;
        };

        if let Some(v) = value.as_f64()
            && !field.in_range(v)
        {
            self.report(ValidationError::OutOfRange {
                path: path.to_string(),
                value: v,
                min: field.min.unwrap_or(f64::NEG_INFINITY),
                max: field.max.unwrap_or(f64::INFINITY),
            });
            return Checked::Invalid;
        }

        if !field.allows(&value) {
            self.report(ValidationError::NotInAllowedValues {
                path: path.to_string(),
                value: display_scalar(&value),
            });
            return Checked::NotAllowed;
        }

        Checked::Valid(value)
    }

    fn scalar(
        &mut self,
        path: &str,
        field: &FieldSchema,
        primitive: Primitive,
        prior: Option<&Value>,
        raw: &Value,
    ) -> Write {
        match self.check(path, field, primitive, raw) {
            Checked::Valid(value) => changed(prior, value),
            Checked::Invalid => Write::Rejected,
            Checked::NotAllowed => {
                if prior.is_some_and(|p| field.allows(p)) {
                    return Write::Rejected;
                }
                match field.default_value.as_ref().filter(|d| field.allows(d)) {
                    Some(default) if prior != Some(default) => Write::Fallback(default.clone()),
                    _ => Write::Rejected,
                }
            }
        }
    }

    fn object(
        &mut self,
        path: &str,
        attributes: &SchemaMap,
        delete_missing: bool,
        prior: Option<&Value>,
        raw: &Value,
    ) -> Write {
        let Some(input) = raw.as_object() else {
            self.report(ValidationError::InvalidType {
                path: path.to_string(),
                expected: "object",
            });
            return Write::Rejected;
        };

        let mut working = prior
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        match self.fields(path, attributes, &mut working, input, Scope::Object { delete_missing }) {
            Err(Aborted) => Write::Rejected,
            Ok(nested) if nested.is_empty() => {
                if prior.is_some() {
                    Write::Unchanged
                } else {
                    Write::Rejected
                }
            }
            Ok(nested) => Write::Update(Value::Object(working), Change::Nested(nested)),
        }
    }

    fn primitive_array(
        &mut self,
        path: &str,
        field: &FieldSchema,
        element: Primitive,
        mode: ArrayMode,
        prior: Option<&Value>,
        raw: &Value,
    ) -> Write {
        let mut accepted: Vec<Value> = Vec::new();
        let mut rejected = false;
        for (i, item) in items(raw).into_iter().enumerate() {
            match self.check(&format!("{path}[{i}]"), field, element, item) {
                Checked::Valid(value) => {
                    if !accepted.contains(&value) {
                        accepted.push(value);
                    }
                }
                Checked::NotAllowed | Checked::Invalid => rejected = true,
            }
        }

        let result = if mode.replace_all {
            accepted
        } else {
            let mut merged = prior
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for value in accepted {
                if !merged.contains(&value) {
                    merged.push(value);
                }
            }
            merged
        };

        if mode.remove_if_empty && result.is_empty() {
            return if prior.is_some() {
                Write::Remove
            } else {
                Write::Unchanged
            };
        }

        let value = Value::Array(result);
        if prior != Some(&value) || (mode.replace_all && rejected) {
            Write::Set(value)
        } else {
            Write::Unchanged
        }
    }

    fn object_array(
        &mut self,
        path: &str,
        attributes: &SchemaMap,
        keyed: &KeyedArray,
        prior: Option<&Value>,
        raw: &Value,
    ) -> Write {
        let mut working: Vec<Value> = prior
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut touched: Vec<usize> = Vec::new();
        let mut consumed: BTreeSet<Vec<String>> = BTreeSet::new();
        let mut elements: BTreeMap<String, ChangeSet> = BTreeMap::new();

        for (i, item) in items(raw).into_iter().enumerate() {
            let Some(input) = item.as_object() else {
                self.report(ValidationError::InvalidType {
                    path: format!("{path}[{i}]"),
                    expected: "object",
                });
                continue;
            };
            let Some(mut key) = element_key(attributes, keyed, input) else {
                self.report(ValidationError::InvalidKey {
                    path: path.to_string(),
                    key: describe_key(keyed, input),
                });
                continue;
            };
            let mut input = Cow::Borrowed(input);
            let mut matches = locate(attributes, keyed, &working, &key);

            if matches.is_empty() && keyed.add_if_missing {
                let Some(canonical) = canonicalize(keyed, &key) else {
                    self.report(ValidationError::InvalidKey {
                        path: path.to_string(),
                        key: key.join(","),
                    });
                    continue;
                };
                if canonical != key {
                    let overridden = input.to_mut();
                    for (attribute, component) in keyed.key_id.iter().zip(&canonical) {
                        overridden.insert(attribute.clone(), Value::String(component.clone()));
                    }
                    matches = locate(attributes, keyed, &working, &canonical);
                    key = canonical;
                }
            }

            let label = key.join(",");
            if !consumed.insert(key) {
                // First write wins within one call.
                self.report(ValidationError::DuplicateKey {
                    path: path.to_string(),
                    key: label,
                });
                continue;
            }

            let element_path = format!("{path}[{label}]");
            match matches.as_slice() {
                [index] => {
                    let index = *index;
                    let mut element = working[index].as_object().cloned().unwrap_or_default();
                    if let Ok(nested) =
                        self.fields(&element_path, attributes, &mut element, &input, Scope::Element)
                        && !nested.is_empty()
                    {
                        working[index] = Value::Object(element);
                        elements.insert(label, nested);
                    }
                    if !touched.contains(&index) {
                        touched.push(index);
                    }
                }
                [] if keyed.add_if_missing => {
                    let mut element = Map::new();
                    if let Ok(nested) =
                        self.fields(&element_path, attributes, &mut element, &input, Scope::Element)
                    {
                        tracing::trace!(path, key = %label, "Added array element");
                        working.push(Value::Object(element));
                        touched.push(working.len() - 1);
                        elements.insert(label, nested);
                    }
                }
                [] => {
                    tracing::debug!(path, key = %label, "No element matches key, skipped");
                }
                _ => {
                    // Ambiguous elements stay as they are.
                    for &index in &matches {
                        if !touched.contains(&index) {
                            touched.push(index);
                        }
                    }
                    self.report(ValidationError::DuplicateKey {
                        path: path.to_string(),
                        key: label,
                    });
                }
            }
        }

        let result: Vec<Value> = if keyed.replace_all {
            touched.iter().map(|&i| working[i].clone()).collect()
        } else {
            working.clone()
        };

        if keyed.remove_if_empty && result.is_empty() {
            return if prior.is_some() {
                Write::Remove
            } else {
                Write::Unchanged
            };
        }
        if prior.is_none() && result.is_empty() {
            return Write::Unchanged;
        }

        let reshaped = result != working;
        let value = Value::Array(result);
        if prior == Some(&value) {
            Write::Unchanged
        } else if reshaped || elements.is_empty() {
            Write::Set(value)
        } else {
            Write::Update(value, Change::Elements(elements))
        }
    }
}

/// Applies a write to `target`. Returns whether the input was accepted.
fn apply(key: &str, write: Write, target: &mut Map<String, Value>, changes: &mut ChangeSet) -> bool {
    match write {
        Write::Rejected => false,
        Write::Unchanged => true,
        Write::Set(value) => {
            target.insert(key.to_string(), value);
            changes.record(key, Change::Set);
            true
        }
        Write::Update(value, change) => {
            target.insert(key.to_string(), value);
            changes.record(key, change);
            true
        }
        Write::Remove => {
            if target.remove(key).is_some() {
                changes.record(key, Change::Removed);
            }
            true
        }
        Write::Fallback(value) => {
            target.insert(key.to_string(), value);
            changes.record(key, Change::Set);
            false
        }
    }
}

fn changed(prior: Option<&Value>, value: Value) -> Write {
    if prior == Some(&value) {
        Write::Unchanged
    } else {
        Write::Set(value)
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Array input as a list; scalars and objects are wrapped.
fn items(raw: &Value) -> Vec<&Value> {
    match raw {
        Value::Array(values) => values.iter().collect(),
        other => vec![other],
    }
}

/// Computes the natural key of an element, coercing each component the way
/// its attribute is coerced.
fn element_key(
    attributes: &SchemaMap,
    keyed: &KeyedArray,
    element: &Map<String, Value>,
) -> Option<Vec<String>> {
    keyed
        .key_id
        .iter()
        .map(|attribute| {
            let raw = element.get(attribute)?;
            let (primitive, normalize) = attributes
                .get(attribute)
                .and_then(|f| Some((f.kind.primitive()?, f.normalize)))
                .unwrap_or((Primitive::String, Normalize::NONE));
            coerce(attribute, raw, primitive, normalize, None).map(|v| display_scalar(&v))
        })
        .collect()
}

fn describe_key(keyed: &KeyedArray, element: &Map<String, Value>) -> String {
    keyed
        .key_id
        .iter()
        .map(|attribute| element.get(attribute).map_or_else(|| "null".to_string(), display_scalar))
        .collect::<Vec<_>>()
        .join(",")
}

fn locate(attributes: &SchemaMap, keyed: &KeyedArray, elements: &[Value], key: &[String]) -> Vec<usize> {
    elements
        .iter()
        .enumerate()
        .filter(|(_, element)| {
            element
                .as_object()
                .and_then(|e| element_key(attributes, keyed, e))
                .is_some_and(|k| k == key)
        })
        .map(|(i, _)| i)
        .collect()
}

fn canonicalize(keyed: &KeyedArray, key: &[String]) -> Option<Vec<String>> {
    key.iter()
        .map(|component| keyed.is_valid_key.validate(component))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::KeyValidator;
    use serde_json::json;

    fn run(schema: &SchemaMap, state: &mut StateDocument, update: Value) -> Reconciliation {
        reconcile(schema, state, update.as_object().unwrap())
    }

    fn doc(value: Value) -> StateDocument {
        serde_json::from_value(value).unwrap()
    }

    fn kinds(result: &Reconciliation) -> Vec<ErrorKind> {
        result.errors.iter().map(ValidationError::kind).collect()
    }

    #[test]
    fn writes_only_differences() {
        let schema = SchemaMap::new()
            .with("on", FieldSchema::boolean())
            .with("brightness", FieldSchema::integer());
        let mut state = doc(json!({"on": true, "brightness": 10}));

        let result = run(&schema, &mut state, json!({"on": true, "brightness": 20}));

        assert_eq!(result.changes.keys().collect::<Vec<_>>(), vec!["brightness"]);
        assert_eq!(state.get("brightness"), Some(&json!(20)));
    }

    #[test]
    fn omitted_keys_keep_their_value() {
        let schema = SchemaMap::new()
            .with("on", FieldSchema::boolean())
            .with("brightness", FieldSchema::integer());
        let mut state = doc(json!({"on": true, "brightness": 10}));

        let result = run(&schema, &mut state, json!({"on": false}));

        assert_eq!(state.get("brightness"), Some(&json!(10)));
        assert_eq!(result.changes.paths(), vec!["on"]);
    }

    #[test]
    fn defaults_fill_absent_keys() {
        let schema = SchemaMap::new()
            .with("online", FieldSchema::boolean().mandatory().with_default(json!(true)));
        let mut state = StateDocument::new();

        let result = run(&schema, &mut state, json!({}));

        assert_eq!(state.get("online"), Some(&json!(true)));
        assert!(result.changes.contains("online"));
        assert!(result.is_clean());
    }

    #[test]
    fn null_deletes_optional_and_resets_defaulted_keys() {
        let schema = SchemaMap::new()
            .with("isJammed", FieldSchema::boolean())
            .with("mode", FieldSchema::string().with_default(json!("off")));
        let mut state = doc(json!({"isJammed": true, "mode": "heat"}));

        let result = run(&schema, &mut state, json!({"isJammed": null, "mode": null}));

        assert!(!state.contains_key("isJammed"));
        assert_eq!(state.get("mode"), Some(&json!("off")));
        assert_eq!(result.changes.get("isJammed"), Some(&Change::Removed));
        assert_eq!(result.changes.get("mode"), Some(&Change::Set));
    }

    #[test]
    fn null_on_mandatory_key_is_an_error() {
        let schema = SchemaMap::new().with("isLocked", FieldSchema::boolean().mandatory());
        let mut state = doc(json!({"isLocked": true}));

        let result = run(&schema, &mut state, json!({"isLocked": null}));

        assert_eq!(kinds(&result), vec![ErrorKind::MandatoryFieldMissing]);
        assert_eq!(state.get("isLocked"), Some(&json!(true)));
        assert!(!result.is_changed());
    }

    #[test]
    fn missing_mandatory_does_not_block_siblings() {
        let schema = SchemaMap::new()
            .with("isLocked", FieldSchema::boolean().mandatory())
            .with("isJammed", FieldSchema::boolean());
        let mut state = StateDocument::new();

        let result = run(&schema, &mut state, json!({"isJammed": false}));

        assert_eq!(kinds(&result), vec![ErrorKind::MandatoryFieldMissing]);
        assert_eq!(result.errors[0].path(), "isLocked");
        assert_eq!(state.get("isJammed"), Some(&json!(false)));
    }

    #[test]
    fn uncoercible_value_keeps_prior() {
        let schema = SchemaMap::new().with("brightness", FieldSchema::integer());
        let mut state = doc(json!({"brightness": 40}));

        let result = run(&schema, &mut state, json!({"brightness": "dim"}));

        assert_eq!(kinds(&result), vec![ErrorKind::InvalidType]);
        assert_eq!(state.get("brightness"), Some(&json!(40)));
    }

    #[test]
    fn allowed_values_fall_back_to_default() {
        let field = FieldSchema::string()
            .with_allowed(["heat", "cool", "off"])
            .with_default(json!("off"));
        let schema = SchemaMap::new().with("thermostatMode", field);

        // Prior value still legal: kept.
        let mut state = doc(json!({"thermostatMode": "cool"}));
        let result = run(&schema, &mut state, json!({"thermostatMode": "broil"}));
        assert_eq!(state.get("thermostatMode"), Some(&json!("cool")));
        assert!(!result.is_changed());
        assert_eq!(kinds(&result), vec![ErrorKind::NotInAllowedValues]);

        // Prior value no longer legal: default.
        let mut state = doc(json!({"thermostatMode": "eco"}));
        let result = run(&schema, &mut state, json!({"thermostatMode": "broil"}));
        assert_eq!(state.get("thermostatMode"), Some(&json!("off")));
        assert!(result.changes.contains("thermostatMode"));
    }

    #[test]
    fn exclusive_sibling_removed_and_not_redefaulted() {
        let schema = SchemaMap::new()
            .with(
                "thermostatTemperatureSetpoint",
                FieldSchema::float().exclusive_with([
                    "thermostatTemperatureSetpointHigh",
                    "thermostatTemperatureSetpointLow",
                ]),
            )
            .with(
                "thermostatTemperatureSetpointHigh",
                FieldSchema::float().with_default(json!(25.0)),
            )
            .with(
                "thermostatTemperatureSetpointLow",
                FieldSchema::float().with_default(json!(18.0)),
            );
        let mut state = doc(json!({
            "thermostatTemperatureSetpointHigh": 25.0,
            "thermostatTemperatureSetpointLow": 18.0
        }));

        let result = run(&schema, &mut state, json!({"thermostatTemperatureSetpoint": 21}));

        assert_eq!(state.to_value(), json!({"thermostatTemperatureSetpoint": 21.0}));
        assert_eq!(
            result.changes.get("thermostatTemperatureSetpointHigh"),
            Some(&Change::Removed)
        );
    }

    fn hsv() -> FieldSchema {
        let attributes = SchemaMap::new()
            .with("hue", FieldSchema::float().mandatory().with_range(0.0, 360.0))
            .with("saturation", FieldSchema::float().mandatory().with_range(0.0, 1.0))
            .with("value", FieldSchema::float().mandatory().with_range(0.0, 1.0));
        FieldSchema::object(attributes).delete_missing()
    }

    fn color() -> SchemaMap {
        let attributes = SchemaMap::new()
            .with(
                "temperatureK",
                FieldSchema::integer().exclusive_with(["spectrumRgb", "spectrumHsv"]),
            )
            .with(
                "spectrumRgb",
                FieldSchema::integer().exclusive_with(["temperatureK", "spectrumHsv"]),
            )
            .with(
                "spectrumHsv",
                hsv().exclusive_with(["temperatureK", "spectrumRgb"]),
            );
        SchemaMap::new().with("color", FieldSchema::object(attributes))
    }

    #[test]
    fn nested_changes_are_recorded() {
        let schema = color();
        let mut state = doc(json!({"color": {"temperatureK": 2700}}));

        let result = run(&schema, &mut state, json!({"color": {"spectrumRgb": 255}}));

        assert_eq!(state.to_value(), json!({"color": {"spectrumRgb": 255}}));
        assert_eq!(
            result.changes.paths(),
            vec!["color.spectrumRgb", "color.temperatureK"]
        );
    }

    #[test]
    fn first_exclusive_key_in_one_update_wins() {
        let schema = color();
        let mut state = StateDocument::new();

        let result = run(
            &schema,
            &mut state,
            json!({"color": {"spectrumRgb": 255, "temperatureK": 3000}}),
        );

        assert_eq!(state.to_value(), json!({"color": {"spectrumRgb": 255}}));
        assert_eq!(result.changes.paths(), vec!["color.spectrumRgb"]);
    }

    #[test]
    fn exclusive_pair_replaces_present_sibling_once() {
        let schema = color();
        let mut state = doc(json!({"color": {"temperatureK": 2700}}));

        let result = run(
            &schema,
            &mut state,
            json!({"color": {"spectrumRgb": 255, "temperatureK": 3000}}),
        );

        assert_eq!(state.to_value(), json!({"color": {"spectrumRgb": 255}}));
        assert_eq!(
            result.changes.paths(),
            vec!["color.spectrumRgb", "color.temperatureK"]
        );
    }

    #[test]
    fn delete_missing_object_is_all_or_nothing() {
        let schema = color();
        let before = json!({"color": {"spectrumHsv": {"hue": 10.0, "saturation": 0.5, "value": 1.0}}});
        let mut state = doc(before.clone());

        let result = run(&schema, &mut state, json!({"color": {"spectrumHsv": {"hue": 90}}}));

        assert_eq!(state.to_value(), before);
        assert!(!result.is_changed());
        assert_eq!(
            kinds(&result),
            vec![ErrorKind::MandatoryFieldMissing, ErrorKind::MandatoryFieldMissing]
        );
        assert_eq!(result.errors[0].path(), "color.spectrumHsv.saturation");
    }

    #[test]
    fn delete_missing_removes_optional_attributes() {
        let attributes = SchemaMap::new()
            .with("a", FieldSchema::integer())
            .with("b", FieldSchema::integer());
        let schema = SchemaMap::new().with("obj", FieldSchema::object(attributes).delete_missing());
        let mut state = doc(json!({"obj": {"a": 1, "b": 2}}));

        let result = run(&schema, &mut state, json!({"obj": {"a": 1}}));

        assert_eq!(state.to_value(), json!({"obj": {"a": 1}}));
        assert_eq!(result.changes.paths(), vec!["obj.b"]);
    }

    #[test]
    fn mandatory_attribute_excused_by_exclusive_sibling() {
        let attributes = SchemaMap::new()
            .with("percent", FieldSchema::integer().mandatory().exclusive_with(["level"]))
            .with("level", FieldSchema::string().mandatory().exclusive_with(["percent"]));
        let schema = SchemaMap::new().with("speed", FieldSchema::object(attributes).delete_missing());
        let mut state = doc(json!({"speed": {"percent": 40}}));

        let result = run(&schema, &mut state, json!({"speed": {"level": "high"}}));

        assert!(result.is_clean());
        assert_eq!(state.to_value(), json!({"speed": {"level": "high"}}));
    }

    #[test]
    fn primitive_array_replace_all() {
        let schema = SchemaMap::new().with(
            "activeZones",
            FieldSchema::primitive_array(Primitive::String)
                .with_allowed(["kitchen", "hall"])
                .replace_all()
                .remove_if_empty(),
        );
        let mut state = doc(json!({"activeZones": ["hall"]}));

        let result = run(&schema, &mut state, json!({"activeZones": "kitchen"}));
        assert_eq!(state.get("activeZones"), Some(&json!(["kitchen"])));
        assert!(result.changes.contains("activeZones"));

        // A rejected element marks the array changed even if the result matches.
        let result = run(&schema, &mut state, json!({"activeZones": ["kitchen", "garage"]}));
        assert_eq!(state.get("activeZones"), Some(&json!(["kitchen"])));
        assert!(result.changes.contains("activeZones"));
        assert_eq!(kinds(&result), vec![ErrorKind::NotInAllowedValues]);

        let result = run(&schema, &mut state, json!({"activeZones": []}));
        assert!(!state.contains_key("activeZones"));
        assert_eq!(result.changes.get("activeZones"), Some(&Change::Removed));
    }

    #[test]
    fn primitive_array_appends_without_replace_all() {
        let schema = SchemaMap::new().with("tags", FieldSchema::primitive_array(Primitive::String));
        let mut state = doc(json!({"tags": ["a"]}));

        run(&schema, &mut state, json!({"tags": ["b", "a"]}));

        assert_eq!(state.get("tags"), Some(&json!(["a", "b"])));
    }

    fn sensors() -> SchemaMap {
        let attributes = SchemaMap::new()
            .with("name", FieldSchema::string().mandatory().trim())
            .with("rawValue", FieldSchema::float());
        SchemaMap::new().with(
            "currentSensorStateData",
            FieldSchema::object_array(attributes, KeyedArray::new(["name"]))
                .add_if_missing()
                .remove_if_empty()
                .with_key_validator(KeyValidator::OneOf(vec![
                    "AirQuality".to_string(),
                    "SmokeLevel".to_string(),
                ])),
        )
    }

    #[test]
    fn keyed_upsert_updates_in_place() {
        let schema = sensors();
        let mut state = StateDocument::new();

        run(&schema, &mut state, json!({"currentSensorStateData": [{"name": "AirQuality", "rawValue": 1}]}));
        let result = run(
            &schema,
            &mut state,
            json!({"currentSensorStateData": [{"name": "AirQuality", "rawValue": 2}]}),
        );

        assert_eq!(
            state.get("currentSensorStateData"),
            Some(&json!([{"name": "AirQuality", "rawValue": 2.0}]))
        );
        assert_eq!(
            result.changes.paths(),
            vec!["currentSensorStateData[AirQuality].rawValue"]
        );
    }

    #[test]
    fn keyed_upsert_canonicalizes_new_keys() {
        let schema = sensors();
        let mut state = doc(json!({"currentSensorStateData": [{"name": "AirQuality", "rawValue": 1.0}]}));

        let result = run(
            &schema,
            &mut state,
            json!({"currentSensorStateData": [
                {"name": " airquality ", "rawValue": 3},
                {"name": "smokelevel", "rawValue": 0},
                {"name": "Radon", "rawValue": 9}
            ]}),
        );

        assert_eq!(
            state.get("currentSensorStateData"),
            Some(&json!([
                {"name": "AirQuality", "rawValue": 3.0},
                {"name": "SmokeLevel", "rawValue": 0.0}
            ]))
        );
        assert_eq!(kinds(&result), vec![ErrorKind::InvalidKey]);
    }

    #[test]
    fn duplicate_input_keys_first_write_wins() {
        let schema = sensors();
        let mut state = StateDocument::new();

        let result = run(
            &schema,
            &mut state,
            json!({"currentSensorStateData": [
                {"name": "AirQuality", "rawValue": 1},
                {"name": "AirQuality", "rawValue": 2}
            ]}),
        );

        assert_eq!(
            state.get("currentSensorStateData"),
            Some(&json!([{"name": "AirQuality", "rawValue": 1.0}]))
        );
        assert_eq!(kinds(&result), vec![ErrorKind::DuplicateKey]);
    }

    #[test]
    fn duplicate_existing_keys_are_reported() {
        let schema = sensors();
        let before = json!({"currentSensorStateData": [
            {"name": "AirQuality", "rawValue": 1.0},
            {"name": "AirQuality", "rawValue": 2.0}
        ]});
        let mut state = doc(before.clone());

        let result = run(
            &schema,
            &mut state,
            json!({"currentSensorStateData": [{"name": "AirQuality", "rawValue": 5}]}),
        );

        assert_eq!(state.to_value(), before);
        assert_eq!(kinds(&result), vec![ErrorKind::DuplicateKey]);
    }

    #[test]
    fn duplicate_existing_keys_survive_replace_all() {
        let attributes = SchemaMap::new()
            .with("unit", FieldSchema::string().mandatory().upper_case())
            .with("rawValue", FieldSchema::integer().mandatory());
        let schema = SchemaMap::new().with(
            "capacityRemaining",
            FieldSchema::object_array(attributes, KeyedArray::new(["unit"]))
                .add_if_missing()
                .replace_all(),
        );
        let before = json!({"capacityRemaining": [
            {"unit": "PERCENTAGE", "rawValue": 80},
            {"unit": "PERCENTAGE", "rawValue": 70}
        ]});
        let mut state = doc(before.clone());

        let result = run(
            &schema,
            &mut state,
            json!({"capacityRemaining": [{"unit": "PERCENTAGE", "rawValue": 5}]}),
        );

        assert_eq!(state.to_value(), before);
        assert!(!result.is_changed());
        assert_eq!(kinds(&result), vec![ErrorKind::DuplicateKey]);
    }

    #[test]
    fn keyed_replace_all_drops_omitted_elements() {
        let attributes = SchemaMap::new()
            .with("unit", FieldSchema::string().mandatory().upper_case())
            .with("rawValue", FieldSchema::integer().mandatory());
        let schema = SchemaMap::new().with(
            "capacityRemaining",
            FieldSchema::object_array(attributes, KeyedArray::new(["unit"]))
                .add_if_missing()
                .replace_all(),
        );
        let mut state = doc(json!({"capacityRemaining": [
            {"unit": "PERCENTAGE", "rawValue": 80},
            {"unit": "SECONDS", "rawValue": 3600}
        ]}));

        let result = run(
            &schema,
            &mut state,
            json!({"capacityRemaining": [{"unit": "percentage", "rawValue": 75}]}),
        );

        assert_eq!(
            state.get("capacityRemaining"),
            Some(&json!([{"unit": "PERCENTAGE", "rawValue": 75}]))
        );
        assert_eq!(result.changes.get("capacityRemaining"), Some(&Change::Set));
    }

    #[test]
    fn new_element_missing_mandatory_is_skipped() {
        let attributes = SchemaMap::new()
            .with("unit", FieldSchema::string().mandatory())
            .with("rawValue", FieldSchema::integer().mandatory());
        let schema = SchemaMap::new().with(
            "capacityRemaining",
            FieldSchema::object_array(attributes, KeyedArray::new(["unit"])).add_if_missing(),
        );
        let mut state = StateDocument::new();

        let result = run(&schema, &mut state, json!({"capacityRemaining": [{"unit": "SECONDS"}]}));

        assert!(!state.contains_key("capacityRemaining"));
        assert_eq!(kinds(&result), vec![ErrorKind::MandatoryFieldMissing]);
        assert_eq!(result.errors[0].path(), "capacityRemaining[SECONDS].rawValue");
    }

    #[test]
    fn unknown_keys_without_add_if_missing_are_skipped() {
        let attributes = SchemaMap::new()
            .with("openDirection", FieldSchema::string().mandatory().upper_case())
            .with("openPercent", FieldSchema::integer().mandatory());
        let schema = SchemaMap::new().with(
            "openState",
            FieldSchema::object_array(attributes, KeyedArray::new(["openDirection"])),
        );
        let mut state = doc(json!({"openState": [{"openDirection": "UP", "openPercent": 0}]}));

        let result = run(
            &schema,
            &mut state,
            json!({"openState": [
                {"openDirection": "up", "openPercent": 50},
                {"openDirection": "LEFT", "openPercent": 10}
            ]}),
        );

        assert_eq!(
            state.get("openState"),
            Some(&json!([{"openDirection": "UP", "openPercent": 50}]))
        );
        assert!(result.is_clean());
        assert!(result.changes.contains_path("openState[UP].openPercent"));
    }

    #[test]
    fn composite_keys() {
        let attributes = SchemaMap::new()
            .with("deviceTarget", FieldSchema::string().mandatory())
            .with("statusCode", FieldSchema::string().mandatory())
            .with("priority", FieldSchema::integer());
        let schema = SchemaMap::new().with(
            "currentStatusReport",
            FieldSchema::object_array(attributes, KeyedArray::new(["deviceTarget", "statusCode"]))
                .add_if_missing(),
        );
        let mut state = StateDocument::new();

        run(
            &schema,
            &mut state,
            json!({"currentStatusReport": [
                {"deviceTarget": "d1", "statusCode": "lowBattery", "priority": 1},
                {"deviceTarget": "d1", "statusCode": "jammed", "priority": 0}
            ]}),
        );
        let result = run(
            &schema,
            &mut state,
            json!({"currentStatusReport": {"deviceTarget": "d1", "statusCode": "jammed", "priority": 2}}),
        );

        assert_eq!(state.get("currentStatusReport").and_then(Value::as_array).map(Vec::len), Some(2));
        assert!(result.changes.contains_path("currentStatusReport[d1,jammed].priority"));
    }

    #[test]
    fn reconciled_leaves_input_untouched() {
        let schema = SchemaMap::new().with("on", FieldSchema::boolean());
        let state = doc(json!({"on": false}));

        let update = json!({"on": true});
        let (next, result) = reconciled(&schema, &state, update.as_object().unwrap());

        assert_eq!(state.get("on"), Some(&json!(false)));
        assert_eq!(next.get("on"), Some(&json!(true)));
        assert!(result.is_changed());
    }

    #[test]
    fn prune_removes_unknown_keys() {
        let schema = SchemaMap::new().with("on", FieldSchema::boolean());
        let mut state = doc(json!({"on": true, "brightness": 10}));

        let changes = prune(&schema, &mut state);

        assert_eq!(state.to_value(), json!({"on": true}));
        assert_eq!(changes.get("brightness"), Some(&Change::Removed));
    }
}
