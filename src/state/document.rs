// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-device state document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current state of a device, keyed by state key.
///
/// The document is read-only to callers; it changes only through
/// [`reconcile`](super::reconcile), which keeps it conforming to the
/// device's schema.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use traitstate_lib::schema::{FieldSchema, SchemaMap};
/// use traitstate_lib::state::{reconcile, StateDocument};
///
/// let schema = SchemaMap::new().with("on", FieldSchema::boolean());
/// let mut state = StateDocument::new();
/// let update = json!({"on": true});
/// reconcile(&schema, &mut state, update.as_object().unwrap());
///
/// assert_eq!(state.get("on"), Some(&json!(true)));
/// assert_eq!(state.to_value(), json!({"on": true}));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDocument(Map<String, Value>);

impl StateDocument {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Follows a dotted path through nested objects.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut value = self.0.get(segments.next()?)?;
        for segment in segments {
            value = value.as_object()?.get(segment)?;
        }
        Some(value)
    }

    /// Returns whether the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the document is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Returns a copy of the present keys among `keys`.
    #[must_use]
    pub fn select<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Map<String, Value> {
        keys.into_iter()
            .filter_map(|k| self.0.get(k).map(|v| (k.to_string(), v.clone())))
            .collect()
    }

    /// Returns the document as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub(crate) fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }
}

impl From<StateDocument> for Value {
    fn from(doc: StateDocument) -> Self {
        Value::Object(doc.0)
    }
}
