// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change sets produced by reconciliation.
//!
//! A [`ChangeSet`] names the keys a reconciliation call changed. Scalar
//! keys map to [`Change::Set`] or [`Change::Removed`]; objects and keyed
//! arrays nest the changes of their attributes and elements, so a
//! notification layer can tell `color.spectrumRgb` apart from
//! `color.temperatureK`, or which sensor of `currentSensorStateData` moved.
//!
//! # Examples
//!
//! ```
//! use traitstate_lib::state::{Change, ChangeSet};
//!
//! let mut nested = ChangeSet::new();
//! nested.record("spectrumRgb", Change::Set);
//! nested.record("temperatureK", Change::Removed);
//!
//! let mut changes = ChangeSet::new();
//! changes.record("color", Change::Nested(nested));
//!
//! assert!(changes.contains("color"));
//! assert_eq!(
//!     changes.paths(),
//!     vec!["color.spectrumRgb", "color.temperatureK"]
//! );
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

/// How one key changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    /// The value was written or replaced as a whole.
    Set,
    /// The key was removed.
    Removed,
    /// Attributes of a nested object changed.
    Nested(ChangeSet),
    /// Elements of a keyed array changed, by natural key.
    Elements(BTreeMap<String, ChangeSet>),
}

/// Keys changed by one reconciliation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, Change>);

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a change, replacing any earlier record for the key.
    pub fn record(&mut self, key: impl Into<String>, change: Change) {
        self.0.insert(key.into(), change);
    }

    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of changed keys at this level.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether a key at this level changed.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the change recorded for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Change> {
        self.0.get(key)
    }

    /// Iterates changed keys at this level.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates recorded changes.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Change)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Flattens the change set into leaf paths.
    ///
    /// Object attributes are joined with `.`, keyed array elements are
    /// written as `key[element]`.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_paths("", &mut out);
        out
    }

    /// Returns whether a leaf path (as produced by [`paths`](Self::paths))
    /// changed.
    #[must_use]
    pub fn contains_path(&self, path: &str) -> bool {
        self.paths().iter().any(|p| p == path)
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (key, change) in &self.0 {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match change {
                Change::Set | Change::Removed => out.push(path),
                Change::Nested(nested) => nested.collect_paths(&path, out),
                Change::Elements(elements) => {
                    for (element, nested) in elements {
                        nested.collect_paths(&format!("{path}[{element}]"), out);
                    }
                }
            }
        }
    }
}
