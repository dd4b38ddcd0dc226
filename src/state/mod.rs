// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state documents and their reconciliation.
//!
//! - [`StateDocument`]: the current state of one device
//! - [`reconcile`]: validates and merges a partial update under a schema
//! - [`ChangeSet`]: what a reconciliation call changed
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use traitstate_lib::schema::{FieldSchema, SchemaMap};
//! use traitstate_lib::state::{reconcile, StateDocument};
//!
//! let schema = SchemaMap::new()
//!     .with("on", FieldSchema::boolean())
//!     .with("online", FieldSchema::boolean().mandatory().with_default(json!(true)));
//!
//! let mut state = StateDocument::new();
//! let update = json!({"on": false});
//! let result = reconcile(&schema, &mut state, update.as_object().unwrap());
//! assert_eq!(result.changes.paths(), vec!["on", "online"]);
//!
//! // Applying the same update again changes nothing.
//! let again = reconcile(&schema, &mut state, update.as_object().unwrap());
//! assert!(!again.is_changed());
//! ```

mod changes;
mod document;
mod reconcile;

pub use changes::{Change, ChangeSet};
pub use document::StateDocument;
pub use reconcile::{Reconciliation, prune, reconcile, reconciled};
