// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State schemas.
//!
//! A [`SchemaMap`] describes the legal shape of a device's state document:
//! one [`FieldSchema`] per state key, with its [`FieldKind`], bounds,
//! allowed values, default and mutually exclusive siblings. Object and
//! array kinds nest their own schema maps.
//!
//! Schemas are normally produced by [`build_schema`] from the trait
//! catalogue, but can be assembled by hand for custom state:
//!
//! ```
//! use traitstate_lib::schema::{FieldSchema, KeyedArray, SchemaMap};
//!
//! let sensor = SchemaMap::new()
//!     .with("name", FieldSchema::string().mandatory().trim())
//!     .with("value", FieldSchema::float());
//!
//! let schema = SchemaMap::new()
//!     .with("online", FieldSchema::boolean().mandatory())
//!     .with(
//!         "sensors",
//!         FieldSchema::object_array(sensor, KeyedArray::new(["name"])).add_if_missing(),
//!     );
//! assert_eq!(schema.len(), 2);
//! ```

mod builder;
mod catalogue;
mod field;

pub use builder::build_schema;
pub use field::{FieldKind, FieldSchema, KeyValidator, KeyedArray, SchemaMap};
