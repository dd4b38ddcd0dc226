// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `TraitState` Lib - device schemas, state reconciliation and command
//! dispatch for smart-home platform integrations.
//!
//! A device advertises a set of traits (`OnOff`, `ColorSetting`,
//! `TemperatureSetting`, ...). This library turns the enabled traits and
//! their configuration into a state schema, keeps each device's state
//! document valid against it, and maps platform commands to state changes.
//! It does no I/O: transports deliver already-parsed JSON values and receive
//! [`DeviceEvent`](event::DeviceEvent)s to forward.
//!
//! # Supported Features
//!
//! - **Schema building**: a declarative catalogue of 28 traits, shaped by
//!   the device's [`TraitConfig`](traits::TraitConfig)
//! - **State reconciliation**: coercion, ranges, allowed values, defaults,
//!   mandatory fields, mutually exclusive fields and keyed array upserts,
//!   with a [`ChangeSet`](state::ChangeSet) of what changed
//! - **Command dispatch**: one validating handler per platform command,
//!   proposing state for the reconciler
//! - **Challenges**: acknowledgement and PIN confirmation per command category
//! - **Device management**: per-device contexts and a manager with a
//!   broadcast event bus
//!
//! # Quick Start
//!
//! ```
//! use serde_json::json;
//! use traitstate_lib::challenge::Challenge;
//! use traitstate_lib::device::{DeviceConfig, DeviceContext};
//! use traitstate_lib::event::DeviceId;
//! use traitstate_lib::traits::{TraitConfig, TraitSet};
//!
//! let config = DeviceConfig::new("Hall", "action.devices.types.THERMOSTAT")
//!     .with_traits(TraitSet::thermostat())
//!     .with_trait_config(TraitConfig::default().with_thermostat_modes(["off", "heat", "cool"]));
//! let mut device = DeviceContext::new(DeviceId::new(), config);
//!
//! // State reported by the device
//! let report = json!({"thermostatMode": "off", "thermostatTemperatureAmbient": "19.5"});
//! device.update_state(report.as_object().unwrap());
//!
//! // Command from the platform
//! let params = json!({"thermostatMode": "heat"});
//! let execution = device.execute(
//!     "action.devices.commands.ThermostatSetMode",
//!     params.as_object().unwrap(),
//!     &Challenge::none(),
//! );
//!
//! assert!(execution.is_applied());
//! assert_eq!(device.state().get("thermostatMode"), Some(&json!("heat")));
//! assert_eq!(device.state().get("thermostatTemperatureAmbient"), Some(&json!(19.5)));
//! ```
//!
//! # Reconciling Without a Device
//!
//! ```
//! use serde_json::json;
//! use traitstate_lib::schema::build_schema;
//! use traitstate_lib::state::{StateDocument, reconcile};
//! use traitstate_lib::traits::{ColorModel, TraitConfig, TraitSet};
//!
//! let config = TraitConfig::default()
//!     .with_color_model(ColorModel::Rgb)
//!     .with_color_temperature(2000.0, 6500.0);
//! let schema = build_schema(&TraitSet::color_light(), &config);
//!
//! let mut state = StateDocument::new();
//! reconcile(&schema, &mut state, json!({"color": {"temperatureK": 2700}}).as_object().unwrap());
//! let result = reconcile(&schema, &mut state, json!({"color": {"spectrumRgb": 255}}).as_object().unwrap());
//!
//! assert!(result.is_clean());
//! assert_eq!(state.lookup("color.spectrumRgb"), Some(&json!(255)));
//! assert!(state.lookup("color.temperatureK").is_none());
//! ```

pub mod challenge;
pub mod command;
pub mod device;
pub mod error;
pub mod event;
pub mod manager;
pub mod schema;
pub mod state;
pub mod traits;
pub mod value;

pub use challenge::{Challenge, ChallengePolicy, ChallengeType};
pub use command::{Outcome, Proposal};
pub use device::{DeviceConfig, DeviceContext, Execution};
pub use error::{CommandError, Error, ErrorKind, Result, ValidationError};
pub use event::{DeviceEvent, DeviceId, EventBus, EventSink};
pub use manager::DeviceManager;
pub use schema::{FieldSchema, SchemaMap, build_schema};
pub use state::{ChangeSet, Reconciliation, StateDocument, reconcile};
pub use traits::{Trait, TraitConfig, TraitSet};
