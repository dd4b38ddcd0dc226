// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound device events.
//!
//! Device contexts publish [`DeviceEvent`]s through an [`EventSink`]:
//! state reports whenever a reconciliation changed something, and PIN
//! prompts raised by the challenge guard. [`EventBus`] fans events out over
//! a tokio broadcast channel; [`EventLog`] records them in memory.
//!
//! # Examples
//!
//! ```
//! use traitstate_lib::event::{DeviceEvent, DeviceId, EventBus};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(DeviceEvent::device_added(DeviceId::new()));
//! assert!(rx.try_recv().unwrap().is_lifecycle());
//! ```

mod device_event;
mod device_id;
mod event_bus;
mod sink;

pub use device_event::DeviceEvent;
pub use device_id::DeviceId;
pub use event_bus::EventBus;
pub use sink::{EventLog, EventSink};
