// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device manager for coordinating many devices.
//!
//! The [`DeviceManager`] owns one [`DeviceContext`](crate::device::DeviceContext)
//! per device and routes every device's events to a shared
//! [`EventBus`](crate::event::EventBus).
//!
//! # Event Subscription
//!
//! ```no_run
//! use traitstate_lib::event::DeviceEvent;
//! use traitstate_lib::manager::DeviceManager;
//!
//! # async fn example() {
//! let manager = DeviceManager::new();
//! let mut events = manager.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             DeviceEvent::StateReported { device_id, changes, .. } => {
//!                 println!("Report {device_id}: {:?}", changes.paths());
//!             }
//!             DeviceEvent::PinPrompt { device_id, command, .. } => {
//!                 println!("Ask for the PIN of {device_id} to run {command}");
//!             }
//!             _ => {}
//!         }
//!     }
//! });
//! # }
//! ```

mod device_manager;

pub use device_manager::DeviceManager;
