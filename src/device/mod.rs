// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device contexts.
//!
//! A [`DeviceContext`] owns everything one device needs: its
//! [`DeviceConfig`], the schema built from it, the current state document
//! and the challenge policy. Every operation goes through the context, so
//! devices share nothing and can be driven from different threads as long
//! as each context is used by one caller at a time (the
//! [`DeviceManager`](crate::manager::DeviceManager) takes care of that).
//!
//! | Operation | Effect | Events |
//! |-----------|--------|--------|
//! | [`update_state`](DeviceContext::update_state) | reconciles a reported update | `StateReported` if changed |
//! | [`execute`](DeviceContext::execute) | dispatches a command, reconciles its proposal | `PinPrompt`, `StateReported` |
//! | [`reconfigure`](DeviceContext::reconfigure) | rebuilds the schema, prunes and fills state | `Reconfigured`, `StateReported` |

mod config;
mod context;

pub use config::DeviceConfig;
pub use context::{DeviceContext, Execution};
