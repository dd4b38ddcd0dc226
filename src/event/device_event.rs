// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::DeviceId;
use crate::state::{ChangeSet, StateDocument};
use crate::traits::Trait;

/// Events published by device contexts and the device manager.
///
/// `StateReported` and `PinPrompt` are the two outbound calls a host has to
/// forward to the platform: the state report after a change, and the
/// request to ask the user for a PIN.
///
/// # Examples
///
/// ```
/// use traitstate_lib::event::{DeviceEvent, DeviceId};
/// use traitstate_lib::traits::Trait;
///
/// let device_id = DeviceId::new();
/// let prompt = DeviceEvent::pin_prompt(device_id, "LockUnlock", Trait::LockUnlock);
///
/// assert_eq!(prompt.device_id(), device_id);
/// assert!(prompt.is_pin_prompt());
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// A device was registered.
    DeviceAdded {
        /// The new device.
        device_id: DeviceId,
    },

    /// A device was removed.
    DeviceRemoved {
        /// The removed device.
        device_id: DeviceId,
    },

    /// The device's traits or trait configuration changed and its schema
    /// was rebuilt.
    Reconfigured {
        /// The device.
        device_id: DeviceId,
        /// Keys pruned from the state because no enabled trait describes them.
        pruned: ChangeSet,
    },

    /// State should be reported to the platform.
    ///
    /// Published whenever a reconciliation changed the state, and after
    /// commands whose affected keys must be acknowledged even if unchanged.
    StateReported {
        /// The device.
        device_id: DeviceId,
        /// What changed; empty for a pure acknowledgement.
        changes: ChangeSet,
        /// Keys the command declared authoritative.
        affected_keys: BTreeSet<String>,
        /// The full state after the update.
        state: StateDocument,
        /// When the report was produced.
        at: DateTime<Utc>,
    },

    /// The user has to be asked for a PIN.
    PinPrompt {
        /// The device.
        device_id: DeviceId,
        /// The command waiting for the PIN.
        command: String,
        /// The challenge category of the command.
        category: Trait,
        /// When the prompt was raised.
        at: DateTime<Utc>,
    },
}

impl DeviceEvent {
    /// Returns the device the event is about.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        match self {
            Self::DeviceAdded { device_id }
            | Self::DeviceRemoved { device_id }
            | Self::Reconfigured { device_id, .. }
            | Self::StateReported { device_id, .. }
            | Self::PinPrompt { device_id, .. } => *device_id,
        }
    }

    /// Returns `true` for added/removed events.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::DeviceAdded { .. } | Self::DeviceRemoved { .. })
    }

    /// Returns `true` for state reports.
    #[must_use]
    pub fn is_state_report(&self) -> bool {
        matches!(self, Self::StateReported { .. })
    }

    /// Returns `true` for PIN prompts.
    #[must_use]
    pub fn is_pin_prompt(&self) -> bool {
        matches!(self, Self::PinPrompt { .. })
    }

    /// Creates a device added event.
    #[must_use]
    pub fn device_added(device_id: DeviceId) -> Self {
        Self::DeviceAdded { device_id }
    }

    /// Creates a device removed event.
    #[must_use]
    pub fn device_removed(device_id: DeviceId) -> Self {
        Self::DeviceRemoved { device_id }
    }

    /// Creates a reconfiguration event.
    #[must_use]
    pub fn reconfigured(device_id: DeviceId, pruned: ChangeSet) -> Self {
        Self::Reconfigured { device_id, pruned }
    }

    /// Creates a state report stamped with the current time.
    #[must_use]
    pub fn state_reported(
        device_id: DeviceId,
        changes: ChangeSet,
        affected_keys: BTreeSet<String>,
        state: StateDocument,
    ) -> Self {
        Self::StateReported {
            device_id,
            changes,
            affected_keys,
            state,
            at: Utc::now(),
        }
    }

    /// Creates a PIN prompt stamped with the current time.
    #[must_use]
    pub fn pin_prompt(device_id: DeviceId, command: impl Into<String>, category: Trait) -> Self {
        Self::PinPrompt {
            device_id,
            command: command.into(),
            category,
            at: Utc::now(),
        }
    }
}
