// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device configuration.

use serde::{Deserialize, Serialize};

use crate::challenge::{ChallengePolicy, ChallengeType};
use crate::traits::{Trait, TraitConfig, TraitSet};

/// Everything needed to build a device context.
///
/// # Examples
///
/// ```
/// use traitstate_lib::challenge::ChallengeType;
/// use traitstate_lib::device::DeviceConfig;
/// use traitstate_lib::traits::{Trait, TraitConfig, TraitSet};
///
/// let config = DeviceConfig::new("Front door", "action.devices.types.LOCK")
///     .with_trait(Trait::LockUnlock)
///     .with_challenge(Trait::LockUnlock, ChallengeType::PinNeeded, Some("1234"));
///
/// assert!(config.traits.contains(Trait::LockUnlock));
/// ```
///
/// Configurations also load from JSON, with every section optional:
///
/// ```
/// use traitstate_lib::device::DeviceConfig;
/// use traitstate_lib::traits::Trait;
///
/// let config: DeviceConfig = serde_json::from_str(r#"{
///     "name": "Hall thermostat",
///     "traits": ["TemperatureSetting"],
///     "trait_config": {"available_thermostat_modes": ["off", "heat"]},
///     "challenge_policy": {"TemperatureSetting": {"type": "ackNeeded"}}
/// }"#).unwrap();
///
/// assert!(config.traits.contains(Trait::TemperatureSetting));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Display name.
    pub name: String,
    /// Platform device type, e.g. `action.devices.types.LIGHT`.
    pub device_type: String,
    /// Enabled traits.
    pub traits: TraitSet,
    /// Per-trait configuration.
    pub trait_config: TraitConfig,
    /// Challenge settings per command category.
    pub challenge_policy: ChallengePolicy,
}

impl DeviceConfig {
    /// Creates a configuration with no traits.
    #[must_use]
    pub fn new(name: impl Into<String>, device_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device_type: device_type.into(),
            ..Self::default()
        }
    }

    /// Enables a trait.
    #[must_use]
    pub fn with_trait(mut self, t: Trait) -> Self {
        self.traits.set(t, true);
        self
    }

    /// Replaces the enabled traits.
    #[must_use]
    pub fn with_traits(mut self, traits: TraitSet) -> Self {
        self.traits = traits;
        self
    }

    /// Replaces the trait configuration.
    #[must_use]
    pub fn with_trait_config(mut self, trait_config: TraitConfig) -> Self {
        self.trait_config = trait_config;
        self
    }

    /// Replaces the challenge policy.
    #[must_use]
    pub fn with_challenge_policy(mut self, policy: ChallengePolicy) -> Self {
        self.challenge_policy = policy;
        self
    }

    /// Sets the challenge of one command category.
    #[must_use]
    pub fn with_challenge(
        mut self,
        category: Trait,
        challenge_type: ChallengeType,
        pin: Option<&str>,
    ) -> Self {
        self.challenge_policy
            .set(category, challenge_type, pin.map(str::to_string));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates() {
        let config = DeviceConfig::new("Lamp", "action.devices.types.LIGHT")
            .with_traits(TraitSet::color_light())
            .with_trait(Trait::Timer)
            .with_challenge(Trait::OnOff, ChallengeType::AckNeeded, None);

        assert_eq!(config.name, "Lamp");
        assert_eq!(config.traits.len(), 4);
        assert_eq!(
            config.challenge_policy.challenge_type(Trait::OnOff),
            ChallengeType::AckNeeded
        );
    }

    #[test]
    fn empty_json_is_default() {
        let config: DeviceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DeviceConfig::default());
    }
}
