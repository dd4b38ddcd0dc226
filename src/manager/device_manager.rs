// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry of device contexts.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::challenge::{Challenge, ChallengePolicy};
use crate::command::CommandParams;
use crate::device::{DeviceConfig, DeviceContext, Execution};
use crate::error::Error;
use crate::event::{DeviceEvent, DeviceId, EventBus};
use crate::state::{Reconciliation, StateDocument};
use crate::traits::{TraitConfig, TraitSet};

type SharedDevice = Arc<Mutex<DeviceContext>>;

/// Manager for many devices sharing one event bus.
///
/// Each device sits behind its own mutex: calls for one device are
/// serialized, calls for different devices run in parallel. The registry
/// lock is only held to look a device up.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use traitstate_lib::challenge::Challenge;
/// use traitstate_lib::device::DeviceConfig;
/// use traitstate_lib::manager::DeviceManager;
/// use traitstate_lib::traits::Trait;
///
/// # fn main() -> traitstate_lib::Result<()> {
/// let manager = DeviceManager::new();
/// let mut events = manager.subscribe();
///
/// let id = manager.add_device(DeviceConfig::new("Lamp", "action.devices.types.LIGHT").with_trait(Trait::OnOff));
/// let params = json!({"on": true});
/// manager.execute(id, "action.devices.commands.OnOff", params.as_object().unwrap(), &Challenge::none())?;
///
/// assert_eq!(manager.state(id)?.get("on"), Some(&json!(true)));
/// assert!(events.try_recv().unwrap().is_lifecycle());
/// assert!(events.try_recv().unwrap().is_state_report());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DeviceManager {
    devices: Arc<RwLock<HashMap<DeviceId, SharedDevice>>>,
    event_bus: EventBus,
}

impl DeviceManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::with_event_bus(EventBus::new())
    }

    /// Creates a manager with a custom event bus capacity.
    #[must_use]
    pub fn with_capacity(event_capacity: usize) -> Self {
        Self::with_event_bus(EventBus::with_capacity(event_capacity))
    }

    fn with_event_bus(event_bus: EventBus) -> Self {
        Self {
            devices: Arc::new(RwLock::new(HashMap::new())),
            event_bus,
        }
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Subscribes to the events of every managed device.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.event_bus.subscribe()
    }

    /// Returns the number of active event subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.event_bus.subscriber_count()
    }

    // =========================================================================
    // Device Management
    // =========================================================================

    /// Adds a device and returns its new ID.
    pub fn add_device(&self, config: DeviceConfig) -> DeviceId {
        let device_id = DeviceId::new();
        let name = config.name.clone();
        let context =
            DeviceContext::new(device_id, config).with_sink(Arc::new(self.event_bus.clone()));

        self.devices
            .write()
            .insert(device_id, Arc::new(Mutex::new(context)));
        tracing::info!(%device_id, name = %name, "Device added");

        self.event_bus.publish(DeviceEvent::device_added(device_id));
        device_id
    }

    /// Removes a device.
    ///
    /// Returns `true` if the device was found and removed.
    pub fn remove_device(&self, device_id: DeviceId) -> bool {
        let removed = self.devices.write().remove(&device_id).is_some();

        if removed {
            tracing::info!(%device_id, "Device removed");
            self.event_bus.publish(DeviceEvent::device_removed(device_id));
        }
        removed
    }

    /// Returns all device IDs.
    #[must_use]
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.read().keys().copied().collect()
    }

    /// Returns the number of managed devices.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }

    /// Returns `true` if the device is managed.
    #[must_use]
    pub fn contains(&self, device_id: DeviceId) -> bool {
        self.devices.read().contains_key(&device_id)
    }

    // =========================================================================
    // Device Operations
    // =========================================================================

    /// Returns a snapshot of a device's state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] for unknown devices.
    pub fn state(&self, device_id: DeviceId) -> Result<StateDocument, Error> {
        self.with_device(device_id, |d| d.state().clone())
    }

    /// Returns a copy of a device's configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] for unknown devices.
    pub fn config(&self, device_id: DeviceId) -> Result<DeviceConfig, Error> {
        self.with_device(device_id, |d| d.config().clone())
    }

    /// Returns a copy of a device's challenge policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] for unknown devices.
    pub fn policy(&self, device_id: DeviceId) -> Result<ChallengePolicy, Error> {
        self.with_device(device_id, |d| d.policy().clone())
    }

    /// Merges a state update reported by a device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] for unknown devices.
    pub fn update_state(
        &self,
        device_id: DeviceId,
        partial: &Map<String, Value>,
    ) -> Result<Reconciliation, Error> {
        self.with_device(device_id, |d| d.update_state(partial))
    }

    /// Executes a command on a device.
    ///
    /// A rejected command is not an error here; it is reported in the
    /// returned [`Execution`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] for unknown devices.
    pub fn execute(
        &self,
        device_id: DeviceId,
        command_id: &str,
        params: &CommandParams,
        challenge: &Challenge,
    ) -> Result<Execution, Error> {
        self.with_device(device_id, |d| d.execute(command_id, params, challenge))
    }

    /// Replaces a device's traits and trait configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] for unknown devices.
    pub fn reconfigure(
        &self,
        device_id: DeviceId,
        traits: TraitSet,
        trait_config: TraitConfig,
    ) -> Result<Reconciliation, Error> {
        self.with_device(device_id, |d| d.reconfigure(traits, trait_config))
    }

    fn with_device<T>(
        &self,
        device_id: DeviceId,
        f: impl FnOnce(&mut DeviceContext) -> T,
    ) -> Result<T, Error> {
        let device = self
            .devices
            .read()
            .get(&device_id)
            .cloned()
            .ok_or(Error::DeviceNotFound)?;
        let mut guard = device.lock();
        Ok(f(&mut guard))
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Trait;
    use serde_json::json;

    fn lamp() -> DeviceConfig {
        DeviceConfig::new("Lamp", "action.devices.types.LIGHT").with_traits(TraitSet::color_light())
    }

    #[test]
    fn new_manager_is_empty() {
        let manager = DeviceManager::new();

        assert_eq!(manager.device_count(), 0);
        assert!(manager.device_ids().is_empty());
    }

    #[tokio::test]
    async fn add_device_publishes_event() {
        let manager = DeviceManager::new();
        let mut events = manager.subscribe();

        let id = manager.add_device(lamp());

        let event = events.recv().await.unwrap();
        assert!(matches!(event, DeviceEvent::DeviceAdded { device_id } if device_id == id));
        assert!(manager.contains(id));
    }

    #[tokio::test]
    async fn remove_device_publishes_event() {
        let manager = DeviceManager::new();
        let id = manager.add_device(lamp());
        let mut events = manager.subscribe();

        assert!(manager.remove_device(id));
        assert_eq!(manager.device_count(), 0);

        let event = events.recv().await.unwrap();
        assert!(matches!(event, DeviceEvent::DeviceRemoved { device_id } if device_id == id));
    }

    #[test]
    fn unknown_device() {
        let manager = DeviceManager::new();
        let fake_id = DeviceId::new();

        assert!(!manager.remove_device(fake_id));
        assert!(matches!(manager.state(fake_id), Err(Error::DeviceNotFound)));
        assert!(matches!(
            manager.update_state(fake_id, &Map::new()),
            Err(Error::DeviceNotFound)
        ));
    }

    #[tokio::test]
    async fn state_report_reaches_subscribers() {
        let manager = DeviceManager::new();
        let id = manager.add_device(lamp());
        let mut events = manager.subscribe();

        let update = json!({"on": true, "brightness": 70});
        manager.update_state(id, update.as_object().unwrap()).unwrap();

        let DeviceEvent::StateReported { device_id, changes, state, .. } =
            events.recv().await.unwrap()
        else {
            panic!("expected a state report");
        };
        assert_eq!(device_id, id);
        assert!(changes.contains("brightness"));
        assert_eq!(state.get("on"), Some(&json!(true)));
    }

    #[test]
    fn devices_are_independent() {
        let manager = DeviceManager::new();
        let lamp_id = manager.add_device(lamp());
        let lock_id = manager.add_device(DeviceConfig::new("Door", "").with_trait(Trait::LockUnlock));

        let params = json!({"lock": true});
        let on_lamp = manager
            .execute(lamp_id, "LockUnlock", params.as_object().unwrap(), &Challenge::none())
            .unwrap();
        let on_lock = manager
            .execute(lock_id, "LockUnlock", params.as_object().unwrap(), &Challenge::none())
            .unwrap();

        assert!(!on_lamp.is_applied());
        assert!(on_lock.is_applied());
        assert!(manager.state(lamp_id).unwrap().get("isLocked").is_none());
    }

    #[test]
    fn parallel_devices() {
        let manager = DeviceManager::new();
        let ids: Vec<DeviceId> = (0..4).map(|_| manager.add_device(lamp())).collect();

        std::thread::scope(|scope| {
            for &id in &ids {
                let manager = &manager;
                scope.spawn(move || {
                    for level in 0..=100 {
                        let update = json!({"brightness": level});
                        manager.update_state(id, update.as_object().unwrap()).unwrap();
                    }
                });
            }
        });

        for id in ids {
            assert_eq!(manager.state(id).unwrap().get("brightness"), Some(&json!(100)));
        }
    }

    #[test]
    fn reconfigure_unknown_device() {
        let manager = DeviceManager::new();
        let result = manager.reconfigure(DeviceId::new(), TraitSet::new(), TraitConfig::default());
        assert!(matches!(result, Err(Error::DeviceNotFound)));
    }
}
