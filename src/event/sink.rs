// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event sinks.

use std::sync::Arc;

use parking_lot::Mutex;

use super::DeviceEvent;

/// Destination of outbound device events.
///
/// Device contexts and the challenge guard publish through this trait, so a
/// host can route reports straight to its transport, and tests can record
/// them.
pub trait EventSink: Send + Sync {
    /// Delivers one event. Must not block.
    fn emit(&self, event: DeviceEvent);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn emit(&self, event: DeviceEvent) {
        (**self).emit(event);
    }
}

/// An [`EventSink`] that keeps every event in memory.
///
/// Clones share the same log.
///
/// # Examples
///
/// ```
/// use traitstate_lib::event::{DeviceEvent, DeviceId, EventLog, EventSink};
///
/// let log = EventLog::new();
/// log.emit(DeviceEvent::device_added(DeviceId::new()));
///
/// assert_eq!(log.len(), 1);
/// assert_eq!(log.take().len(), 1);
/// assert!(log.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<DeviceEvent>>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events.lock().clone()
    }

    /// Removes and returns the recorded events.
    #[must_use]
    pub fn take(&self) -> Vec<DeviceEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Counts recorded events matching a predicate.
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&DeviceEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|&e| predicate(e)).count()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: DeviceEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DeviceId;

    #[test]
    fn clones_share_events() {
        let log = EventLog::new();
        let other = log.clone();
        other.emit(DeviceEvent::device_added(DeviceId::new()));

        assert_eq!(log.len(), 1);
        assert_eq!(log.count(DeviceEvent::is_lifecycle), 1);
        assert_eq!(log.count(DeviceEvent::is_pin_prompt), 0);
    }

    #[test]
    fn arc_forwards() {
        let log = EventLog::new();
        let sink: Arc<dyn EventSink> = Arc::new(log.clone());
        sink.emit(DeviceEvent::device_removed(DeviceId::new()));

        assert_eq!(log.events().len(), 1);
    }
}
