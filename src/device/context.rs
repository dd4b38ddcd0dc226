// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-device context.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::challenge::{Challenge, ChallengePolicy};
use crate::command::{self, CommandContext, CommandParams, Dispatcher, Outcome};
use crate::event::{DeviceEvent, DeviceId, EventBus, EventSink};
use crate::schema::{SchemaMap, build_schema};
use crate::state::{self, Reconciliation, StateDocument};
use crate::traits::{TraitConfig, TraitSet};

use super::DeviceConfig;

/// Result of [`DeviceContext::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// What the dispatcher decided.
    pub outcome: Outcome,
    /// How the proposal was applied; `None` unless the command was applied.
    pub reconciliation: Option<Reconciliation>,
}

impl Execution {
    /// Returns `true` if the command was applied.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.outcome.is_applied()
    }
}

/// One device: configuration, schema, state and challenge policy.
///
/// All operations take `&mut self`; a context is never shared between two
/// concurrent calls. Events go to the context's [`EventSink`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use traitstate_lib::challenge::Challenge;
/// use traitstate_lib::device::{DeviceConfig, DeviceContext};
/// use traitstate_lib::event::{DeviceId, EventLog};
/// use traitstate_lib::traits::TraitSet;
///
/// let log = EventLog::new();
/// let config = DeviceConfig::new("Lamp", "action.devices.types.LIGHT")
///     .with_traits(TraitSet::color_light());
/// let mut device = DeviceContext::new(DeviceId::new(), config).with_sink(Arc::new(log.clone()));
///
/// let params = json!({"brightness": 40});
/// let execution = device.execute("BrightnessAbsolute", params.as_object().unwrap(), &Challenge::none());
///
/// assert!(execution.is_applied());
/// assert_eq!(device.state().get("brightness"), Some(&json!(40)));
/// assert_eq!(log.len(), 1);
/// ```
pub struct DeviceContext {
    id: DeviceId,
    config: DeviceConfig,
    schema: SchemaMap,
    state: StateDocument,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("traits", &self.config.traits)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl DeviceContext {
    /// Creates a context and fills the initial state with defaults.
    ///
    /// Events go to a private [`EventBus`] until [`with_sink`](Self::with_sink)
    /// replaces it.
    #[must_use]
    pub fn new(id: DeviceId, config: DeviceConfig) -> Self {
        let schema = build_schema(&config.traits, &config.trait_config);
        let mut state = StateDocument::new();
        let initial = state::reconcile(&schema, &mut state, &Map::new());
        tracing::debug!(
            device_id = %id,
            fields = schema.len(),
            defaults = initial.changes.len(),
            "Device context created"
        );

        Self {
            id,
            config,
            schema,
            state,
            sink: Arc::new(EventBus::new()),
        }
    }

    /// Routes this device's events to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the device ID.
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Returns the device configuration.
    #[must_use]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Returns the schema built from the current configuration.
    #[must_use]
    pub fn schema(&self) -> &SchemaMap {
        &self.schema
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> &StateDocument {
        &self.state
    }

    /// Returns the challenge policy.
    #[must_use]
    pub fn policy(&self) -> &ChallengePolicy {
        &self.config.challenge_policy
    }

    /// Lists the commands this device accepts.
    #[must_use]
    pub fn supported_commands(&self) -> Vec<String> {
        command::supported_commands(&self.config.traits, &self.config.trait_config)
    }

    /// Merges a state update reported by the device.
    ///
    /// Publishes a state report if anything changed.
    pub fn update_state(&mut self, partial: &Map<String, Value>) -> Reconciliation {
        let result = state::reconcile(&self.schema, &mut self.state, partial);
        if result.is_changed() {
            self.report(&result, BTreeSet::new());
        }
        result
    }

    /// Executes a platform command.
    ///
    /// An applied proposal is reconciled into the state and reported, even
    /// when nothing changed but the command named keys to acknowledge.
    /// Rejected and challenge-blocked commands leave the state untouched.
    pub fn execute(
        &mut self,
        command_id: &str,
        params: &CommandParams,
        challenge: &Challenge,
    ) -> Execution {
        let outcome = {
            let context =
                CommandContext::new(&self.config.traits, &self.config.trait_config, &self.state);
            let mut dispatcher = Dispatcher::new(
                self.id,
                context,
                &mut self.config.challenge_policy,
                self.sink.as_ref(),
            );
            dispatcher.dispatch(command_id, params, challenge)
        };

        let Outcome::Applied(proposal) = &outcome else {
            return Execution {
                outcome,
                reconciliation: None,
            };
        };

        let result = state::reconcile(&self.schema, &mut self.state, proposal.delta());
        let affected: BTreeSet<String> = proposal
            .affected_keys()
            .iter()
            .filter(|k| self.schema.contains_key(k))
            .cloned()
            .collect();
        if result.is_changed() || !affected.is_empty() {
            self.report(&result, affected);
        }

        Execution {
            outcome,
            reconciliation: Some(result),
        }
    }

    /// Replaces the traits and trait configuration.
    ///
    /// Rebuilds the schema, removes state keys it no longer describes and
    /// fills defaults of newly enabled fields. Returns both kinds of change
    /// as one reconciliation.
    pub fn reconfigure(&mut self, traits: TraitSet, trait_config: TraitConfig) -> Reconciliation {
        self.config.traits = traits;
        self.config.trait_config = trait_config;
        self.schema = build_schema(&self.config.traits, &self.config.trait_config);

        let pruned = state::prune(&self.schema, &mut self.state);
        let mut result = state::reconcile(&self.schema, &mut self.state, &Map::new());
        tracing::info!(
            device_id = %self.id,
            traits = self.config.traits.len(),
            pruned = pruned.len(),
            filled = result.changes.len(),
            "Device reconfigured"
        );

        self.sink.emit(DeviceEvent::reconfigured(self.id, pruned.clone()));
        for (key, change) in pruned.iter() {
            result.changes.record(key, change.clone());
        }
        if result.is_changed() {
            self.report(&result, BTreeSet::new());
        }
        result
    }

    fn report(&self, result: &Reconciliation, affected_keys: BTreeSet<String>) {
        tracing::debug!(
            device_id = %self.id,
            changed = result.changes.len(),
            affected = affected_keys.len(),
            "Reporting state"
        );
        self.sink.emit(DeviceEvent::state_reported(
            self.id,
            result.changes.clone(),
            affected_keys,
            self.state.clone(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{ChallengeKind, ChallengeType};
    use crate::error::ErrorKind;
    use crate::event::EventLog;
    use crate::traits::Trait;
    use serde_json::json;

    fn device(config: DeviceConfig) -> (DeviceContext, EventLog) {
        let log = EventLog::new();
        let context = DeviceContext::new(DeviceId::new(), config).with_sink(Arc::new(log.clone()));
        (context, log)
    }

    fn params(value: Value) -> CommandParams {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn initial_state_has_defaults() {
        let (context, log) = device(DeviceConfig::new("Washer", "").with_trait(Trait::StartStop));
        assert_eq!(context.state().get("online"), Some(&json!(true)));
        assert_eq!(context.state().get("isRunning"), Some(&json!(false)));
        assert!(log.is_empty());
    }

    #[test]
    fn update_reports_only_changes() {
        let (mut context, log) = device(DeviceConfig::new("Lamp", "").with_trait(Trait::OnOff));

        let result = context.update_state(&params(json!({"on": true})));
        assert!(result.changes.contains("on"));
        assert_eq!(log.count(DeviceEvent::is_state_report), 1);

        let again = context.update_state(&params(json!({"on": true})));
        assert!(!again.is_changed());
        assert_eq!(log.count(DeviceEvent::is_state_report), 1);
    }

    #[test]
    fn unchanged_command_is_acknowledged() {
        let config = DeviceConfig::new("Lamp", "").with_trait(Trait::OnOff);
        let (mut context, log) = device(config);
        context.update_state(&params(json!({"on": true})));
        log.take();

        let execution = context.execute("OnOff", &params(json!({"on": true})), &Challenge::none());
        assert!(execution.is_applied());
        assert!(!execution.reconciliation.unwrap().is_changed());

        let events = log.take();
        assert_eq!(events.len(), 1);
        let DeviceEvent::StateReported { affected_keys, .. } = &events[0] else {
            panic!("expected a state report");
        };
        assert!(affected_keys.contains("on"));
    }

    #[test]
    fn blocked_command_leaves_state() {
        let config = DeviceConfig::new("Door", "")
            .with_trait(Trait::LockUnlock)
            .with_challenge(Trait::LockUnlock, ChallengeType::AckNeeded, None);
        let (mut context, log) = device(config);
        let before = context.state().clone();

        let execution = context.execute("LockUnlock", &params(json!({"lock": true})), &Challenge::none());

        assert_eq!(execution.outcome, Outcome::ChallengeRequired(ChallengeKind::AckNeeded));
        assert!(execution.reconciliation.is_none());
        assert_eq!(context.state(), &before);
        assert!(log.is_empty());
    }

    #[test]
    fn rejected_command_leaves_state() {
        let (mut context, _) = device(DeviceConfig::new("Lamp", "").with_traits(TraitSet::color_light()));
        let before = context.state().clone();

        let execution =
            context.execute("BrightnessAbsolute", &params(json!({"brightness": 150})), &Challenge::none());
        assert_eq!(execution.outcome.error_kind(), Some(ErrorKind::OutOfRange));
        assert_eq!(context.state(), &before);
    }

    #[test]
    fn set_challenge_updates_policy() {
        let (mut context, _) = device(DeviceConfig::new("Door", "").with_trait(Trait::LockUnlock));
        context.execute(
            "SetChallenge",
            &params(json!({"category": "LockUnlock", "type": "ackNeeded"})),
            &Challenge::none(),
        );
        assert_eq!(context.policy().challenge_type(Trait::LockUnlock), ChallengeType::AckNeeded);
    }

    #[test]
    fn reconfigure_prunes_and_fills() {
        let config = DeviceConfig::new("Lamp", "").with_traits(TraitSet::color_light());
        let (mut context, log) = device(config);
        context.update_state(&params(json!({"on": true, "brightness": 30})));
        log.take();

        let result = context.reconfigure(
            TraitSet::new().with(Trait::OnOff).with(Trait::StartStop),
            TraitConfig::default(),
        );

        assert!(context.state().get("brightness").is_none());
        assert_eq!(context.state().get("isRunning"), Some(&json!(false)));
        assert!(result.changes.contains("brightness"));
        assert!(result.changes.contains("isRunning"));

        let events = log.take();
        assert!(matches!(events[0], DeviceEvent::Reconfigured { .. }));
        assert!(events[1].is_state_report());
    }
}
