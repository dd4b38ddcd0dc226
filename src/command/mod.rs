// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command dispatch.
//!
//! The [`Dispatcher`] maps a platform command (`action.devices.commands.X`
//! or bare `X`) and its parameters to an [`Outcome`]:
//!
//! 1. unknown commands are rejected with `UnknownCommand`
//! 2. commands of a trait the device lacks (or reports only) are rejected
//!    with `FunctionNotSupported`
//! 3. the [`ChallengeGuard`] may block the command
//! 4. the command's handler validates its parameters against the device's
//!    configuration and proposes state values
//!
//! Handlers never touch the state. A [`Proposal`] is a partial update for
//! the state reconciler plus the keys to acknowledge.
//!
//! # Available commands
//!
//! | Trait | Commands |
//! |-------|----------|
//! | OnOff | `OnOff` |
//! | Brightness | `BrightnessAbsolute`, `BrightnessRelative` |
//! | ColorSetting | `ColorAbsolute` |
//! | TemperatureSetting | `ThermostatTemperatureSetpoint`, `ThermostatTemperatureSetRange`, `ThermostatSetMode`, `TemperatureRelative` |
//! | TemperatureControl | `SetTemperature` |
//! | HumiditySetting | `SetHumidity`, `HumidityRelative` |
//! | FanSpeed | `SetFanSpeed`, `SetFanSpeedRelative` |
//! | Modes / Toggles | `SetModes` / `SetToggles` |
//! | OpenClose | `OpenClose`, `OpenCloseRelative` |
//! | Volume | `setVolume`, `volumeRelative`, `mute` |
//! | InputSelector | `SetInput`, `NextInput`, `PreviousInput` |
//! | AppSelector | `appSelect` |
//! | Channel | `selectChannel`, `relativeChannel`, `returnChannel` |
//! | StartStop | `StartStop`, `PauseUnpause` |
//! | LockUnlock / ArmDisarm | `LockUnlock` / `ArmDisarm` |
//! | Timer | `TimerStart`, `TimerAdjust`, `TimerPause`, `TimerResume`, `TimerCancel` |
//! | Rotation | `RotateAbsolute` |
//! | EnergyStorage / Dock | `Charge` / `Dock` |
//! | Locator / Reboot / Scene | `Locate` / `Reboot` / `ActivateScene` |
//! | TransportControl | `mediaStop`, `mediaPause`, `mediaResume` |
//!
//! `SetChallenge` (`category`, `type`, optional `pin`) changes the
//! device's challenge policy and is never challenge-gated itself.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use traitstate_lib::challenge::{Challenge, ChallengePolicy};
//! use traitstate_lib::command::{CommandContext, Dispatcher, Outcome};
//! use traitstate_lib::event::{DeviceId, EventLog};
//! use traitstate_lib::state::StateDocument;
//! use traitstate_lib::traits::{TraitConfig, TraitSet};
//!
//! let traits = TraitSet::thermostat();
//! let config = TraitConfig::default().with_thermostat_modes(["off", "heat", "cool"]);
//! let state = StateDocument::new();
//! let mut policy = ChallengePolicy::new();
//! let log = EventLog::new();
//!
//! let context = CommandContext::new(&traits, &config, &state);
//! let mut dispatcher = Dispatcher::new(DeviceId::new(), context, &mut policy, &log);
//!
//! let params = json!({"thermostatMode": "heat"});
//! let outcome = dispatcher.dispatch(
//!     "action.devices.commands.ThermostatSetMode",
//!     params.as_object().unwrap(),
//!     &Challenge::none(),
//! );
//! let Outcome::Applied(proposal) = outcome else { panic!("not applied") };
//! assert_eq!(proposal.delta()["thermostatMode"], json!("heat"));
//! ```

mod appliance;
mod climate;
mod lighting;
mod media;
mod params;
mod position;
mod security;
mod settings;

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::challenge::{
    Challenge, ChallengeGuard, ChallengeKind, ChallengePolicy, ChallengeType, Verdict,
};
use crate::error::{CommandError, ErrorKind};
use crate::event::{DeviceId, EventSink};
use crate::state::StateDocument;
use crate::traits::{Trait, TraitConfig, TraitSet};

/// Prefix of platform command identifiers.
pub const COMMAND_PREFIX: &str = "action.devices.commands.";

/// Name of the administrative command changing the challenge policy.
pub const SET_CHALLENGE: &str = "SetChallenge";

/// Command parameters as received from the platform.
pub type CommandParams = Map<String, Value>;

/// State values proposed by a command.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use traitstate_lib::command::Proposal;
///
/// let proposal = Proposal::new().set("on", true).acknowledge("brightness");
/// assert_eq!(proposal.delta()["on"], json!(true));
/// assert!(proposal.affected_keys().contains("brightness"));
/// assert!(!proposal.delta().contains_key("brightness"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Proposal {
    delta: Map<String, Value>,
    affected_keys: BTreeSet<String>,
}

impl Proposal {
    /// Creates an empty proposal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Proposes a value for a state key.
    #[must_use]
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Proposes a value for a state key in place.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.delta.insert(key.to_string(), value.into());
        self.affected_keys.insert(key.to_string());
    }

    /// Marks a key to report even though no value is proposed for it.
    #[must_use]
    pub fn acknowledge(mut self, key: &str) -> Self {
        self.affected_keys.insert(key.to_string());
        self
    }

    /// Returns the proposed partial update.
    #[must_use]
    pub fn delta(&self) -> &Map<String, Value> {
        &self.delta
    }

    /// Returns the keys the command considers authoritative.
    #[must_use]
    pub fn affected_keys(&self) -> &BTreeSet<String> {
        &self.affected_keys
    }

    /// Returns `true` if the command proposes no state at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delta.is_empty() && self.affected_keys.is_empty()
    }

    /// Splits the proposal into delta and affected keys.
    #[must_use]
    pub fn into_parts(self) -> (Map<String, Value>, BTreeSet<String>) {
        (self.delta, self.affected_keys)
    }
}

/// Result of dispatching a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The command was accepted; its proposal still has to be reconciled.
    Applied(Proposal),
    /// The command was refused; nothing may be applied.
    Rejected(CommandError),
    /// The command waits for a challenge answer.
    ChallengeRequired(ChallengeKind),
}

impl Outcome {
    /// Returns `true` for [`Outcome::Applied`].
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Returns the proposal of an applied command.
    #[must_use]
    pub fn proposal(&self) -> Option<&Proposal> {
        match self {
            Self::Applied(proposal) => Some(proposal),
            _ => None,
        }
    }

    /// Returns the error kind to surface, if the command did not apply.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Applied(_) => None,
            Self::Rejected(error) => Some(error.kind()),
            Self::ChallengeRequired(kind) => Some(kind.kind()),
        }
    }
}

/// Read-only view of a device handed to command handlers.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    /// Enabled traits.
    pub traits: &'a TraitSet,
    /// Trait configuration.
    pub config: &'a TraitConfig,
    /// Current state, for relative commands.
    pub state: &'a StateDocument,
}

impl<'a> CommandContext<'a> {
    /// Creates a context.
    #[must_use]
    pub fn new(traits: &'a TraitSet, config: &'a TraitConfig, state: &'a StateDocument) -> Self {
        Self {
            traits,
            config,
            state,
        }
    }

    fn number(&self, key: &str) -> Option<f64> {
        self.state.get(key)?.as_f64()
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.state.get(key)?.as_str()
    }
}

type Handler = fn(&CommandContext<'_>, &CommandParams) -> Result<Proposal, CommandError>;

/// An entry of the command table.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    /// Command name without prefix.
    pub name: &'static str,
    /// Trait the command belongs to; also its challenge category.
    pub category: Trait,
    handler: Handler,
}

impl CommandSpec {
    /// Returns the fully qualified platform identifier.
    #[must_use]
    pub fn platform_id(&self) -> String {
        format!("{COMMAND_PREFIX}{}", self.name)
    }
}

const fn command(name: &'static str, category: Trait, handler: Handler) -> CommandSpec {
    CommandSpec {
        name,
        category,
        handler,
    }
}

const COMMANDS: &[CommandSpec] = &[
    command("OnOff", Trait::OnOff, lighting::on_off),
    command("BrightnessAbsolute", Trait::Brightness, lighting::brightness_absolute),
    command("BrightnessRelative", Trait::Brightness, lighting::brightness_relative),
    command("ColorAbsolute", Trait::ColorSetting, lighting::color_absolute),
    command(
        "ThermostatTemperatureSetpoint",
        Trait::TemperatureSetting,
        climate::thermostat_setpoint,
    ),
    command(
        "ThermostatTemperatureSetRange",
        Trait::TemperatureSetting,
        climate::thermostat_set_range,
    ),
    command("ThermostatSetMode", Trait::TemperatureSetting, climate::thermostat_set_mode),
    command("TemperatureRelative", Trait::TemperatureSetting, climate::temperature_relative),
    command("SetTemperature", Trait::TemperatureControl, climate::set_temperature),
    command("SetHumidity", Trait::HumiditySetting, climate::set_humidity),
    command("HumidityRelative", Trait::HumiditySetting, climate::humidity_relative),
    command("SetFanSpeed", Trait::FanSpeed, climate::set_fan_speed),
    command("SetFanSpeedRelative", Trait::FanSpeed, climate::set_fan_speed_relative),
    command("SetModes", Trait::Modes, settings::set_modes),
    command("SetToggles", Trait::Toggles, settings::set_toggles),
    command("OpenClose", Trait::OpenClose, position::open_close),
    command("OpenCloseRelative", Trait::OpenClose, position::open_close_relative),
    command("RotateAbsolute", Trait::Rotation, position::rotate_absolute),
    command("setVolume", Trait::Volume, media::set_volume),
    command("volumeRelative", Trait::Volume, media::volume_relative),
    command("mute", Trait::Volume, media::mute),
    command("SetInput", Trait::InputSelector, media::set_input),
    command("NextInput", Trait::InputSelector, media::next_input),
    command("PreviousInput", Trait::InputSelector, media::previous_input),
    command("appSelect", Trait::AppSelector, media::app_select),
    command("selectChannel", Trait::Channel, media::select_channel),
    command("relativeChannel", Trait::Channel, media::relative_channel),
    command("returnChannel", Trait::Channel, media::return_channel),
    command("mediaStop", Trait::TransportControl, media::media_stop),
    command("mediaPause", Trait::TransportControl, media::media_pause),
    command("mediaResume", Trait::TransportControl, media::media_resume),
    command("StartStop", Trait::StartStop, appliance::start_stop),
    command("PauseUnpause", Trait::StartStop, appliance::pause_unpause),
    command("TimerStart", Trait::Timer, appliance::timer_start),
    command("TimerAdjust", Trait::Timer, appliance::timer_adjust),
    command("TimerPause", Trait::Timer, appliance::timer_pause),
    command("TimerResume", Trait::Timer, appliance::timer_resume),
    command("TimerCancel", Trait::Timer, appliance::timer_cancel),
    command("Charge", Trait::EnergyStorage, appliance::charge),
    command("Dock", Trait::Dock, appliance::dock),
    command("Locate", Trait::Locator, appliance::locate),
    command("Reboot", Trait::Reboot, appliance::reboot),
    command("ActivateScene", Trait::Scene, appliance::activate_scene),
    command("LockUnlock", Trait::LockUnlock, security::lock_unlock),
    command("ArmDisarm", Trait::ArmDisarm, security::arm_disarm),
];

/// Strips the platform prefix from a command identifier.
#[must_use]
pub fn command_name(command_id: &str) -> &str {
    let id = command_id.trim();
    id.strip_prefix(COMMAND_PREFIX).unwrap_or(id)
}

/// Looks up a command by platform identifier or bare name.
#[must_use]
pub fn lookup(command_id: &str) -> Option<&'static CommandSpec> {
    let name = command_name(command_id);
    COMMANDS.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

/// Iterates the command table.
pub fn commands() -> impl Iterator<Item = &'static CommandSpec> {
    COMMANDS.iter()
}

/// Lists the platform identifiers a device accepts.
#[must_use]
pub fn supported_commands(traits: &TraitSet, config: &TraitConfig) -> Vec<String> {
    COMMANDS
        .iter()
        .filter(|c| traits.contains(c.category) && !config.is_query_only(c.category))
        .map(CommandSpec::platform_id)
        .collect()
}

/// Dispatches commands for one device.
pub struct Dispatcher<'a> {
    device_id: DeviceId,
    context: CommandContext<'a>,
    policy: &'a mut ChallengePolicy,
    sink: &'a dyn EventSink,
}

impl<'a> Dispatcher<'a> {
    /// Creates a dispatcher. PIN prompts are published to `sink`.
    #[must_use]
    pub fn new(
        device_id: DeviceId,
        context: CommandContext<'a>,
        policy: &'a mut ChallengePolicy,
        sink: &'a dyn EventSink,
    ) -> Self {
        Self {
            device_id,
            context,
            policy,
            sink,
        }
    }

    /// Dispatches one command.
    pub fn dispatch(
        &mut self,
        command_id: &str,
        params: &CommandParams,
        challenge: &Challenge,
    ) -> Outcome {
        let name = command_name(command_id);
        if name.eq_ignore_ascii_case(SET_CHALLENGE) {
            return match self.set_challenge(params) {
                Ok(()) => Outcome::Applied(Proposal::new()),
                Err(error) => Outcome::Rejected(error),
            };
        }

        let Some(spec) = lookup(name) else {
            tracing::debug!(device_id = %self.device_id, command = name, "Unknown command");
            return Outcome::Rejected(CommandError::UnknownCommand(name.to_string()));
        };

        let category = spec.category;
        if !self.context.traits.contains(category) || self.context.config.is_query_only(category) {
            tracing::debug!(
                device_id = %self.device_id,
                command = spec.name,
                category = %category,
                "Command trait not enabled"
            );
            return Outcome::Rejected(CommandError::FunctionNotSupported {
                command: spec.name.to_string(),
            });
        }

        let guard = ChallengeGuard::new(self.device_id, self.policy, self.sink);
        match guard.check(spec.name, category, challenge) {
            Verdict::Proceed => {}
            Verdict::Required(kind) => return Outcome::ChallengeRequired(kind),
            Verdict::Rejected(error) => return Outcome::Rejected(error),
        }

        match (spec.handler)(&self.context, params) {
            Ok(proposal) => {
                tracing::debug!(
                    device_id = %self.device_id,
                    command = spec.name,
                    keys = proposal.delta().len(),
                    "Command applied"
                );
                Outcome::Applied(proposal)
            }
            Err(error) => {
                tracing::debug!(
                    device_id = %self.device_id,
                    command = spec.name,
                    error = %error,
                    "Command rejected"
                );
                Outcome::Rejected(error)
            }
        }
    }

    fn set_challenge(&mut self, params: &CommandParams) -> Result<(), CommandError> {
        let category: Trait = params::text(params, "category")?
            .parse()
            .map_err(|_| CommandError::invalid("category", "unknown trait"))?;
        let challenge_type: ChallengeType = params::text(params, "type")?
            .parse()
            .map_err(|_| CommandError::invalid("type", "expected none, ackNeeded or pinNeeded"))?;
        let pin = params::opt_text(params, "pin")?;

        if challenge_type == ChallengeType::PinNeeded && pin.is_none() {
            tracing::warn!(
                device_id = %self.device_id,
                category = %category,
                "PIN challenge set without a PIN"
            );
        }
        self.policy.set(category, challenge_type, pin);
        tracing::info!(
            device_id = %self.device_id,
            category = %category,
            challenge = %challenge_type,
            "Challenge policy changed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DeviceEvent, EventLog};
    use serde_json::json;

    struct Fixture {
        traits: TraitSet,
        config: TraitConfig,
        state: StateDocument,
        policy: ChallengePolicy,
        log: EventLog,
    }

    impl Fixture {
        fn new(traits: TraitSet, config: TraitConfig) -> Self {
            Self {
                traits,
                config,
                state: StateDocument::new(),
                policy: ChallengePolicy::new(),
                log: EventLog::new(),
            }
        }

        fn dispatch(&mut self, command: &str, params: Value, challenge: &Challenge) -> Outcome {
            let context = CommandContext::new(&self.traits, &self.config, &self.state);
            let mut dispatcher =
                Dispatcher::new(DeviceId::new(), context, &mut self.policy, &self.log);
            dispatcher.dispatch(command, params.as_object().unwrap(), challenge)
        }
    }

    #[test]
    fn every_command_is_unique() {
        let names: BTreeSet<String> = commands().map(|c| c.name.to_ascii_lowercase()).collect();
        assert_eq!(names.len(), COMMANDS.len());
    }

    #[test]
    fn prefixed_and_bare_names() {
        assert_eq!(lookup("action.devices.commands.OnOff").unwrap().name, "OnOff");
        assert_eq!(lookup("setVolume").unwrap().category, Trait::Volume);
        assert!(lookup("action.devices.commands.Fly").is_none());
    }

    #[test]
    fn unknown_command() {
        let mut fx = Fixture::new(TraitSet::color_light(), TraitConfig::default());
        let outcome = fx.dispatch("Teleport", json!({}), &Challenge::none());
        assert_eq!(outcome.error_kind(), Some(ErrorKind::UnknownCommand));
    }

    #[test]
    fn trait_not_enabled() {
        let mut fx = Fixture::new(TraitSet::new().with(Trait::OnOff), TraitConfig::default());
        let outcome = fx.dispatch("LockUnlock", json!({"lock": true}), &Challenge::none());
        assert_eq!(outcome.error_kind(), Some(ErrorKind::FunctionNotSupported));
    }

    #[test]
    fn query_only_trait_rejects_commands() {
        let config = TraitConfig::default().with_query_only(Trait::OnOff);
        let mut fx = Fixture::new(TraitSet::new().with(Trait::OnOff), config);
        let outcome = fx.dispatch("OnOff", json!({"on": true}), &Challenge::none());
        assert_eq!(outcome.error_kind(), Some(ErrorKind::FunctionNotSupported));
    }

    #[test]
    fn missing_parameter() {
        let mut fx = Fixture::new(TraitSet::new().with(Trait::OnOff), TraitConfig::default());
        let outcome = fx.dispatch("OnOff", json!({}), &Challenge::none());
        assert_eq!(
            outcome,
            Outcome::Rejected(CommandError::MissingCommandParameter("on".to_string()))
        );
    }

    #[test]
    fn challenge_blocks_before_handler() {
        let mut fx = Fixture::new(TraitSet::new().with(Trait::LockUnlock), TraitConfig::default());
        fx.policy.set(Trait::LockUnlock, ChallengeType::PinNeeded, Some("1234".to_string()));

        // Even a malformed command waits for the PIN first.
        let outcome = fx.dispatch("LockUnlock", json!({}), &Challenge::none());
        assert_eq!(outcome, Outcome::ChallengeRequired(ChallengeKind::PinNeeded));
        assert_eq!(fx.log.count(DeviceEvent::is_pin_prompt), 1);

        let outcome = fx.dispatch("LockUnlock", json!({"lock": true}), &Challenge::pin("1234"));
        assert_eq!(outcome.proposal().unwrap().delta()["isLocked"], json!(true));
    }

    #[test]
    fn set_challenge_is_never_gated() {
        let mut fx = Fixture::new(TraitSet::new().with(Trait::LockUnlock), TraitConfig::default());
        fx.policy.set(Trait::LockUnlock, ChallengeType::AckNeeded, None);

        let outcome = fx.dispatch(
            "action.devices.commands.SetChallenge",
            json!({"category": "LockUnlock", "type": "pinNeeded", "pin": "9999"}),
            &Challenge::none(),
        );

        assert!(outcome.is_applied());
        assert_eq!(fx.policy.challenge_type(Trait::LockUnlock), ChallengeType::PinNeeded);
        assert_eq!(fx.policy.rule(Trait::LockUnlock).configured_pin(), Some("9999"));
    }

    #[test]
    fn set_challenge_validates_parameters() {
        let mut fx = Fixture::new(TraitSet::new(), TraitConfig::default());
        let outcome = fx.dispatch(
            SET_CHALLENGE,
            json!({"category": "Teleporter", "type": "pinNeeded"}),
            &Challenge::none(),
        );
        assert_eq!(outcome.error_kind(), Some(ErrorKind::InvalidParameter));
    }

    #[test]
    fn supported_commands_follow_traits() {
        let traits = TraitSet::new().with(Trait::OnOff).with(Trait::Volume);
        let config = TraitConfig::default().with_query_only(Trait::Volume);
        assert_eq!(
            supported_commands(&traits, &config),
            vec!["action.devices.commands.OnOff".to_string()]
        );
    }
}
