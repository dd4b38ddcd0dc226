// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device traits and their configuration.
//!
//! A device advertises a set of [`Trait`]s. Which traits a device has is
//! decided outside this library and arrives as a [`TraitSet`]; how each
//! trait behaves (ranges, available modes, command-only flags, ...) arrives
//! as a [`TraitConfig`]. Together they are the input of the schema builder.
//!
//! # Examples
//!
//! ```
//! use traitstate_lib::traits::{Trait, TraitConfig, TraitSet};
//!
//! let traits = TraitSet::new()
//!     .with(Trait::OnOff)
//!     .with(Trait::Brightness);
//! assert!(traits.contains(Trait::Brightness));
//!
//! let config = TraitConfig::default()
//!     .with_thermostat_modes(["off", "heat", "cool"])
//!     .with_command_only(Trait::OnOff);
//! assert!(config.is_command_only(Trait::OnOff));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Prefix used by the platform for trait identifiers.
pub const TRAIT_PREFIX: &str = "action.devices.traits.";

/// A capability bundle contributing fields to a device's state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Trait {
    /// Power on/off.
    OnOff,
    /// Brightness 0-100.
    Brightness,
    /// Color temperature and RGB/HSV colors.
    ColorSetting,
    /// Thermostat modes and setpoints.
    TemperatureSetting,
    /// Appliance temperature setpoint (ovens, kettles).
    TemperatureControl,
    /// Humidity setpoint.
    HumiditySetting,
    /// Fan speed settings or percentage.
    FanSpeed,
    /// Named multi-value modes.
    Modes,
    /// Named on/off toggles.
    Toggles,
    /// Open percentage, optionally per direction.
    OpenClose,
    /// Volume level and mute.
    Volume,
    /// Media input selection.
    InputSelector,
    /// Application selection.
    AppSelector,
    /// TV channel selection.
    Channel,
    /// Start, stop and pause, optionally per zone.
    StartStop,
    /// Lock and unlock.
    LockUnlock,
    /// Security system arming.
    ArmDisarm,
    /// Named sensor readings.
    SensorState,
    /// Battery and charge level.
    EnergyStorage,
    /// Countdown timer.
    Timer,
    /// Rotation in degrees or percent.
    Rotation,
    /// Return to dock.
    Dock,
    /// Media activity and playback state.
    MediaState,
    /// Media transport (stop, pause, resume).
    TransportControl,
    /// Device status report.
    StatusReport,
    /// Make the device beep or flash.
    Locator,
    /// Reboot the device.
    Reboot,
    /// Activate or deactivate a scene.
    Scene,
}

impl Trait {
    /// Every trait, in catalogue order.
    pub const ALL: [Self; 28] = [
        Self::OnOff,
        Self::Brightness,
        Self::ColorSetting,
        Self::TemperatureSetting,
        Self::TemperatureControl,
        Self::HumiditySetting,
        Self::FanSpeed,
        Self::Modes,
        Self::Toggles,
        Self::OpenClose,
        Self::Volume,
        Self::InputSelector,
        Self::AppSelector,
        Self::Channel,
        Self::StartStop,
        Self::LockUnlock,
        Self::ArmDisarm,
        Self::SensorState,
        Self::EnergyStorage,
        Self::Timer,
        Self::Rotation,
        Self::Dock,
        Self::MediaState,
        Self::TransportControl,
        Self::StatusReport,
        Self::Locator,
        Self::Reboot,
        Self::Scene,
    ];

    /// Returns the short trait name, e.g. `"OnOff"`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OnOff => "OnOff",
            Self::Brightness => "Brightness",
            Self::ColorSetting => "ColorSetting",
            Self::TemperatureSetting => "TemperatureSetting",
            Self::TemperatureControl => "TemperatureControl",
            Self::HumiditySetting => "HumiditySetting",
            Self::FanSpeed => "FanSpeed",
            Self::Modes => "Modes",
            Self::Toggles => "Toggles",
            Self::OpenClose => "OpenClose",
            Self::Volume => "Volume",
            Self::InputSelector => "InputSelector",
            Self::AppSelector => "AppSelector",
            Self::Channel => "Channel",
            Self::StartStop => "StartStop",
            Self::LockUnlock => "LockUnlock",
            Self::ArmDisarm => "ArmDisarm",
            Self::SensorState => "SensorState",
            Self::EnergyStorage => "EnergyStorage",
            Self::Timer => "Timer",
            Self::Rotation => "Rotation",
            Self::Dock => "Dock",
            Self::MediaState => "MediaState",
            Self::TransportControl => "TransportControl",
            Self::StatusReport => "StatusReport",
            Self::Locator => "Locator",
            Self::Reboot => "Reboot",
            Self::Scene => "Scene",
        }
    }

    /// Returns the fully qualified platform identifier.
    #[must_use]
    pub fn platform_id(&self) -> String {
        format!("{TRAIT_PREFIX}{}", self.name())
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Trait {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let short = s.trim();
        let short = short.strip_prefix(TRAIT_PREFIX).unwrap_or(short);
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(short))
            .ok_or_else(|| Error::Config(format!("unknown trait: {s}")))
    }
}

/// The set of traits enabled on a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraitSet(BTreeSet<Trait>);

impl TraitSet {
    /// Creates an empty trait set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from externally resolved enablement flags.
    #[must_use]
    pub fn from_flags(flags: impl IntoIterator<Item = (Trait, bool)>) -> Self {
        Self(
            flags
                .into_iter()
                .filter_map(|(t, enabled)| enabled.then_some(t))
                .collect(),
        )
    }

    /// Adds a trait.
    #[must_use]
    pub fn with(mut self, t: Trait) -> Self {
        self.0.insert(t);
        self
    }

    /// Enables or disables a trait in place.
    pub fn set(&mut self, t: Trait, enabled: bool) {
        if enabled {
            self.0.insert(t);
        } else {
            self.0.remove(&t);
        }
    }

    /// Returns whether a trait is enabled.
    #[must_use]
    pub fn contains(&self, t: Trait) -> bool {
        self.0.contains(&t)
    }

    /// Iterates enabled traits in catalogue order.
    pub fn iter(&self) -> impl Iterator<Item = Trait> + '_ {
        self.0.iter().copied()
    }

    /// Returns the number of enabled traits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no trait is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// On/off, brightness and color: a typical color bulb.
    #[must_use]
    pub fn color_light() -> Self {
        Self::new()
            .with(Trait::OnOff)
            .with(Trait::Brightness)
            .with(Trait::ColorSetting)
    }

    /// A thermostat.
    #[must_use]
    pub fn thermostat() -> Self {
        Self::new().with(Trait::TemperatureSetting)
    }
}

impl FromIterator<Trait> for TraitSet {
    fn from_iter<I: IntoIterator<Item = Trait>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Color model supported by a `ColorSetting` device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorModel {
    /// 24-bit RGB integer.
    Rgb,
    /// Hue, saturation, value.
    Hsv,
}

/// Inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl NumericRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Returns whether `v` lies inside the range.
    #[must_use]
    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    /// Clamps `v` into the range.
    #[must_use]
    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }
}

/// A fan speed setting and its spoken synonyms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanSpeedSetting {
    /// Setting name reported in `currentFanSpeedSetting`.
    pub name: String,
    /// Synonyms accepted in commands.
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// A mode of the `Modes` trait and its settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeDefinition {
    /// Mode name, the attribute key in `currentModeSettings`.
    pub name: String,
    /// Legal setting names.
    pub settings: Vec<String>,
}

/// An application of the `AppSelector` trait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationEntry {
    /// Application key reported in `currentApplication`.
    pub key: String,
    /// Display names accepted in commands.
    #[serde(default)]
    pub names: Vec<String>,
}

/// A channel of the `Channel` trait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntry {
    /// Unique channel code.
    pub key: String,
    /// Display names accepted in commands.
    #[serde(default)]
    pub names: Vec<String>,
    /// Channel number, when the channel has one.
    #[serde(default)]
    pub number: Option<String>,
}

/// Per-trait configuration.
///
/// Lists are expected already normalized by the list-import layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitConfig {
    /// Traits that accept commands but report no state.
    pub command_only: BTreeSet<Trait>,
    /// Traits that report state but accept no commands.
    pub query_only: BTreeSet<Trait>,

    /// Color model, when the device supports colors.
    pub color_model: Option<ColorModel>,
    /// Supported color temperature in Kelvin.
    pub color_temperature_range: Option<NumericRange>,

    /// Thermostat modes, e.g. `off`, `heat`, `cool`.
    pub available_thermostat_modes: Vec<String>,
    /// Thermostat setpoint range in Celsius.
    pub thermostat_temperature_range: NumericRange,
    /// Minimum distance between the heat/cool setpoints.
    pub buffer_range_celsius: f64,

    /// Appliance setpoint range in Celsius.
    pub temperature_range: NumericRange,
    /// Appliance setpoint step.
    pub temperature_step_celsius: f64,

    /// Humidity setpoint range in percent.
    pub humidity_setpoint_range: NumericRange,

    /// Named fan speeds.
    pub available_fan_speeds: Vec<FanSpeedSetting>,
    /// Whether the fan accepts a percentage.
    pub supports_fan_speed_percent: bool,

    /// Modes of the `Modes` trait.
    pub available_modes: Vec<ModeDefinition>,
    /// Toggles of the `Toggles` trait.
    pub available_toggles: Vec<String>,

    /// Open/close directions; more than one selects per-direction state.
    pub open_directions: Vec<String>,
    /// Only fully open or closed is supported.
    pub discrete_only_open_close: bool,

    /// Maximum volume level.
    pub volume_max_level: i64,
    /// Step used by relative volume commands.
    pub level_step_size: i64,
    /// Whether mute is supported.
    pub volume_can_mute_and_unmute: bool,

    /// Media inputs.
    pub available_inputs: Vec<String>,
    /// Inputs have a meaningful next/previous order.
    pub ordered_inputs: bool,

    /// Applications.
    pub available_applications: Vec<ApplicationEntry>,
    /// Channels.
    pub available_channels: Vec<ChannelEntry>,

    /// Cleaning zones.
    pub available_zones: Vec<String>,
    /// Whether `StartStop` supports pausing.
    pub pausable: bool,

    /// Arm levels of an alarm system.
    pub available_arm_levels: Vec<String>,

    /// Names of the supported sensors.
    pub sensor_states_supported: Vec<String>,

    /// Longest timer in seconds.
    pub max_timer_limit_sec: i64,

    /// Rotation range in degrees.
    pub rotation_degrees_range: NumericRange,

    /// Whether scenes can be deactivated.
    pub scene_reversible: bool,
}

impl Default for TraitConfig {
    fn default() -> Self {
        Self {
            command_only: BTreeSet::new(),
            query_only: BTreeSet::new(),
            color_model: None,
            color_temperature_range: None,
            available_thermostat_modes: Vec::new(),
            thermostat_temperature_range: NumericRange::new(10.0, 32.0),
            buffer_range_celsius: 2.0,
            temperature_range: NumericRange::new(0.0, 100.0),
            temperature_step_celsius: 1.0,
            humidity_setpoint_range: NumericRange::new(0.0, 100.0),
            available_fan_speeds: Vec::new(),
            supports_fan_speed_percent: false,
            available_modes: Vec::new(),
            available_toggles: Vec::new(),
            open_directions: Vec::new(),
            discrete_only_open_close: false,
            volume_max_level: 100,
            level_step_size: 1,
            volume_can_mute_and_unmute: true,
            available_inputs: Vec::new(),
            ordered_inputs: false,
            available_applications: Vec::new(),
            available_channels: Vec::new(),
            available_zones: Vec::new(),
            pausable: false,
            available_arm_levels: Vec::new(),
            sensor_states_supported: Vec::new(),
            max_timer_limit_sec: 86_400,
            rotation_degrees_range: NumericRange::new(0.0, 360.0),
            scene_reversible: false,
        }
    }
}

impl TraitConfig {
    /// Returns whether a trait reports no state.
    #[must_use]
    pub fn is_command_only(&self, t: Trait) -> bool {
        self.command_only.contains(&t)
    }

    /// Returns whether a trait accepts no commands.
    #[must_use]
    pub fn is_query_only(&self, t: Trait) -> bool {
        self.query_only.contains(&t)
    }

    /// Marks a trait command-only.
    #[must_use]
    pub fn with_command_only(mut self, t: Trait) -> Self {
        self.command_only.insert(t);
        self
    }

    /// Marks a trait query-only.
    #[must_use]
    pub fn with_query_only(mut self, t: Trait) -> Self {
        self.query_only.insert(t);
        self
    }

    /// Sets the color model.
    #[must_use]
    pub fn with_color_model(mut self, model: ColorModel) -> Self {
        self.color_model = Some(model);
        self
    }

    /// Sets the color temperature range in Kelvin.
    #[must_use]
    pub fn with_color_temperature(mut self, min_k: f64, max_k: f64) -> Self {
        self.color_temperature_range = Some(NumericRange::new(min_k, max_k));
        self
    }

    /// Sets the available thermostat modes.
    #[must_use]
    pub fn with_thermostat_modes<I, S>(mut self, modes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_thermostat_modes = modes.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a fan speed setting.
    #[must_use]
    pub fn with_fan_speed(mut self, name: impl Into<String>) -> Self {
        self.available_fan_speeds.push(FanSpeedSetting {
            name: name.into(),
            synonyms: Vec::new(),
        });
        self
    }

    /// Adds a mode of the `Modes` trait.
    #[must_use]
    pub fn with_mode<I, S>(mut self, name: impl Into<String>, settings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_modes.push(ModeDefinition {
            name: name.into(),
            settings: settings.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Adds a toggle.
    #[must_use]
    pub fn with_toggle(mut self, name: impl Into<String>) -> Self {
        self.available_toggles.push(name.into());
        self
    }

    /// Sets the open/close directions.
    #[must_use]
    pub fn with_open_directions<I, S>(mut self, directions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.open_directions = directions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the available inputs.
    #[must_use]
    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an application.
    #[must_use]
    pub fn with_application(mut self, key: impl Into<String>, name: impl Into<String>) -> Self {
        self.available_applications.push(ApplicationEntry {
            key: key.into(),
            names: vec![name.into()],
        });
        self
    }

    /// Adds a channel.
    #[must_use]
    pub fn with_channel(
        mut self,
        key: impl Into<String>,
        name: impl Into<String>,
        number: Option<&str>,
    ) -> Self {
        self.available_channels.push(ChannelEntry {
            key: key.into(),
            names: vec![name.into()],
            number: number.map(str::to_string),
        });
        self
    }

    /// Sets the cleaning zones.
    #[must_use]
    pub fn with_zones<I, S>(mut self, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_zones = zones.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the arm levels.
    #[must_use]
    pub fn with_arm_levels<I, S>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_arm_levels = levels.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the supported sensor names.
    #[must_use]
    pub fn with_sensors<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensor_states_supported = names.into_iter().map(Into::into).collect();
        self
    }

    /// Finds a mode definition by name, ignoring case.
    #[must_use]
    pub fn mode(&self, name: &str) -> Option<&ModeDefinition> {
        self.available_modes
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trait_names_round_trip_through_from_str() {
        for t in Trait::ALL {
            assert_eq!(t.name().parse::<Trait>().unwrap(), t);
        }
    }

    #[test]
    fn parses_platform_identifier() {
        let t: Trait = "action.devices.traits.ColorSetting".parse().unwrap();
        assert_eq!(t, Trait::ColorSetting);
        assert_eq!(t.platform_id(), "action.devices.traits.ColorSetting");
    }

    #[test]
    fn rejects_unknown_trait() {
        assert!("Teleport".parse::<Trait>().is_err());
    }

    #[test]
    fn trait_set_from_flags() {
        let set = TraitSet::from_flags([
            (Trait::OnOff, true),
            (Trait::Brightness, false),
            (Trait::Volume, true),
        ]);
        assert!(set.contains(Trait::OnOff));
        assert!(!set.contains(Trait::Brightness));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn trait_set_toggle() {
        let mut set = TraitSet::color_light();
        set.set(Trait::ColorSetting, false);
        assert!(!set.contains(Trait::ColorSetting));
        set.set(Trait::Timer, true);
        assert!(set.contains(Trait::Timer));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let json = r#"{
            "command_only": ["OnOff"],
            "available_thermostat_modes": ["off", "heat"],
            "available_modes": [{"name": "wash", "settings": ["quick", "eco"]}]
        }"#;
        let config: TraitConfig = serde_json::from_str(json).unwrap();
        assert!(config.is_command_only(Trait::OnOff));
        assert_eq!(config.available_thermostat_modes, vec!["off", "heat"]);
        assert_eq!(config.volume_max_level, 100);
        assert_eq!(config.mode("WASH").unwrap().settings.len(), 2);
    }

    #[test]
    fn numeric_range_clamps() {
        let range = NumericRange::new(0.0, 100.0);
        assert!(range.contains(100.0));
        assert!(!range.contains(100.5));
        assert!((range.clamp(150.0) - 100.0).abs() < f64::EPSILON);
    }
}
