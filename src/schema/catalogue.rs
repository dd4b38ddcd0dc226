// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The trait catalogue.
//!
//! One [`TraitEntry`] per trait, listing the state fields the trait
//! contributes. Entries are plain data: ranges and value lists that depend
//! on the device configuration are named by [`RangeSource`] and
//! [`ValuesSource`] and resolved by the builder. Keep this table in the
//! same order and with the same field names as the platform's trait
//! documentation so it can be audited line by line.

use crate::traits::{ColorModel, Trait};
use crate::value::{Normalize, Primitive};

/// Fields contributed by one trait.
#[derive(Debug)]
pub(crate) struct TraitEntry {
    pub(crate) trait_: Trait,
    pub(crate) fields: &'static [FieldRule],
}

/// Declarative description of one field.
#[derive(Debug)]
pub(crate) struct FieldRule {
    pub(crate) key: &'static str,
    pub(crate) shape: Shape,
    pub(crate) mandatory: bool,
    pub(crate) range: RangeSource,
    pub(crate) values: ValuesSource,
    pub(crate) default: Option<Literal>,
    pub(crate) exclusive_with: &'static [&'static str],
    pub(crate) normalize: Normalize,
    pub(crate) when: Condition,
}

#[derive(Debug)]
pub(crate) enum Shape {
    Scalar(Primitive),
    Object {
        attributes: &'static [FieldRule],
        delete_missing: bool,
    },
    /// Object whose attributes come from a configured list.
    Dynamic(DynamicAttributes),
    ObjectArray {
        attributes: &'static [FieldRule],
        key_id: &'static [&'static str],
        add_if_missing: bool,
        remove_if_empty: bool,
        replace_all: bool,
        key: KeySource,
    },
    PrimitiveArray {
        element: Primitive,
        replace_all: bool,
        remove_if_empty: bool,
    },
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum DynamicAttributes {
    /// One string attribute per mode, restricted to that mode's settings.
    ModeSettings,
    /// One boolean attribute per toggle.
    ToggleSettings,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum RangeSource {
    Unbounded,
    Fixed(f64, f64),
    Config(ConfigRange),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ConfigRange {
    ColorTemperature,
    ThermostatTemperature,
    Temperature,
    HumiditySetpoint,
    Volume,
    TimerLimit,
    RotationDegrees,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ValuesSource {
    Any,
    Fixed(&'static [&'static str]),
    Config(ConfigList),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ConfigList {
    ThermostatModes,
    FanSpeeds,
    Inputs,
    Applications,
    Zones,
    ArmLevels,
    SensorNames,
    OpenDirections,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum KeySource {
    NonEmpty,
    /// Must be one of a configured list; any non-empty key if the list is empty.
    Config(ConfigList),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Literal {
    Bool(bool),
}

/// Configuration-dependent presence of a field.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Condition {
    Always,
    ColorModel(ColorModel),
    ColorTemperature,
    FanSpeedSettings,
    FanSpeedPercent,
    SingleDirection,
    MultipleDirections,
    MuteSupported,
    Pausable,
    Zones,
    ArmLevels,
}

const fn field(key: &'static str, shape: Shape) -> FieldRule {
    FieldRule {
        key,
        shape,
        mandatory: false,
        range: RangeSource::Unbounded,
        values: ValuesSource::Any,
        default: None,
        exclusive_with: &[],
        normalize: Normalize::NONE,
        when: Condition::Always,
    }
}

const fn boolean(key: &'static str) -> FieldRule {
    field(key, Shape::Scalar(Primitive::Boolean))
}

const fn integer(key: &'static str) -> FieldRule {
    field(key, Shape::Scalar(Primitive::Integer))
}

const fn float(key: &'static str) -> FieldRule {
    field(key, Shape::Scalar(Primitive::Float))
}

const fn string(key: &'static str) -> FieldRule {
    field(key, Shape::Scalar(Primitive::String))
}

impl FieldRule {
    const fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    const fn range(mut self, min: f64, max: f64) -> Self {
        self.range = RangeSource::Fixed(min, max);
        self
    }

    const fn range_from(mut self, range: ConfigRange) -> Self {
        self.range = RangeSource::Config(range);
        self
    }

    const fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.values = ValuesSource::Fixed(values);
        self
    }

    const fn values_from(mut self, list: ConfigList) -> Self {
        self.values = ValuesSource::Config(list);
        self
    }

    const fn default(mut self, literal: Literal) -> Self {
        self.default = Some(literal);
        self
    }

    const fn exclusive(mut self, keys: &'static [&'static str]) -> Self {
        self.exclusive_with = keys;
        self
    }

    const fn upper(mut self) -> Self {
        self.normalize = Normalize {
            upper_case: true,
            trim: true,
        };
        self
    }

    const fn trimmed(mut self) -> Self {
        self.normalize = Normalize::TRIM;
        self
    }

    const fn when(mut self, condition: Condition) -> Self {
        self.when = condition;
        self
    }
}

/// Fields every device has, whatever its traits.
pub(crate) const BASE_FIELDS: &[FieldRule] = &[boolean("online")
    .mandatory()
    .default(Literal::Bool(true))];

const ON_OFF: &[FieldRule] = &[boolean("on")];

const BRIGHTNESS: &[FieldRule] = &[integer("brightness").range(0.0, 100.0)];

const SPECTRUM_HSV: &[FieldRule] = &[
    float("hue").mandatory().range(0.0, 360.0),
    float("saturation").mandatory().range(0.0, 1.0),
    float("value").mandatory().range(0.0, 1.0),
];

const COLOR: &[FieldRule] = &[
    integer("temperatureK")
        .range_from(ConfigRange::ColorTemperature)
        .exclusive(&["spectrumRgb", "spectrumHsv"])
        .when(Condition::ColorTemperature),
    integer("spectrumRgb")
        .range(0.0, 16_777_215.0)
        .exclusive(&["temperatureK", "spectrumHsv"])
        .when(Condition::ColorModel(ColorModel::Rgb)),
    field(
        "spectrumHsv",
        Shape::Object {
            attributes: SPECTRUM_HSV,
            delete_missing: true,
        },
    )
    .exclusive(&["temperatureK", "spectrumRgb"])
    .when(Condition::ColorModel(ColorModel::Hsv)),
];

const COLOR_SETTING: &[FieldRule] = &[field(
    "color",
    Shape::Object {
        attributes: COLOR,
        delete_missing: false,
    },
)];

const TEMPERATURE_SETTING: &[FieldRule] = &[
    string("thermostatMode")
        .trimmed()
        .values_from(ConfigList::ThermostatModes),
    string("activeThermostatMode").trimmed(),
    float("thermostatTemperatureSetpoint")
        .range_from(ConfigRange::ThermostatTemperature)
        .exclusive(&[
            "thermostatTemperatureSetpointHigh",
            "thermostatTemperatureSetpointLow",
        ]),
    float("thermostatTemperatureSetpointHigh")
        .range_from(ConfigRange::ThermostatTemperature)
        .exclusive(&["thermostatTemperatureSetpoint"]),
    float("thermostatTemperatureSetpointLow")
        .range_from(ConfigRange::ThermostatTemperature)
        .exclusive(&["thermostatTemperatureSetpoint"]),
    float("thermostatTemperatureAmbient"),
    float("thermostatHumidityAmbient").range(0.0, 100.0),
];

const TEMPERATURE_CONTROL: &[FieldRule] = &[
    float("temperatureSetpointCelsius").range_from(ConfigRange::Temperature),
    float("temperatureAmbientCelsius"),
];

const HUMIDITY_SETTING: &[FieldRule] = &[
    integer("humiditySetpointPercent").range_from(ConfigRange::HumiditySetpoint),
    integer("humidityAmbientPercent").range(0.0, 100.0),
];

const FAN_SPEED: &[FieldRule] = &[
    string("currentFanSpeedSetting")
        .trimmed()
        .values_from(ConfigList::FanSpeeds)
        .when(Condition::FanSpeedSettings),
    integer("currentFanSpeedPercent")
        .range(0.0, 100.0)
        .when(Condition::FanSpeedPercent),
];

const MODES: &[FieldRule] = &[field(
    "currentModeSettings",
    Shape::Dynamic(DynamicAttributes::ModeSettings),
)];

const TOGGLES: &[FieldRule] = &[field(
    "currentToggleSettings",
    Shape::Dynamic(DynamicAttributes::ToggleSettings),
)];

const OPEN_STATE: &[FieldRule] = &[
    string("openDirection").mandatory().upper(),
    integer("openPercent").mandatory().range(0.0, 100.0),
];

const OPEN_CLOSE: &[FieldRule] = &[
    integer("openPercent")
        .range(0.0, 100.0)
        .when(Condition::SingleDirection),
    field(
        "openState",
        Shape::ObjectArray {
            attributes: OPEN_STATE,
            key_id: &["openDirection"],
            add_if_missing: true,
            remove_if_empty: false,
            replace_all: false,
            key: KeySource::Config(ConfigList::OpenDirections),
        },
    )
    .when(Condition::MultipleDirections),
];

const VOLUME: &[FieldRule] = &[
    integer("currentVolume").range_from(ConfigRange::Volume),
    boolean("isMuted").when(Condition::MuteSupported),
];

const INPUT_SELECTOR: &[FieldRule] = &[string("currentInput")
    .trimmed()
    .values_from(ConfigList::Inputs)];

const APP_SELECTOR: &[FieldRule] = &[string("currentApplication")
    .trimmed()
    .values_from(ConfigList::Applications)];

const START_STOP: &[FieldRule] = &[
    boolean("isRunning").default(Literal::Bool(false)),
    boolean("isPaused").when(Condition::Pausable),
    field(
        "activeZones",
        Shape::PrimitiveArray {
            element: Primitive::String,
            replace_all: true,
            remove_if_empty: true,
        },
    )
    .trimmed()
    .values_from(ConfigList::Zones)
    .when(Condition::Zones),
];

const LOCK_UNLOCK: &[FieldRule] = &[boolean("isLocked"), boolean("isJammed")];

const ARM_DISARM: &[FieldRule] = &[
    boolean("isArmed"),
    string("currentArmLevel")
        .trimmed()
        .values_from(ConfigList::ArmLevels)
        .when(Condition::ArmLevels),
    integer("exitAllowance").range(0.0, 3600.0),
];

const SENSOR_STATE_DATA: &[FieldRule] = &[
    string("name").mandatory().trimmed(),
    string("currentSensorState").trimmed(),
    float("rawValue"),
];

const SENSOR_STATE: &[FieldRule] = &[field(
    "currentSensorStateData",
    Shape::ObjectArray {
        attributes: SENSOR_STATE_DATA,
        key_id: &["name"],
        add_if_missing: true,
        remove_if_empty: true,
        replace_all: false,
        key: KeySource::Config(ConfigList::SensorNames),
    },
)];

const CAPACITY: &[FieldRule] = &[
    string("unit").mandatory().upper().one_of(&[
        "SECONDS",
        "MILES",
        "KILOMETERS",
        "PERCENTAGE",
        "KILOWATT_HOURS",
    ]),
    integer("rawValue").mandatory(),
];

const ENERGY_STORAGE: &[FieldRule] = &[
    string("descriptiveCapacityRemaining")
        .upper()
        .one_of(&["CRITICALLY_LOW", "LOW", "MEDIUM", "HIGH", "FULL"]),
    field(
        "capacityRemaining",
        Shape::ObjectArray {
            attributes: CAPACITY,
            key_id: &["unit"],
            add_if_missing: true,
            remove_if_empty: false,
            replace_all: true,
            key: KeySource::NonEmpty,
        },
    ),
    boolean("isCharging"),
    boolean("isPluggedIn"),
];

const TIMER: &[FieldRule] = &[
    integer("timerRemainingSec").range_from(ConfigRange::TimerLimit),
    boolean("timerPaused"),
];

const ROTATION: &[FieldRule] = &[
    float("rotationDegrees")
        .range_from(ConfigRange::RotationDegrees)
        .exclusive(&["rotationPercent"]),
    float("rotationPercent")
        .range(0.0, 100.0)
        .exclusive(&["rotationDegrees"]),
];

const DOCK: &[FieldRule] = &[boolean("isDocked")];

const MEDIA_STATE: &[FieldRule] = &[
    string("activityState")
        .upper()
        .one_of(&["INACTIVE", "STANDBY", "ACTIVE"]),
    string("playbackState").upper().one_of(&[
        "PAUSED",
        "PLAYING",
        "FAST_FORWARDING",
        "REWINDING",
        "BUFFERING",
        "STOPPED",
    ]),
];

const STATUS_REPORT_ENTRY: &[FieldRule] = &[
    boolean("blocking"),
    string("deviceTarget").mandatory().trimmed(),
    integer("priority").range(0.0, 100.0),
    string("statusCode").mandatory().trimmed(),
];

const STATUS_REPORT: &[FieldRule] = &[field(
    "currentStatusReport",
    Shape::ObjectArray {
        attributes: STATUS_REPORT_ENTRY,
        key_id: &["deviceTarget", "statusCode"],
        add_if_missing: true,
        remove_if_empty: false,
        replace_all: true,
        key: KeySource::NonEmpty,
    },
)];

/// Traits with no reportable state.
const NO_STATE: &[FieldRule] = &[];

/// The catalogue, in trait order.
pub(crate) const CATALOGUE: &[TraitEntry] = &[
    TraitEntry { trait_: Trait::OnOff, fields: ON_OFF },
    TraitEntry { trait_: Trait::Brightness, fields: BRIGHTNESS },
    TraitEntry { trait_: Trait::ColorSetting, fields: COLOR_SETTING },
    TraitEntry { trait_: Trait::TemperatureSetting, fields: TEMPERATURE_SETTING },
    TraitEntry { trait_: Trait::TemperatureControl, fields: TEMPERATURE_CONTROL },
    TraitEntry { trait_: Trait::HumiditySetting, fields: HUMIDITY_SETTING },
    TraitEntry { trait_: Trait::FanSpeed, fields: FAN_SPEED },
    TraitEntry { trait_: Trait::Modes, fields: MODES },
    TraitEntry { trait_: Trait::Toggles, fields: TOGGLES },
    TraitEntry { trait_: Trait::OpenClose, fields: OPEN_CLOSE },
    TraitEntry { trait_: Trait::Volume, fields: VOLUME },
    TraitEntry { trait_: Trait::InputSelector, fields: INPUT_SELECTOR },
    TraitEntry { trait_: Trait::AppSelector, fields: APP_SELECTOR },
    TraitEntry { trait_: Trait::Channel, fields: NO_STATE },
    TraitEntry { trait_: Trait::StartStop, fields: START_STOP },
    TraitEntry { trait_: Trait::LockUnlock, fields: LOCK_UNLOCK },
    TraitEntry { trait_: Trait::ArmDisarm, fields: ARM_DISARM },
    TraitEntry { trait_: Trait::SensorState, fields: SENSOR_STATE },
    TraitEntry { trait_: Trait::EnergyStorage, fields: ENERGY_STORAGE },
    TraitEntry { trait_: Trait::Timer, fields: TIMER },
    TraitEntry { trait_: Trait::Rotation, fields: ROTATION },
    TraitEntry { trait_: Trait::Dock, fields: DOCK },
    TraitEntry { trait_: Trait::MediaState, fields: MEDIA_STATE },
    TraitEntry { trait_: Trait::TransportControl, fields: NO_STATE },
    TraitEntry { trait_: Trait::StatusReport, fields: STATUS_REPORT },
    TraitEntry { trait_: Trait::Locator, fields: NO_STATE },
    TraitEntry { trait_: Trait::Reboot, fields: NO_STATE },
    TraitEntry { trait_: Trait::Scene, fields: NO_STATE },
];

/// Looks up the catalogue entry of a trait.
pub(crate) fn entry(t: Trait) -> Option<&'static TraitEntry> {
    CATALOGUE.iter().find(|e| e.trait_ == t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_trait_has_exactly_one_entry() {
        for t in Trait::ALL {
            let count = CATALOGUE.iter().filter(|e| e.trait_ == t).count();
            assert_eq!(count, 1, "{t} must appear once in the catalogue");
        }
        assert_eq!(CATALOGUE.len(), Trait::ALL.len());
    }

    #[test]
    fn exclusive_keys_name_siblings() {
        fn check(fields: &[FieldRule]) {
            for f in fields {
                for other in f.exclusive_with {
                    assert!(
                        fields.iter().any(|s| s.key == *other),
                        "{} is exclusive with unknown sibling {other}",
                        f.key
                    );
                }
                if let Shape::Object { attributes, .. } | Shape::ObjectArray { attributes, .. } =
                    &f.shape
                {
                    check(attributes);
                }
            }
        }
        for e in CATALOGUE {
            check(e.fields);
        }
    }

    #[test]
    fn array_keys_are_attributes() {
        for e in CATALOGUE {
            for f in e.fields {
                if let Shape::ObjectArray {
                    attributes, key_id, ..
                } = &f.shape
                {
                    for k in *key_id {
                        assert!(attributes.iter().any(|a| a.key == *k && a.mandatory));
                    }
                }
            }
        }
    }
}
