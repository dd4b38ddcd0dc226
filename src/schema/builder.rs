// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Builds a [`SchemaMap`] from the trait catalogue.

use serde_json::Value;

use crate::traits::{TraitConfig, TraitSet};

use super::catalogue::{
    self, Condition, ConfigList, ConfigRange, DynamicAttributes, FieldRule, KeySource, Literal,
    RangeSource, Shape, ValuesSource,
};
use super::{FieldKind, FieldSchema, KeyValidator, KeyedArray, SchemaMap};

/// Builds the schema of a device.
///
/// Pure function of the enabled traits and their configuration: call it
/// again whenever a trait is toggled or a configured list is reloaded.
/// Command-only traits contribute no fields.
///
/// # Examples
///
/// ```
/// use traitstate_lib::schema::build_schema;
/// use traitstate_lib::traits::{Trait, TraitConfig, TraitSet};
///
/// let traits = TraitSet::new().with(Trait::OnOff).with(Trait::Brightness);
/// let schema = build_schema(&traits, &TraitConfig::default());
/// assert!(schema.contains_key("online"));
/// assert!(schema.contains_key("on"));
/// assert_eq!(schema.get("brightness").unwrap().max, Some(100.0));
///
/// let config = TraitConfig::default().with_command_only(Trait::OnOff);
/// let schema = build_schema(&traits, &config);
/// assert!(!schema.contains_key("on"));
/// ```
#[must_use]
pub fn build_schema(traits: &TraitSet, config: &TraitConfig) -> SchemaMap {
    let mut schema = materialize_all(catalogue::BASE_FIELDS, config);

    for t in traits.iter() {
        if config.is_command_only(t) {
            tracing::trace!(trait_name = %t, "Command-only trait contributes no state");
            continue;
        }
        let Some(entry) = catalogue::entry(t) else {
            continue;
        };
        for rule in entry.fields {
            if let Some(field) = materialize(rule, config) {
                schema.insert(rule.key, field);
            }
        }
    }

    tracing::debug!(
        traits = traits.len(),
        fields = schema.len(),
        "Built state schema"
    );
    schema
}

fn materialize_all(rules: &[FieldRule], config: &TraitConfig) -> SchemaMap {
    rules
        .iter()
        .filter_map(|rule| materialize(rule, config).map(|f| (rule.key, f)))
        .collect()
}

fn materialize(rule: &FieldRule, config: &TraitConfig) -> Option<FieldSchema> {
    if !holds(rule.when, config) {
        return None;
    }

    let kind = match &rule.shape {
        Shape::Scalar(primitive) => FieldSchema::primitive(*primitive).kind,
        Shape::Object {
            attributes,
            delete_missing,
        } => FieldKind::Object {
            attributes: materialize_all(attributes, config),
            delete_missing: *delete_missing,
        },
        Shape::Dynamic(dynamic) => FieldKind::Object {
            attributes: dynamic_attributes(*dynamic, config),
            delete_missing: false,
        },
        Shape::ObjectArray {
            attributes,
            key_id,
            add_if_missing,
            remove_if_empty,
            replace_all,
            key,
        } => {
            let mut keyed = KeyedArray::new(key_id.iter().copied());
            keyed.add_if_missing = *add_if_missing;
            keyed.remove_if_empty = *remove_if_empty;
            keyed.replace_all = *replace_all;
            keyed.is_valid_key = key_validator(*key, config);
            FieldKind::ObjectArray {
                attributes: materialize_all(attributes, config),
                keyed,
            }
        }
        Shape::PrimitiveArray {
            element,
            replace_all,
            remove_if_empty,
        } => FieldKind::PrimitiveArray {
            element: *element,
            replace_all: *replace_all,
            remove_if_empty: *remove_if_empty,
        },
    };

    let mut field = FieldSchema::of(kind)
        .exclusive_with(rule.exclusive_with.iter().copied())
        .with_normalize(rule.normalize);
    field.mandatory = rule.mandatory;
    if let Some((min, max)) = range(rule.range, config) {
        field = field.with_range(min, max);
    }
    field.allowed_values = values(rule.values, config);
    field.default_value = rule.default.map(|Literal::Bool(b)| Value::Bool(b));
    Some(field)
}

fn holds(condition: Condition, config: &TraitConfig) -> bool {
    match condition {
        Condition::Always => true,
        Condition::ColorModel(model) => config.color_model == Some(model),
        Condition::ColorTemperature => config.color_temperature_range.is_some(),
        Condition::FanSpeedSettings => !config.available_fan_speeds.is_empty(),
        Condition::FanSpeedPercent => config.supports_fan_speed_percent,
        Condition::SingleDirection => config.open_directions.len() <= 1,
        Condition::MultipleDirections => config.open_directions.len() > 1,
        Condition::MuteSupported => config.volume_can_mute_and_unmute,
        Condition::Pausable => config.pausable,
        Condition::Zones => !config.available_zones.is_empty(),
        Condition::ArmLevels => !config.available_arm_levels.is_empty(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn range(source: RangeSource, config: &TraitConfig) -> Option<(f64, f64)> {
    match source {
        RangeSource::Unbounded => None,
        RangeSource::Fixed(min, max) => Some((min, max)),
        RangeSource::Config(which) => match which {
            ConfigRange::ColorTemperature => config
                .color_temperature_range
                .map(|r| (r.min, r.max)),
            ConfigRange::ThermostatTemperature => Some((
                config.thermostat_temperature_range.min,
                config.thermostat_temperature_range.max,
            )),
            ConfigRange::Temperature => {
                Some((config.temperature_range.min, config.temperature_range.max))
            }
            ConfigRange::HumiditySetpoint => Some((
                config.humidity_setpoint_range.min,
                config.humidity_setpoint_range.max,
            )),
            ConfigRange::Volume => Some((0.0, config.volume_max_level as f64)),
            // -1 reports "no timer running"
            ConfigRange::TimerLimit => Some((-1.0, config.max_timer_limit_sec as f64)),
            ConfigRange::RotationDegrees => Some((
                config.rotation_degrees_range.min,
                config.rotation_degrees_range.max,
            )),
        },
    }
}

fn values(source: ValuesSource, config: &TraitConfig) -> Option<Vec<Value>> {
    match source {
        ValuesSource::Any => None,
        ValuesSource::Fixed(values) => Some(strings(values.iter().copied())),
        ValuesSource::Config(list) => unrestricted_if_empty(strings(names(list, config))),
    }
}

/// An empty configured list places no restriction on the field.
fn unrestricted_if_empty(values: Vec<Value>) -> Option<Vec<Value>> {
    (!values.is_empty()).then_some(values)
}

fn strings<'a>(items: impl Iterator<Item = &'a str>) -> Vec<Value> {
    items.map(|s| Value::String(s.to_string())).collect()
}

/// Names of a configured list, as reported in state.
fn names(list: ConfigList, config: &TraitConfig) -> Box<dyn Iterator<Item = &str> + '_> {
    match list {
        ConfigList::ThermostatModes => {
            Box::new(config.available_thermostat_modes.iter().map(String::as_str))
        }
        ConfigList::FanSpeeds => Box::new(
            config
                .available_fan_speeds
                .iter()
                .map(|s| s.name.as_str()),
        ),
        ConfigList::Inputs => Box::new(config.available_inputs.iter().map(String::as_str)),
        ConfigList::Applications => Box::new(
            config
                .available_applications
                .iter()
                .map(|a| a.key.as_str()),
        ),
        ConfigList::Zones => Box::new(config.available_zones.iter().map(String::as_str)),
        ConfigList::ArmLevels => Box::new(config.available_arm_levels.iter().map(String::as_str)),
        ConfigList::SensorNames => {
            Box::new(config.sensor_states_supported.iter().map(String::as_str))
        }
        ConfigList::OpenDirections => Box::new(config.open_directions.iter().map(String::as_str)),
    }
}

fn key_validator(source: KeySource, config: &TraitConfig) -> KeyValidator {
    match source {
        KeySource::NonEmpty => KeyValidator::NonEmpty,
        KeySource::Config(list) => {
            let allowed: Vec<String> = names(list, config).map(str::to_string).collect();
            if allowed.is_empty() {
                KeyValidator::NonEmpty
            } else {
                KeyValidator::OneOf(allowed)
            }
        }
    }
}

fn dynamic_attributes(dynamic: DynamicAttributes, config: &TraitConfig) -> SchemaMap {
    match dynamic {
        DynamicAttributes::ModeSettings => config
            .available_modes
            .iter()
            .map(|mode| {
                let mut field = FieldSchema::string().trim();
                field.allowed_values =
                    unrestricted_if_empty(strings(mode.settings.iter().map(String::as_str)));
                (mode.name.clone(), field)
            })
            .collect(),
        DynamicAttributes::ToggleSettings => config
            .available_toggles
            .iter()
            .map(|name| (name.clone(), FieldSchema::boolean()))
            .collect(),
    }
}
