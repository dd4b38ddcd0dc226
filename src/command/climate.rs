// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thermostat, appliance temperature, humidity and fan commands.
//!
//! Relative commands accept either an absolute delta or a weight. A
//! temperature weight is one degree, a humidity or fan percent weight is
//! ten points, and a fan setting weight moves through the configured
//! settings.

use super::params::{self, find_name, first_of, in_range, whole};
use super::{CommandContext, CommandParams, Proposal};
use crate::error::CommandError;

const SETPOINT: &str = "thermostatTemperatureSetpoint";
const SETPOINT_HIGH: &str = "thermostatTemperatureSetpointHigh";
const SETPOINT_LOW: &str = "thermostatTemperatureSetpointLow";

const PERCENT_WEIGHT_STEP: f64 = 10.0;

pub(super) fn thermostat_setpoint(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let range = ctx.config.thermostat_temperature_range;
    let setpoint = in_range(SETPOINT, params::number(p, SETPOINT)?, range.min, range.max)?;
    Ok(Proposal::new().set(SETPOINT, setpoint))
}

pub(super) fn thermostat_set_range(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let range = ctx.config.thermostat_temperature_range;
    let high = in_range(SETPOINT_HIGH, params::number(p, SETPOINT_HIGH)?, range.min, range.max)?;
    let low = in_range(SETPOINT_LOW, params::number(p, SETPOINT_LOW)?, range.min, range.max)?;
    let buffer = ctx.config.buffer_range_celsius;
    if high - low < buffer {
        return Err(CommandError::invalid(
            SETPOINT_HIGH,
            format!("must exceed the low setpoint by at least {buffer}"),
        ));
    }
    Ok(Proposal::new().set(SETPOINT_HIGH, high).set(SETPOINT_LOW, low))
}

pub(super) fn thermostat_set_mode(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let wanted = params::text(p, "thermostatMode")?;
    let modes = ctx.config.available_thermostat_modes.iter().map(String::as_str);
    let mode = find_name(modes, &wanted).ok_or(CommandError::NotInAllowedValues {
        key: "thermostatMode".to_string(),
        value: wanted,
    })?;
    Ok(Proposal::new().set("thermostatMode", mode))
}

pub(super) fn temperature_relative(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let (name, raw) = first_of(
        p,
        &[
            "thermostatTemperatureRelativeDegree",
            "thermostatTemperatureRelativeWeight",
        ],
    )?;
    let delta = params::to_number(name, raw)?;
    let range = ctx.config.thermostat_temperature_range;

    if let (Some(high), Some(low)) = (ctx.number(SETPOINT_HIGH), ctx.number(SETPOINT_LOW)) {
        return Ok(Proposal::new()
            .set(SETPOINT_HIGH, range.clamp(high + delta))
            .set(SETPOINT_LOW, range.clamp(low + delta)));
    }

    let current = ctx
        .number(SETPOINT)
        .or_else(|| ctx.number("thermostatTemperatureAmbient"))
        .unwrap_or(range.min);
    Ok(Proposal::new().set(SETPOINT, range.clamp(current + delta)))
}

pub(super) fn set_temperature(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let range = ctx.config.temperature_range;
    let requested = in_range(
        "temperatureSetpointCelsius",
        params::number(p, "temperature")?,
        range.min,
        range.max,
    )?;
    let step = ctx.config.temperature_step_celsius;
    let snapped = if step > 0.0 {
        range.clamp(range.min + ((requested - range.min) / step).round() * step)
    } else {
        requested
    };
    Ok(Proposal::new().set("temperatureSetpointCelsius", snapped))
}

pub(super) fn set_humidity(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let range = ctx.config.humidity_setpoint_range;
    let humidity = in_range(
        "humiditySetpointPercent",
        params::number(p, "humidity")?,
        range.min,
        range.max,
    )?;
    Ok(Proposal::new().set("humiditySetpointPercent", whole(humidity)))
}

pub(super) fn humidity_relative(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let (name, raw) = first_of(p, &["humidityRelativePercent", "humidityRelativeWeight"])?;
    let mut delta = params::to_number(name, raw)?;
    if name == "humidityRelativeWeight" {
        delta *= PERCENT_WEIGHT_STEP;
    }
    let range = ctx.config.humidity_setpoint_range;
    let current = ctx.number("humiditySetpointPercent").unwrap_or(range.min);
    Ok(Proposal::new().set("humiditySetpointPercent", whole(range.clamp(current + delta))))
}

pub(super) fn set_fan_speed(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let (name, raw) = first_of(p, &["fanSpeed", "fanSpeedPercent"])?;
    if name == "fanSpeedPercent" {
        if !ctx.config.supports_fan_speed_percent {
            return Err(CommandError::invalid(name, "fan speed percentage not supported"));
        }
        let percent = in_range("currentFanSpeedPercent", params::to_number(name, raw)?, 0.0, 100.0)?;
        return Ok(Proposal::new().set("currentFanSpeedPercent", whole(percent)));
    }

    let wanted = params::to_text(name, raw)?;
    let setting = ctx
        .config
        .available_fan_speeds
        .iter()
        .find(|s| {
            find_name(
                std::iter::once(s.name.as_str()).chain(s.synonyms.iter().map(String::as_str)),
                &wanted,
            )
            .is_some()
        })
        .ok_or(CommandError::NotInAllowedValues {
            key: "currentFanSpeedSetting".to_string(),
            value: wanted,
        })?;
    Ok(Proposal::new().set("currentFanSpeedSetting", setting.name.as_str()))
}

pub(super) fn set_fan_speed_relative(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let (name, raw) = first_of(p, &["fanSpeedRelativeWeight", "fanSpeedRelativePercent"])?;
    let speeds = &ctx.config.available_fan_speeds;

    if name == "fanSpeedRelativeWeight" && !speeds.is_empty() {
        let weight = params::to_integer(name, raw)?;
        let current = ctx
            .text("currentFanSpeedSetting")
            .and_then(|c| speeds.iter().position(|s| s.name.eq_ignore_ascii_case(c)))
            .unwrap_or(0);
        let last = speeds.len() - 1;
        let target = i64::try_from(current)
            .unwrap_or(0)
            .saturating_add(weight)
            .clamp(0, i64::try_from(last).unwrap_or(0));
        let index = usize::try_from(target).unwrap_or(last);
        return Ok(Proposal::new().set("currentFanSpeedSetting", speeds[index].name.as_str()));
    }

    if !ctx.config.supports_fan_speed_percent {
        return Err(CommandError::invalid(name, "relative fan speed not supported"));
    }
    let mut delta = params::to_number(name, raw)?;
    if name == "fanSpeedRelativeWeight" {
        delta *= PERCENT_WEIGHT_STEP;
    }
    let current = ctx.number("currentFanSpeedPercent").unwrap_or(0.0);
    Ok(Proposal::new().set(
        "currentFanSpeedPercent",
        whole((current + delta).clamp(0.0, 100.0)),
    ))
}
