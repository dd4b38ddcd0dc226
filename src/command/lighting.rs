// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power, brightness and color commands.

use serde_json::json;

use super::params::{self, first_of, in_range, whole};
use super::{CommandContext, CommandParams, Proposal};
use crate::error::CommandError;
use crate::traits::ColorModel;

/// Largest 24-bit RGB value.
const RGB_MAX: f64 = 16_777_215.0;

/// Brightness points per relative weight unit.
const BRIGHTNESS_WEIGHT_STEP: f64 = 10.0;

pub(super) fn on_off(_: &CommandContext<'_>, p: &CommandParams) -> Result<Proposal, CommandError> {
    Ok(Proposal::new().set("on", params::boolean(p, "on")?))
}

pub(super) fn brightness_absolute(
    _: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let level = in_range("brightness", params::number(p, "brightness")?, 0.0, 100.0)?;
    Ok(Proposal::new().set("brightness", whole(level)))
}

pub(super) fn brightness_relative(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let (name, raw) = first_of(p, &["brightnessRelativePercent", "brightnessRelativeWeight"])?;
    let mut delta = params::to_number(name, raw)?;
    if name == "brightnessRelativeWeight" {
        delta *= BRIGHTNESS_WEIGHT_STEP;
    }
    let current = ctx.number("brightness").unwrap_or(0.0);
    let level = (current + delta).clamp(0.0, 100.0);
    Ok(Proposal::new().set("brightness", whole(level)))
}

pub(super) fn color_absolute(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let color = params::object(p, "color")?;
    let (name, raw) = first_of(
        color,
        &["temperatureK", "temperature", "spectrumRgb", "spectrumRGB", "spectrumHsv", "spectrumHSV"],
    )?;

    let value = match name {
        "temperatureK" | "temperature" => {
            let range = ctx
                .config
                .color_temperature_range
                .ok_or_else(|| CommandError::invalid(name, "color temperature not supported"))?;
            let k = in_range("temperatureK", params::to_number(name, raw)?, range.min, range.max)?;
            json!({ "temperatureK": whole(k) })
        }
        "spectrumRgb" | "spectrumRGB" => {
            require_model(ctx, ColorModel::Rgb, name)?;
            let rgb = in_range("spectrumRgb", params::to_number(name, raw)?, 0.0, RGB_MAX)?;
            json!({ "spectrumRgb": whole(rgb) })
        }
        _ => {
            require_model(ctx, ColorModel::Hsv, name)?;
            let hsv = raw
                .as_object()
                .ok_or_else(|| CommandError::invalid(name, "expected object"))?;
            json!({
                "spectrumHsv": {
                    "hue": in_range("hue", params::number(hsv, "hue")?, 0.0, 360.0)?,
                    "saturation": in_range("saturation", params::number(hsv, "saturation")?, 0.0, 1.0)?,
                    "value": in_range("value", params::number(hsv, "value")?, 0.0, 1.0)?,
                }
            })
        }
    };
    Ok(Proposal::new().set("color", value))
}

fn require_model(ctx: &CommandContext<'_>, model: ColorModel, name: &str) -> Result<(), CommandError> {
    if ctx.config.color_model == Some(model) {
        Ok(())
    } else {
        Err(CommandError::invalid(name, "color model not supported"))
    }
}
