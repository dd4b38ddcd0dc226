// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Volume, input, application, channel and transport commands.

use super::params::{self, find_name, first_of, in_range, whole};
use super::{CommandContext, CommandParams, Proposal};
use crate::error::CommandError;

#[allow(clippy::cast_precision_loss)]
pub(super) fn set_volume(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let max = ctx.config.volume_max_level as f64;
    let level = in_range("currentVolume", params::number(p, "volumeLevel")?, 0.0, max)?;
    Ok(Proposal::new().set("currentVolume", whole(level)))
}

#[allow(clippy::cast_possible_truncation)]
pub(super) fn volume_relative(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let steps = params::integer(p, "relativeSteps")?;
    let max = ctx.config.volume_max_level;
    let current = ctx.number("currentVolume").map_or(0, |v| v.round() as i64);
    let level = current
        .saturating_add(steps.saturating_mul(ctx.config.level_step_size))
        .clamp(0, max.max(0));
    Ok(Proposal::new().set("currentVolume", level))
}

pub(super) fn mute(ctx: &CommandContext<'_>, p: &CommandParams) -> Result<Proposal, CommandError> {
    if !ctx.config.volume_can_mute_and_unmute {
        return Err(CommandError::FunctionNotSupported {
            command: "mute".to_string(),
        });
    }
    Ok(Proposal::new().set("isMuted", params::boolean(p, "mute")?))
}

pub(super) fn set_input(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let wanted = params::text(p, "newInput")?;
    let input = find_name(inputs(ctx), &wanted).ok_or(CommandError::NotInAllowedValues {
        key: "currentInput".to_string(),
        value: wanted,
    })?;
    Ok(Proposal::new().set("currentInput", input))
}

pub(super) fn next_input(
    ctx: &CommandContext<'_>,
    _: &CommandParams,
) -> Result<Proposal, CommandError> {
    step_input(ctx, "NextInput", true)
}

pub(super) fn previous_input(
    ctx: &CommandContext<'_>,
    _: &CommandParams,
) -> Result<Proposal, CommandError> {
    step_input(ctx, "PreviousInput", false)
}

fn inputs<'c>(ctx: &CommandContext<'c>) -> impl Iterator<Item = &'c str> {
    ctx.config.available_inputs.iter().map(String::as_str)
}

fn step_input(
    ctx: &CommandContext<'_>,
    command: &str,
    forward: bool,
) -> Result<Proposal, CommandError> {
    let available = &ctx.config.available_inputs;
    if !ctx.config.ordered_inputs || available.is_empty() {
        return Err(CommandError::FunctionNotSupported {
            command: command.to_string(),
        });
    }
    let count = available.len();
    let current = ctx
        .text("currentInput")
        .and_then(|c| available.iter().position(|i| i.eq_ignore_ascii_case(c)));
    let index = match (current, forward) {
        (Some(i), true) => (i + 1) % count,
        (Some(i), false) => (i + count - 1) % count,
        (None, true) => 0,
        (None, false) => count - 1,
    };
    Ok(Proposal::new().set("currentInput", available[index].as_str()))
}

pub(super) fn app_select(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let (name, raw) = first_of(p, &["newApplication", "newApplicationName"])?;
    let wanted = params::to_text(name, raw)?;
    let app = ctx
        .config
        .available_applications
        .iter()
        .find(|a| {
            if name == "newApplication" {
                a.key.eq_ignore_ascii_case(wanted.trim())
            } else {
                find_name(a.names.iter().map(String::as_str), &wanted).is_some()
            }
        })
        .ok_or(CommandError::NotInAllowedValues {
            key: "currentApplication".to_string(),
            value: wanted,
        })?;
    Ok(Proposal::new().set("currentApplication", app.key.as_str()))
}

pub(super) fn select_channel(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let (name, raw) = first_of(p, &["channelCode", "channelName", "channelNumber"])?;
    let wanted = params::to_text(name, raw)?;
    let found = ctx.config.available_channels.iter().any(|c| match name {
        "channelCode" => c.key.eq_ignore_ascii_case(wanted.trim()),
        "channelName" => find_name(c.names.iter().map(String::as_str), &wanted).is_some(),
        _ => c.number.as_deref().is_some_and(|n| n.trim() == wanted.trim()),
    });
    if !found {
        return Err(CommandError::NotInAllowedValues {
            key: name.to_string(),
            value: wanted,
        });
    }
    Ok(Proposal::new())
}

pub(super) fn relative_channel(
    _: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    if params::integer(p, "relativeChannelChange")? == 0 {
        return Err(CommandError::invalid("relativeChannelChange", "must not be zero"));
    }
    Ok(Proposal::new())
}

pub(super) fn return_channel(
    _: &CommandContext<'_>,
    _: &CommandParams,
) -> Result<Proposal, CommandError> {
    Ok(Proposal::new())
}

pub(super) fn media_stop(
    _: &CommandContext<'_>,
    _: &CommandParams,
) -> Result<Proposal, CommandError> {
    Ok(Proposal::new().set("playbackState", "STOPPED"))
}

pub(super) fn media_pause(
    _: &CommandContext<'_>,
    _: &CommandParams,
) -> Result<Proposal, CommandError> {
    Ok(Proposal::new().set("playbackState", "PAUSED"))
}

pub(super) fn media_resume(
    _: &CommandContext<'_>,
    _: &CommandParams,
) -> Result<Proposal, CommandError> {
    Ok(Proposal::new().set("playbackState", "PLAYING"))
}
