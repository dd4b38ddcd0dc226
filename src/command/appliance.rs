// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Start/stop, timer, charging, dock, locator, reboot and scene commands.

use serde_json::Value;

use super::params::{self, find_name, in_range};
use super::{CommandContext, CommandParams, Proposal};
use crate::error::CommandError;

/// `timerRemainingSec` when no timer is set.
const NO_TIMER: i64 = -1;

pub(super) fn start_stop(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let start = params::boolean(p, "start")?;
    let mut proposal = Proposal::new().set("isRunning", start);
    if ctx.config.pausable {
        proposal.insert("isPaused", false);
    }

    let zones = &ctx.config.available_zones;
    let requested = requested_zones(p)?;
    if zones.is_empty() {
        if !requested.is_empty() {
            return Err(CommandError::invalid("zone", "zones not supported"));
        }
        return Ok(proposal);
    }

    let mut active = Vec::new();
    if start {
        for wanted in &requested {
            let zone = find_name(zones.iter().map(String::as_str), wanted).ok_or_else(|| {
                CommandError::NotInAllowedValues {
                    key: "activeZones".to_string(),
                    value: wanted.clone(),
                }
            })?;
            active.push(Value::from(zone));
        }
    }
    proposal.insert("activeZones", active);
    Ok(proposal)
}

fn requested_zones(p: &CommandParams) -> Result<Vec<String>, CommandError> {
    if let Some(zone) = params::opt_text(p, "zone")? {
        return Ok(vec![zone]);
    }
    match params::raw(p, "multipleZones") {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|z| params::to_text("multipleZones", z))
            .collect(),
        Some(_) => Err(CommandError::invalid("multipleZones", "expected array")),
    }
}

pub(super) fn pause_unpause(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    if !ctx.config.pausable {
        return Err(CommandError::FunctionNotSupported {
            command: "PauseUnpause".to_string(),
        });
    }
    Ok(Proposal::new().set("isPaused", params::boolean(p, "pause")?))
}

pub(super) fn timer_start(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let seconds = params::integer(p, "timerTimeSec")?;
    let seconds = checked_duration(ctx, seconds)?;
    Ok(Proposal::new()
        .set("timerRemainingSec", seconds)
        .set("timerPaused", false))
}

pub(super) fn timer_adjust(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let remaining = running_timer(ctx, "timerTimeSec")?;
    let adjust = params::integer(p, "timerTimeSec")?;
    let seconds = checked_duration(ctx, remaining.saturating_add(adjust))?;
    Ok(Proposal::new().set("timerRemainingSec", seconds))
}

pub(super) fn timer_pause(
    ctx: &CommandContext<'_>,
    _: &CommandParams,
) -> Result<Proposal, CommandError> {
    running_timer(ctx, "timerPaused")?;
    Ok(Proposal::new()
        .set("timerPaused", true)
        .acknowledge("timerRemainingSec"))
}

pub(super) fn timer_resume(
    ctx: &CommandContext<'_>,
    _: &CommandParams,
) -> Result<Proposal, CommandError> {
    running_timer(ctx, "timerPaused")?;
    Ok(Proposal::new()
        .set("timerPaused", false)
        .acknowledge("timerRemainingSec"))
}

pub(super) fn timer_cancel(
    ctx: &CommandContext<'_>,
    _: &CommandParams,
) -> Result<Proposal, CommandError> {
    running_timer(ctx, "timerRemainingSec")?;
    Ok(Proposal::new()
        .set("timerRemainingSec", NO_TIMER)
        .set("timerPaused", false))
}

fn running_timer(ctx: &CommandContext<'_>, name: &str) -> Result<i64, CommandError> {
    ctx.state
        .get("timerRemainingSec")
        .and_then(Value::as_i64)
        .filter(|&s| s > 0)
        .ok_or_else(|| CommandError::invalid(name, "no timer is running"))
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn checked_duration(ctx: &CommandContext<'_>, seconds: i64) -> Result<i64, CommandError> {
    let max = ctx.config.max_timer_limit_sec;
    in_range("timerRemainingSec", seconds as f64, 1.0, max as f64).map(|s| s as i64)
}

pub(super) fn charge(_: &CommandContext<'_>, p: &CommandParams) -> Result<Proposal, CommandError> {
    Ok(Proposal::new().set("isCharging", params::boolean(p, "charge")?))
}

pub(super) fn dock(_: &CommandContext<'_>, _: &CommandParams) -> Result<Proposal, CommandError> {
    Ok(Proposal::new().set("isDocked", true))
}

pub(super) fn locate(_: &CommandContext<'_>, p: &CommandParams) -> Result<Proposal, CommandError> {
    params::opt_boolean(p, "silence")?;
    params::opt_text(p, "lang")?;
    Ok(Proposal::new())
}

pub(super) fn reboot(_: &CommandContext<'_>, _: &CommandParams) -> Result<Proposal, CommandError> {
    Ok(Proposal::new())
}

pub(super) fn activate_scene(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let deactivate = params::opt_boolean(p, "deactivate")?.unwrap_or(false);
    if deactivate && !ctx.config.scene_reversible {
        return Err(CommandError::invalid("deactivate", "scene is not reversible"));
    }
    Ok(Proposal::new())
}
