// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lock and alarm commands.

use super::params::{self, find_name};
use super::{CommandContext, CommandParams, Proposal};
use crate::error::CommandError;

pub(super) fn lock_unlock(
    _: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    Ok(Proposal::new().set("isLocked", params::boolean(p, "lock")?))
}

pub(super) fn arm_disarm(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    // Cancelling an arming in progress disarms.
    if params::opt_boolean(p, "cancel")?.unwrap_or(false) {
        return Ok(Proposal::new().set("isArmed", false));
    }

    let arm = params::boolean(p, "arm")?;
    let mut proposal = Proposal::new().set("isArmed", arm);
    if let Some(wanted) = params::opt_text(p, "armLevel")? {
        let levels = ctx.config.available_arm_levels.iter().map(String::as_str);
        let level = find_name(levels, &wanted).ok_or(CommandError::NotInAllowedValues {
            key: "currentArmLevel".to_string(),
            value: wanted,
        })?;
        proposal.insert("currentArmLevel", level);
    }
    Ok(proposal)
}
