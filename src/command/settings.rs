// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `Modes` and `Toggles` commands.

use serde_json::{Map, Value};

use super::params::{self, find_name};
use super::{CommandContext, CommandParams, Proposal};
use crate::error::CommandError;

pub(super) fn set_modes(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let update = non_empty(p, "updateModeSettings")?;
    let mut settings = Map::new();
    for (name, raw) in update {
        let mode = ctx
            .config
            .mode(name)
            .ok_or_else(|| not_allowed("currentModeSettings", name))?;
        let wanted = params::to_text(name, raw)?;
        let setting = find_name(mode.settings.iter().map(String::as_str), &wanted)
            .ok_or_else(|| not_allowed(&format!("currentModeSettings.{}", mode.name), &wanted))?;
        settings.insert(mode.name.clone(), Value::from(setting));
    }
    Ok(Proposal::new().set("currentModeSettings", settings))
}

pub(super) fn set_toggles(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let update = non_empty(p, "updateToggleSettings")?;
    let mut toggles = Map::new();
    for (name, raw) in update {
        let toggle = find_name(ctx.config.available_toggles.iter().map(String::as_str), name)
            .ok_or_else(|| not_allowed("currentToggleSettings", name))?;
        toggles.insert(toggle.to_string(), Value::from(params::to_bool(name, raw)?));
    }
    Ok(Proposal::new().set("currentToggleSettings", toggles))
}

fn non_empty<'p>(p: &'p CommandParams, name: &str) -> Result<&'p CommandParams, CommandError> {
    let update = params::object(p, name)?;
    if update.is_empty() {
        return Err(CommandError::invalid(name, "nothing to update"));
    }
    Ok(update)
}

fn not_allowed(key: &str, value: &str) -> CommandError {
    CommandError::NotInAllowedValues {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateDocument;
    use crate::traits::{Trait, TraitConfig, TraitSet};
    use serde_json::json;

    fn config() -> TraitConfig {
        TraitConfig::default()
            .with_mode("load", ["small", "large"])
            .with_mode("temperature", ["cold", "warm", "hot"])
            .with_toggle("Turbo")
            .with_toggle("Quiet")
    }

    fn run(handler: super::super::Handler, params: Value) -> Result<Proposal, CommandError> {
        let traits = TraitSet::new().with(Trait::Modes).with(Trait::Toggles);
        let config = config();
        let state = StateDocument::new();
        let ctx = CommandContext::new(&traits, &config, &state);
        handler(&ctx, params.as_object().unwrap())
    }

    #[test]
    fn modes_use_configured_spelling() {
        let proposal = run(
            set_modes,
            json!({"updateModeSettings": {"LOAD": "Large", "temperature": "warm"}}),
        )
        .unwrap();
        assert_eq!(
            proposal.delta()["currentModeSettings"],
            json!({"load": "large", "temperature": "warm"})
        );
    }

    #[test]
    fn unknown_mode_or_setting() {
        let err = run(set_modes, json!({"updateModeSettings": {"speed": "fast"}})).unwrap_err();
        assert_eq!(err, not_allowed("currentModeSettings", "speed"));

        let err = run(set_modes, json!({"updateModeSettings": {"load": "huge"}})).unwrap_err();
        assert_eq!(err, not_allowed("currentModeSettings.load", "huge"));
    }

    #[test]
    fn toggles() {
        let proposal = run(set_toggles, json!({"updateToggleSettings": {"turbo": "on"}})).unwrap();
        assert_eq!(proposal.delta()["currentToggleSettings"], json!({"Turbo": true}));

        let err = run(set_toggles, json!({"updateToggleSettings": {"Sleep": true}})).unwrap_err();
        assert!(matches!(err, CommandError::NotInAllowedValues { .. }));
    }

    #[test]
    fn empty_update_is_invalid() {
        let err = run(set_toggles, json!({"updateToggleSettings": {}})).unwrap_err();
        assert!(matches!(err, CommandError::InvalidParameter { .. }));
    }
}
