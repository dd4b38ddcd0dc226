// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Open/close and rotation commands.

use serde_json::{Value, json};

use super::params::{self, find_name, first_of, in_range, whole};
use super::{CommandContext, CommandParams, Proposal};
use crate::error::CommandError;

pub(super) fn open_close(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let percent = in_range("openPercent", params::number(p, "openPercent")?, 0.0, 100.0)?;
    if ctx.config.discrete_only_open_close && percent > 0.0 && percent < 100.0 {
        return Err(CommandError::invalid(
            "openPercent",
            "only fully open or closed is supported",
        ));
    }

    let directions = targets(ctx, p)?;
    if directions.is_empty() {
        return Ok(Proposal::new().set("openPercent", whole(percent)));
    }
    let elements: Vec<Value> = directions
        .into_iter()
        .map(|d| json!({ "openDirection": d, "openPercent": whole(percent) }))
        .collect();
    Ok(Proposal::new().set("openState", elements))
}

pub(super) fn open_close_relative(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    if ctx.config.discrete_only_open_close {
        return Err(CommandError::FunctionNotSupported {
            command: "OpenCloseRelative".to_string(),
        });
    }
    let delta = params::number(p, "openRelativePercent")?;

    let directions = targets(ctx, p)?;
    if directions.is_empty() {
        let current = ctx.number("openPercent").unwrap_or(0.0);
        return Ok(Proposal::new().set("openPercent", whole((current + delta).clamp(0.0, 100.0))));
    }
    let elements: Vec<Value> = directions
        .into_iter()
        .map(|d| {
            let current = current_direction(ctx, d).unwrap_or(0.0);
            json!({
                "openDirection": d,
                "openPercent": whole((current + delta).clamp(0.0, 100.0)),
            })
        })
        .collect();
    Ok(Proposal::new().set("openState", elements))
}

pub(super) fn rotate_absolute(
    ctx: &CommandContext<'_>,
    p: &CommandParams,
) -> Result<Proposal, CommandError> {
    let (name, raw) = first_of(p, &["rotationDegrees", "rotationPercent"])?;
    let value = params::to_number(name, raw)?;
    let value = if name == "rotationDegrees" {
        let range = ctx.config.rotation_degrees_range;
        in_range(name, value, range.min, range.max)?
    } else {
        in_range(name, value, 0.0, 100.0)?
    };
    Ok(Proposal::new().set(name, value))
}

/// Resolves the directions a command addresses.
///
/// Empty for single-direction devices. Without an `openDirection`
/// parameter every configured direction is addressed.
fn targets<'c>(ctx: &CommandContext<'c>, p: &CommandParams) -> Result<Vec<&'c str>, CommandError> {
    let directions = &ctx.config.open_directions;
    if directions.len() < 2 {
        return Ok(Vec::new());
    }
    let all = directions.iter().map(String::as_str);
    match params::opt_text(p, "openDirection")? {
        None => Ok(all.collect()),
        Some(wanted) => find_name(all, &wanted)
            .map(|d| vec![d])
            .ok_or(CommandError::NotInAllowedValues {
                key: "openDirection".to_string(),
                value: wanted,
            }),
    }
}

fn current_direction(ctx: &CommandContext<'_>, direction: &str) -> Option<f64> {
    ctx.state
        .get("openState")?
        .as_array()?
        .iter()
        .find(|e| {
            e.get("openDirection")
                .and_then(Value::as_str)
                .is_some_and(|d| d.eq_ignore_ascii_case(direction))
        })?
        .get("openPercent")?
        .as_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateDocument;
    use crate::traits::{Trait, TraitConfig, TraitSet};

    fn run(
        handler: super::super::Handler,
        config: &TraitConfig,
        state: Value,
        params: Value,
    ) -> Result<Proposal, CommandError> {
        let traits = TraitSet::new().with(Trait::OpenClose).with(Trait::Rotation);
        let state: StateDocument = serde_json::from_value(state).unwrap();
        let ctx = CommandContext::new(&traits, config, &state);
        handler(&ctx, params.as_object().unwrap())
    }

    #[test]
    fn single_direction_sets_percent() {
        let proposal = run(open_close, &TraitConfig::default(), json!({}), json!({"openPercent": 40}))
            .unwrap();
        assert_eq!(proposal.delta()["openPercent"], json!(40));
    }

    #[test]
    fn discrete_only() {
        let mut config = TraitConfig::default();
        config.discrete_only_open_close = true;

        let err = run(open_close, &config, json!({}), json!({"openPercent": 40})).unwrap_err();
        assert!(matches!(err, CommandError::InvalidParameter { .. }));
        assert!(run(open_close, &config, json!({}), json!({"openPercent": 100})).is_ok());

        let err = run(open_close_relative, &config, json!({}), json!({"openRelativePercent": 10}))
            .unwrap_err();
        assert!(matches!(err, CommandError::FunctionNotSupported { .. }));
    }

    #[test]
    fn multiple_directions_write_open_state() {
        let config = TraitConfig::default().with_open_directions(["UP", "DOWN"]);

        let proposal = run(
            open_close,
            &config,
            json!({}),
            json!({"openPercent": 100, "openDirection": "up"}),
        )
        .unwrap();
        assert_eq!(
            proposal.delta()["openState"],
            json!([{"openDirection": "UP", "openPercent": 100}])
        );

        let proposal = run(open_close, &config, json!({}), json!({"openPercent": 0})).unwrap();
        assert_eq!(proposal.delta()["openState"].as_array().unwrap().len(), 2);

        let err = run(
            open_close,
            &config,
            json!({}),
            json!({"openPercent": 0, "openDirection": "LEFT"}),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::NotInAllowedValues { .. }));
    }

    #[test]
    fn relative_per_direction() {
        let config = TraitConfig::default().with_open_directions(["UP", "DOWN"]);
        let state = json!({"openState": [
            {"openDirection": "UP", "openPercent": 30},
            {"openDirection": "DOWN", "openPercent": 90},
        ]});
        let proposal = run(
            open_close_relative,
            &config,
            state,
            json!({"openRelativePercent": 20}),
        )
        .unwrap();
        assert_eq!(
            proposal.delta()["openState"],
            json!([
                {"openDirection": "UP", "openPercent": 50},
                {"openDirection": "DOWN", "openPercent": 100},
            ])
        );
    }

    #[test]
    fn rotation() {
        let config = TraitConfig::default();
        let proposal = run(rotate_absolute, &config, json!({}), json!({"rotationDegrees": 90})).unwrap();
        assert_eq!(proposal.delta()["rotationDegrees"], json!(90.0));

        let err = run(rotate_absolute, &config, json!({}), json!({"rotationPercent": 120})).unwrap_err();
        assert!(matches!(err, CommandError::OutOfRange { .. }));
    }
}
