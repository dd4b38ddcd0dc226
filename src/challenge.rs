// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Challenge/PIN guard for sensitive commands.
//!
//! Each command belongs to a category (its [`Trait`]). The device's
//! [`ChallengePolicy`] assigns each category a [`ChallengeType`] and,
//! for PIN challenges, the expected PIN. Before a command is applied the
//! [`ChallengeGuard`] checks the caller's [`Challenge`] answer:
//!
//! | Policy        | Answer                | Verdict                                     |
//! |---------------|-----------------------|---------------------------------------------|
//! | `None`        | anything              | proceed                                     |
//! | `AckNeeded`   | `ack == false`        | challenge required (`AckNeeded`)            |
//! | `PinNeeded`   | no PIN configured     | rejected (`ChallengeNotConfigured`)         |
//! | `PinNeeded`   | no PIN supplied       | PIN prompt event, then `PinNeeded`          |
//! | `PinNeeded`   | wrong PIN             | challenge required (`PinMismatch`)          |
//!
//! # Examples
//!
//! ```
//! use traitstate_lib::challenge::{
//!     Challenge, ChallengeGuard, ChallengeKind, ChallengePolicy, ChallengeType, Verdict,
//! };
//! use traitstate_lib::event::{DeviceId, EventLog};
//! use traitstate_lib::traits::Trait;
//!
//! let policy = ChallengePolicy::new().with(Trait::LockUnlock, ChallengeType::PinNeeded, Some("1234"));
//! let log = EventLog::new();
//! let guard = ChallengeGuard::new(DeviceId::new(), &policy, &log);
//!
//! let verdict = guard.check("LockUnlock", Trait::LockUnlock, &Challenge::none());
//! assert_eq!(verdict, Verdict::Required(ChallengeKind::PinNeeded));
//! assert_eq!(log.len(), 1);
//!
//! let verdict = guard.check("LockUnlock", Trait::LockUnlock, &Challenge::pin("1234"));
//! assert_eq!(verdict, Verdict::Proceed);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CommandError, Error, ErrorKind};
use crate::event::{DeviceEvent, DeviceId, EventSink};
use crate::traits::Trait;

/// Kind of confirmation a command category requires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChallengeType {
    /// No confirmation.
    #[default]
    None,
    /// The user must acknowledge the command.
    AckNeeded,
    /// The user must supply the configured PIN.
    PinNeeded,
}

impl ChallengeType {
    /// Returns the platform name of the challenge type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::AckNeeded => "ackNeeded",
            Self::PinNeeded => "pinNeeded",
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "ack" | "ackneeded" => Ok(Self::AckNeeded),
            "pin" | "pinneeded" => Ok(Self::PinNeeded),
            _ => Err(Error::Config(format!("unknown challenge type: {s}"))),
        }
    }
}

/// Challenge settings of one command category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRule {
    /// Required confirmation.
    #[serde(rename = "type", default)]
    pub challenge_type: ChallengeType,
    /// Expected PIN for [`ChallengeType::PinNeeded`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
}

impl ChallengeRule {
    /// Returns the configured PIN, ignoring blank ones.
    #[must_use]
    pub fn configured_pin(&self) -> Option<&str> {
        self.pin.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

/// Per-category challenge configuration of a device.
///
/// Categories without an entry need no confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengePolicy(BTreeMap<Trait, ChallengeRule>);

impl ChallengePolicy {
    /// Creates a policy requiring no confirmation anywhere.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rule of a category, builder style.
    #[must_use]
    pub fn with(mut self, category: Trait, challenge_type: ChallengeType, pin: Option<&str>) -> Self {
        self.set(category, challenge_type, pin.map(str::to_string));
        self
    }

    /// Sets the rule of a category.
    ///
    /// Setting [`ChallengeType::None`] without a PIN removes the entry.
    pub fn set(&mut self, category: Trait, challenge_type: ChallengeType, pin: Option<String>) {
        if challenge_type == ChallengeType::None && pin.is_none() {
            self.0.remove(&category);
        } else {
            self.0.insert(category, ChallengeRule { challenge_type, pin });
        }
    }

    /// Returns the rule of a category.
    #[must_use]
    pub fn rule(&self, category: Trait) -> ChallengeRule {
        self.0.get(&category).cloned().unwrap_or_default()
    }

    /// Returns the challenge type of a category.
    #[must_use]
    pub fn challenge_type(&self, category: Trait) -> ChallengeType {
        self.0
            .get(&category)
            .map_or(ChallengeType::None, |r| r.challenge_type)
    }

    /// Iterates configured categories.
    pub fn iter(&self) -> impl Iterator<Item = (Trait, &ChallengeRule)> {
        self.0.iter().map(|(t, r)| (*t, r))
    }
}

/// The caller's answer to a challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// The user acknowledged the command.
    #[serde(default)]
    pub ack: bool,
    /// The PIN the user entered.
    #[serde(default)]
    pub pin: Option<String>,
}

impl Challenge {
    /// No answer.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// An acknowledgement.
    #[must_use]
    pub fn ack() -> Self {
        Self {
            ack: true,
            pin: None,
        }
    }

    /// A PIN answer.
    #[must_use]
    pub fn pin(pin: impl Into<String>) -> Self {
        Self {
            ack: false,
            pin: Some(pin.into()),
        }
    }

    fn supplied_pin(&self) -> Option<&str> {
        self.pin.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

/// Why a command is waiting for a challenge answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChallengeKind {
    /// An acknowledgement is required.
    AckNeeded,
    /// A PIN is required.
    PinNeeded,
    /// The supplied PIN is wrong.
    PinMismatch,
}

impl ChallengeKind {
    /// Returns the platform challenge code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AckNeeded => "ackNeeded",
            Self::PinNeeded => "pinNeeded",
            Self::PinMismatch => "challengeFailedPinNeeded",
        }
    }

    /// Returns the error kind a host reports for this challenge.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::ChallengeFailed
    }
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a challenge check.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The command may be applied.
    Proceed,
    /// The command waits for a challenge answer.
    Required(ChallengeKind),
    /// The command can never pass as configured.
    Rejected(CommandError),
}

/// Checks challenge answers against a device's policy.
pub struct ChallengeGuard<'a> {
    device_id: DeviceId,
    policy: &'a ChallengePolicy,
    sink: &'a dyn EventSink,
}

impl<'a> ChallengeGuard<'a> {
    /// Creates a guard publishing PIN prompts to `sink`.
    #[must_use]
    pub fn new(device_id: DeviceId, policy: &'a ChallengePolicy, sink: &'a dyn EventSink) -> Self {
        Self {
            device_id,
            policy,
            sink,
        }
    }

    /// Checks `challenge` for `command` of `category`.
    ///
    /// Publishes one [`DeviceEvent::PinPrompt`] when a PIN is required but
    /// none was supplied.
    #[must_use]
    pub fn check(&self, command: &str, category: Trait, challenge: &Challenge) -> Verdict {
        let rule = self.policy.rule(category);
        let verdict = match rule.challenge_type {
            ChallengeType::None => Verdict::Proceed,
            ChallengeType::AckNeeded if challenge.ack => Verdict::Proceed,
            ChallengeType::AckNeeded => Verdict::Required(ChallengeKind::AckNeeded),
            ChallengeType::PinNeeded => match (rule.configured_pin(), challenge.supplied_pin()) {
                (None, _) => Verdict::Rejected(CommandError::ChallengeNotConfigured {
                    category: category.to_string(),
                }),
                (Some(_), None) => {
                    self.sink
                        .emit(DeviceEvent::pin_prompt(self.device_id, command, category));
                    Verdict::Required(ChallengeKind::PinNeeded)
                }
                (Some(expected), Some(given)) if expected == given => Verdict::Proceed,
                (Some(_), Some(_)) => Verdict::Required(ChallengeKind::PinMismatch),
            },
        };

        tracing::debug!(
            device_id = %self.device_id,
            command,
            category = %category,
            challenge = %rule.challenge_type,
            verdict = ?verdict,
            "Challenge checked"
        );
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventLog;

    fn check(policy: &ChallengePolicy, log: &EventLog, challenge: &Challenge) -> Verdict {
        ChallengeGuard::new(DeviceId::new(), policy, log).check(
            "ArmDisarm",
            Trait::ArmDisarm,
            challenge,
        )
    }

    #[test]
    fn no_policy_proceeds() {
        let log = EventLog::new();
        assert_eq!(check(&ChallengePolicy::new(), &log, &Challenge::none()), Verdict::Proceed);
        assert!(log.is_empty());
    }

    #[test]
    fn ack_needed() {
        let policy = ChallengePolicy::new().with(Trait::ArmDisarm, ChallengeType::AckNeeded, None);
        let log = EventLog::new();

        assert_eq!(
            check(&policy, &log, &Challenge::none()),
            Verdict::Required(ChallengeKind::AckNeeded)
        );
        assert_eq!(check(&policy, &log, &Challenge::ack()), Verdict::Proceed);
        assert!(log.is_empty());
    }

    #[test]
    fn pin_not_configured() {
        let policy = ChallengePolicy::new().with(Trait::ArmDisarm, ChallengeType::PinNeeded, Some("  "));
        let log = EventLog::new();

        let verdict = check(&policy, &log, &Challenge::pin("1234"));
        assert!(matches!(
            verdict,
            Verdict::Rejected(CommandError::ChallengeNotConfigured { .. })
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn missing_pin_prompts_once() {
        let policy = ChallengePolicy::new().with(Trait::ArmDisarm, ChallengeType::PinNeeded, Some("0000"));
        let log = EventLog::new();

        assert_eq!(
            check(&policy, &log, &Challenge::none()),
            Verdict::Required(ChallengeKind::PinNeeded)
        );
        assert_eq!(log.count(DeviceEvent::is_pin_prompt), 1);
    }

    #[test]
    fn pin_mismatch_and_match() {
        let policy = ChallengePolicy::new().with(Trait::ArmDisarm, ChallengeType::PinNeeded, Some("0000"));
        let log = EventLog::new();

        assert_eq!(
            check(&policy, &log, &Challenge::pin("1111")),
            Verdict::Required(ChallengeKind::PinMismatch)
        );
        assert_eq!(check(&policy, &log, &Challenge::pin(" 0000 ")), Verdict::Proceed);
        assert!(log.is_empty());
    }

    #[test]
    fn other_categories_unaffected() {
        let policy = ChallengePolicy::new().with(Trait::LockUnlock, ChallengeType::PinNeeded, Some("1"));
        let log = EventLog::new();
        assert_eq!(check(&policy, &log, &Challenge::none()), Verdict::Proceed);
    }

    #[test]
    fn set_none_clears_entry() {
        let mut policy = ChallengePolicy::new().with(Trait::ArmDisarm, ChallengeType::AckNeeded, None);
        policy.set(Trait::ArmDisarm, ChallengeType::None, None);
        assert_eq!(policy.iter().count(), 0);
        assert_eq!(policy.challenge_type(Trait::ArmDisarm), ChallengeType::None);
    }

    #[test]
    fn challenge_type_parsing() {
        assert_eq!("pinNeeded".parse::<ChallengeType>().unwrap(), ChallengeType::PinNeeded);
        assert_eq!("ACK".parse::<ChallengeType>().unwrap(), ChallengeType::AckNeeded);
        assert_eq!("".parse::<ChallengeType>().unwrap(), ChallengeType::None);
        assert!("retina".parse::<ChallengeType>().is_err());
    }

    #[test]
    fn policy_deserializes_from_json() {
        let policy: ChallengePolicy = serde_json::from_value(serde_json::json!({
            "LockUnlock": {"type": "pinNeeded", "pin": "4321"},
            "OpenClose": {"type": "ackNeeded"}
        }))
        .unwrap();

        assert_eq!(policy.challenge_type(Trait::OpenClose), ChallengeType::AckNeeded);
        assert_eq!(policy.rule(Trait::LockUnlock).configured_pin(), Some("4321"));
    }
}
