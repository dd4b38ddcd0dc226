// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `traitstate` library.
//!
//! Errors come in two layers:
//!
//! - [`ValidationError`] is reported per field by the state reconciler. It
//!   never aborts a whole update: the offending field is skipped and the
//!   error is collected in the [`Reconciliation`](crate::state::Reconciliation).
//! - [`CommandError`] aborts a whole command before any state is touched.
//!
//! Both map onto the flat [`ErrorKind`] catalogue that external layers
//! surface to the platform.

use std::fmt;

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A field failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A command was rejected.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Device was not found in the manager.
    #[error("device not found")]
    DeviceNotFound,

    /// Device or trait configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Flat catalogue of the error kinds surfaced to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// A mandatory field is absent and no exclusive sibling excuses it.
    MandatoryFieldMissing,
    /// A numeric value lies outside `min..=max`.
    OutOfRange,
    /// A value is not one of the allowed literals.
    NotInAllowedValues,
    /// Several array elements share the same natural key.
    DuplicateKey,
    /// A natural key was rejected by the key validator.
    InvalidKey,
    /// A value cannot be coerced to the field's primitive type.
    InvalidType,
    /// The command identifier is not known.
    UnknownCommand,
    /// The command is known but its trait is not enabled on the device.
    FunctionNotSupported,
    /// A required command parameter is absent.
    MissingCommandParameter,
    /// A command parameter has the wrong shape.
    InvalidParameter,
    /// The command is PIN protected but no PIN has been configured.
    ChallengeNotConfigured,
    /// The challenge was answered incorrectly.
    ChallengeFailed,
}

impl ErrorKind {
    /// Returns the platform error code for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MandatoryFieldMissing => "mandatoryFieldMissing",
            Self::OutOfRange => "valueOutOfRange",
            Self::NotInAllowedValues => "notSupported",
            Self::DuplicateKey => "duplicateKey",
            Self::InvalidKey => "invalidKey",
            Self::InvalidType => "invalidValue",
            Self::UnknownCommand => "unknownCommand",
            Self::FunctionNotSupported => "functionNotSupported",
            Self::MissingCommandParameter => "protocolError",
            Self::InvalidParameter => "invalidValue",
            Self::ChallengeNotConfigured => "challengeFailedNotSetup",
            Self::ChallengeFailed => "challengeFailedPinNeeded",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-level errors reported by the state reconciler.
///
/// `path` is a dotted path to the offending field, with keyed array
/// elements written as `key[element-key]`, e.g. `openState[UP].openPercent`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A mandatory field is missing from both the update and the state.
    #[error("mandatory field {path} is missing")]
    MandatoryFieldMissing {
        /// Path of the missing field.
        path: String,
    },

    /// A numeric value is outside its bounds.
    #[error("value {value} for {path} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Path of the field.
        path: String,
        /// The rejected value.
        value: f64,
        /// Lower bound (`-inf` when unbounded).
        min: f64,
        /// Upper bound (`inf` when unbounded).
        max: f64,
    },

    /// A value is not one of the allowed literals.
    #[error("value {value} for {path} is not an allowed value")]
    NotInAllowedValues {
        /// Path of the field.
        path: String,
        /// The rejected value, rendered as JSON.
        value: String,
    },

    /// Several existing elements match the same natural key.
    #[error("duplicate key {key} in {path}")]
    DuplicateKey {
        /// Path of the array.
        path: String,
        /// The duplicated natural key.
        key: String,
    },

    /// The key validator rejected a natural key.
    #[error("invalid key {key} in {path}")]
    InvalidKey {
        /// Path of the array.
        path: String,
        /// The rejected key.
        key: String,
    },

    /// The value cannot be coerced to the field type.
    #[error("value for {path} is not a valid {expected}")]
    InvalidType {
        /// Path of the field.
        path: String,
        /// Name of the expected kind.
        expected: &'static str,
    },
}

impl ValidationError {
    /// Returns the error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MandatoryFieldMissing { .. } => ErrorKind::MandatoryFieldMissing,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::NotInAllowedValues { .. } => ErrorKind::NotInAllowedValues,
            Self::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Self::InvalidKey { .. } => ErrorKind::InvalidKey,
            Self::InvalidType { .. } => ErrorKind::InvalidType,
        }
    }

    /// Returns the path of the offending field.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::MandatoryFieldMissing { path }
            | Self::OutOfRange { path, .. }
            | Self::NotInAllowedValues { path, .. }
            | Self::DuplicateKey { path, .. }
            | Self::InvalidKey { path, .. }
            | Self::InvalidType { path, .. } => path,
        }
    }
}

/// Errors that abort a whole command.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    /// The command identifier is not in the handler table.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The command's trait is not enabled on this device.
    #[error("command {command} is not supported by this device")]
    FunctionNotSupported {
        /// The command identifier.
        command: String,
    },

    /// A required parameter is absent.
    #[error("missing parameter {0}")]
    MissingCommandParameter(String),

    /// A parameter is present but malformed.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// A parameter names a value the device does not offer.
    #[error("{value} is not an available value for {key}")]
    NotInAllowedValues {
        /// State key or parameter the value was checked against.
        key: String,
        /// The rejected value.
        value: String,
    },

    /// A numeric parameter is outside the device's range.
    #[error("value {value} for {key} is out of range [{min}, {max}]")]
    OutOfRange {
        /// State key the value was checked against.
        key: String,
        /// The rejected value.
        value: f64,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// The command requires a PIN but none is configured.
    #[error("challenge for {category} is not set up")]
    ChallengeNotConfigured {
        /// The command category (trait name).
        category: String,
    },
}

impl CommandError {
    /// Returns the error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownCommand(_) => ErrorKind::UnknownCommand,
            Self::FunctionNotSupported { .. } => ErrorKind::FunctionNotSupported,
            Self::MissingCommandParameter(_) => ErrorKind::MissingCommandParameter,
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Self::NotInAllowedValues { .. } => ErrorKind::NotInAllowedValues,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::ChallengeNotConfigured { .. } => ErrorKind::ChallengeNotConfigured,
        }
    }

    pub(crate) fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
