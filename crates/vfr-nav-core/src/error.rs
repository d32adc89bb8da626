// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use std::fmt;
use thiserror::Error;

/// A field of a JSON document that did not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path from the document root, e.g. `state.legs[1].wind.velocity`
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

fn join(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum PlanError {
    /// An imported document was rejected. Nothing was written.
    #[error("Flight plan rejected: {}", join(.0))]
    Validation(Vec<FieldError>),

    /// A stored record could not be migrated. The plan was not loaded.
    #[error("Stored flight plan {key} is corrupted: {}", join(.errors))]
    CorruptedData {
        key: String,
        errors: Vec<FieldError>,
    },

    /// The key lies outside the flight plan namespace.
    #[error("{0:?} is not a flight plan key")]
    InvalidKey(String),

    #[error("A flight plan named {0:?} already exists")]
    PlanExists(String),

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PlanError {
    /// Field errors carried by a validation or corruption failure.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            PlanError::Validation(errors) | PlanError::CorruptedData { errors, .. } => errors,
            _ => &[],
        }
    }
}
